//! Command-line argument surface.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use paperjet::{
	ConvertOptions, InputSource, Margins, PageSettings, PaperFormat, ProgressSink,
	SupervisorOptions, WindowSize,
};
use url::Url;

/// Render HTML and text documents to PDF through headless Chromium.
#[derive(Debug, Parser)]
#[command(name = "paperjet", version, about)]
pub struct Cli {
	/// Input document: a local file or an http(s) URL.
	pub input: String,

	/// Output PDF path; its parent directory must already exist.
	pub output: PathBuf,

	/// Paper format.
	#[arg(long, value_enum, default_value = "a4")]
	pub paper_format: PaperFormatArg,

	/// Custom paper width in inches; overrides --paper-format.
	#[arg(long, requires = "paper_height")]
	pub paper_width: Option<f64>,

	/// Custom paper height in inches; overrides --paper-format.
	#[arg(long, requires = "paper_width")]
	pub paper_height: Option<f64>,

	/// Top margin in inches.
	#[arg(long, default_value_t = 0.4)]
	pub margin_top: f64,

	/// Bottom margin in inches.
	#[arg(long, default_value_t = 0.4)]
	pub margin_bottom: f64,

	/// Left margin in inches.
	#[arg(long, default_value_t = 0.4)]
	pub margin_left: f64,

	/// Right margin in inches.
	#[arg(long, default_value_t = 0.4)]
	pub margin_right: f64,

	/// Landscape orientation.
	#[arg(long)]
	pub landscape: bool,

	/// Print the browser's header and footer.
	#[arg(long)]
	pub header_footer: bool,

	/// Print background graphics.
	#[arg(long)]
	pub background: bool,

	/// Rendering scale factor (0.1 to 2.0).
	#[arg(long, default_value_t = 1.0)]
	pub scale: f64,

	/// Page ranges to print, e.g. "1-5, 8, 11-13".
	#[arg(long)]
	pub page_ranges: Option<String>,

	/// Tolerate page ranges past the end of the document.
	#[arg(long)]
	pub ignore_invalid_page_ranges: bool,

	/// Render only once the page sets window.status to this value.
	#[arg(long)]
	pub wait_for_status: Option<String>,

	/// Milliseconds to wait for the status value.
	#[arg(long, default_value_t = 60_000)]
	pub wait_for_status_timeout: u64,

	/// Overall conversion timeout in milliseconds.
	#[arg(long)]
	pub timeout: Option<u64>,

	/// Explicit browser executable.
	#[arg(long)]
	pub chrome_path: Option<PathBuf>,

	/// Browser window size as WIDTHxHEIGHT in pixels.
	#[arg(long, value_parser = parse_window_size)]
	pub window_size: Option<WindowSize>,

	/// Proxy server, e.g. "socks5://127.0.0.1:1080".
	#[arg(long)]
	pub proxy_server: Option<String>,

	/// Comma-separated proxy bypass list.
	#[arg(long)]
	pub proxy_bypass: Option<String>,

	/// Proxy auto-config URL.
	#[arg(long)]
	pub proxy_pac_url: Option<String>,

	/// User agent override.
	#[arg(long)]
	pub user_agent: Option<String>,

	/// Browser profile directory (must exist).
	#[arg(long)]
	pub user_data_dir: Option<PathBuf>,

	/// Extra extension to pre-wrap as text (repeatable).
	#[arg(long = "pre-wrap-ext")]
	pub pre_wrap_ext: Vec<String>,

	/// Append timestamped progress lines to this file.
	#[arg(long)]
	pub log_file: Option<PathBuf>,

	/// Increase verbosity (-v, -vv).
	#[arg(short, long, action = ArgAction::Count)]
	pub verbose: u8,
}

/// Named paper formats accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PaperFormatArg {
	Letter,
	Legal,
	Tabloid,
	Ledger,
	A0,
	A1,
	A2,
	A3,
	A4,
	A5,
	A6,
}

impl From<PaperFormatArg> for PaperFormat {
	fn from(arg: PaperFormatArg) -> Self {
		match arg {
			PaperFormatArg::Letter => PaperFormat::Letter,
			PaperFormatArg::Legal => PaperFormat::Legal,
			PaperFormatArg::Tabloid => PaperFormat::Tabloid,
			PaperFormatArg::Ledger => PaperFormat::Ledger,
			PaperFormatArg::A0 => PaperFormat::A0,
			PaperFormatArg::A1 => PaperFormat::A1,
			PaperFormatArg::A2 => PaperFormat::A2,
			PaperFormatArg::A3 => PaperFormat::A3,
			PaperFormatArg::A4 => PaperFormat::A4,
			PaperFormatArg::A5 => PaperFormat::A5,
			PaperFormatArg::A6 => PaperFormat::A6,
		}
	}
}

fn parse_window_size(value: &str) -> Result<WindowSize, String> {
	let (width, height) = value
		.split_once(['x', 'X'])
		.ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))?;
	let width: u32 = width.trim().parse().map_err(|_| format!("bad width in {value:?}"))?;
	let height: u32 = height.trim().parse().map_err(|_| format!("bad height in {value:?}"))?;
	if width == 0 || height == 0 {
		return Err(format!("window size must be non-zero, got {value:?}"));
	}
	Ok(WindowSize::Custom { width, height })
}

impl Cli {
	/// The input locator: URLs stay remote, everything else is a file path.
	pub fn input_source(&self) -> InputSource {
		match Url::parse(&self.input) {
			Ok(url) if matches!(url.scheme(), "http" | "https") => InputSource::remote(url),
			_ => InputSource::file(&self.input),
		}
	}

	/// Page geometry assembled from the flags.
	pub fn page_settings(&self) -> PageSettings {
		let paper_format = match (self.paper_width, self.paper_height) {
			(Some(width), Some(height)) => PaperFormat::Custom { width, height },
			_ => self.paper_format.into(),
		};

		PageSettings {
			landscape: self.landscape,
			display_header_footer: self.header_footer,
			print_background: self.background,
			scale: self.scale,
			paper_format,
			margins: Margins {
				top: self.margin_top,
				bottom: self.margin_bottom,
				left: self.margin_left,
				right: self.margin_right,
			},
			page_ranges: self.page_ranges.clone(),
			ignore_invalid_page_ranges: self.ignore_invalid_page_ranges,
		}
	}

	/// Browser process configuration.
	pub fn supervisor_options(&self) -> SupervisorOptions {
		SupervisorOptions {
			executable: self.chrome_path.clone(),
			window_size: self.window_size.unwrap_or_default(),
			user_data_dir: self.user_data_dir.clone(),
			proxy_server: self.proxy_server.clone(),
			proxy_bypass_list: self.proxy_bypass.clone(),
			proxy_pac_url: self.proxy_pac_url.clone(),
			user_agent: self.user_agent.clone(),
			..SupervisorOptions::default()
		}
	}

	/// Per-conversion options, opening the progress log file when given.
	pub fn convert_options(&self) -> anyhow::Result<ConvertOptions> {
		let progress = match &self.log_file {
			Some(path) => {
				let file = std::fs::OpenOptions::new()
					.create(true)
					.append(true)
					.open(path)
					.with_context(|| format!("opening log file {}", path.display()))?;
				Some(ProgressSink::new(file))
			}
			None => None,
		};

		Ok(ConvertOptions {
			wait_for_status: self.wait_for_status.clone(),
			wait_for_status_timeout: Duration::from_millis(self.wait_for_status_timeout),
			timeout: self.timeout.map(Duration::from_millis),
			progress,
		})
	}
}
