//! Browser launch argument assembly.
//!
//! [`LaunchArguments`] is an ordered set of unique command-line flags.
//! Value-bearing flags are keyed by flag name, so re-setting a flag replaces
//! its value in place instead of appending a duplicate. Once the supervisor
//! has started the process the set is frozen; see
//! [`ProcessSupervisor`](crate::supervisor::ProcessSupervisor).

use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Marker environment variable set on every launched browser process.
///
/// Teardown identifies this library's processes by the marker value rather
/// than by executable name, so unrelated browsers sharing the binary are
/// never touched.
pub const PROCESS_MARKER_ENV: &str = "PAPERJET_PROCESS_MARKER";

/// Viewport size passed to the browser at launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSize {
	/// 800×600
	Svga,
	/// 1024×768
	Xga,
	/// 1280×720
	Hd,
	/// 1366×768
	Wxga,
	/// 1280×1024
	Sxga,
	/// 1920×1080
	FullHd,
	/// 2560×1440
	Qhd,
	/// Explicit width×height in pixels.
	Custom {
		/// Width in pixels.
		width: u32,
		/// Height in pixels.
		height: u32,
	},
}

impl Default for WindowSize {
	fn default() -> Self {
		WindowSize::Hd
	}
}

impl WindowSize {
	/// Pixel dimensions as `(width, height)`.
	pub fn dimensions(self) -> (u32, u32) {
		match self {
			WindowSize::Svga => (800, 600),
			WindowSize::Xga => (1024, 768),
			WindowSize::Hd => (1280, 720),
			WindowSize::Wxga => (1366, 768),
			WindowSize::Sxga => (1280, 1024),
			WindowSize::FullHd => (1920, 1080),
			WindowSize::Qhd => (2560, 1440),
			WindowSize::Custom { width, height } => (width, height),
		}
	}

	/// Validates that both dimensions are non-zero.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] for a zero width or height.
	pub fn validate(self) -> Result<()> {
		let (width, height) = self.dimensions();
		if width == 0 || height == 0 {
			return Err(Error::InvalidArgument(format!(
				"window size must be non-zero, got {width}x{height}"
			)));
		}
		Ok(())
	}
}

impl fmt::Display for WindowSize {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let (width, height) = self.dimensions();
		write!(f, "{width},{height}")
	}
}

#[derive(Debug, Clone)]
struct Flag {
	name: String,
	value: Option<String>,
}

impl Flag {
	fn render(&self) -> String {
		match &self.value {
			Some(value) => format!("{}={}", self.name, value),
			None => self.name.clone(),
		}
	}
}

/// Ordered, de-duplicated browser launch flags.
#[derive(Debug, Clone, Default)]
pub struct LaunchArguments {
	flags: Vec<Flag>,
}

impl LaunchArguments {
	/// An empty argument set.
	pub fn new() -> Self {
		Self::default()
	}

	/// The standard headless rendering set.
	///
	/// Disables everything a print run does not need: GPU, scrollbars,
	/// audio, background throttling, extensions, sync, translate, the crash
	/// reporter, and first-run chrome. The debugging port is OS-assigned;
	/// the chosen port is announced on the diagnostic stream at startup.
	pub fn headless(window_size: WindowSize) -> Result<Self> {
		window_size.validate()?;

		let mut args = Self::new();
		args.set("--headless");
		args.set("--disable-gpu");
		args.set("--hide-scrollbars");
		args.set("--mute-audio");
		args.set("--disable-background-timer-throttling");
		args.set("--disable-backgrounding-occluded-windows");
		args.set("--disable-renderer-backgrounding");
		args.set("--disable-extensions");
		args.set("--disable-sync");
		args.set("--disable-translate");
		args.set("--disable-default-apps");
		args.set("--disable-breakpad");
		args.set("--no-first-run");
		args.set("--no-default-browser-check");
		args.set_value("--remote-debugging-port", "0");
		args.set_value("--window-size", &window_size.to_string());
		Ok(args)
	}

	/// Adds a bare flag, or moves nothing if it is already present.
	pub fn set(&mut self, name: &str) {
		self.upsert(name, None);
	}

	/// Adds a `--flag=value` pair. Re-setting an existing flag replaces its
	/// value in place, preserving the original position.
	pub fn set_value(&mut self, name: &str, value: &str) {
		self.upsert(name, Some(value.to_string()));
	}

	/// Removes a flag by name. No-op if absent.
	pub fn remove(&mut self, name: &str) {
		self.flags.retain(|flag| flag.name != name);
	}

	/// Returns the value of a flag, if present and value-bearing.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.flags
			.iter()
			.find(|flag| flag.name == name)
			.and_then(|flag| flag.value.as_deref())
	}

	/// Returns true if the flag is present in any form.
	pub fn contains(&self, name: &str) -> bool {
		self.flags.iter().any(|flag| flag.name == name)
	}

	/// Sets `--user-data-dir` after checking the directory exists.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] when the directory is missing.
	pub fn set_user_data_dir(&mut self, dir: &Path) -> Result<()> {
		if !dir.is_dir() {
			return Err(Error::InvalidArgument(format!(
				"user data directory not found: {}",
				dir.display()
			)));
		}
		self.set_value("--user-data-dir", &dir.display().to_string());
		Ok(())
	}

	/// Renders the set in insertion order, ready for process spawn.
	pub fn to_vec(&self) -> Vec<String> {
		self.flags.iter().map(Flag::render).collect()
	}

	fn upsert(&mut self, name: &str, value: Option<String>) {
		match self.flags.iter_mut().find(|flag| flag.name == name) {
			Some(flag) => flag.value = value,
			None => self.flags.push(Flag {
				name: name.to_string(),
				value,
			}),
		}
	}
}
