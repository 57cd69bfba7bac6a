//! The per-request conversion orchestrator.
//!
//! [`Converter::convert`] drives one document through
//! validate → [pre-wrap] → [image validation] → navigate/wait/render →
//! materialize, with a scratch workspace that is removed on every exit
//! path. Validation failures surface before any process or network work.
//!
//! A [`Converter`] is shared: any number of conversions may run
//! concurrently against it. Each one opens its own [`Tab`] against the
//! shared supervisor; nothing protocol-level is ever shared between
//! concurrent conversions. A conversion's own deadline failing it closes
//! its tab and workspace but leaves the browser running for the others.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use encoding_rs::Encoding;
use pj_runtime::timer::CountdownTimer;
use pj_runtime::ProcessSupervisor;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::image::ImageValidator;
use crate::page_settings::PageSettings;
use crate::prewrap::{PreWrapper, TextPreWrapper};
use crate::progress::{ProgressSink, log_progress};
use crate::tab::Tab;
use crate::workspace::TempWorkspace;

/// What to convert: a local file or a remote URL.
pub enum InputSource {
	/// A local document. `encoding` declares the text encoding for inputs
	/// that go through pre-wrapping; HTML files are passed to the browser
	/// untouched.
	File {
		/// Path to the input document.
		path: PathBuf,
		/// Declared text encoding, when known.
		encoding: Option<&'static Encoding>,
	},
	/// A remote document fetched by the browser itself.
	Remote(Url),
}

impl InputSource {
	/// A local file with encoding sniffing.
	pub fn file(path: impl Into<PathBuf>) -> Self {
		InputSource::File {
			path: path.into(),
			encoding: None,
		}
	}

	/// A local file with a declared text encoding.
	pub fn file_with_encoding(path: impl Into<PathBuf>, encoding: &'static Encoding) -> Self {
		InputSource::File {
			path: path.into(),
			encoding: Some(encoding),
		}
	}

	/// A remote URL.
	pub fn remote(url: Url) -> Self {
		InputSource::Remote(url)
	}
}

/// Where the rendered PDF goes.
pub enum OutputTarget {
	/// A file path whose parent directory must already exist.
	File(PathBuf),
	/// Any writable sink.
	Writer(Box<dyn Write + Send>),
}

impl OutputTarget {
	/// Output to a file.
	pub fn file(path: impl Into<PathBuf>) -> Self {
		OutputTarget::File(path.into())
	}

	/// Output to a writer.
	pub fn writer(writer: impl Write + Send + 'static) -> Self {
		OutputTarget::Writer(Box::new(writer))
	}
}

/// Per-conversion knobs beyond page geometry.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
	/// Render only once the page sets `window.status` to this value (or
	/// the sub-timeout passes).
	pub wait_for_status: Option<String>,
	/// Budget for the status wait. The overall timeout is suspended while
	/// this runs.
	pub wait_for_status_timeout: Duration,
	/// Overall conversion deadline. `None` waits indefinitely.
	pub timeout: Option<Duration>,
	/// Progress side channel.
	pub progress: Option<ProgressSink>,
}

impl Default for ConvertOptions {
	fn default() -> Self {
		Self {
			wait_for_status: None,
			wait_for_status_timeout: Duration::from_secs(60),
			timeout: None,
			progress: None,
		}
	}
}

/// Converts documents to PDF through a shared browser process.
pub struct Converter {
	supervisor: Arc<ProcessSupervisor>,
	pre_wrapper: Box<dyn PreWrapper>,
	image_validator: Option<Box<dyn ImageValidator>>,
}

impl Converter {
	/// A converter over the given supervisor, with the stock text
	/// pre-wrapper and no image validation.
	pub fn new(supervisor: Arc<ProcessSupervisor>) -> Self {
		Self {
			supervisor,
			pre_wrapper: Box::new(TextPreWrapper::default()),
			image_validator: None,
		}
	}

	/// Replaces the pre-wrap collaborator.
	pub fn with_pre_wrapper(mut self, pre_wrapper: Box<dyn PreWrapper>) -> Self {
		self.pre_wrapper = pre_wrapper;
		self
	}

	/// Installs an image-validation collaborator.
	pub fn with_image_validator(mut self, validator: Box<dyn ImageValidator>) -> Self {
		self.image_validator = Some(validator);
		self
	}

	/// The shared supervisor this converter renders through.
	pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
		&self.supervisor
	}

	/// Converts one document to PDF.
	///
	/// # Errors
	///
	/// Validation errors ([`Error::DirectoryNotFound`],
	/// [`Error::UnsupportedInputFormat`], [`Error::InvalidArgument`])
	/// surface before the browser is touched. Protocol and deadline
	/// failures abort only this conversion; see [`Error`].
	pub async fn convert(
		&self,
		input: InputSource,
		output: OutputTarget,
		settings: &PageSettings,
		options: ConvertOptions,
	) -> Result<()> {
		let progress = options.progress.clone();
		log_progress(progress.as_ref(), "validating conversion request");

		if let OutputTarget::File(path) = &output {
			validate_output_directory(path)?;
		}
		settings.to_print_params()?;
		self.validate_input(&input)?;

		let mut workspace = TempWorkspace::new();
		let result = self
			.run(&input, output, settings, &options, &mut workspace)
			.await;

		if workspace.created() {
			log_progress(progress.as_ref(), "removing temp workspace");
		}
		workspace.cleanup();

		match &result {
			Ok(()) => log_progress(progress.as_ref(), "conversion succeeded"),
			Err(error) => log_progress(progress.as_ref(), &format!("conversion failed: {error}")),
		}
		result
	}

	async fn run(
		&self,
		input: &InputSource,
		output: OutputTarget,
		settings: &PageSettings,
		options: &ConvertOptions,
		workspace: &mut TempWorkspace,
	) -> Result<()> {
		let progress = options.progress.as_ref();

		let url = self.prepare_document(input, workspace, progress)?;

		log_progress(progress, "ensuring browser is running");
		self.supervisor.ensure_running().await?;

		let timer = match options.timeout {
			Some(timeout) => Some(CountdownTimer::started(timeout)?),
			None => None,
		};

		let tab = Tab::open(&self.supervisor).await?;
		let rendered = self
			.drive(&tab, &url, settings, options, timer.as_ref())
			.await;
		tab.close().await;
		let bytes = rendered?;

		materialize(output, &bytes, progress)
	}

	/// Resolves the input to a URL the browser can navigate to, wrapping
	/// and validating local documents in the workspace as needed.
	fn prepare_document(
		&self,
		input: &InputSource,
		workspace: &mut TempWorkspace,
		progress: Option<&ProgressSink>,
	) -> Result<Url> {
		match input {
			InputSource::Remote(url) => Ok(url.clone()),
			InputSource::File { path, encoding } => {
				let mut document = path.clone();

				if !is_html(path) {
					log_progress(progress, &format!("pre-wrapping {}", path.display()));
					document = self.pre_wrapper.wrap(path, *encoding, workspace.path()?)?;
				}

				if let Some(validator) = &self.image_validator {
					log_progress(progress, "validating images");
					if let Some(rewritten) = validator.validate(&document, workspace.path()?)? {
						debug!(target: "pj", rewritten = %rewritten.display(), "images rewrote the document");
						document = rewritten;
					}
				}

				file_url(&document)
			}
		}
	}

	async fn drive(
		&self,
		tab: &Tab,
		url: &Url,
		settings: &PageSettings,
		options: &ConvertOptions,
		timer: Option<&CountdownTimer>,
	) -> Result<Vec<u8>> {
		let progress = options.progress.as_ref();

		log_progress(progress, &format!("navigating to {url}"));
		tab.navigate(url, timer).await?;

		if let Some(target) = &options.wait_for_status {
			// The overall deadline is suspended for the whole sub-wait;
			// the two deadlines nest, they do not add.
			if let Some(timer) = timer {
				timer.pause()?;
			}
			log_progress(
				progress,
				&format!(
					"waiting up to {}ms for window.status == {target:?}",
					options.wait_for_status_timeout.as_millis()
				),
			);
			let matched = tab
				.wait_for_window_status(target, options.wait_for_status_timeout)
				.await;
			if let Some(timer) = timer {
				timer.resume()?;
			}
			if matched? {
				log_progress(progress, "window status matched");
			} else {
				log_progress(progress, "window status wait timed out; rendering anyway");
			}
		}

		log_progress(progress, "rendering to pdf");
		let bytes = tab.print_to_pdf(settings, timer).await?;
		log_progress(progress, &format!("rendered {} bytes", bytes.len()));
		Ok(bytes)
	}

	fn validate_input(&self, input: &InputSource) -> Result<()> {
		match input {
			InputSource::Remote(_) => Ok(()),
			InputSource::File { path, .. } => {
				if !path.is_file() {
					return Err(Error::InvalidArgument(format!(
						"input file not found: {}",
						path.display()
					)));
				}
				if is_html(path) || self.pre_wrapper.matches(path) {
					Ok(())
				} else {
					Err(Error::UnsupportedInputFormat { path: path.clone() })
				}
			}
		}
	}
}

fn is_html(path: &Path) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
}

fn file_url(path: &Path) -> Result<Url> {
	let absolute = path.canonicalize()?;
	Url::from_file_path(&absolute).map_err(|()| {
		Error::InvalidArgument(format!("not a navigable path: {}", absolute.display()))
	})
}

fn validate_output_directory(path: &Path) -> Result<()> {
	let parent = match path.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
		_ => PathBuf::from("."),
	};
	if !parent.is_dir() {
		return Err(Error::DirectoryNotFound { path: parent });
	}
	Ok(())
}

/// Writes the rendered bytes to their destination. File outputs go through
/// a scratch file persisted into place on success only, so a failure never
/// leaves a partial document behind.
fn materialize(output: OutputTarget, bytes: &[u8], progress: Option<&ProgressSink>) -> Result<()> {
	match output {
		OutputTarget::File(path) => {
			let parent = match path.parent() {
				Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
				_ => PathBuf::from("."),
			};
			let mut scratch = tempfile::NamedTempFile::new_in(parent)?;
			scratch.write_all(bytes)?;
			scratch.flush()?;
			scratch
				.persist(&path)
				.map_err(|error| Error::Io(error.error))?;
			log_progress(progress, &format!("wrote {}", path.display()));
		}
		OutputTarget::Writer(mut writer) => {
			writer.write_all(bytes)?;
			writer.flush()?;
			log_progress(progress, "wrote output stream");
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicBool, Ordering};

	use pj_runtime::SupervisorOptions;

	use super::*;

	/// A supervisor that would fail loudly if any launch were attempted.
	fn unlaunchable_converter() -> Converter {
		let supervisor = Arc::new(ProcessSupervisor::new(SupervisorOptions {
			executable: Some(PathBuf::from("/definitely/not/a/browser")),
			..SupervisorOptions::default()
		}));
		Converter::new(supervisor)
	}

	#[tokio::test]
	async fn missing_output_directory_fails_before_any_launch() {
		let dir = tempfile::tempdir().unwrap();
		let input = dir.path().join("page.html");
		std::fs::write(&input, "<html></html>").unwrap();

		let converter = unlaunchable_converter();
		let error = converter
			.convert(
				InputSource::file(&input),
				OutputTarget::file("/no/such/directory/out.pdf"),
				&PageSettings::default(),
				ConvertOptions::default(),
			)
			.await
			.unwrap_err();

		assert!(matches!(error, Error::DirectoryNotFound { .. }), "{error:?}");
		assert!(!converter.supervisor().is_running().await);
	}

	#[tokio::test]
	async fn unsupported_extension_fails_before_any_launch() {
		let dir = tempfile::tempdir().unwrap();
		let input = dir.path().join("archive.tar");
		std::fs::write(&input, "not html").unwrap();

		let converter = unlaunchable_converter();
		let error = converter
			.convert(
				InputSource::file(&input),
				OutputTarget::file(dir.path().join("out.pdf")),
				&PageSettings::default(),
				ConvertOptions::default(),
			)
			.await
			.unwrap_err();

		assert!(
			matches!(error, Error::UnsupportedInputFormat { .. }),
			"{error:?}"
		);
		assert!(!converter.supervisor().is_running().await);
	}

	#[tokio::test]
	async fn missing_input_file_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let converter = unlaunchable_converter();
		let error = converter
			.convert(
				InputSource::file(dir.path().join("nonexistent.html")),
				OutputTarget::file(dir.path().join("out.pdf")),
				&PageSettings::default(),
				ConvertOptions::default(),
			)
			.await
			.unwrap_err();

		assert!(matches!(error, Error::InvalidArgument(_)), "{error:?}");
	}

	#[tokio::test]
	async fn invalid_scale_is_rejected_up_front() {
		let dir = tempfile::tempdir().unwrap();
		let input = dir.path().join("page.html");
		std::fs::write(&input, "<html></html>").unwrap();

		let converter = unlaunchable_converter();
		let settings = PageSettings {
			scale: 5.0,
			..PageSettings::default()
		};
		let error = converter
			.convert(
				InputSource::file(&input),
				OutputTarget::file(dir.path().join("out.pdf")),
				&settings,
				ConvertOptions::default(),
			)
			.await
			.unwrap_err();

		assert!(matches!(error, Error::InvalidArgument(_)), "{error:?}");
		assert!(!converter.supervisor().is_running().await);
	}

	#[test]
	fn prepare_document_passes_html_through_untouched() {
		let dir = tempfile::tempdir().unwrap();
		let input = dir.path().join("page.html");
		std::fs::write(&input, "<html></html>").unwrap();

		let converter = unlaunchable_converter();
		let mut workspace = TempWorkspace::new();
		let url = converter
			.prepare_document(&InputSource::file(&input), &mut workspace, None)
			.unwrap();

		assert_eq!(url.scheme(), "file");
		assert!(url.path().ends_with("page.html"));
		assert!(!workspace.created(), "html must not allocate a workspace");
	}

	#[test]
	fn prepare_document_wraps_text_into_the_workspace() {
		let dir = tempfile::tempdir().unwrap();
		let input = dir.path().join("notes.txt");
		std::fs::write(&input, "plain text").unwrap();

		let converter = unlaunchable_converter();
		let mut workspace = TempWorkspace::new();
		let url = converter
			.prepare_document(&InputSource::file(&input), &mut workspace, None)
			.unwrap();

		assert!(workspace.created());
		assert!(url.path().ends_with("notes.html"));
		let workspace_dir = workspace.location().unwrap();
		assert!(
			Path::new(url.path()).starts_with(workspace_dir.canonicalize().unwrap()),
			"wrapped file must live in the workspace"
		);
	}

	#[test]
	fn prepare_document_lets_the_image_validator_rewrite() {
		struct Rewriter(Arc<AtomicBool>);
		impl ImageValidator for Rewriter {
			fn validate(&self, _input: &Path, workspace: &Path) -> Result<Option<PathBuf>> {
				self.0.store(true, Ordering::SeqCst);
				let rewritten = workspace.join("rewritten.html");
				std::fs::write(&rewritten, "<html>resized</html>")?;
				Ok(Some(rewritten))
			}
		}

		let dir = tempfile::tempdir().unwrap();
		let input = dir.path().join("page.html");
		std::fs::write(&input, "<html><img src='x.jpg'></html>").unwrap();

		let invoked = Arc::new(AtomicBool::new(false));
		let converter =
			unlaunchable_converter().with_image_validator(Box::new(Rewriter(Arc::clone(&invoked))));

		let mut workspace = TempWorkspace::new();
		let url = converter
			.prepare_document(&InputSource::file(&input), &mut workspace, None)
			.unwrap();

		assert!(invoked.load(Ordering::SeqCst));
		assert!(url.path().ends_with("rewritten.html"));
	}

	#[test]
	fn prepare_document_passes_remote_urls_through() {
		let converter = unlaunchable_converter();
		let remote = Url::parse("https://example.com/invoice/42").unwrap();
		let mut workspace = TempWorkspace::new();
		let url = converter
			.prepare_document(
				&InputSource::remote(remote.clone()),
				&mut workspace,
				None,
			)
			.unwrap();
		assert_eq!(url, remote);
		assert!(!workspace.created());
	}

	#[test]
	fn materialize_overwrites_existing_output_atomically() {
		let dir = tempfile::tempdir().unwrap();
		let destination = dir.path().join("out.pdf");
		std::fs::write(&destination, "stale").unwrap();

		materialize(OutputTarget::file(&destination), b"%PDF-fresh", None).unwrap();
		assert_eq!(std::fs::read(&destination).unwrap(), b"%PDF-fresh");
	}

	#[test]
	fn materialize_into_writer_flushes_all_bytes() {
		#[derive(Clone)]
		struct SharedSink(Arc<parking_lot::Mutex<Vec<u8>>>);
		impl Write for SharedSink {
			fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
				self.0.lock().extend_from_slice(buf);
				Ok(buf.len())
			}
			fn flush(&mut self) -> std::io::Result<()> {
				Ok(())
			}
		}

		let shared: Arc<parking_lot::Mutex<Vec<u8>>> = Arc::default();
		materialize(
			OutputTarget::writer(SharedSink(Arc::clone(&shared))),
			b"%PDF-stream",
			None,
		)
		.unwrap();
		assert_eq!(*shared.lock(), b"%PDF-stream");
	}
}
