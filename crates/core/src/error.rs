//! Error types for the conversion API.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the conversion API.
///
/// Validation failures (paths, formats, arguments) are reported before any
/// process or network work happens. Protocol-level failures abort only the
/// conversion they belong to; the shared browser process stays up for
/// other conversions unless it crashed, in which case every open session
/// observes [`pj_runtime::Error::BrowserLost`] through the
/// [`Runtime`](Error::Runtime) variant.
#[derive(Debug, Error)]
pub enum Error {
	/// A required directory (output destination, user profile) is missing.
	#[error("directory not found: {}", path.display())]
	DirectoryNotFound {
		/// The missing directory.
		path: PathBuf,
	},

	/// The input file's extension is neither HTML nor in the pre-wrap set.
	#[error("unsupported input format: {}", path.display())]
	UnsupportedInputFormat {
		/// The rejected input.
		path: PathBuf,
	},

	/// The overall conversion deadline was exceeded.
	#[error("conversion timed out after {}ms", timeout.as_millis())]
	ConversionTimedOut {
		/// The deadline that was exceeded.
		timeout: Duration,
	},

	/// Invalid argument provided to a conversion entry point.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// Process or protocol failure from the runtime layer.
	#[error(transparent)]
	Runtime(#[from] pj_runtime::Error),

	/// I/O failure reading input or materializing output.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON shape mismatch on the debugging connection.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true when the browser process itself is gone, which fails
	/// every session currently open against it.
	pub fn is_browser_lost(&self) -> bool {
		matches!(self, Error::Runtime(pj_runtime::Error::BrowserLost))
	}
}
