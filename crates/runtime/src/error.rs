//! Error types for the paperjet runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the browser runtime.
#[derive(Debug, Error)]
pub enum Error {
	/// No browser executable could be located.
	#[error(
		"browser executable not found; install Chrome/Chromium or set an explicit path"
	)]
	ExecutableNotFound,

	/// The browser process failed to start or exited before announcing its
	/// debugging endpoint.
	#[error("browser launch failed: {0}")]
	LaunchFailed(String),

	/// The browser process died while a session against it was open.
	#[error("browser process lost")]
	BrowserLost,

	/// The session was closed while a request was pending or being issued.
	#[error("session closed")]
	SessionClosed,

	/// A single protocol call exceeded its timer.
	#[error("operation timed out: {method}")]
	OperationTimedOut {
		/// Protocol method that was awaiting a response.
		method: String,
	},

	/// Invalid argument provided to a runtime operation.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// Malformed or unexpected data on the debugging connection.
	#[error("protocol error: {0}")]
	Protocol(String),

	/// Error reported by the browser endpoint itself.
	#[error("endpoint error {code}: {message}")]
	Remote {
		/// Numeric protocol error code.
		code: i64,
		/// Error message from the endpoint.
		message: String,
	},

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// WebSocket-level error.
	#[error("websocket error: {0}")]
	WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl Error {
	/// Returns true if this error means the session or its process is gone.
	pub fn is_disconnect(&self) -> bool {
		matches!(self, Error::BrowserLost | Error::SessionClosed)
	}

	/// Returns true if this is a per-call timeout.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::OperationTimedOut { .. })
	}
}
