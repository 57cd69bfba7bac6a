//! Scoped scratch directory for one conversion.
//!
//! Created lazily on first use, removed unconditionally when the
//! conversion finishes. A removal failure is logged and never masks the
//! conversion's own outcome.

use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

/// A conversion-scoped temporary directory.
pub struct TempWorkspace {
	dir: Option<tempfile::TempDir>,
}

impl Default for TempWorkspace {
	fn default() -> Self {
		Self::new()
	}
}

impl TempWorkspace {
	/// An empty workspace; nothing exists on disk yet.
	pub fn new() -> Self {
		Self { dir: None }
	}

	/// Returns the workspace directory, creating it on first call.
	///
	/// # Errors
	///
	/// Propagates the I/O error when the directory cannot be created.
	pub fn path(&mut self) -> io::Result<&Path> {
		if self.dir.is_none() {
			let dir = tempfile::Builder::new().prefix("paperjet-").tempdir()?;
			self.dir = Some(dir);
		}
		Ok(self.dir.as_ref().unwrap().path())
	}

	/// Whether the directory was ever created.
	pub fn created(&self) -> bool {
		self.dir.is_some()
	}

	/// The directory's location, if it was created.
	pub fn location(&self) -> Option<PathBuf> {
		self.dir.as_ref().map(|dir| dir.path().to_path_buf())
	}

	/// Removes the directory if it was created. Idempotent.
	pub fn cleanup(&mut self) {
		if let Some(dir) = self.dir.take() {
			let path = dir.path().to_path_buf();
			if let Err(error) = dir.close() {
				warn!(target: "pj", path = %path.display(), %error, "failed to remove temp workspace");
			}
		}
	}
}
