//! Seam for the image-validation collaborator.
//!
//! Image download, resizing, and EXIF rotation are outside this crate; the
//! orchestrator only defines where such a collaborator plugs in. When one
//! is installed on the [`Converter`](crate::Converter), it runs after
//! pre-wrapping and may rewrite the document inside the conversion's
//! workspace before navigation.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Validates or rewrites a local HTML input's images before rendering.
pub trait ImageValidator: Send + Sync {
	/// Inspects `input` and optionally produces a rewritten document
	/// inside `workspace`.
	///
	/// Returns `Some(path)` when the conversion should navigate to a
	/// rewritten document instead, `None` to keep the input as-is.
	///
	/// # Errors
	///
	/// Implementations report I/O and validation failures; any error
	/// aborts the conversion before navigation.
	fn validate(&self, input: &Path, workspace: &Path) -> Result<Option<PathBuf>>;
}
