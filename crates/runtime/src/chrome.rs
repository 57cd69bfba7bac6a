//! Locating the browser executable.
//!
//! Resolution tries, in order:
//! 1. An explicit override path (configuration)
//! 2. A browser binary sitting next to the current executable
//! 3. Well-known installation locations for the platform (bare names are
//!    resolved through `PATH`)
//!
//! The first existing candidate wins; the order is deterministic so the same
//! machine always resolves the same binary.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Resolves the browser executable to launch.
///
/// # Errors
///
/// Returns [`Error::ExecutableNotFound`] if no candidate exists.
pub fn resolve_executable(override_path: Option<&Path>) -> Result<PathBuf> {
	if let Some(path) = override_path {
		if path.is_file() {
			debug!(target: "pj", path = %path.display(), "using configured browser executable");
			return Ok(path.to_path_buf());
		}
		warn!(
			target: "pj",
			path = %path.display(),
			"configured browser executable does not exist; falling back to discovery"
		);
	}

	if let Some(path) = sibling_candidate() {
		debug!(target: "pj", path = %path.display(), "using sibling browser executable");
		return Ok(path);
	}

	for candidate in platform_candidates() {
		if let Some(path) = resolve_candidate(&candidate) {
			debug!(target: "pj", path = %path.display(), "using discovered browser executable");
			return Ok(path);
		}
	}

	Err(Error::ExecutableNotFound)
}

/// A browser binary shipped alongside the current executable.
fn sibling_candidate() -> Option<PathBuf> {
	let exe = std::env::current_exe().ok()?;
	let dir = exe.parent()?;

	for name in sibling_names() {
		let path = dir.join(name);
		if path.is_file() {
			return Some(path);
		}
	}
	None
}

fn sibling_names() -> &'static [&'static str] {
	if cfg!(windows) {
		&["chrome.exe", "chromium.exe", "headless_shell.exe"]
	} else {
		&["chrome", "chromium", "headless_shell"]
	}
}

fn platform_candidates() -> Vec<String> {
	if cfg!(target_os = "macos") {
		vec![
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	} else if cfg!(target_os = "windows") {
		windows_candidates()
	} else {
		vec![
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/google-chrome",
			"/usr/bin/chromium-browser",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	}
}

fn windows_candidates() -> Vec<String> {
	let mut candidates = Vec::new();
	for base in [
		std::env::var("PROGRAMFILES").ok(),
		std::env::var("PROGRAMFILES(X86)").ok(),
		std::env::var("LOCALAPPDATA").ok(),
	]
	.into_iter()
	.flatten()
	{
		candidates.push(format!("{base}\\Google\\Chrome\\Application\\chrome.exe"));
		candidates.push(format!("{base}\\Chromium\\Application\\chrome.exe"));
	}
	candidates
}

/// Absolute candidates are checked directly; bare names go through `PATH`.
fn resolve_candidate(candidate: &str) -> Option<PathBuf> {
	if candidate.starts_with('/') || candidate.contains('\\') || candidate.contains(':') {
		let path = Path::new(candidate);
		path.is_file().then(|| path.to_path_buf())
	} else {
		which::which(candidate).ok()
	}
}
