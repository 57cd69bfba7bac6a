//! Turning non-HTML text inputs into loadable HTML documents.
//!
//! The browser can only navigate to HTML, so text-like inputs (logs, plain
//! text, XML) are rewritten into a minimal `<pre>` document inside the
//! conversion's scratch workspace first. Which extensions get wrapped, and
//! how, is a collaborator decision behind the [`PreWrapper`] trait; the
//! stock [`TextPreWrapper`] covers the common text formats.

use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use tracing::debug;

use crate::error::Result;

/// Rewrites a registered input format into a loadable HTML file.
pub trait PreWrapper: Send + Sync {
	/// Whether this wrapper handles the file's extension.
	fn matches(&self, path: &Path) -> bool;

	/// Writes the wrapped document into `workspace` and returns its path.
	///
	/// `encoding` is the caller-declared text encoding of the input; the
	/// wrapper falls back to sniffing when it is absent.
	///
	/// # Errors
	///
	/// I/O failures reading the input or writing the wrapped file.
	fn wrap(
		&self,
		input: &Path,
		encoding: Option<&'static Encoding>,
		workspace: &Path,
	) -> Result<PathBuf>;
}

/// Wraps text files in a `<pre>` block, decoding by declared encoding,
/// then byte-order mark, then UTF-8 (lossy).
pub struct TextPreWrapper {
	extensions: Vec<String>,
}

impl Default for TextPreWrapper {
	fn default() -> Self {
		Self::new(&["txt", "text", "log", "xml"])
	}
}

impl TextPreWrapper {
	/// A wrapper handling the given extensions (compared case-insensitively,
	/// without the leading dot).
	pub fn new(extensions: &[&str]) -> Self {
		Self {
			extensions: extensions
				.iter()
				.map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
				.collect(),
		}
	}

	/// The registered extension set.
	pub fn extensions(&self) -> &[String] {
		&self.extensions
	}

	fn decode(bytes: &[u8], encoding: Option<&'static Encoding>) -> String {
		let encoding = encoding
			.or_else(|| Encoding::for_bom(bytes).map(|(encoding, _)| encoding))
			.unwrap_or(encoding_rs::UTF_8);
		let (text, actual, had_errors) = encoding.decode(bytes);
		if had_errors {
			debug!(target: "pj", encoding = actual.name(), "input had undecodable byte sequences");
		}
		text.into_owned()
	}
}

impl PreWrapper for TextPreWrapper {
	fn matches(&self, path: &Path) -> bool {
		path.extension()
			.and_then(|ext| ext.to_str())
			.is_some_and(|ext| {
				let ext = ext.to_ascii_lowercase();
				self.extensions.iter().any(|known| known == &ext)
			})
	}

	fn wrap(
		&self,
		input: &Path,
		encoding: Option<&'static Encoding>,
		workspace: &Path,
	) -> Result<PathBuf> {
		let bytes = std::fs::read(input)?;
		let text = Self::decode(&bytes, encoding);

		let stem = input
			.file_stem()
			.and_then(|stem| stem.to_str())
			.unwrap_or("input");
		let target = workspace.join(format!("{stem}.html"));

		let document = format!(
			"<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"></head>\n<body><pre>{}</pre></body>\n</html>\n",
			escape_html(&text)
		);
		std::fs::write(&target, document)?;

		debug!(target: "pj", input = %input.display(), wrapped = %target.display(), "pre-wrapped input");
		Ok(target)
	}
}

fn escape_html(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());
	for ch in text.chars() {
		match ch {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			_ => escaped.push(ch),
		}
	}
	escaped
}
