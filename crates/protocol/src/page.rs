//! `Page` domain types: navigation and PDF printing.

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Event fired when the page's `load` event has been dispatched.
pub const EVENT_LOAD_FIRED: &str = "Page.loadEventFired";

/// Parameters for `Page.navigate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateParams {
	/// URL to navigate the page to.
	pub url: String,
}

/// Result of `Page.navigate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateResult {
	/// Frame the navigation happened in.
	pub frame_id: String,
	/// Set when the navigation could not be performed (e.g. DNS failure);
	/// the load event will never fire in that case.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error_text: Option<String>,
}

/// Parameters for `Page.printToPDF`.
///
/// Widths, heights, and margins are all in inches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintToPdfParams {
	/// Paper orientation.
	pub landscape: bool,
	/// Display header and footer.
	pub display_header_footer: bool,
	/// Print background graphics.
	pub print_background: bool,
	/// Scale of the webpage rendering.
	pub scale: f64,
	/// Paper width in inches.
	pub paper_width: f64,
	/// Paper height in inches.
	pub paper_height: f64,
	/// Top margin in inches.
	pub margin_top: f64,
	/// Bottom margin in inches.
	pub margin_bottom: f64,
	/// Left margin in inches.
	pub margin_left: f64,
	/// Right margin in inches.
	pub margin_right: f64,
	/// Paper ranges to print, e.g. `"1-5, 8, 11-13"`. Empty means all pages.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub page_ranges: Option<String>,
	/// Silently cap page ranges that exceed the document instead of failing.
	pub ignore_invalid_page_ranges: bool,
}

/// Result of `Page.printToPDF`: the document as a base64-encoded payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PrintToPdfResult {
	/// Base64-encoded PDF data.
	pub data: String,
}

impl PrintToPdfResult {
	/// Decodes the payload into raw PDF bytes.
	pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
		base64::prelude::BASE64_STANDARD.decode(&self.data)
	}
}
