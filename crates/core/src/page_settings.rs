//! Page geometry and rendering options for PDF output.

use pj_protocol::PrintToPdfParams;

use crate::error::{Error, Result};

/// Paper size as a tagged variant over a fixed inch table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaperFormat {
	/// 8.5 × 11 in
	Letter,
	/// 8.5 × 14 in
	Legal,
	/// 11 × 17 in
	Tabloid,
	/// 17 × 11 in
	Ledger,
	/// 33.1 × 46.8 in
	A0,
	/// 23.4 × 33.1 in
	A1,
	/// 16.54 × 23.4 in
	A2,
	/// 11.7 × 16.54 in
	A3,
	/// 8.27 × 11.7 in
	A4,
	/// 5.83 × 8.27 in
	A5,
	/// 4.13 × 5.83 in
	A6,
	/// Explicit width × height in inches.
	Custom {
		/// Paper width in inches.
		width: f64,
		/// Paper height in inches.
		height: f64,
	},
}

impl PaperFormat {
	/// Paper dimensions in inches as `(width, height)`.
	pub fn dimensions(self) -> (f64, f64) {
		match self {
			PaperFormat::Letter => (8.5, 11.0),
			PaperFormat::Legal => (8.5, 14.0),
			PaperFormat::Tabloid => (11.0, 17.0),
			PaperFormat::Ledger => (17.0, 11.0),
			PaperFormat::A0 => (33.1, 46.8),
			PaperFormat::A1 => (23.4, 33.1),
			PaperFormat::A2 => (16.54, 23.4),
			PaperFormat::A3 => (11.7, 16.54),
			PaperFormat::A4 => (8.27, 11.7),
			PaperFormat::A5 => (5.83, 8.27),
			PaperFormat::A6 => (4.13, 5.83),
			PaperFormat::Custom { width, height } => (width, height),
		}
	}
}

/// Page margins in inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
	/// Top margin in inches.
	pub top: f64,
	/// Bottom margin in inches.
	pub bottom: f64,
	/// Left margin in inches.
	pub left: f64,
	/// Right margin in inches.
	pub right: f64,
}

impl Default for Margins {
	fn default() -> Self {
		Self::uniform(0.4)
	}
}

impl Margins {
	/// The same margin on all four sides.
	pub fn uniform(inches: f64) -> Self {
		Self {
			top: inches,
			bottom: inches,
			left: inches,
			right: inches,
		}
	}

	/// No margins at all.
	pub fn none() -> Self {
		Self::uniform(0.0)
	}
}

/// Rendering options for one conversion. Immutable for its duration.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSettings {
	/// Landscape orientation.
	pub landscape: bool,
	/// Print the browser's header and footer.
	pub display_header_footer: bool,
	/// Print background graphics.
	pub print_background: bool,
	/// Rendering scale factor; must be within `0.1..=2.0`.
	pub scale: f64,
	/// Paper size.
	pub paper_format: PaperFormat,
	/// Page margins.
	pub margins: Margins,
	/// Page-range expression, e.g. `"1-5, 8, 11-13"`. `None` prints all.
	pub page_ranges: Option<String>,
	/// Tolerate ranges that point past the end of the document.
	pub ignore_invalid_page_ranges: bool,
}

impl Default for PageSettings {
	fn default() -> Self {
		Self {
			landscape: false,
			display_header_footer: false,
			print_background: false,
			scale: 1.0,
			paper_format: PaperFormat::A4,
			margins: Margins::default(),
			page_ranges: None,
			ignore_invalid_page_ranges: false,
		}
	}
}

impl PageSettings {
	/// Validates the settings and maps them onto the render command's
	/// parameter struct.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] for a scale outside `0.1..=2.0`
	/// or non-positive paper dimensions.
	pub fn to_print_params(&self) -> Result<PrintToPdfParams> {
		if !(0.1..=2.0).contains(&self.scale) {
			return Err(Error::InvalidArgument(format!(
				"scale must be within 0.1..=2.0, got {}",
				self.scale
			)));
		}

		let (paper_width, paper_height) = self.paper_format.dimensions();
		if paper_width <= 0.0 || paper_height <= 0.0 {
			return Err(Error::InvalidArgument(format!(
				"paper dimensions must be positive, got {paper_width}x{paper_height} inches"
			)));
		}

		Ok(PrintToPdfParams {
			landscape: self.landscape,
			display_header_footer: self.display_header_footer,
			print_background: self.print_background,
			scale: self.scale,
			paper_width,
			paper_height,
			margin_top: self.margins.top,
			margin_bottom: self.margins.bottom,
			margin_left: self.margins.left,
			margin_right: self.margins.right,
			page_ranges: self.page_ranges.clone(),
			ignore_invalid_page_ranges: self.ignore_invalid_page_ranges,
		})
	}
}
