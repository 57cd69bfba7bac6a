//! HTML and text to PDF conversion through a supervised headless browser.
//!
//! The crate drives an external Chromium over its debugging protocol:
//! a shared [`ProcessSupervisor`] owns the one browser process, and every
//! conversion opens its own [`Tab`] (an isolated browsing context with its
//! own connections) against it. Concurrent conversions therefore never
//! share protocol state - the supervisor is the only shared resource, and
//! its start/stop transitions are the only serialized ones.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use paperjet::{
//!     ConvertOptions, Converter, InputSource, OutputTarget, PageSettings,
//!     ProcessSupervisor, SupervisorOptions,
//! };
//!
//! # async fn demo() -> paperjet::Result<()> {
//! let supervisor = Arc::new(ProcessSupervisor::new(SupervisorOptions::default()));
//! let converter = Converter::new(Arc::clone(&supervisor));
//!
//! converter
//!     .convert(
//!         InputSource::file("report.html"),
//!         OutputTarget::file("report.pdf"),
//!         &PageSettings::default(),
//!         ConvertOptions::default(),
//!     )
//!     .await?;
//!
//! supervisor.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod converter;
pub mod error;
pub mod image;
pub mod page_settings;
pub mod prewrap;
pub mod progress;
pub mod tab;
pub mod workspace;

pub use converter::{ConvertOptions, Converter, InputSource, OutputTarget};
pub use error::{Error, Result};
pub use image::ImageValidator;
pub use page_settings::{Margins, PageSettings, PaperFormat};
pub use prewrap::{PreWrapper, TextPreWrapper};
pub use progress::ProgressSink;
pub use tab::Tab;
pub use workspace::TempWorkspace;

// The process layer is part of the public surface: callers construct and
// own the supervisor that converters share.
pub use pj_runtime::{
	CountdownTimer, ProcessSupervisor, SupervisorOptions, TimerState, WindowSize,
};
