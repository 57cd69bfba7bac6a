//! Paperjet runtime - browser process lifecycle, connection, and deadlines.
//!
//! This crate provides the low-level infrastructure for owning a headless
//! browser and speaking to its debugging endpoint:
//!
//! - **Timer**: pausable countdown shared by process-start and protocol
//!   call waits
//! - **Launch**: executable discovery and frozen launch-argument assembly
//! - **Supervisor**: process spawn, startup handshake, exit observation,
//!   tree teardown
//! - **Transport**: the WebSocket to an endpoint, as plain channels
//! - **Connection**: request/response correlation and event fan-out
//!
//! ```text
//! ┌─────────────┐
//! │  paperjet   │  Conversion API (tabs, page settings, orchestrator)
//! └──────┬──────┘
//! ┌──────▼──────┐
//! │  pj-runtime │  This crate
//! │  ┌────────┐ │
//! │  │ Conn   │ │  id correlation, event broadcast
//! │  └────────┘ │
//! │  ┌────────┐ │
//! │  │ Trans  │ │  WebSocket transport
//! │  └────────┘ │
//! │  ┌────────┐ │
//! │  │ Superv │ │  Process management
//! │  └────────┘ │
//! └─────────────┘
//! ```
//!
//! Concurrency model: one shared [`ProcessSupervisor`], one
//! [`Connection`] (or a pair of them) per unit of work. Connections are
//! never shared between concurrent callers, which is what makes the
//! pending-request table safe without any cross-caller coordination.

pub mod chrome;
pub mod connection;
pub mod error;
pub mod launch;
pub mod supervisor;
pub mod timer;
pub mod transport;

pub use connection::{Connection, ConnectionState};
pub use error::{Error, Result};
pub use launch::{LaunchArguments, PROCESS_MARKER_ENV, WindowSize};
pub use supervisor::{ENDPOINT_LINE_PREFIX, ProcessSupervisor, SupervisorOptions};
pub use timer::{CountdownTimer, TimerState};
pub use transport::{TransportEvent, TransportParts, connect};
