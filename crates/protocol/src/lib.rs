//! Wire types for the DevTools protocol subset paperjet speaks.
//!
//! This crate contains the serde-serializable types used on the wire of a
//! browser debugging connection. These types represent the "protocol layer" -
//! the shapes of data exactly as they appear in messages.
//!
//! Types in this crate are:
//! - **Pure data**: no behavior beyond serialization/deserialization (plus
//!   base64 payload decoding, which is a wire concern)
//! - **1:1 with the protocol**: field names match the endpoint's camelCase
//!   schema via serde renames
//!
//! Higher-level APIs are built on top of these types in `paperjet`.

pub mod message;
pub mod page;
pub mod target;

pub use message::*;
pub use page::*;
pub use target::*;
