//! The request/response/event envelope of the debugging connection.
//!
//! Every message on the wire is one of three shapes: a request (carries an
//! `id` chosen by the client), a response (echoes that `id`, with either a
//! `result` or an `error`), or an event (carries a `method` and no `id`).
//! Correlation is by `id` only; response arrival order is unspecified.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol request sent to the browser endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	/// Unique request ID for correlating the response (unique per connection).
	pub id: u64,
	/// Method name to invoke, e.g. `"Page.navigate"`.
	pub method: String,
	/// Method parameters as a JSON object.
	#[serde(skip_serializing_if = "Value::is_null", default)]
	pub params: Value,
}

/// Protocol response from the browser endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	/// Request ID this response correlates to.
	pub id: u64,
	/// Success result (mutually exclusive with `error`).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Error result (mutually exclusive with `result`).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
}

/// Error details attached to a failed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
	/// Numeric protocol error code.
	pub code: i64,
	/// Human-readable error message.
	pub message: String,
	/// Additional error detail, when the endpoint provides one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

/// Unsolicited event emitted by the browser endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
	/// Event method name, e.g. `"Page.loadEventFired"`.
	pub method: String,
	/// Event parameters as a JSON object.
	#[serde(default)]
	pub params: Value,
}

/// Discriminated union of incoming protocol messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	/// Response message (has an `id` field).
	Response(Response),
	/// Event message (has a `method` field, no `id`).
	Event(Event),
	/// Unknown message shape (forward-compatible catch-all).
	Unknown(Value),
}
