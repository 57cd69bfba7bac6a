//! WebSocket transport to a browser debugging endpoint.
//!
//! The transport owns the socket and exposes plain channels: callers push
//! outbound JSON values and consume inbound [`TransportEvent`]s. A writer
//! task drains the outbound channel into the socket; a reader task parses
//! incoming text frames and publishes them inbound. The reader's final act
//! is a [`TransportEvent::Closed`] carrying whether the peer went away on
//! its own (`lost`) — the connection layer turns that into the right
//! failure for any requests still pending.

#[cfg(test)]
mod tests;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};
use url::Url;

use crate::error::Result;

/// Inbound notification from the transport's reader task.
#[derive(Debug)]
pub enum TransportEvent {
	/// A parsed JSON message from the endpoint.
	Message(Value),
	/// The socket is gone. `lost` is true when the peer disappeared rather
	/// than the local side shutting down first.
	Closed {
		/// Peer-initiated disappearance.
		lost: bool,
	},
}

/// Channel pair connecting a [`Connection`](crate::connection::Connection)
/// to a transport's background tasks.
pub struct TransportParts {
	/// Outbound JSON values, drained by the writer task.
	pub outbound: mpsc::UnboundedSender<Value>,
	/// Inbound events published by the reader task.
	pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens a WebSocket to the endpoint and spawns its reader/writer tasks.
///
/// Dropping the returned outbound sender shuts the socket down with a close
/// frame.
///
/// # Errors
///
/// Returns [`Error::WebSocket`](crate::Error::WebSocket) when the handshake
/// fails.
pub async fn connect(endpoint: &Url) -> Result<TransportParts> {
	let (stream, _) = connect_async(endpoint.as_str()).await?;
	let (mut sink, mut source) = stream.split();

	let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Value>();
	let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<TransportEvent>();

	tokio::spawn(async move {
		while let Some(value) = outbound_rx.recv().await {
			if let Err(error) = sink.send(WsMessage::Text(value.to_string())).await {
				debug!(target: "pj", %error, "websocket write failed");
				return;
			}
		}
		// Outbound channel dropped: local close. Best-effort close frame.
		let _ = sink.send(WsMessage::Close(None)).await;
	});

	tokio::spawn(async move {
		let lost = loop {
			match source.next().await {
				Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<Value>(&text) {
					Ok(value) => {
						if inbound_tx.send(TransportEvent::Message(value)).is_err() {
							break false;
						}
					}
					Err(error) => {
						warn!(target: "pj", %error, "discarding malformed frame");
					}
				},
				Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
				Some(Ok(WsMessage::Binary(_))) => {
					debug!(target: "pj", "discarding unexpected binary frame");
				}
				Some(Ok(WsMessage::Close(_))) | None => break true,
				Some(Err(error)) => {
					debug!(target: "pj", %error, "websocket read failed");
					break true;
				}
			}
		};
		let _ = inbound_tx.send(TransportEvent::Closed { lost });
	});

	Ok(TransportParts {
		outbound: outbound_tx,
		inbound: inbound_rx,
	})
}
