//! Request/response correlation over one debugging connection.
//!
//! One [`Connection`] wraps one WebSocket to the browser. It assigns
//! monotonically increasing request ids, records a pending entry per
//! in-flight request, and runs a dispatch loop that routes every incoming
//! message: by id to the pending entry (responses), to broadcast
//! subscribers (events), or to a debug log (anything unrecognized).
//!
//! Correlation is by id only - requests leave in send order but responses
//! may arrive in any order. Each pending entry is resolved exactly once:
//! by its response, by a supplied timer expiring (the entry is removed so a
//! late response is dropped on the floor), or by the connection shutting
//! down, whichever happens first.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex as ParkingLotMutex;
use pj_protocol::{ErrorPayload, Event, Message, Request, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

use crate::error::{Error, Result};
use crate::timer::CountdownTimer;
use crate::transport::{TransportEvent, TransportParts};

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	/// Being established.
	Connecting,
	/// Live; requests are accepted.
	Open,
	/// Shutdown in progress; pending requests are being failed.
	Closing,
	/// Fully shut down.
	Closed,
}

/// Pending request callbacks keyed by request id.
type CallbackMap = Arc<TokioMutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// Removes a pending entry if the owning request future is dropped before
/// completing, so abandoned calls cannot leak table entries.
struct PendingGuard {
	id: u64,
	callbacks: CallbackMap,
	armed: bool,
}

impl PendingGuard {
	fn new(id: u64, callbacks: CallbackMap) -> Self {
		Self {
			id,
			callbacks,
			armed: true,
		}
	}

	fn disarm(&mut self) {
		self.armed = false;
	}
}

impl Drop for PendingGuard {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}

		let id = self.id;
		let callbacks = Arc::clone(&self.callbacks);
		if let Ok(handle) = tokio::runtime::Handle::try_current() {
			handle.spawn(async move {
				if callbacks.lock().await.remove(&id).is_some() {
					debug!(target: "pj", id, "removed abandoned pending request");
				}
			});
		}
	}
}

/// One live debugging connection with request correlation and event fan-out.
pub struct Connection {
	/// Request id counter; unique within this connection.
	last_id: AtomicU64,
	/// Pending requests awaiting their response.
	callbacks: CallbackMap,
	/// Outbound half of the transport; taken on shutdown to stop the writer.
	outbound: ParkingLotMutex<Option<mpsc::UnboundedSender<Value>>>,
	/// Protocol event fan-out.
	event_tx: broadcast::Sender<Event>,
	state: ParkingLotMutex<ConnectionState>,
	/// Responses actually handed to a waiting caller.
	delivered: AtomicU64,
}

impl Connection {
	/// Wraps transport channels and starts the dispatch loop.
	pub fn open(parts: TransportParts) -> Arc<Self> {
		let TransportParts {
			outbound,
			mut inbound,
		} = parts;

		let (event_tx, _) = broadcast::channel(256);

		let connection = Arc::new(Self {
			last_id: AtomicU64::new(0),
			callbacks: Arc::new(TokioMutex::new(HashMap::new())),
			outbound: ParkingLotMutex::new(Some(outbound)),
			event_tx,
			state: ParkingLotMutex::new(ConnectionState::Connecting),
			delivered: AtomicU64::new(0),
		});

		*connection.state.lock() = ConnectionState::Open;

		let dispatcher = Arc::clone(&connection);
		tokio::spawn(async move {
			while let Some(event) = inbound.recv().await {
				match event {
					TransportEvent::Message(value) => dispatcher.dispatch(value).await,
					TransportEvent::Closed { lost } => {
						dispatcher.shutdown(lost).await;
						return;
					}
				}
			}
			// Transport tasks vanished without a close notification.
			dispatcher.shutdown(true).await;
		});

		connection
	}

	/// Current lifecycle state.
	pub fn state(&self) -> ConnectionState {
		*self.state.lock()
	}

	/// Sends a request and waits for its response.
	///
	/// With a timer, the wait is bounded: on expiry the pending entry is
	/// removed (a late response will not be delivered to anyone) and the
	/// call fails with [`Error::OperationTimedOut`].
	///
	/// # Errors
	///
	/// [`Error::SessionClosed`] when the connection is or becomes closed,
	/// [`Error::BrowserLost`] when the process disappears mid-call,
	/// [`Error::Remote`] when the endpoint answers with an error payload.
	pub async fn send(
		&self,
		method: &str,
		params: Value,
		timer: Option<&CountdownTimer>,
	) -> Result<Value> {
		let sender = {
			if *self.state.lock() != ConnectionState::Open {
				return Err(Error::SessionClosed);
			}
			self.outbound.lock().clone()
		};
		let Some(sender) = sender else {
			return Err(Error::SessionClosed);
		};

		let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().await.insert(id, tx);
		let mut guard = PendingGuard::new(id, Arc::clone(&self.callbacks));

		let request = Request {
			id,
			method: method.to_string(),
			params,
		};
		let payload = match serde_json::to_value(&request) {
			Ok(payload) => payload,
			Err(error) => {
				self.callbacks.lock().await.remove(&id);
				guard.disarm();
				return Err(error.into());
			}
		};

		debug!(target: "pj", id, method, "sending request");
		if sender.send(payload).is_err() {
			self.callbacks.lock().await.remove(&id);
			guard.disarm();
			return Err(Error::SessionClosed);
		}

		match timer {
			None => {
				let result = rx.await;
				guard.disarm();
				match result {
					Ok(result) => result,
					Err(_) => Err(Error::SessionClosed),
				}
			}
			Some(timer) => {
				tokio::select! {
					result = rx => {
						guard.disarm();
						match result {
							Ok(result) => result,
							Err(_) => Err(Error::SessionClosed),
						}
					}
					_ = timer.expired() => {
						self.callbacks.lock().await.remove(&id);
						guard.disarm();
						debug!(target: "pj", id, method, "request timed out");
						Err(Error::OperationTimedOut {
							method: method.to_string(),
						})
					}
				}
			}
		}
	}

	/// [`send`](Self::send) plus deserialization of the result payload.
	///
	/// # Errors
	///
	/// As [`send`](Self::send), plus [`Error::Json`](crate::Error::Json)
	/// when the result does not match `T`.
	pub async fn send_parsed<T: DeserializeOwned>(
		&self,
		method: &str,
		params: Value,
		timer: Option<&CountdownTimer>,
	) -> Result<T> {
		let value = self.send(method, params, timer).await?;
		Ok(serde_json::from_value(value)?)
	}

	/// Subscribes to protocol events. Receivers that lag past 256 buffered
	/// events lose the oldest ones.
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.event_tx.subscribe()
	}

	/// Closes the connection: stops the transport and fails every pending
	/// request with [`Error::SessionClosed`]. Idempotent.
	pub async fn close(&self) {
		self.shutdown(false).await;
	}

	async fn dispatch(&self, value: Value) {
		match serde_json::from_value::<Message>(value) {
			Ok(Message::Response(response)) => self.dispatch_response(response).await,
			Ok(Message::Event(event)) => {
				// No receivers is fine; events are a broadcast side channel.
				let _ = self.event_tx.send(event);
			}
			Ok(Message::Unknown(value)) => {
				debug!(target: "pj", %value, "discarding unrecognized message");
			}
			Err(error) => {
				debug!(target: "pj", %error, "discarding undecodable message");
			}
		}
	}

	async fn dispatch_response(&self, response: Response) {
		let callback = self.callbacks.lock().await.remove(&response.id);
		match callback {
			Some(tx) => {
				let result = match response.error {
					Some(payload) => Err(remote_error(payload)),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};
				if tx.send(result).is_ok() {
					self.delivered.fetch_add(1, Ordering::SeqCst);
				}
			}
			None => {
				// Late (post-timeout) or unsolicited; must not reach a caller.
				debug!(target: "pj", id = response.id, "response without a pending request");
			}
		}
	}

	async fn shutdown(&self, lost: bool) {
		{
			let mut state = self.state.lock();
			if *state != ConnectionState::Open {
				return;
			}
			*state = ConnectionState::Closing;
		}

		// Dropping the sender stops the writer task, which sends the close
		// frame on its way out.
		self.outbound.lock().take();

		let mut callbacks = self.callbacks.lock().await;
		for (_, tx) in callbacks.drain() {
			let _ = tx.send(Err(if lost {
				Error::BrowserLost
			} else {
				Error::SessionClosed
			}));
		}
		drop(callbacks);

		*self.state.lock() = ConnectionState::Closed;
	}

	#[cfg(test)]
	fn responses_delivered(&self) -> u64 {
		self.delivered.load(Ordering::SeqCst)
	}
}

/// Converts an endpoint error payload into [`Error::Remote`].
fn remote_error(payload: ErrorPayload) -> Error {
	let message = match payload.data {
		Some(data) => format!("{} ({data})", payload.message),
		None => payload.message,
	};
	Error::Remote {
		code: payload.code,
		message,
	}
}
