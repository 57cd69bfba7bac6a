//! One conversion's session against the shared browser.
//!
//! A [`Tab`] is a pair of connections: one to the browser endpoint (used to
//! create and close the target) and one to the target's own page endpoint
//! (used to navigate, observe, and render). Both belong to exactly one
//! conversion; concurrency across conversions comes from opening more
//! tabs against the same supervisor, never from sharing one.
//!
//! After a deadline expiry the tab is unusable for its conversion and must
//! be closed, not reused.


use std::sync::Arc;
use std::time::Duration;

use pj_protocol::{
	CloseTargetParams, CreateTargetParams, CreateTargetResult, EVENT_LOAD_FIRED, NavigateParams,
	NavigateResult, PrintToPdfResult,
};
use pj_runtime::timer::CountdownTimer;
use pj_runtime::{Connection, ProcessSupervisor};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::page_settings::PageSettings;

/// How often `window.status` is sampled during a status wait.
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// An isolated browsing context plus the connections that drive it.
pub struct Tab {
	browser: Arc<Connection>,
	page: Arc<Connection>,
	target_id: String,
}

impl Tab {
	/// Opens a fresh tab against the supervisor's browser.
	///
	/// # Errors
	///
	/// Fails when the browser is not running, the endpoint refuses the
	/// connection, or target creation fails.
	pub async fn open(supervisor: &ProcessSupervisor) -> Result<Self> {
		let endpoint = supervisor.endpoint().await?;

		let browser = Connection::open(pj_runtime::connect(&endpoint).await?);
		let created: CreateTargetResult = browser
			.send_parsed(
				"Target.createTarget",
				serde_json::to_value(CreateTargetParams::blank())?,
				None,
			)
			.await?;

		let page_endpoint = page_endpoint(&endpoint, &created.target_id);
		let page = Connection::open(pj_runtime::connect(&page_endpoint).await?);
		page.send("Page.enable", Value::Null, None).await?;

		debug!(target: "pj", target_id = %created.target_id, "tab opened");
		Ok(Self {
			browser,
			page,
			target_id: created.target_id,
		})
	}

	/// Identifier of the underlying target.
	pub fn target_id(&self) -> &str {
		&self.target_id
	}

	/// Navigates and waits for the page's load event.
	///
	/// # Errors
	///
	/// Returns [`Error::ConversionTimedOut`] when `timer` expires before
	/// the load event; the tab must then be closed, not reused. Navigation
	/// failures reported by the endpoint (bad host, TLS failure) surface
	/// with the endpoint's own error text.
	pub async fn navigate(&self, url: &Url, timer: Option<&CountdownTimer>) -> Result<()> {
		// Subscribe before issuing the command; the load event can fire
		// before the navigate response arrives.
		let mut events = self.page.subscribe();

		let result: NavigateResult = self
			.page
			.send_parsed(
				"Page.navigate",
				serde_json::to_value(NavigateParams {
					url: url.to_string(),
				})?,
				timer,
			)
			.await
			.map_err(|error| escalate_timeout(error, timer))?;

		if let Some(reason) = result.error_text {
			return Err(Error::Runtime(pj_runtime::Error::Protocol(format!(
				"navigation to {url} failed: {reason}"
			))));
		}

		loop {
			let event = match timer {
				Some(timer) => {
					tokio::select! {
						event = events.recv() => event,
						_ = timer.expired() => return Err(conversion_timed_out(Some(timer))),
					}
				}
				None => events.recv().await,
			};

			match event {
				Ok(event) if event.method == EVENT_LOAD_FIRED => return Ok(()),
				Ok(_) => {}
				Err(broadcast::error::RecvError::Lagged(dropped)) => {
					warn!(target: "pj", dropped, "event receiver lagged during navigation");
				}
				Err(broadcast::error::RecvError::Closed) => {
					return Err(Error::Runtime(pj_runtime::Error::SessionClosed));
				}
			}
		}
	}

	/// Polls the page's `window.status` until it equals `target`.
	///
	/// Returns `true` on a match, `false` when `sub_timeout` elapses first.
	/// A page may legitimately never reach the status, so timing out here
	/// is a reported outcome, not an error.
	///
	/// # Errors
	///
	/// Only session loss is an error; see [`navigate`](Self::navigate).
	pub async fn wait_for_window_status(
		&self,
		target: &str,
		sub_timeout: Duration,
	) -> Result<bool> {
		let deadline = tokio::time::Instant::now() + sub_timeout;

		loop {
			let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
			if remaining.is_zero() {
				return Ok(false);
			}

			match tokio::time::timeout(remaining, self.window_status()).await {
				// The sub-deadline hit while a poll was in flight.
				Err(_) => return Ok(false),
				Ok(Err(error)) => return Err(error),
				Ok(Ok(status)) if status == target => return Ok(true),
				Ok(Ok(_)) => {}
			}

			let nap = STATUS_POLL_INTERVAL
				.min(deadline.saturating_duration_since(tokio::time::Instant::now()));
			tokio::time::sleep(nap).await;
		}
	}

	/// Renders the current page to PDF bytes.
	///
	/// # Errors
	///
	/// Timer expiry fails with
	/// [`OperationTimedOut`](pj_runtime::Error::OperationTimedOut), the
	/// same contract as any single protocol call.
	pub async fn print_to_pdf(
		&self,
		settings: &PageSettings,
		timer: Option<&CountdownTimer>,
	) -> Result<Vec<u8>> {
		let params = settings.to_print_params()?;
		let result: PrintToPdfResult = self
			.page
			.send_parsed("Page.printToPDF", serde_json::to_value(&params)?, timer)
			.await?;

		result.decode().map_err(|error| {
			Error::Runtime(pj_runtime::Error::Protocol(format!(
				"undecodable pdf payload: {error}"
			)))
		})
	}

	/// Closes the tab: best-effort target close on the browser connection,
	/// then both connections shut down.
	pub async fn close(self) {
		self.page.close().await;

		match serde_json::to_value(CloseTargetParams {
			target_id: self.target_id.clone(),
		}) {
			Ok(params) => {
				if let Err(error) = self.browser.send("Target.closeTarget", params, None).await {
					debug!(target: "pj", target_id = %self.target_id, %error, "target close failed");
				}
			}
			Err(error) => {
				debug!(target: "pj", %error, "target close skipped");
			}
		}

		self.browser.close().await;
		debug!(target: "pj", target_id = %self.target_id, "tab closed");
	}

	async fn window_status(&self) -> Result<String> {
		let value = self
			.page
			.send(
				"Runtime.evaluate",
				serde_json::json!({
					"expression": "window.status",
					"returnByValue": true,
				}),
				None,
			)
			.await?;

		Ok(value["result"]["value"].as_str().unwrap_or_default().to_string())
	}

	#[cfg(test)]
	fn from_connections(browser: Arc<Connection>, page: Arc<Connection>, target_id: &str) -> Self {
		Self {
			browser,
			page,
			target_id: target_id.to_string(),
		}
	}
}

/// The per-target endpoint lives under `/devtools/page/` on the same
/// authority as the browser endpoint.
fn page_endpoint(browser: &Url, target_id: &str) -> Url {
	let mut url = browser.clone();
	url.set_path(&format!("/devtools/page/{target_id}"));
	url
}

/// A per-call timeout on a timer that carries the whole conversion's
/// deadline is the conversion deadline expiring.
fn escalate_timeout(error: pj_runtime::Error, timer: Option<&CountdownTimer>) -> Error {
	match error {
		pj_runtime::Error::OperationTimedOut { .. } => conversion_timed_out(timer),
		other => Error::Runtime(other),
	}
}

fn conversion_timed_out(timer: Option<&CountdownTimer>) -> Error {
	Error::ConversionTimedOut {
		timeout: timer.map(CountdownTimer::duration).unwrap_or_default(),
	}
}
