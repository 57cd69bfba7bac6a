use std::time::Duration;

use tokio::time::Instant;

use super::*;

/// A connection wired to in-process channels instead of a socket: the test
/// reads what would hit the wire from `wire_rx` and injects endpoint
/// traffic through `inject_tx`.
fn fake_connection() -> (
	Arc<Connection>,
	mpsc::UnboundedReceiver<Value>,
	mpsc::UnboundedSender<TransportEvent>,
) {
	let (outbound_tx, wire_rx) = mpsc::unbounded_channel();
	let (inject_tx, inbound_rx) = mpsc::unbounded_channel();

	let connection = Connection::open(TransportParts {
		outbound: outbound_tx,
		inbound: inbound_rx,
	});

	(connection, wire_rx, inject_tx)
}

fn response(id: u64, result: Value) -> TransportEvent {
	TransportEvent::Message(serde_json::json!({"id": id, "result": result}))
}

#[tokio::test]
async fn request_ids_are_unique_and_increasing() {
	let (connection, mut wire_rx, inject_tx) = fake_connection();

	// Echo responder so both sends complete.
	tokio::spawn(async move {
		while let Some(request) = wire_rx.recv().await {
			let id = request["id"].as_u64().unwrap();
			let _ = inject_tx.send(response(id, serde_json::json!({"echo": id})));
		}
	});

	let first = connection
		.send("Page.enable", Value::Null, None)
		.await
		.unwrap();
	let second = connection
		.send("Page.enable", Value::Null, None)
		.await
		.unwrap();

	let first_id = first["echo"].as_u64().unwrap();
	let second_id = second["echo"].as_u64().unwrap();
	assert!(second_id > first_id);
}

#[tokio::test]
async fn response_resolves_matching_request() {
	let (connection, mut wire_rx, inject_tx) = fake_connection();

	let pending = {
		let connection = Arc::clone(&connection);
		tokio::spawn(async move {
			connection
				.send(
					"Page.navigate",
					serde_json::json!({"url": "about:blank"}),
					None,
				)
				.await
		})
	};

	let request = wire_rx.recv().await.unwrap();
	assert_eq!(request["method"], "Page.navigate");
	let id = request["id"].as_u64().unwrap();

	inject_tx
		.send(response(id, serde_json::json!({"frameId": "F1"})))
		.unwrap();

	let result = pending.await.unwrap().unwrap();
	assert_eq!(result["frameId"], "F1");
}

#[tokio::test]
async fn out_of_order_responses_correlate_by_id() {
	let (connection, mut wire_rx, inject_tx) = fake_connection();

	let first = {
		let connection = Arc::clone(&connection);
		tokio::spawn(async move { connection.send("a", Value::Null, None).await })
	};
	let first_id = wire_rx.recv().await.unwrap()["id"].as_u64().unwrap();

	let second = {
		let connection = Arc::clone(&connection);
		tokio::spawn(async move { connection.send("b", Value::Null, None).await })
	};
	let second_id = wire_rx.recv().await.unwrap()["id"].as_u64().unwrap();

	// Answer in reverse order.
	inject_tx
		.send(response(second_id, serde_json::json!({"which": "b"})))
		.unwrap();
	inject_tx
		.send(response(first_id, serde_json::json!({"which": "a"})))
		.unwrap();

	assert_eq!(first.await.unwrap().unwrap()["which"], "a");
	assert_eq!(second.await.unwrap().unwrap()["which"], "b");
}

#[tokio::test]
async fn error_payload_surfaces_as_remote_error() {
	let (connection, mut wire_rx, inject_tx) = fake_connection();

	let pending = {
		let connection = Arc::clone(&connection);
		tokio::spawn(async move { connection.send("Page.navigate", Value::Null, None).await })
	};

	let id = wire_rx.recv().await.unwrap()["id"].as_u64().unwrap();
	inject_tx
		.send(TransportEvent::Message(serde_json::json!({
			"id": id,
			"error": {"code": -32000, "message": "Cannot navigate to invalid URL"}
		})))
		.unwrap();

	let error = pending.await.unwrap().unwrap_err();
	match error {
		Error::Remote { code, message } => {
			assert_eq!(code, -32000);
			assert!(message.contains("invalid URL"));
		}
		other => panic!("expected remote error, got {other:?}"),
	}
}

#[tokio::test(start_paused = true)]
async fn timer_expiry_fails_send_and_drops_late_response() {
	let (connection, mut wire_rx, inject_tx) = fake_connection();

	let timer = CountdownTimer::started(Duration::from_millis(50)).unwrap();
	let before = Instant::now();
	let result = connection
		.send("Page.printToPDF", Value::Null, Some(&timer))
		.await;
	let waited = before.elapsed();

	assert!(matches!(result, Err(Error::OperationTimedOut { .. })));
	assert!(
		waited >= Duration::from_millis(50) && waited < Duration::from_millis(150),
		"timed out after {waited:?}"
	);

	// The endpoint answers late; nobody may receive that response.
	let id = wire_rx.recv().await.unwrap()["id"].as_u64().unwrap();
	inject_tx
		.send(response(id, serde_json::json!({"data": "late"})))
		.unwrap();
	tokio::time::sleep(Duration::from_millis(10)).await;
	assert_eq!(connection.responses_delivered(), 0);

	// The connection itself stays usable.
	let pending = {
		let connection = Arc::clone(&connection);
		tokio::spawn(async move { connection.send("Page.enable", Value::Null, None).await })
	};
	let next_id = wire_rx.recv().await.unwrap()["id"].as_u64().unwrap();
	assert!(next_id > id);
	inject_tx.send(response(next_id, Value::Null)).unwrap();
	pending.await.unwrap().unwrap();
	assert_eq!(connection.responses_delivered(), 1);
}

#[tokio::test]
async fn close_fails_pending_requests_with_session_closed() {
	let (connection, mut wire_rx, _inject_tx) = fake_connection();

	let pending = {
		let connection = Arc::clone(&connection);
		tokio::spawn(async move { connection.send("Page.navigate", Value::Null, None).await })
	};
	wire_rx.recv().await.unwrap();

	connection.close().await;
	assert!(matches!(pending.await.unwrap(), Err(Error::SessionClosed)));
	assert_eq!(connection.state(), ConnectionState::Closed);

	// Close is idempotent and later sends are rejected outright.
	connection.close().await;
	assert!(matches!(
		connection.send("Page.enable", Value::Null, None).await,
		Err(Error::SessionClosed)
	));
}

#[tokio::test]
async fn transport_loss_fails_pending_requests_with_browser_lost() {
	let (connection, mut wire_rx, inject_tx) = fake_connection();

	let pending = {
		let connection = Arc::clone(&connection);
		tokio::spawn(async move { connection.send("Page.printToPDF", Value::Null, None).await })
	};
	wire_rx.recv().await.unwrap();

	inject_tx
		.send(TransportEvent::Closed { lost: true })
		.unwrap();

	assert!(matches!(pending.await.unwrap(), Err(Error::BrowserLost)));
	assert_eq!(connection.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn events_reach_subscribers() {
	let (connection, _wire_rx, inject_tx) = fake_connection();

	let mut events = connection.subscribe();
	inject_tx
		.send(TransportEvent::Message(serde_json::json!({
			"method": "Page.loadEventFired",
			"params": {"timestamp": 1.0}
		})))
		.unwrap();

	let event = events.recv().await.unwrap();
	assert_eq!(event.method, "Page.loadEventFired");
}

#[tokio::test]
async fn unrecognized_messages_do_not_fail_the_session() {
	let (connection, mut wire_rx, inject_tx) = fake_connection();

	inject_tx
		.send(TransportEvent::Message(serde_json::json!({"junk": true})))
		.unwrap();

	let pending = {
		let connection = Arc::clone(&connection);
		tokio::spawn(async move { connection.send("Page.enable", Value::Null, None).await })
	};
	let id = wire_rx.recv().await.unwrap()["id"].as_u64().unwrap();
	inject_tx.send(response(id, Value::Null)).unwrap();
	pending.await.unwrap().unwrap();
}
