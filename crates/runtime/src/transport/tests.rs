use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::*;

/// Starts a local WebSocket server that hands the accepted stream to `serve`.
async fn local_server<F, Fut>(serve: F) -> Url
where
	F: FnOnce(
			tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
		) -> Fut
		+ Send
		+ 'static,
	Fut: std::future::Future<Output = ()> + Send,
{
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let ws = accept_async(stream).await.unwrap();
		serve(ws).await;
	});

	Url::parse(&format!("ws://{addr}/devtools/page/test")).unwrap()
}

#[tokio::test]
async fn round_trips_json_messages() {
	let url = local_server(|mut ws| async move {
		// Echo each text frame back with an id field added.
		while let Some(Ok(WsMessage::Text(text))) = ws.next().await {
			let incoming: serde_json::Value = serde_json::from_str(&text).unwrap();
			let reply = serde_json::json!({"id": incoming["id"], "result": {}});
			ws.send(WsMessage::Text(reply.to_string())).await.unwrap();
		}
	})
	.await;

	let mut parts = connect(&url).await.unwrap();
	parts
		.outbound
		.send(serde_json::json!({"id": 1, "method": "Page.enable"}))
		.unwrap();

	match parts.inbound.recv().await.unwrap() {
		TransportEvent::Message(value) => assert_eq!(value["id"], 1),
		other => panic!("expected message, got {other:?}"),
	}
}

#[tokio::test]
async fn peer_disconnect_reports_lost() {
	let url = local_server(|mut ws| async move {
		ws.send(WsMessage::Text(
			serde_json::json!({"method": "Page.loadEventFired", "params": {}}).to_string(),
		))
		.await
		.unwrap();
		// Server drops the socket without a close handshake.
	})
	.await;

	let mut parts = connect(&url).await.unwrap();

	match parts.inbound.recv().await.unwrap() {
		TransportEvent::Message(value) => {
			assert_eq!(value["method"], "Page.loadEventFired");
		}
		other => panic!("expected message, got {other:?}"),
	}

	match parts.inbound.recv().await.unwrap() {
		TransportEvent::Closed { lost } => assert!(lost),
		other => panic!("expected close, got {other:?}"),
	}
}

#[tokio::test]
async fn malformed_frame_is_discarded_not_fatal() {
	let url = local_server(|mut ws| async move {
		ws.send(WsMessage::Text("this is not json".to_string()))
			.await
			.unwrap();
		ws.send(WsMessage::Text(
			serde_json::json!({"id": 9, "result": {}}).to_string(),
		))
		.await
		.unwrap();
		// Keep the socket open until the client goes away.
		while ws.next().await.is_some() {}
	})
	.await;

	let mut parts = connect(&url).await.unwrap();

	match parts.inbound.recv().await.unwrap() {
		TransportEvent::Message(value) => assert_eq!(value["id"], 9),
		other => panic!("expected the well-formed message, got {other:?}"),
	}
}

#[tokio::test]
async fn dropping_outbound_closes_the_socket() {
	let (done_tx, done_rx) = tokio::sync::oneshot::channel();

	let url = local_server(move |mut ws| async move {
		// Wait for the client's close frame (next() yields Close, then None).
		loop {
			match ws.next().await {
				Some(Ok(WsMessage::Close(_))) | None => break,
				_ => {}
			}
		}
		let _ = done_tx.send(());
	})
	.await;

	let parts = connect(&url).await.unwrap();
	drop(parts.outbound);

	tokio::time::timeout(std::time::Duration::from_secs(5), done_rx)
		.await
		.expect("server never observed the close")
		.unwrap();
}
