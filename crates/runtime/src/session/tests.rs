use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{DuplexStream, duplex};

use super::*;

type ServerSocket = WebSocketStream<DuplexStream>;

async fn connected_session(title: Option<&str>) -> (ProtocolSession, ServerSocket) {
	let (client_io, server_io) = duplex(64 * 1024);
	let server = tokio::spawn(async move { tokio_tungstenite::accept_async(server_io).await.unwrap() });
	let socket = crate::handshake::negotiate(client_io, "ws://h/p/ws").await.unwrap();
	let server = server.await.unwrap();

	let target = DebugTarget {
		id: Some("1".into()),
		title: title.map(str::to_string),
		web_socket_debugger_url: Some("ws://h/p/ws".into()),
		..Default::default()
	};
	let session = ProtocolSession::start(socket, StateTracker::new(), TargetAddress::new("h", 80).unwrap(), target);
	(session, server)
}

async fn next_request(server: &mut ServerSocket) -> Value {
	loop {
		match server.next().await {
			Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
			Some(Ok(_)) => continue,
			other => panic!("expected a request, got {other:?}"),
		}
	}
}

async fn push(server: &mut ServerSocket, value: Value) {
	server.send(Message::Text(value.to_string())).await.unwrap();
}

#[tokio::test]
async fn test_session_starts_connected() {
	let (session, _server) = connected_session(Some("T")).await;
	assert_eq!(session.state(), ConnectionState::Connected);
	assert!(session.is_connected());
	assert_eq!(session.status().reason, None);
}

#[tokio::test]
async fn test_send_command_correlates_response() {
	let (session, mut server) = connected_session(None).await;

	let (result, ()) = tokio::join!(
		session.send_command("Runtime.evaluate", Some(json!({"expression": "1+1"}))),
		async {
			let request = next_request(&mut server).await;
			assert_eq!(request["method"], "Runtime.evaluate");
			assert_eq!(request["params"]["expression"], "1+1");
			push(&mut server, json!({"id": request["id"], "result": {"value": 2}})).await;
		}
	);

	assert_eq!(result.unwrap(), json!({"value": 2}));
	assert!(session.inner.callbacks.lock().is_empty());
}

#[tokio::test]
async fn test_error_response_is_remote_error() {
	let (session, mut server) = connected_session(None).await;

	let (result, ()) = tokio::join!(session.send_command("Foo.bar", None), async {
		let request = next_request(&mut server).await;
		assert!(request.get("params").is_none());
		push(
			&mut server,
			json!({"id": request["id"], "error": {"code": -32601, "message": "'Foo.bar' wasn't found"}}),
		)
		.await;
	});

	match result.unwrap_err() {
		Error::Remote { code, message } => {
			assert_eq!(code, -32601);
			assert!(message.contains("Foo.bar"));
		}
		other => panic!("expected remote error, got {other:?}"),
	}
}

#[tokio::test]
async fn test_enable_domains_sends_runtime_then_debugger() {
	let (session, mut server) = connected_session(None).await;

	let (result, methods) = tokio::join!(session.enable_domains(), async {
		let mut methods = Vec::new();
		for _ in 0..2 {
			let request = next_request(&mut server).await;
			methods.push(request["method"].as_str().unwrap().to_string());
			push(&mut server, json!({"id": request["id"], "result": {}})).await;
		}
		methods
	});

	result.unwrap();
	assert_eq!(methods, ["Runtime.enable", "Debugger.enable"]);
}

#[tokio::test]
async fn test_target_crash_ends_session_as_crashed() {
	let (session, mut server) = connected_session(None).await;
	let mut events = session.take_events().unwrap();

	push(
		&mut server,
		json!({"method": "Inspector.detached", "params": {"reason": "targetCrashed"}}),
	)
	.await;

	let event = events.recv().await.unwrap();
	assert!(event.is_crash());

	let status = session.terminated().await;
	assert_eq!(status.state, ConnectionState::Crashed);
	assert_eq!(status.reason.as_deref(), Some(CRASHED_STATUS));
}

#[tokio::test]
async fn test_other_detach_reason_ends_session_as_detached() {
	let (session, mut server) = connected_session(None).await;
	let mut events = session.take_events().unwrap();

	push(
		&mut server,
		json!({"method": "Inspector.detached", "params": {"reason": "Render process gone."}}),
	)
	.await;

	assert_eq!(
		events.recv().await.unwrap(),
		ProtocolEvent::Detached {
			reason: "Render process gone.".into()
		}
	);
	let status = session.terminated().await;
	assert_eq!(status.state, ConnectionState::Detached);
	assert_eq!(status.reason.as_deref(), Some(DETACHED_STATUS));

	// Receiver drains and then ends with the session.
	assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn test_events_before_take_are_capped_but_detach_is_kept() {
	let (session, mut server) = connected_session(None).await;

	for i in 0..UNTAKEN_EVENT_LIMIT + 10 {
		push(
			&mut server,
			json!({"method": "Debugger.scriptParsed", "params": {"scriptId": i.to_string()}}),
		)
		.await;
	}
	push(
		&mut server,
		json!({"method": "Inspector.detached", "params": {"reason": "Inspector already opened"}}),
	)
	.await;
	session.terminated().await;

	let mut events = session.take_events().unwrap();
	let mut received = Vec::new();
	while let Some(event) = events.recv().await {
		received.push(event);
	}

	assert_eq!(received.len(), UNTAKEN_EVENT_LIMIT + 1);
	match &received[UNTAKEN_EVENT_LIMIT - 1] {
		ProtocolEvent::Inspector { params, .. } => {
			assert_eq!(params["scriptId"], (UNTAKEN_EVENT_LIMIT - 1).to_string());
		}
		other => panic!("expected passthrough event, got {other:?}"),
	}
	assert!(received.last().unwrap().is_terminal());
}

#[tokio::test]
async fn test_taken_stream_is_not_capped() {
	let (session, mut server) = connected_session(None).await;
	let mut events = session.take_events().unwrap();

	let total = UNTAKEN_EVENT_LIMIT + 10;
	for i in 0..total {
		push(
			&mut server,
			json!({"method": "Debugger.scriptParsed", "params": {"scriptId": i.to_string()}}),
		)
		.await;
	}

	for _ in 0..total {
		assert!(matches!(events.recv().await, Some(ProtocolEvent::Inspector { .. })));
	}
}

#[tokio::test]
async fn test_other_events_pass_through() {
	let (session, mut server) = connected_session(None).await;
	let mut events = session.take_events().unwrap();

	push(
		&mut server,
		json!({"method": "Debugger.scriptParsed", "params": {"scriptId": "42", "url": "app.js"}}),
	)
	.await;

	match events.recv().await.unwrap() {
		ProtocolEvent::Inspector { method, params } => {
			assert_eq!(method, "Debugger.scriptParsed");
			assert_eq!(params["scriptId"], "42");
		}
		other => panic!("expected passthrough event, got {other:?}"),
	}
	assert_eq!(session.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_close_is_idempotent() {
	let (session, mut server) = connected_session(None).await;

	assert!(session.close("Closed by user", ConnectionState::Closed));
	assert!(!session.close("Closed again", ConnectionState::Closed));
	assert!(!session.close("Late detach", ConnectionState::Detached));

	let status = session.status();
	assert_eq!(status.state, ConnectionState::Closed);
	assert_eq!(status.reason.as_deref(), Some("Closed by user"));

	let frame = server.next().await;
	assert!(
		matches!(frame, Some(Ok(Message::Close(_))) | None),
		"expected close frame, got {frame:?}"
	);
}

#[tokio::test]
async fn test_non_terminal_close_state_is_recorded_as_closed() {
	let (session, _server) = connected_session(None).await;
	assert!(session.close("bye", ConnectionState::Connected));
	assert_eq!(session.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_pending_command_fails_when_session_closes() {
	let (session, mut server) = connected_session(None).await;

	let (result, ()) = tokio::join!(session.send_command("Debugger.pause", None), async {
		next_request(&mut server).await;
		session.close("Closed by user", ConnectionState::Closed);
	});

	assert!(matches!(result, Err(Error::SessionClosed)));
}

#[tokio::test]
async fn test_command_after_close_fails() {
	let (session, _server) = connected_session(None).await;
	session.close("Closed by user", ConnectionState::Closed);

	let err = session.send_command("Debugger.resume", None).await.unwrap_err();
	assert!(err.is_closed());
	assert!(session.inner.callbacks.lock().is_empty());
}

#[tokio::test]
async fn test_socket_loss_reports_disconnected() {
	let (session, server) = connected_session(None).await;
	let mut events = session.take_events().unwrap();

	drop(server);

	assert!(matches!(
		events.recv().await.unwrap(),
		ProtocolEvent::Disconnected { .. }
	));
	let status = session.terminated().await;
	assert_eq!(status.state, ConnectionState::Detached);
	assert_eq!(status.reason.as_deref(), Some(DISCONNECTED_STATUS));
}

#[tokio::test]
async fn test_dropping_session_closes_it() {
	let (session, mut server) = connected_session(None).await;
	let mut status = session.subscribe();

	drop(session);

	let closed = status.wait_for(|s| s.state.is_terminal()).await.unwrap().clone();
	assert_eq!(closed.state, ConnectionState::Closed);
	let frame = server.next().await;
	assert!(matches!(frame, Some(Ok(Message::Close(_))) | None));
}

#[tokio::test]
async fn test_abandoned_command_removes_callback() {
	let (session, mut server) = connected_session(None).await;

	let outcome = tokio::time::timeout(
		Duration::from_millis(50),
		session.send_command("Runtime.evaluate", None),
	)
	.await;
	assert!(outcome.is_err());
	assert!(session.inner.callbacks.lock().is_empty());

	// A late answer for the abandoned id is ignored.
	let request = next_request(&mut server).await;
	push(&mut server, json!({"id": request["id"], "result": {}})).await;
	assert!(session.is_connected());
}

#[tokio::test]
async fn test_connected_address_includes_title() {
	let (titled, _a) = connected_session(Some("T")).await;
	assert_eq!(titled.connected_address(), "h:80 \u{2013} T");

	let (untitled, _b) = connected_session(None).await;
	assert_eq!(untitled.connected_address(), "h:80");
}

#[tokio::test]
async fn test_events_can_be_taken_once() {
	let (session, _server) = connected_session(None).await;
	assert!(session.take_events().is_some());
	assert!(session.take_events().is_none());
}

#[tokio::test]
async fn test_handle_tracks_liveness() {
	let (session, _server) = connected_session(None).await;
	let handle = session.handle();
	assert_eq!(handle.live_url().as_deref(), Some("ws://h/p/ws"));

	assert!(handle.close("Replaced"));
	assert!(handle.live_url().is_none());
	assert_eq!(session.status().reason.as_deref(), Some("Replaced"));

	drop(session);
	assert!(!handle.close("again"));
}
