//! Loopback debug server for end-to-end tests.
//!
//! Serves the discovery document over plain HTTP on `127.0.0.1`, then accepts
//! the WebSocket upgrade on the same connection and hands the server side of
//! the socket to the test.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

pub type ServerSocket = WebSocketStream<TcpStream>;

/// Builds the discovery body from the server port and the request count so far.
pub type BodyFn = dyn Fn(u16, usize) -> String + Send + Sync;

pub struct FakeDebugServer {
	pub port: u16,
	requests: Arc<Mutex<Vec<String>>>,
	sockets: mpsc::UnboundedReceiver<ServerSocket>,
}

impl FakeDebugServer {
	pub async fn start(body: impl Fn(u16, usize) -> String + Send + Sync + 'static) -> Self {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();
		let requests = Arc::new(Mutex::new(Vec::new()));
		let (socket_tx, sockets) = mpsc::unbounded_channel();
		let body: Arc<BodyFn> = Arc::new(body);
		let served = Arc::new(AtomicUsize::new(0));

		let log = Arc::clone(&requests);
		tokio::spawn(async move {
			while let Ok((stream, _)) = listener.accept().await {
				let body = Arc::clone(&body);
				let log = Arc::clone(&log);
				let served = Arc::clone(&served);
				let socket_tx = socket_tx.clone();
				tokio::spawn(async move {
					let _ = handle(stream, port, body, log, served, socket_tx).await;
				});
			}
		});

		Self {
			port,
			requests,
			sockets,
		}
	}

	/// Configured server URL: the fake YouTrack lives under `/p`.
	pub fn server_url(&self) -> String {
		format!("http://127.0.0.1:{}/p", self.port)
	}

	pub fn ws_url(port: u16) -> String {
		format!("ws://127.0.0.1:{port}/p/ws")
	}

	/// Request heads received so far.
	pub fn requests(&self) -> Vec<String> {
		self.requests.lock().clone()
	}

	pub async fn next_socket(&mut self) -> ServerSocket {
		tokio::time::timeout(Duration::from_secs(5), self.sockets.recv())
			.await
			.expect("no WebSocket upgrade within 5s")
			.expect("server stopped")
	}

	/// Returns true if no upgrade arrives within `wait`.
	pub async fn no_upgrade_within(&mut self, wait: Duration) -> bool {
		tokio::time::timeout(wait, self.sockets.recv()).await.is_err()
	}
}

async fn handle(
	mut stream: TcpStream,
	port: u16,
	body: Arc<BodyFn>,
	log: Arc<Mutex<Vec<String>>>,
	served: Arc<AtomicUsize>,
	socket_tx: mpsc::UnboundedSender<ServerSocket>,
) -> std::io::Result<()> {
	let mut head = Vec::new();
	let mut byte = [0u8; 1];
	while !head.ends_with(b"\r\n\r\n") {
		if stream.read(&mut byte).await? == 0 {
			return Ok(());
		}
		head.push(byte[0]);
	}
	log.lock().push(String::from_utf8_lossy(&head).into_owned());

	let document = body(port, served.fetch_add(1, Ordering::SeqCst));
	let response = format!(
		"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{document}",
		document.len()
	);
	stream.write_all(response.as_bytes()).await?;

	if let Ok(socket) = tokio_tungstenite::accept_async(stream).await {
		let _ = socket_tx.send(socket);
	}
	Ok(())
}

/// Single page target whose debugger URL points back at the fake server.
pub fn page_document(port: u16) -> String {
	format!(
		r#"[{{"url":"http://127.0.0.1:{port}/p","webSocketDebuggerUrl":"{}","title":"T","type":"page","id":"1"}}]"#,
		FakeDebugServer::ws_url(port)
	)
}

/// Reads the next command sent by the client.
pub async fn next_command(socket: &mut ServerSocket) -> Value {
	loop {
		match socket.next().await {
			Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
			Some(Ok(_)) => continue,
			other => panic!("expected a command, got {other:?}"),
		}
	}
}

pub async fn push(socket: &mut ServerSocket, value: Value) {
	socket.send(Message::Text(value.to_string())).await.unwrap();
}
