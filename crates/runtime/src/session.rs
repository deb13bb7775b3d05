//! Inspector Protocol session over an upgraded WebSocket.
//!
//! This module implements command correlation and event dispatch on top of
//! the socket. It handles:
//! - Generating unique command ids
//! - Correlating responses with pending commands
//! - Distinguishing events from responses
//! - Reacting to `Inspector.detached` and socket loss
//!
//! # Message Flow
//!
//! 1. Caller invokes [`ProtocolSession::send_command`] with a method and params
//! 2. The session allocates an id and registers a oneshot sender for it
//! 3. The request is queued to the writer task as a text frame
//! 4. The reader task receives the response and resolves the oneshot
//!
//! Events are forwarded to the receiver returned by
//! [`ProtocolSession::take_events`]. A detach event or socket loss moves the
//! session to a terminal state through the same path as a local
//! [`close`](ProtocolSession::close).

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use ytdebug_protocol::{DebugTarget, Event, InboundMessage, ProtocolEvent, Request};

use crate::address::TargetAddress;
use crate::error::{Error, Result};
use crate::state::{ConnectionState, SessionStatus, StateTracker};

/// Status text for a crashed target.
pub const CRASHED_STATUS: &str = "Disconnected (Inspector crashed)";

/// Status text for any other detach.
pub const DETACHED_STATUS: &str = "Disconnected (Inspector already opened)";

/// Status text for a socket lost without a detach event.
pub const DISCONNECTED_STATUS: &str = "Disconnected";

/// Domains enabled by [`ProtocolSession::enable_domains`].
pub const DEFAULT_DOMAINS: [&str; 2] = ["Runtime", "Debugger"];

/// Events buffered before [`ProtocolSession::take_events`] is called; later
/// non-terminal events are dropped until the stream is taken.
pub const UNTAKEN_EVENT_LIMIT: usize = 1024;

/// Time allowed for the close frame once the session is shut down.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Pending command callbacks keyed by command id.
type CallbackMap = Arc<Mutex<HashMap<u32, oneshot::Sender<Result<Value>>>>>;

/// Removes the callback of a command whose future was dropped before completion.
struct CancelGuard {
	id: u32,
	callbacks: CallbackMap,
	completed: bool,
}

impl CancelGuard {
	fn new(id: u32, callbacks: CallbackMap) -> Self {
		Self {
			id,
			callbacks,
			completed: false,
		}
	}

	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if !self.completed && self.callbacks.lock().remove(&self.id).is_some() {
			tracing::debug!(id = self.id, "Removed orphaned command callback");
		}
	}
}

/// Future returned by [`ProtocolSession::send_command`].
struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.complete();
				Poll::Ready(result.map_err(|_| Error::SessionClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

struct Inner {
	last_id: AtomicU32,
	callbacks: CallbackMap,
	outbound_tx: mpsc::UnboundedSender<Message>,
	state: StateTracker,
	cancel: CancellationToken,
	address: TargetAddress,
	target: DebugTarget,
	events_taken: AtomicBool,
	untaken: AtomicUsize,
}

impl Inner {
	/// Single path to a terminal state. Returns false if already terminal.
	fn shutdown(&self, terminal: ConnectionState, reason: &str) -> bool {
		if !self.state.finish(terminal, reason) {
			return false;
		}
		tracing::info!(address = %self.address, state = %terminal, reason, "Debug session ended");

		self.cancel.cancel();
		let pending: Vec<_> = self.callbacks.lock().drain().collect();
		for (_, callback) in pending {
			let _ = callback.send(Err(Error::SessionClosed));
		}
		true
	}

	fn dispatch(&self, message: InboundMessage, events: &mpsc::UnboundedSender<ProtocolEvent>) {
		match message {
			InboundMessage::Response(response) => {
				let Some(callback) = self.callbacks.lock().remove(&response.id) else {
					tracing::debug!(id = response.id, "Response for unknown command (ignored)");
					return;
				};
				let result = match response.error {
					Some(error) => Err(Error::Remote {
						code: error.code,
						message: error.message,
					}),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};
				let _ = callback.send(result);
			}
			InboundMessage::Event(event) => self.dispatch_event(event, events),
			InboundMessage::Unknown(value) => {
				tracing::debug!(%value, "Unknown message type (ignored)");
			}
		}
	}

	fn dispatch_event(&self, event: Event, events: &mpsc::UnboundedSender<ProtocolEvent>) {
		let event = ProtocolEvent::from_event(event);
		let terminal = match &event {
			ProtocolEvent::Detached { .. } if event.is_crash() => Some((ConnectionState::Crashed, CRASHED_STATUS)),
			ProtocolEvent::Detached { reason } => {
				tracing::debug!(reason = %reason, "Inspector detached");
				Some((ConnectionState::Detached, DETACHED_STATUS))
			}
			_ => None,
		};

		self.forward(event, events);
		if let Some((state, status)) = terminal {
			self.shutdown(state, status);
		}
	}

	/// Queues an event for the owner. Terminal events are always kept.
	fn forward(&self, event: ProtocolEvent, events: &mpsc::UnboundedSender<ProtocolEvent>) {
		if !self.events_taken.load(Ordering::Acquire)
			&& !event.is_terminal()
			&& self.untaken.fetch_add(1, Ordering::AcqRel) >= UNTAKEN_EVENT_LIMIT
		{
			tracing::trace!(?event, "Dropped event, event stream not taken");
			return;
		}
		let _ = events.send(event);
	}

	fn dispatch_frame(&self, text: &str, events: &mpsc::UnboundedSender<ProtocolEvent>) {
		tracing::trace!(frame = text, "Inbound frame");
		match serde_json::from_str::<InboundMessage>(text) {
			Ok(message) => self.dispatch(message, events),
			Err(e) => tracing::error!("Failed to parse Inspector message: {e}"),
		}
	}

	/// Socket went away. Ignored if the session already ended.
	fn connection_lost(&self, error: Option<String>, events: &mpsc::UnboundedSender<ProtocolEvent>) {
		if self.state.current().is_terminal() {
			return;
		}
		if let Some(error) = &error {
			tracing::error!(address = %self.address, "Debug socket failed: {error}");
		}
		self.forward(ProtocolEvent::Disconnected { error }, events);
		self.shutdown(ConnectionState::Detached, DISCONNECTED_STATUS);
	}
}

/// Live debugging session.
///
/// Dropping the session closes it.
pub struct ProtocolSession {
	inner: Arc<Inner>,
	events: Mutex<Option<mpsc::UnboundedReceiver<ProtocolEvent>>>,
}

impl ProtocolSession {
	/// Takes over an upgraded socket and starts the reader and writer tasks.
	///
	/// `state` is the tracker of the attempt that produced the socket; it is
	/// advanced to [`ConnectionState::Connected`].
	pub fn start<S>(socket: WebSocketStream<S>, state: StateTracker, address: TargetAddress, target: DebugTarget) -> Self
	where
		S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
	{
		state.advance(ConnectionState::Connected);

		let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let inner = Arc::new(Inner {
			last_id: AtomicU32::new(0),
			callbacks: Arc::new(Mutex::new(HashMap::new())),
			outbound_tx,
			state,
			cancel: CancellationToken::new(),
			address,
			target,
			events_taken: AtomicBool::new(false),
			untaken: AtomicUsize::new(0),
		});

		let (mut sink, mut stream) = socket.split();

		let cancel = inner.cancel.clone();
		tokio::spawn(async move {
			loop {
				tokio::select! {
					_ = cancel.cancelled() => break,
					message = outbound_rx.recv() => {
						let Some(message) = message else { break };
						if let Err(e) = sink.send(message).await {
							tracing::error!("Debug socket write error: {e}");
							break;
						}
					}
				}
			}
			let _ = tokio::time::timeout(CLOSE_GRACE, sink.close()).await;
		});

		let reader = Arc::clone(&inner);
		tokio::spawn(async move {
			loop {
				tokio::select! {
					_ = reader.cancel.cancelled() => break,
					frame = stream.next() => match frame {
						Some(Ok(Message::Text(text))) => reader.dispatch_frame(&text, &events_tx),
						Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
							Ok(text) => reader.dispatch_frame(text, &events_tx),
							Err(_) => tracing::debug!(len = data.len(), "Ignored non-UTF-8 binary frame"),
						},
						Some(Ok(Message::Close(frame))) => {
							tracing::debug!(?frame, "Server closed the debug socket");
							reader.connection_lost(None, &events_tx);
							break;
						}
						Some(Ok(_)) => {}
						Some(Err(e)) => {
							reader.connection_lost(Some(e.to_string()), &events_tx);
							break;
						}
						None => {
							reader.connection_lost(None, &events_tx);
							break;
						}
					},
				}
			}
		});

		tracing::info!(address = %inner.address, title = ?inner.target.title, "Debug session connected");
		Self {
			inner,
			events: Mutex::new(Some(events_rx)),
		}
	}

	/// Sends a command and awaits its result.
	///
	/// # Errors
	///
	/// - [`Error::Remote`] if the server answers with an error
	/// - [`Error::SessionClosed`] if the session ends before the answer
	pub async fn send_command(&self, method: &str, params: Option<Value>) -> Result<Value> {
		let inner = &self.inner;
		let id = inner.last_id.fetch_add(1, Ordering::SeqCst);

		let (tx, rx) = oneshot::channel();
		inner.callbacks.lock().insert(id, tx);
		let guard = CancelGuard::new(id, Arc::clone(&inner.callbacks));

		// Checked after registering so a concurrent shutdown either drains
		// this callback or is observed here.
		if inner.state.current().is_terminal() {
			return Err(Error::SessionClosed);
		}

		let request = Request {
			id,
			method: method.to_string(),
			params,
		};
		let text = serde_json::to_string(&request)?;
		tracing::debug!(id, method, "Sending command");

		if inner.outbound_tx.send(Message::Text(text)).is_err() {
			return Err(Error::SessionClosed);
		}

		ResponseFuture { rx, guard }.await
	}

	/// Enables the `Runtime` and `Debugger` domains.
	pub async fn enable_domains(&self) -> Result<()> {
		for domain in DEFAULT_DOMAINS {
			self.send_command(&format!("{domain}.enable"), None).await?;
		}
		Ok(())
	}

	/// Takes the event receiver. Returns `None` after the first call.
	///
	/// Until it is taken, at most [`UNTAKEN_EVENT_LIMIT`] non-terminal events are kept.
	/// Once taken, events are unbounded and the caller must drain them.
	/// The receiver yields `None` once the session has ended and every
	/// buffered event was read.
	pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<ProtocolEvent>> {
		let events = self.events.lock().take();
		if events.is_some() {
			self.inner.events_taken.store(true, Ordering::Release);
		}
		events
	}

	/// Ends the session with `reason`.
	///
	/// `state` must be terminal; anything else is recorded as
	/// [`ConnectionState::Closed`]. Returns false if the session had already
	/// ended, in which case nothing happens.
	pub fn close(&self, reason: &str, state: ConnectionState) -> bool {
		let state = if state.is_terminal() { state } else { ConnectionState::Closed };
		self.inner.shutdown(state, reason)
	}

	pub fn state(&self) -> ConnectionState {
		self.inner.state.current()
	}

	pub fn status(&self) -> SessionStatus {
		self.inner.state.status()
	}

	pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
		self.inner.state.subscribe()
	}

	/// Waits until the session reaches a terminal state.
	pub async fn terminated(&self) -> SessionStatus {
		let mut rx = self.subscribe();
		match rx.wait_for(|status| status.state.is_terminal()).await {
			Ok(status) => status.clone(),
			Err(_) => self.status(),
		}
	}

	pub fn is_connected(&self) -> bool {
		self.state() == ConnectionState::Connected
	}

	pub fn target(&self) -> &DebugTarget {
		&self.inner.target
	}

	pub fn address(&self) -> &TargetAddress {
		&self.inner.address
	}

	/// `host:port`, followed by the target title when there is one.
	pub fn connected_address(&self) -> String {
		match &self.inner.target.title {
			Some(title) => format!("{} \u{2013} {title}", self.inner.address),
			None => self.inner.address.to_string(),
		}
	}

	pub(crate) fn handle(&self) -> SessionHandle {
		SessionHandle {
			inner: Arc::downgrade(&self.inner),
		}
	}
}

impl Drop for ProtocolSession {
	fn drop(&mut self) {
		self.inner.shutdown(ConnectionState::Closed, "Session dropped");
	}
}

impl std::fmt::Debug for ProtocolSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProtocolSession")
			.field("address", &self.inner.address)
			.field("state", &self.state())
			.finish()
	}
}

/// Non-owning reference kept by the orchestrator to its latest session.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionHandle {
	inner: Weak<Inner>,
}

impl SessionHandle {
	/// Debugger URL of the session while it is still live.
	pub(crate) fn live_url(&self) -> Option<String> {
		let inner = self.inner.upgrade()?;
		if inner.state.current().is_terminal() {
			return None;
		}
		inner.target.web_socket_debugger_url.clone()
	}

	pub(crate) fn close(&self, reason: &str) -> bool {
		self.inner
			.upgrade()
			.is_some_and(|inner| inner.shutdown(ConnectionState::Closed, reason))
	}
}
