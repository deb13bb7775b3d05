//! Connection attempts.
//!
//! [`ConnectionOrchestrator::start`] runs one attempt in the background:
//!
//! ```text
//! resolve → connect → discover → check consistency → gate → upgrade → session
//! ```
//!
//! Stages run strictly in this order and the first failure ends the attempt.
//! The outcome is delivered exactly once through the returned
//! [`PendingConnection`]. Advisory notifications for the consistency result
//! are sent to the sink once per attempt, right after discovery.
//!
//! Attempts started concurrently on one orchestrator are not ordered against
//! each other; callers that care must serialize them. Whichever connects last
//! closes the other's session, so at most one stays live.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::address;
use crate::config::DebugConfig;
use crate::consistency;
use crate::discovery::{DiscoveryClient, DiscoveryOutcome};
use crate::error::{Error, Result};
use crate::handshake::{self, GateDecision};
use crate::notify::{self, NotificationSink};
use crate::session::{ProtocolSession, SessionHandle};
use crate::state::{ConnectionState, SessionStatus, StateTracker};
use crate::transport::SecureTransport;

/// Status text given to a live session replaced by a new attempt.
pub const REPLACED_STATUS: &str = "Replaced by a new debug session";

/// Drives connection attempts and tracks the session they produce.
///
/// At most one session started by this orchestrator is live at a time.
pub struct ConnectionOrchestrator {
	sink: Arc<dyn NotificationSink>,
	active: Arc<Mutex<SessionHandle>>,
}

impl ConnectionOrchestrator {
	pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
		Self {
			sink,
			active: Arc::new(Mutex::new(SessionHandle::default())),
		}
	}

	/// Starts an attempt in the background.
	///
	/// Must be called from within a Tokio runtime.
	pub fn start(&self, config: DebugConfig) -> PendingConnection {
		let (result_tx, result_rx) = oneshot::channel();
		let cancel = CancellationToken::new();
		let state = StateTracker::new();
		let status = state.subscribe();

		let attempt = Attempt {
			config,
			sink: Arc::clone(&self.sink),
			active: Arc::clone(&self.active),
		};
		let token = cancel.clone();

		tokio::spawn(async move {
			let outcome = tokio::select! {
				_ = token.cancelled() => Err(Error::Cancelled),
				result = attempt.run_with_deadline(state.clone()) => result,
			};

			if let Err(e) = &outcome {
				state.finish(ConnectionState::Failed, e.to_string());
				match e {
					Error::AlreadyConnected(url) => tracing::info!(url = %url, "Debugger already connected"),
					Error::Cancelled => tracing::debug!("Connection attempt cancelled"),
					_ => tracing::warn!("Debug connection failed: {e}"),
				}
			}

			// A session nobody waits for is dropped here, which closes it.
			if result_tx.send(outcome).is_err() {
				tracing::debug!("Connection result discarded, attempt was abandoned");
			}
		});

		PendingConnection {
			rx: result_rx,
			cancel,
			status,
		}
	}

	/// Runs an attempt to completion.
	pub async fn connect(&self, config: DebugConfig) -> Result<ProtocolSession> {
		self.start(config).await
	}

	/// Runs discovery only and returns every advertised target.
	pub async fn list_targets(&self, config: &DebugConfig) -> Result<DiscoveryOutcome> {
		config.check_server_version()?;
		let address = address::resolve_config(config)?;
		let stream = SecureTransport::new(config.tls)?.connect(&address).await?;
		let discovery = DiscoveryClient::new(address, config.server.clone(), config.selection);
		let (_, outcome) = discovery.discover(stream).await?;
		Ok(outcome)
	}

	/// Returns true while the last session started here is live.
	pub fn has_live_session(&self) -> bool {
		self.active.lock().live_url().is_some()
	}

	/// Closes the live session, if any.
	pub fn close_active(&self, reason: &str) -> bool {
		self.active.lock().close(reason)
	}
}

impl std::fmt::Debug for ConnectionOrchestrator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConnectionOrchestrator")
			.field("live", &self.has_live_session())
			.finish()
	}
}

struct Attempt {
	config: DebugConfig,
	sink: Arc<dyn NotificationSink>,
	active: Arc<Mutex<SessionHandle>>,
}

impl Attempt {
	async fn run_with_deadline(self, state: StateTracker) -> Result<ProtocolSession> {
		let deadline = self.config.connect_timeout;
		match deadline {
			Some(limit) => tokio::time::timeout(limit, self.run(state))
				.await
				.map_err(|_| Error::Timeout(format!("connection attempt exceeded {}ms", limit.as_millis())))?,
			None => self.run(state).await,
		}
	}

	async fn run(self, state: StateTracker) -> Result<ProtocolSession> {
		let config = &self.config;
		config.check_server_version()?;

		state.advance(ConnectionState::Resolving);
		let address = address::resolve_config(config)?;
		tracing::info!(%address, "Connecting debugger");
		let stream = SecureTransport::new(config.tls)?.connect(&address).await?;

		state.advance(ConnectionState::Discovering);
		let discovery = DiscoveryClient::new(address.clone(), config.server.clone(), config.selection);
		let (stream, outcome) = discovery.discover(stream).await?;

		state.advance(ConnectionState::CheckingConsistency);
		let identity = config.server.as_ref();
		let selected = outcome.selected;
		let result = consistency::check(selected.as_ref(), identity);
		if let Some(note) = notify::advisory(&result, identity) {
			notify::deliver(self.sink.as_ref(), note);
		}

		let live_url = self.active.lock().live_url();
		if handshake::gate(&result, live_url.as_deref(), identity)? == GateDecision::ReplaceLiveSession {
			self.active.lock().close(REPLACED_STATUS);
		}

		let (target, ws_url) = match selected {
			Some(target) => match target.web_socket_debugger_url.clone() {
				Some(url) => (target, url),
				None => return Err(Error::NoDebuggableTarget),
			},
			None => return Err(Error::NoDebuggableTarget),
		};

		state.advance(ConnectionState::HandshakingWS);
		let socket = handshake::negotiate(stream, &ws_url).await?;

		let session = ProtocolSession::start(socket, state, address, target);

		// A concurrent attempt may have installed its session since the gate ran.
		let mut active = self.active.lock();
		if active.close(REPLACED_STATUS) {
			tracing::info!("Replaced a debug session connected by a concurrent attempt");
		}
		*active = session.handle();
		drop(active);
		Ok(session)
	}
}

/// Outcome of a connection attempt started with [`ConnectionOrchestrator::start`].
///
/// Resolves exactly once. Dropping it cancels the attempt.
#[derive(Debug)]
pub struct PendingConnection {
	rx: oneshot::Receiver<Result<ProtocolSession>>,
	cancel: CancellationToken,
	status: watch::Receiver<SessionStatus>,
}

impl PendingConnection {
	/// Cancels the attempt and tears down whatever it opened.
	///
	/// Safe to call repeatedly and at any stage. Has no effect once the
	/// attempt produced a session.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Current stage of the attempt.
	pub fn state(&self) -> ConnectionState {
		self.status.borrow().state
	}

	pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
		self.status.clone()
	}
}

impl Future for PendingConnection {
	type Output = Result<ProtocolSession>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx)
			.poll(cx)
			.map(|result| result.unwrap_or(Err(Error::Cancelled)))
	}
}

impl Drop for PendingConnection {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use tokio::net::TcpListener;

	use super::*;
	use crate::notify::CollectingSink;

	fn orchestrator() -> (ConnectionOrchestrator, CollectingSink) {
		let sink = CollectingSink::new();
		(ConnectionOrchestrator::new(Arc::new(sink.clone())), sink)
	}

	#[tokio::test]
	async fn test_old_server_fails_before_any_io() {
		let (orchestrator, sink) = orchestrator();
		let config = DebugConfig::builder()
			.server_url("http://127.0.0.1:1")
			.server_version("2020.6")
			.build()
			.unwrap();

		let pending = orchestrator.start(config);
		let err = pending.await.unwrap_err();
		assert!(matches!(err, Error::UnsupportedServerVersion { .. }), "got {err:?}");
		assert!(sink.is_empty());
	}

	#[tokio::test]
	async fn test_unresolvable_config_fails() {
		let (orchestrator, _) = orchestrator();
		let config = DebugConfig::builder().build().unwrap();
		let err = orchestrator.connect(config).await.unwrap_err();
		assert!(matches!(err, Error::InvalidConfig(_)));
	}

	#[tokio::test]
	async fn test_cancel_is_idempotent_and_reports_cancelled() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();
		// Accepts and then stays silent so discovery never completes.
		let _server = tokio::spawn(async move {
			let (socket, _) = listener.accept().await.unwrap();
			tokio::time::sleep(Duration::from_secs(30)).await;
			drop(socket);
		});

		let (orchestrator, _) = orchestrator();
		let config = DebugConfig::builder()
			.server_url(format!("http://127.0.0.1:{port}"))
			.build()
			.unwrap();

		let pending = orchestrator.start(config);
		let mut status = pending.subscribe();
		status
			.wait_for(|s| s.state == ConnectionState::Discovering)
			.await
			.unwrap();

		pending.cancel();
		pending.cancel();
		let err = pending.await.unwrap_err();
		assert!(err.is_cancelled());

		let last = status.wait_for(|s| s.state.is_terminal()).await.unwrap().clone();
		assert_eq!(last.state, ConnectionState::Failed);
		assert!(!orchestrator.has_live_session());
	}

	#[tokio::test]
	async fn test_deadline_fails_with_timeout() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();
		let _server = tokio::spawn(async move {
			let (socket, _) = listener.accept().await.unwrap();
			tokio::time::sleep(Duration::from_secs(30)).await;
			drop(socket);
		});

		let (orchestrator, _) = orchestrator();
		let config = DebugConfig::builder()
			.server_url(format!("http://127.0.0.1:{port}"))
			.connect_timeout(Duration::from_millis(100))
			.build()
			.unwrap();

		let err = orchestrator.connect(config).await.unwrap_err();
		assert!(err.is_timeout(), "got {err:?}");
	}
}
