//! Connection attempt state.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Stage of a connection attempt, and of the session it produces.
///
/// States only move forward. `Detached`, `Crashed`, `Closed` and `Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
	Idle,
	Resolving,
	Discovering,
	CheckingConsistency,
	HandshakingWS,
	Connected,
	/// Server detached the debugger, or the socket went away.
	Detached,
	/// Debugged runtime crashed.
	Crashed,
	/// Closed locally.
	Closed,
	/// Attempt failed before a session existed.
	Failed,
}

impl ConnectionState {
	fn rank(self) -> u8 {
		match self {
			Self::Idle => 0,
			Self::Resolving => 1,
			Self::Discovering => 2,
			Self::CheckingConsistency => 3,
			Self::HandshakingWS => 4,
			Self::Connected => 5,
			Self::Detached | Self::Crashed | Self::Closed | Self::Failed => 6,
		}
	}

	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Detached | Self::Crashed | Self::Closed | Self::Failed)
	}

	/// Returns true if `next` is a legal successor of `self`.
	pub fn can_advance_to(self, next: Self) -> bool {
		!self.is_terminal() && next.rank() > self.rank()
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Resolving => "resolving",
			Self::Discovering => "discovering",
			Self::CheckingConsistency => "checking-consistency",
			Self::HandshakingWS => "handshaking",
			Self::Connected => "connected",
			Self::Detached => "detached",
			Self::Crashed => "crashed",
			Self::Closed => "closed",
			Self::Failed => "failed",
		}
	}
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// State plus the status text of the transition that reached it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
	pub state: ConnectionState,
	/// Set for terminal states, e.g. `"Disconnected (Inspector crashed)"`.
	pub reason: Option<String>,
}

/// One attempt's [`ConnectionState`].
///
/// Clones share the same state. Observers subscribe through [`watch`] and
/// always see the latest status.
#[derive(Debug, Clone)]
pub struct StateTracker {
	tx: Arc<watch::Sender<SessionStatus>>,
}

impl StateTracker {
	pub fn new() -> Self {
		let (tx, _) = watch::channel(SessionStatus {
			state: ConnectionState::Idle,
			reason: None,
		});
		Self { tx: Arc::new(tx) }
	}

	pub fn current(&self) -> ConnectionState {
		self.tx.borrow().state
	}

	pub fn status(&self) -> SessionStatus {
		self.tx.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
		self.tx.subscribe()
	}

	/// Moves to a non-terminal stage. Returns false if the move is illegal.
	pub fn advance(&self, next: ConnectionState) -> bool {
		self.transition(next, None)
	}

	/// Moves to a terminal state with a status text.
	///
	/// Only the first terminal transition takes effect.
	pub fn finish(&self, terminal: ConnectionState, reason: impl Into<String>) -> bool {
		debug_assert!(terminal.is_terminal());
		self.transition(terminal, Some(reason.into()))
	}

	fn transition(&self, next: ConnectionState, reason: Option<String>) -> bool {
		let changed = self.tx.send_if_modified(|status| {
			if !status.state.can_advance_to(next) {
				return false;
			}
			status.state = next;
			status.reason = reason;
			true
		});
		if changed {
			tracing::debug!(state = %next, "Connection state changed");
		} else {
			tracing::trace!(from = %self.current(), to = %next, "Ignored state transition");
		}
		changed
	}
}

impl Default for StateTracker {
	fn default() -> Self {
		Self::new()
	}
}
