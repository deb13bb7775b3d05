//! Error types for the debugger runtime.

use thiserror::Error;

use crate::consistency::Consistency;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Message shown when no server is configured at handshake time.
pub const NOT_CONFIGURED_MESSAGE: &str = "YouTrack server integration is not configured yet";

/// Message shown when another debugger holds the target.
pub const ALREADY_ATTACHED_MESSAGE: &str =
	"Another debugger is attached, please ensure that configuration is stopped or restart application to force detach";

/// Errors that can occur while connecting to or talking with a debug target.
#[derive(Debug, Error)]
pub enum Error {
	/// Configuration is incomplete or inconsistent.
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),

	/// Server version is known and too old to expose script debugging.
	#[error("YouTrack version is not sufficient: {found} (requires {required} or newer)")]
	UnsupportedServerVersion { found: String, required: String },

	/// DNS, TCP connect or TLS negotiation failed.
	#[error("Transport error: {0}")]
	Transport(String),

	/// The discovery endpoint was unreachable or answered with garbage.
	#[error("Discovery failed: {0}")]
	Discovery(String),

	/// No server identity was available when the handshake was gated.
	#[error("{}", NOT_CONFIGURED_MESSAGE)]
	NotConfigured,

	/// The selected target has no debugger URL.
	#[error("No debuggable target: the debug operation requires permission to update at least one project")]
	NoDebuggableTarget,

	/// Discovered debugger URL points at a different origin than the configured server.
	#[error("Debugger URL origin {discovered} does not match configured server {configured}")]
	OriginMismatch { configured: String, discovered: String },

	/// Another debugger session holds the target.
	#[error("{}", ALREADY_ATTACHED_MESSAGE)]
	AlreadyAttached,

	/// This orchestrator's own live session already holds the target.
	#[error("Already connected to {0}")]
	AlreadyConnected(String),

	/// WebSocket upgrade failed.
	#[error("WebSocket handshake failed: {0}")]
	Handshake(String),

	/// Malformed or unexpected Inspector traffic.
	#[error("Protocol error: {0}")]
	Protocol(String),

	/// Error response to a command.
	#[error("Inspector error {code}: {message}")]
	Remote { code: i64, message: String },

	/// Session reached a terminal state.
	#[error("Session closed")]
	SessionClosed,

	/// Channel closed unexpectedly.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// The pending connection attempt was cancelled.
	#[error("Connection attempt cancelled")]
	Cancelled,

	/// The connection attempt exceeded its deadline.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Maps a non-OK consistency result to the error raised at handshake time.
	///
	/// Returns `None` for [`Consistency::Ok`].
	pub fn from_consistency(result: &Consistency) -> Option<Self> {
		match result {
			Consistency::Ok => None,
			Consistency::NoServerConfigured => Some(Error::NotConfigured),
			Consistency::NoDebuggableTarget => Some(Error::NoDebuggableTarget),
			Consistency::OriginMismatch { configured, discovered } => Some(Error::OriginMismatch {
				configured: configured.clone(),
				discovered: discovered.clone(),
			}),
		}
	}

	/// Returns true for conditions that are only advisory during discovery.
	pub fn is_advisory(&self) -> bool {
		matches!(
			self,
			Error::NotConfigured | Error::NoDebuggableTarget | Error::OriginMismatch { .. }
		)
	}

	/// Returns true for conditions that end a connection attempt wherever they occur.
	pub fn is_fatal(&self) -> bool {
		!self.is_advisory() && !matches!(self, Error::AlreadyConnected(_))
	}

	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout(_))
	}

	/// Returns true if the attempt was cancelled.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Error::Cancelled)
	}

	/// Returns true if the session is gone.
	pub fn is_closed(&self) -> bool {
		matches!(self, Error::SessionClosed | Error::ChannelClosed)
	}
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
	fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
		use tokio_tungstenite::tungstenite::Error as WsError;

		match e {
			WsError::ConnectionClosed | WsError::AlreadyClosed => Error::SessionClosed,
			WsError::Io(io) => Error::Io(io),
			other => Error::Protocol(other.to_string()),
		}
	}
}
