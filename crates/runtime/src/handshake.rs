//! WebSocket upgrade of the discovery connection.
//!
//! Before upgrading, the consistency check is evaluated again through [`gate`].
//! At this point a non-OK result is authoritative and ends the attempt.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{WebSocketStream, client_async_with_config};

use crate::config::ServerIdentity;
use crate::consistency::{Consistency, same_origin};
use crate::error::{Error, Result};

/// Largest frame and reassembled message accepted from the debug server.
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// What the orchestrator does once the gate passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
	/// Upgrade right away.
	Connect,
	/// Close this orchestrator's live session, then upgrade.
	ReplaceLiveSession,
}

/// Re-applies the consistency result right before the upgrade.
///
/// `live_url` is the debugger URL of this orchestrator's live session, if any.
///
/// - OK: connect, replacing the live session if there is one.
/// - No debugger URL while the live session is attached to the configured
///   server: [`Error::AlreadyConnected`]; the server hides the URL from
///   everyone but the attached debugger.
/// - Any other non-OK result with a live session: [`Error::AlreadyAttached`].
/// - Non-OK without a live session: the matching configuration error.
pub fn gate(result: &Consistency, live_url: Option<&str>, identity: Option<&ServerIdentity>) -> Result<GateDecision> {
	match (result, live_url) {
		(Consistency::Ok, Some(_)) => Ok(GateDecision::ReplaceLiveSession),
		(Consistency::NoDebuggableTarget, Some(live))
			if identity.is_some_and(|id| same_origin(live, id.base_url().as_str())) =>
		{
			Err(Error::AlreadyConnected(live.to_string()))
		}
		(_, Some(_)) => Err(Error::AlreadyAttached),
		(other, None) => match Error::from_consistency(other) {
			Some(e) => Err(e),
			None => Ok(GateDecision::Connect),
		},
	}
}

/// WebSocket settings for the debug connection.
pub fn websocket_config() -> WebSocketConfig {
	let mut config = WebSocketConfig::default();
	config.max_frame_size = Some(MAX_FRAME_SIZE);
	config.max_message_size = Some(MAX_FRAME_SIZE);
	config
}

/// Upgrades `stream` to a WebSocket against `ws_url`.
///
/// The request uses protocol version 13 with no subprotocol. Anything other
/// than `101 Switching Protocols` fails with [`Error::Handshake`].
pub async fn negotiate<S>(stream: S, ws_url: &str) -> Result<WebSocketStream<S>>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	tracing::debug!(url = ws_url, "Starting WebSocket handshake");

	let (socket, response) = client_async_with_config(ws_url, stream, Some(websocket_config()))
		.await
		.map_err(handshake_error)?;

	tracing::info!(url = ws_url, status = %response.status(), "WebSocket handshake completed");
	Ok(socket)
}

fn handshake_error(e: WsError) -> Error {
	match e {
		WsError::Http(response) => Error::Handshake(format!("server answered {}", response.status())),
		WsError::Url(e) => Error::Handshake(format!("invalid debugger URL: {e}")),
		other => Error::Handshake(other.to_string()),
	}
}
