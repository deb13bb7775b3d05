//! Origin consistency between the configured server and a discovered target.
//!
//! [`check`] is pure: the orchestrator calls it once after discovery to raise
//! advisory notifications and again right before the WebSocket upgrade, where
//! a non-OK result stops the attempt.

use std::fmt;

use url::Url;
use ytdebug_protocol::DebugTarget;

use crate::config::ServerIdentity;

/// Scheme class, host and effective port of a URL.
///
/// `http`/`ws` and `https`/`wss` pair up so a server's base URL can be
/// compared against the WebSocket URL it advertises.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
	pub secure: bool,
	pub host: String,
	pub port: u16,
}

impl Origin {
	/// Origin of `url`; `None` for schemes other than http(s) and ws(s).
	pub fn of(url: &Url) -> Option<Self> {
		let secure = match url.scheme() {
			"https" | "wss" => true,
			"http" | "ws" => false,
			_ => return None,
		};
		Some(Self {
			secure,
			host: url.host_str()?.to_ascii_lowercase(),
			port: url.port_or_known_default()?,
		})
	}

	/// Parses `url` and returns its origin.
	pub fn parse(url: &str) -> Option<Self> {
		Url::parse(url).ok().as_ref().and_then(Self::of)
	}
}

impl fmt::Display for Origin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let scheme = if self.secure { "https" } else { "http" };
		write!(f, "{scheme}://{}:{}", self.host, self.port)
	}
}

/// Outcome of comparing a discovered target against the configured server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consistency {
	/// Origins match and the target is attachable.
	Ok,
	/// No server is configured.
	NoServerConfigured,
	/// A server is configured but no attachable target was discovered.
	NoDebuggableTarget,
	/// The debugger URL points somewhere other than the configured server.
	OriginMismatch { configured: String, discovered: String },
}

impl Consistency {
	pub fn is_ok(&self) -> bool {
		matches!(self, Self::Ok)
	}
}

/// Compares `discovered` against `identity`.
pub fn check(discovered: Option<&DebugTarget>, identity: Option<&ServerIdentity>) -> Consistency {
	let Some(identity) = identity else {
		return Consistency::NoServerConfigured;
	};
	let Some(ws_url) = discovered.and_then(|t| t.web_socket_debugger_url.as_deref()) else {
		return Consistency::NoDebuggableTarget;
	};

	let configured = Origin::of(identity.base_url());
	let found = Origin::parse(ws_url);
	match (configured, found) {
		(Some(configured), Some(found)) if configured == found => Consistency::Ok,
		_ => Consistency::OriginMismatch {
			configured: identity.base_url().origin().ascii_serialization(),
			discovered: Url::parse(ws_url)
				.map(|u| u.origin().ascii_serialization())
				.unwrap_or_else(|_| ws_url.to_string()),
		},
	}
}

/// Returns true if `url` shares its origin with `other`.
pub fn same_origin(url: &str, other: &str) -> bool {
	match (Origin::parse(url), Origin::parse(other)) {
		(Some(a), Some(b)) => a == b,
		_ => false,
	}
}
