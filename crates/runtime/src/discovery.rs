//! Discovery of debuggable targets.
//!
//! The client sends one authenticated `GET` to the discovery endpoint over an
//! open [`DebugStream`](crate::transport::DebugStream) and hands the stream
//! back afterwards so the WebSocket upgrade can reuse the connection.


use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Limited};
use hyper::client::conn::http1;
use hyper::header::{ACCEPT, AUTHORIZATION, HOST};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use ytdebug_protocol::{DISCOVERY_PATH, DebugTarget, TargetSelection, parse_targets};

use crate::address::TargetAddress;
use crate::config::ServerIdentity;
use crate::error::{Error, Result};

/// Largest discovery document accepted.
pub const MAX_DISCOVERY_BODY: usize = 10 * 1024 * 1024;

/// Message for a discovery document that is not JSON.
pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid response from the remote host";

/// Parsed discovery document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryOutcome {
	/// Every target, in document order.
	pub targets: Vec<DebugTarget>,
	/// Target picked by the selection policy; `None` if nothing is discoverable yet.
	pub selected: Option<DebugTarget>,
}

/// Issues the discovery request for one connection attempt.
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
	address: TargetAddress,
	identity: Option<ServerIdentity>,
	selection: TargetSelection,
}

impl DiscoveryClient {
	pub fn new(address: TargetAddress, identity: Option<ServerIdentity>, selection: TargetSelection) -> Self {
		Self {
			address,
			identity,
			selection,
		}
	}

	/// Request path: the server URL's path followed by the discovery endpoint.
	pub fn request_path(&self) -> String {
		let prefix = self.identity.as_ref().map(ServerIdentity::path_prefix).unwrap_or_default();
		format!("{prefix}{DISCOVERY_PATH}")
	}

	/// Builds the discovery request.
	///
	/// `Authorization` is only sent when a server identity is configured.
	pub fn build_request(&self) -> Result<Request<Empty<Bytes>>> {
		let mut builder = Request::builder()
			.method(Method::GET)
			.uri(self.request_path())
			.header(HOST, self.address.to_string())
			.header(ACCEPT, "*/*");
		if let Some(identity) = &self.identity {
			builder = builder.header(AUTHORIZATION, identity.basic_auth());
		}
		builder
			.body(Empty::new())
			.map_err(|e| Error::Discovery(format!("failed to build request: {e}")))
	}

	/// Runs the discovery exchange on `stream` and returns the stream with the
	/// parsed outcome.
	///
	/// # Errors
	///
	/// Returns [`Error::Discovery`] if the exchange fails, the status is not a
	/// success, the body is empty, or the body is not a target document.
	pub async fn discover<S>(&self, stream: S) -> Result<(S, DiscoveryOutcome)>
	where
		S: AsyncRead + AsyncWrite + Unpin,
	{
		let request = self.build_request()?;
		tracing::debug!(path = %request.uri(), address = %self.address, "Requesting debug targets");

		let (mut sender, connection) = http1::handshake::<_, Empty<Bytes>>(TokioIo::new(stream))
			.await
			.map_err(|e| Error::Discovery(e.to_string()))?;

		// The sender is dropped at the end of the exchange so the connection
		// future can resolve and release the stream.
		let exchange = async move {
			let response = sender
				.send_request(request)
				.await
				.map_err(|e| Error::Discovery(e.to_string()))?;
			let status = response.status();
			let body = Limited::new(response.into_body(), MAX_DISCOVERY_BODY)
				.collect()
				.await
				.map_err(|e| Error::Discovery(format!("failed to read response body: {e}")))?
				.to_bytes();
			Ok::<_, Error>((status, body))
		};

		let (exchange, parts) = tokio::join!(exchange, connection.without_shutdown());
		let (status, body) = exchange?;
		let parts = parts.map_err(|e| Error::Discovery(e.to_string()))?;

		if !parts.read_buf.is_empty() {
			return Err(Error::Discovery(format!(
				"{} unexpected bytes after the discovery response",
				parts.read_buf.len()
			)));
		}
		if !status.is_success() {
			return Err(status_error(status));
		}

		let outcome = self.interpret(&body)?;
		Ok((parts.io.into_inner(), outcome))
	}

	/// Parses a discovery body and applies the selection policy.
	pub fn interpret(&self, body: &[u8]) -> Result<DiscoveryOutcome> {
		if body.iter().all(u8::is_ascii_whitespace) {
			tracing::debug!("Discovery returned an empty body");
			return Err(Error::Discovery("malformed response".into()));
		}

		let targets = parse_targets(body).map_err(|e| self.parse_error(e))?;
		let selected = self.selection.select(&targets).cloned();
		tracing::debug!(
			count = targets.len(),
			url = selected.as_ref().and_then(|t| t.web_socket_debugger_url.as_deref()),
			"Debug address obtained"
		);

		Ok(DiscoveryOutcome { targets, selected })
	}

	fn parse_error(&self, e: serde_json::Error) -> Error {
		if !(e.is_syntax() || e.is_eof()) {
			return Error::Discovery(format!("unexpected discovery document: {e}"));
		}
		if self.address.is_ip_or_localhost() {
			Error::Discovery(INVALID_RESPONSE_MESSAGE.to_string())
		} else {
			Error::Discovery(format!(
				"{INVALID_RESPONSE_MESSAGE}. Invalid connection to the hostname {}, check the configured host",
				self.address.host()
			))
		}
	}
}

fn status_error(status: StatusCode) -> Error {
	match status {
		StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
			Error::Discovery(format!("server rejected the credentials ({status})"))
		}
		_ => Error::Discovery(format!("server answered {status}")),
	}
}
