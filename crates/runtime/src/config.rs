//! Connection configuration.
//!
//! Everything a connection attempt needs is passed in through [`DebugConfig`]:
//! the server identity used for discovery credentials and origin checks, the
//! debug address override, the TLS policy and the optional deadline.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use url::Url;
use ytdebug_protocol::TargetSelection;

use crate::error::{Error, Result};

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 443;

/// Oldest server release exposing the script debugger.
pub const MIN_SERVER_VERSION: ServerVersion = ServerVersion { major: 2021, minor: 3 };

/// How the transport secures the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsPolicy {
	/// Plain TCP, no TLS.
	Plain,
	/// TLS with certificate validation against the bundled web PKI roots.
	Verified,
	/// TLS that accepts any server certificate.
	///
	/// Debug endpoints are usually internal and self-signed. This must be
	/// requested explicitly and is logged whenever a connection uses it.
	AcceptInvalidCerts,
}

impl TlsPolicy {
	/// Returns true if the connection is wrapped in TLS.
	pub fn is_tls(self) -> bool {
		!matches!(self, Self::Plain)
	}

	fn for_scheme(scheme: &str) -> Self {
		match scheme {
			"http" | "ws" => Self::Plain,
			_ => Self::Verified,
		}
	}
}

/// Base URL and credentials of the configured YouTrack server.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerIdentity {
	base_url: Url,
	username: String,
	password: String,
}

impl ServerIdentity {
	/// Creates an identity from the server's base URL.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidConfig`] if the URL does not parse, is not
	/// `http`/`https`, or has no host.
	pub fn new(base_url: &str, username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
		let base_url =
			Url::parse(base_url.trim()).map_err(|e| Error::InvalidConfig(format!("server URL '{base_url}': {e}")))?;

		if !matches!(base_url.scheme(), "http" | "https") {
			return Err(Error::InvalidConfig(format!(
				"server URL must use http or https, got '{}'",
				base_url.scheme()
			)));
		}
		if base_url.host_str().is_none_or(str::is_empty) {
			return Err(Error::InvalidConfig("server URL has no host".into()));
		}

		Ok(Self {
			base_url,
			username: username.into(),
			password: password.into(),
		})
	}

	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	pub fn username(&self) -> &str {
		&self.username
	}

	pub fn password(&self) -> &str {
		&self.password
	}

	/// Path of the base URL without its trailing slash; empty for a root install.
	pub fn path_prefix(&self) -> &str {
		self.base_url.path().trim_end_matches('/')
	}

	/// Admin settings page, offered when the discovered origin looks wrong.
	pub fn settings_url(&self) -> String {
		format!("{}/admin/settings", self.base_url.as_str().trim_end_matches('/'))
	}

	/// Value of the `Authorization` header sent to the discovery endpoint.
	pub fn basic_auth(&self) -> String {
		let credentials = format!("{}:{}", self.username, self.password);
		format!("Basic {}", STANDARD.encode(credentials))
	}
}

impl fmt::Debug for ServerIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ServerIdentity")
			.field("base_url", &self.base_url.as_str())
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// `major.minor` server release, compared numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion {
	pub major: u32,
	pub minor: u32,
}

impl ServerVersion {
	pub const fn new(major: u32, minor: u32) -> Self {
		Self { major, minor }
	}

	/// Returns true if the release exposes the script debugger.
	pub fn supports_debugging(self) -> bool {
		self >= MIN_SERVER_VERSION
	}
}

impl FromStr for ServerVersion {
	type Err = Error;

	/// Parses `"2021.3"`, ignoring any build suffix such as `"2021.3.23422"`.
	fn from_str(s: &str) -> Result<Self> {
		let invalid = || Error::InvalidConfig(format!("invalid server version '{s}'"));
		let mut parts = s.trim().split('.');

		let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
		let minor = match parts.next() {
			Some(p) => p.parse().map_err(|_| invalid())?,
			None => 0,
		};
		Ok(Self { major, minor })
	}
}

impl fmt::Display for ServerVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.major, self.minor)
	}
}

/// Inputs of one connection attempt.
#[derive(Debug, Clone)]
pub struct DebugConfig {
	/// Configured server; `None` when no server has been set up yet.
	pub server: Option<ServerIdentity>,
	/// Debug host override; defaults to the server URL's host.
	pub host: Option<String>,
	/// Raw debug port; non-positive values fall back to [`DEFAULT_PORT`].
	pub port: Option<i64>,
	pub tls: TlsPolicy,
	pub selection: TargetSelection,
	/// Deadline for the whole attempt, from resolution to the WebSocket upgrade.
	pub connect_timeout: Option<Duration>,
	/// Server release, when the caller knows it.
	pub server_version: Option<ServerVersion>,
}

impl DebugConfig {
	pub fn builder() -> DebugConfigBuilder {
		DebugConfigBuilder::default()
	}

	/// Fails with [`Error::UnsupportedServerVersion`] when the known server
	/// release predates the script debugger.
	pub fn check_server_version(&self) -> Result<()> {
		match self.server_version {
			Some(version) if !version.supports_debugging() => Err(Error::UnsupportedServerVersion {
				found: version.to_string(),
				required: MIN_SERVER_VERSION.to_string(),
			}),
			_ => Ok(()),
		}
	}
}

/// Builder for [`DebugConfig`].
#[derive(Debug, Default)]
pub struct DebugConfigBuilder {
	server_url: Option<String>,
	username: String,
	password: String,
	host: Option<String>,
	port: Option<i64>,
	tls: Option<TlsPolicy>,
	selection: TargetSelection,
	connect_timeout: Option<Duration>,
	server_version: Option<String>,
}

impl DebugConfigBuilder {
	pub fn server_url(mut self, url: impl Into<String>) -> Self {
		self.server_url = Some(url.into());
		self
	}

	pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
		self.username = username.into();
		self.password = password.into();
		self
	}

	pub fn host(mut self, host: impl Into<String>) -> Self {
		self.host = Some(host.into());
		self
	}

	pub fn port(mut self, port: i64) -> Self {
		self.port = Some(port);
		self
	}

	/// Overrides the TLS policy derived from the server URL scheme.
	pub fn tls(mut self, policy: TlsPolicy) -> Self {
		self.tls = Some(policy);
		self
	}

	/// Accepts any server certificate when `accept` is true.
	pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
		if accept {
			self.tls = Some(TlsPolicy::AcceptInvalidCerts);
		}
		self
	}

	pub fn selection(mut self, selection: TargetSelection) -> Self {
		self.selection = selection;
		self
	}

	pub fn connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = Some(timeout);
		self
	}

	pub fn server_version(mut self, version: impl Into<String>) -> Self {
		self.server_version = Some(version.into());
		self
	}

	/// Validates the inputs and builds the configuration.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidConfig`] for an unparsable server URL or
	/// server version.
	pub fn build(self) -> Result<DebugConfig> {
		let server = self
			.server_url
			.as_deref()
			.filter(|url| !url.trim().is_empty())
			.map(|url| ServerIdentity::new(url, self.username, self.password))
			.transpose()?;

		let tls = self.tls.unwrap_or_else(|| match &server {
			Some(identity) => TlsPolicy::for_scheme(identity.base_url().scheme()),
			None => TlsPolicy::Verified,
		});

		let server_version = self.server_version.as_deref().map(str::parse).transpose()?;

		Ok(DebugConfig {
			server,
			host: self.host.filter(|h| !h.trim().is_empty()),
			port: self.port,
			tls,
			selection: self.selection,
			connect_timeout: self.connect_timeout,
			server_version,
		})
	}
}
