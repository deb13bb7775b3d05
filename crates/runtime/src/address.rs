//! Debug endpoint address resolution.

use std::fmt;
use std::net::IpAddr;

use crate::config::{DEFAULT_PORT, DebugConfig};
use crate::error::{Error, Result};

/// Host and port of the debug endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetAddress {
	host: String,
	port: u16,
}

impl TargetAddress {
	/// Creates an address from an already validated host and port.
	///
	/// IPv6 literals may be given with or without brackets.
	pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
		let host = host.into();
		let host = host.trim().trim_start_matches('[').trim_end_matches(']');
		if host.is_empty() {
			return Err(Error::InvalidConfig("debug host is empty".into()));
		}
		if port == 0 {
			return Err(Error::InvalidConfig("debug port must be between 1 and 65535".into()));
		}
		Ok(Self {
			host: host.to_string(),
			port,
		})
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	/// Returns true for IP literals and the `localhost` names.
	///
	/// Discovery failures on any other host hint at a wrong hostname.
	pub fn is_ip_or_localhost(&self) -> bool {
		self.host.parse::<IpAddr>().is_ok()
			|| self.host.eq_ignore_ascii_case("localhost")
			|| self.host.eq_ignore_ascii_case("localhost6")
	}
}

/// Formats as `host:port`, bracketing IPv6 literals, as used in the `Host` header.
impl fmt::Display for TargetAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.host.contains(':') {
			write!(f, "[{}]:{}", self.host, self.port)
		} else {
			write!(f, "{}:{}", self.host, self.port)
		}
	}
}

/// Resolves a configured host and raw port.
///
/// An unset or non-positive port becomes [`DEFAULT_PORT`].
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] for an empty host or a port above 65535.
pub fn resolve(host: &str, port: Option<i64>) -> Result<TargetAddress> {
	let port = match port {
		Some(p) if p > 0 => {
			u16::try_from(p).map_err(|_| Error::InvalidConfig(format!("debug port {p} is out of range")))?
		}
		_ => DEFAULT_PORT,
	};
	TargetAddress::new(host, port)
}

/// Resolves the debug endpoint of a connection attempt.
///
/// An explicit host wins. Otherwise host and port come from the server URL:
/// its explicit port, else [`DEFAULT_PORT`]. The scheme's default port is not
/// used. An explicit port overrides the URL's port in both cases.
pub fn resolve_config(config: &DebugConfig) -> Result<TargetAddress> {
	if let Some(host) = &config.host {
		return resolve(host, config.port);
	}

	let Some(identity) = &config.server else {
		return Err(Error::InvalidConfig(
			"no debug host configured and no server URL to derive it from".into(),
		));
	};

	let url = identity.base_url();
	let host = url.host_str().unwrap_or_default();
	let port = config
		.port
		.filter(|p| *p > 0)
		.or_else(|| url.port().map(i64::from));
	resolve(host, port)
}
