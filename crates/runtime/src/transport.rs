//! TCP transport with optional TLS.
//!
//! One [`DebugStream`] carries the whole attempt: the discovery request runs
//! over it first, then the same stream is upgraded to a WebSocket. The TLS
//! layer is selected by [`TlsPolicy`]; with
//! [`TlsPolicy::AcceptInvalidCerts`] the peer certificate chain is not
//! validated at all, while handshake signatures still are.


use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_tungstenite::MaybeTlsStream;

use crate::address::TargetAddress;
use crate::config::TlsPolicy;
use crate::error::{Error, Result};

/// Duplex byte stream to the debug endpoint, plain or TLS.
pub type DebugStream = MaybeTlsStream<TcpStream>;

/// Opens [`DebugStream`]s according to a [`TlsPolicy`].
#[derive(Clone)]
pub struct SecureTransport {
	policy: TlsPolicy,
	connector: Option<TlsConnector>,
}

impl SecureTransport {
	/// Prepares a transport; TLS configuration is built once here.
	pub fn new(policy: TlsPolicy) -> Result<Self> {
		let connector = match policy {
			TlsPolicy::Plain => None,
			TlsPolicy::Verified | TlsPolicy::AcceptInvalidCerts => {
				Some(TlsConnector::from(Arc::new(client_config(policy)?)))
			}
		};
		Ok(Self { policy, connector })
	}

	pub fn policy(&self) -> TlsPolicy {
		self.policy
	}

	/// Connects to `address` and completes the TLS handshake if required.
	///
	/// Any failure (DNS, refused connection, TLS negotiation) is reported as
	/// [`Error::Transport`]; nothing is retried.
	pub async fn connect(&self, address: &TargetAddress) -> Result<DebugStream> {
		tracing::debug!(%address, policy = ?self.policy, "Opening transport");

		let tcp = TcpStream::connect((address.host(), address.port()))
			.await
			.map_err(|e| Error::Transport(format!("failed to connect to {address}: {e}")))?;
		tcp.set_nodelay(true)
			.map_err(|e| Error::Transport(format!("failed to configure socket: {e}")))?;

		let Some(connector) = &self.connector else {
			return Ok(MaybeTlsStream::Plain(tcp));
		};

		if self.policy == TlsPolicy::AcceptInvalidCerts {
			tracing::warn!(%address, "TLS certificate validation is disabled for this connection");
		}

		let server_name = ServerName::try_from(address.host().to_string())
			.map_err(|e| Error::Transport(format!("invalid TLS server name '{}': {e}", address.host())))?;
		let tls = connector
			.connect(server_name, tcp)
			.await
			.map_err(|e| Error::Transport(format!("TLS handshake with {address} failed: {e}")))?;

		Ok(MaybeTlsStream::Rustls(tls))
	}
}

impl std::fmt::Debug for SecureTransport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SecureTransport").field("policy", &self.policy).finish()
	}
}

fn client_config(policy: TlsPolicy) -> Result<ClientConfig> {
	let provider = Arc::new(rustls::crypto::ring::default_provider());
	let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
		.with_safe_default_protocol_versions()
		.map_err(|e| Error::Transport(format!("TLS setup failed: {e}")))?;

	let config = match policy {
		TlsPolicy::AcceptInvalidCerts => builder
			.dangerous()
			.with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
			.with_no_client_auth(),
		_ => {
			let mut roots = RootCertStore::empty();
			roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
			builder.with_root_certificates(roots).with_no_client_auth()
		}
	};
	Ok(config)
}

/// Certificate verifier that trusts every chain.
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
	fn verify_server_cert(
		&self,
		_end_entity: &CertificateDer<'_>,
		_intermediates: &[CertificateDer<'_>],
		_server_name: &ServerName<'_>,
		_ocsp_response: &[u8],
		_now: UnixTime,
	) -> std::result::Result<ServerCertVerified, rustls::Error> {
		Ok(ServerCertVerified::assertion())
	}

	fn verify_tls12_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
		verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
	}

	fn verify_tls13_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
		verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
	}

	fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
		self.0.signature_verification_algorithms.supported_schemes()
	}
}
