//! Remote script debugger runtime - discovery, handshake and Inspector session
//!
//! This crate connects a debugger front-end to the script debugger exposed by
//! a YouTrack server:
//!
//! - **Address resolution**: Turning configuration into a host and port
//! - **Transport**: TCP with optional TLS, shared by discovery and the upgrade
//! - **Discovery**: Authenticated lookup of debuggable targets
//! - **Consistency**: Checking the discovered target against the configured server
//! - **Handshake**: WebSocket upgrade on the discovery connection
//! - **Session**: Inspector Protocol command correlation and event dispatch
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │  ConnectionOrchestrator  │  One attempt, one result
//! └────────────┬─────────────┘
//!              │ drives
//! ┌────────────▼─────────────┐
//! │  address → transport →   │
//! │  discovery → consistency │
//! │  → handshake             │
//! └────────────┬─────────────┘
//!              │ yields
//! ┌────────────▼─────────────┐
//! │     ProtocolSession      │  Commands, events, close
//! └──────────────────────────┘
//! ```
//!
//! Configuration and user notifications cross the crate boundary through
//! [`DebugConfig`] and [`NotificationSink`]; nothing is read from ambient state.

pub mod address;
pub mod config;
pub mod consistency;
pub mod discovery;
pub mod error;
pub mod handshake;
pub mod notify;
pub mod orchestrator;
pub mod session;
pub mod state;
pub mod transport;

pub use address::TargetAddress;
pub use config::{DebugConfig, DebugConfigBuilder, ServerIdentity, ServerVersion, TlsPolicy};
pub use consistency::{Consistency, Origin};
pub use discovery::{DiscoveryClient, DiscoveryOutcome};
pub use error::{Error, Result};
pub use handshake::MAX_FRAME_SIZE;
pub use notify::{CollectingSink, Notification, NotificationAction, NotificationSink, Severity, TracingSink};
pub use orchestrator::{ConnectionOrchestrator, PendingConnection};
pub use session::{ProtocolSession, UNTAKEN_EVENT_LIMIT};
pub use state::{ConnectionState, SessionStatus, StateTracker};
pub use transport::{DebugStream, SecureTransport};
pub use ytdebug_protocol::{DebugTarget, ProtocolEvent, TargetSelection};
