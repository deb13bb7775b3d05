//! Inspector Protocol frames.
//!
//! Once the WebSocket upgrade completes, every text frame carries one JSON
//! message. Commands sent by the client carry an integer `id`; the server
//! answers with a response carrying the same `id`, or pushes events that carry
//! a `method` and no `id`.
//!
//! Events are interpreted through a closed set ([`ProtocolEvent`]): the
//! session reacts to `Inspector.detached` itself and passes everything else
//! through untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event the server sends when it terminates the debugging session.
pub const DETACHED_EVENT: &str = "Inspector.detached";

/// Detach reason reported when the debugged runtime crashed.
pub const TARGET_CRASHED_REASON: &str = "targetCrashed";

/// Command sent from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	/// Correlation id, unique per session.
	pub id: u32,
	/// Domain-qualified method name (e.g. `"Debugger.enable"`).
	pub method: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<Value>,
}

/// Server reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	/// Id of the request this answers.
	pub id: u32,
	/// Success payload (mutually exclusive with `error`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Failure payload (mutually exclusive with `result`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
}

/// Protocol error details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

/// Server-pushed notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	/// Domain-qualified event name (e.g. `"Debugger.paused"`).
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

/// Any inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
	/// Has an `id` field.
	Response(Response),
	/// Has a `method` field and no `id`.
	Event(Event),
	/// Anything else, kept for forward compatibility.
	Unknown(Value),
}

/// Event delivered to the owner of a debugging session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProtocolEvent {
	/// The server detached the debugger.
	Detached {
		/// Detach reason; [`TARGET_CRASHED_REASON`] marks a crash.
		reason: String,
	},
	/// Any other Inspector event, passed through uninterpreted.
	Inspector {
		method: String,
		params: Value,
	},
	/// The socket went away without a detach event.
	Disconnected {
		#[serde(skip_serializing_if = "Option::is_none")]
		error: Option<String>,
	},
}

impl ProtocolEvent {
	/// Classifies a raw event.
	pub fn from_event(event: Event) -> Self {
		match event.method.as_str() {
			DETACHED_EVENT => {
				let reason = event
					.params
					.get("reason")
					.and_then(Value::as_str)
					.unwrap_or_default()
					.to_string();
				Self::Detached { reason }
			}
			_ => Self::Inspector {
				method: event.method,
				params: event.params,
			},
		}
	}

	/// Returns true for a detach caused by a crashed target.
	pub fn is_crash(&self) -> bool {
		matches!(self, Self::Detached { reason } if reason == TARGET_CRASHED_REASON)
	}

	/// Returns true if this event ends the session.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Detached { .. } | Self::Disconnected { .. })
	}
}
