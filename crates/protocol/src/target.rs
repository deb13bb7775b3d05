//! Debuggable targets advertised by the discovery endpoint.
//!
//! The endpoint answers with either a JSON array of target objects or a bare
//! sequence of objects. Each object is read field by field; unknown fields are
//! ignored so newer servers can extend the document freely.
//!
//! # Main Types
//!
//! - [`DebugTarget`] - One inspectable script context
//! - [`TargetSelection`] - Which parsed target a connection attempt uses

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Path of the discovery endpoint, relative to the server's base path.
pub const DISCOVERY_PATH: &str = "/api/debug/scripts/json";

/// Target type reported for page-like contexts.
pub const PAGE_TARGET_TYPE: &str = "page";

/// One debuggable context as reported by the discovery endpoint.
///
/// A target without [`web_socket_debugger_url`](Self::web_socket_debugger_url)
/// cannot be attached to. Servers drop the URL while another debugger holds
/// the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugTarget {
	/// Server-assigned target identifier.
	#[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// Target kind, usually `"page"`.
	#[serde(
		rename = "type",
		default,
		deserialize_with = "lenient_string",
		skip_serializing_if = "Option::is_none"
	)]
	pub target_type: Option<String>,
	/// Human-readable title, shown next to the connected address.
	#[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	/// URL of the page the target belongs to.
	#[serde(
		rename = "url",
		default,
		deserialize_with = "lenient_string",
		skip_serializing_if = "Option::is_none"
	)]
	pub page_url: Option<String>,
	/// WebSocket endpoint to attach the debugger to.
	#[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
	pub web_socket_debugger_url: Option<String>,
}

impl DebugTarget {
	/// Returns true if a debugger can attach to this target.
	pub fn is_attachable(&self) -> bool {
		self.web_socket_debugger_url.is_some()
	}

	/// Returns true if the server reports this target as a page.
	pub fn is_page(&self) -> bool {
		self.target_type.as_deref() == Some(PAGE_TARGET_TYPE)
	}
}

/// Accepts strings and scalar values for text fields; anything else reads as absent.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match Value::deserialize(deserializer)? {
		Value::String(s) => Some(s),
		Value::Number(n) => Some(n.to_string()),
		Value::Bool(b) => Some(b.to_string()),
		_ => None,
	})
}

/// Parses a discovery response body into targets, in document order.
///
/// Accepts a top-level array, a single object, or a bare whitespace-separated
/// sequence of either. Every entry must be a JSON object.
///
/// # Errors
///
/// Returns the underlying [`serde_json::Error`]; callers inspect
/// [`classify`](serde_json::Error::classify) to tell syntax failures (often a
/// wrong host serving HTML) from shape mismatches.
pub fn parse_targets(body: &[u8]) -> Result<Vec<DebugTarget>, serde_json::Error> {
	let mut targets = Vec::new();
	for value in serde_json::Deserializer::from_slice(body).into_iter::<Value>() {
		match value? {
			Value::Array(items) => {
				for item in items {
					targets.push(serde_json::from_value(item)?);
				}
			}
			other => targets.push(serde_json::from_value(other)?),
		}
	}
	Ok(targets)
}

/// Policy choosing which discovered target a connection attempt attaches to.
///
/// The server publishes one target of interest per deployment, so the default
/// keeps the last entry of the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetSelection {
	/// Last entry in the document, attachable or not.
	#[default]
	Last,
	/// First entry with a debugger URL.
	FirstDebuggable,
	/// First attachable entry whose type is `"page"`.
	FirstPage,
}

impl TargetSelection {
	/// Picks a target from `targets` according to this policy.
	pub fn select(self, targets: &[DebugTarget]) -> Option<&DebugTarget> {
		match self {
			Self::Last => targets.last(),
			Self::FirstDebuggable => targets.iter().find(|t| t.is_attachable()),
			Self::FirstPage => targets.iter().find(|t| t.is_page() && t.is_attachable()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const PAGE_DOCUMENT: &str = r#"[{"url":"http://h/p","webSocketDebuggerUrl":"ws://h/p/ws","title":"T","type":"page","id":"1"}]"#;

	#[test]
	fn parses_single_target_array() {
		let targets = parse_targets(PAGE_DOCUMENT.as_bytes()).unwrap();
		assert_eq!(targets.len(), 1);

		let target = &targets[0];
		assert_eq!(target.id.as_deref(), Some("1"));
		assert_eq!(target.target_type.as_deref(), Some("page"));
		assert_eq!(target.title.as_deref(), Some("T"));
		assert_eq!(target.page_url.as_deref(), Some("http://h/p"));
		assert_eq!(target.web_socket_debugger_url.as_deref(), Some("ws://h/p/ws"));
		assert!(target.is_attachable());
	}

	#[test]
	fn unknown_fields_are_skipped_in_any_position() {
		let a = r#"[{"devtoolsFrontendUrl":"x","id":"1","nested":{"a":[1,2]},"webSocketDebuggerUrl":"ws://h/ws"}]"#;
		let b = r#"[{"webSocketDebuggerUrl":"ws://h/ws","id":"1","extra":null,"faviconUrl":"f"}]"#;

		let first = parse_targets(a.as_bytes()).unwrap();
		let second = parse_targets(b.as_bytes()).unwrap();
		assert_eq!(first, second);
		assert_eq!(parse_targets(a.as_bytes()).unwrap(), first);
	}

	#[test]
	fn bare_object_sequence_is_accepted() {
		let body = r#"{"id":"1","type":"worker"} {"id":"2","type":"page","webSocketDebuggerUrl":"ws://h/2"}"#;
		let targets = parse_targets(body.as_bytes()).unwrap();
		assert_eq!(targets.len(), 2);
		assert_eq!(targets[1].id.as_deref(), Some("2"));
	}

	#[test]
	fn numeric_id_reads_as_text() {
		let targets = parse_targets(br#"[{"id":42}]"#).unwrap();
		assert_eq!(targets[0].id.as_deref(), Some("42"));
	}

	#[test]
	fn empty_array_yields_no_targets() {
		assert!(parse_targets(b"[]").unwrap().is_empty());
	}

	#[test]
	fn html_body_is_a_syntax_error() {
		let err = parse_targets(b"<html><body>login</body></html>").unwrap_err();
		assert_eq!(err.classify(), serde_json::error::Category::Syntax);
	}

	#[test]
	fn non_object_entry_is_a_data_error() {
		let err = parse_targets(br#"["ws://h/ws"]"#).unwrap_err();
		assert_eq!(err.classify(), serde_json::error::Category::Data);
	}

	#[test]
	fn last_selection_keeps_last_entry_even_without_url() {
		let body = r#"[{"id":"1","webSocketDebuggerUrl":"ws://h/1"},{"id":"2"}]"#;
		let targets = parse_targets(body.as_bytes()).unwrap();

		let selected = TargetSelection::Last.select(&targets).unwrap();
		assert_eq!(selected.id.as_deref(), Some("2"));
		assert!(!selected.is_attachable());
	}

	#[test]
	fn first_debuggable_and_first_page_policies() {
		let body = r#"[
			{"id":"1","type":"worker"},
			{"id":"2","type":"worker","webSocketDebuggerUrl":"ws://h/2"},
			{"id":"3","type":"page","webSocketDebuggerUrl":"ws://h/3"}
		]"#;
		let targets = parse_targets(body.as_bytes()).unwrap();

		let debuggable = TargetSelection::FirstDebuggable.select(&targets).unwrap();
		assert_eq!(debuggable.id.as_deref(), Some("2"));

		let page = TargetSelection::FirstPage.select(&targets).unwrap();
		assert_eq!(page.id.as_deref(), Some("3"));

		assert!(TargetSelection::Last.select(&[]).is_none());
	}

	#[test]
	fn selection_policy_uses_kebab_case_names() {
		let policy: TargetSelection = serde_json::from_str(r#""first-debuggable""#).unwrap();
		assert_eq!(policy, TargetSelection::FirstDebuggable);
	}
}
