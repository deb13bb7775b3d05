//! User-visible notifications.
//!
//! The runtime never renders anything itself. Advisory conditions found during
//! discovery are handed to a [`NotificationSink`] supplied by the caller.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ServerIdentity;
use crate::consistency::Consistency;

/// Shown when discovery ran without a configured server.
pub const NO_SERVER_MESSAGE: &str = "No YouTrack site has been configured for script debugging";

/// Shown when the server exposes no attachable target.
pub const NO_TARGET_MESSAGE: &str =
	"The debug operation requires that you have permission to update at least one project in YouTrack";

/// Shown when the debugger URL does not belong to the configured server.
pub const ORIGIN_MISMATCH_MESSAGE: &str =
	"Please verify that the configured server URL matches the base URL of your YouTrack site";

/// Label of the action attached to [`ORIGIN_MISMATCH_MESSAGE`].
pub const SETTINGS_ACTION_LABEL: &str = "Settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
	Info,
	Warning,
}

/// Follow-up offered with a notification; only followed on explicit user request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
	pub label: String,
	pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
	pub message: String,
	pub severity: Severity,
	pub action: Option<NotificationAction>,
}

/// Receiver of user-visible notifications.
///
/// Implementations must tolerate calls from any task.
pub trait NotificationSink: Send + Sync {
	fn notify(&self, message: &str, severity: Severity);

	fn notify_with_action(&self, message: &str, severity: Severity, action: NotificationAction);
}

/// Builds the advisory notification for a non-OK consistency result.
pub fn advisory(result: &Consistency, identity: Option<&ServerIdentity>) -> Option<Notification> {
	let (message, action) = match result {
		Consistency::Ok => return None,
		Consistency::NoServerConfigured => (NO_SERVER_MESSAGE, None),
		Consistency::NoDebuggableTarget => (NO_TARGET_MESSAGE, None),
		Consistency::OriginMismatch { .. } => (
			ORIGIN_MISMATCH_MESSAGE,
			identity.map(|id| NotificationAction {
				label: SETTINGS_ACTION_LABEL.to_string(),
				url: id.settings_url(),
			}),
		),
	};
	Some(Notification {
		message: message.to_string(),
		severity: Severity::Warning,
		action,
	})
}

/// Delivers `notification` through the matching sink method.
pub fn deliver(sink: &dyn NotificationSink, notification: Notification) {
	match notification.action {
		Some(action) => sink.notify_with_action(&notification.message, notification.severity, action),
		None => sink.notify(&notification.message, notification.severity),
	}
}

/// Sink that writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
	fn notify(&self, message: &str, severity: Severity) {
		match severity {
			Severity::Info => tracing::info!("{message}"),
			Severity::Warning => tracing::warn!("{message}"),
		}
	}

	fn notify_with_action(&self, message: &str, severity: Severity, action: NotificationAction) {
		match severity {
			Severity::Info => tracing::info!(action = %action.label, url = %action.url, "{message}"),
			Severity::Warning => tracing::warn!(action = %action.label, url = %action.url, "{message}"),
		}
	}
}

/// Sink that records notifications in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
	received: Arc<Mutex<Vec<Notification>>>,
}

impl CollectingSink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Notifications received so far, oldest first.
	pub fn notifications(&self) -> Vec<Notification> {
		self.received.lock().clone()
	}

	pub fn len(&self) -> usize {
		self.received.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.received.lock().is_empty()
	}
}

impl NotificationSink for CollectingSink {
	fn notify(&self, message: &str, severity: Severity) {
		self.received.lock().push(Notification {
			message: message.to_string(),
			severity,
			action: None,
		});
	}

	fn notify_with_action(&self, message: &str, severity: Severity, action: NotificationAction) {
		self.received.lock().push(Notification {
			message: message.to_string(),
			severity,
			action: Some(action),
		});
	}
}
