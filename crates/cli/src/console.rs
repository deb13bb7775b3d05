//! Terminal output: notifications and errors go to stderr, data to stdout.

use colored::Colorize;
use ytdebug_runtime::{DebugTarget, NotificationAction, NotificationSink, Severity};

use crate::error::CliError;

/// Prints notifications to stderr.
///
/// Actions are printed as hints; the CLI never opens them on its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
	fn notify(&self, message: &str, severity: Severity) {
		eprintln!("{}", format_notification(message, severity, None));
	}

	fn notify_with_action(&self, message: &str, severity: Severity, action: NotificationAction) {
		eprintln!("{}", format_notification(message, severity, Some(&action)));
	}
}

fn format_notification(message: &str, severity: Severity, action: Option<&NotificationAction>) -> String {
	let label = match severity {
		Severity::Info => "info".cyan().bold(),
		Severity::Warning => "warning".yellow().bold(),
	};
	match action {
		Some(action) => format!("{label}: {message}\n  {}: {}", action.label.bold(), action.url),
		None => format!("{label}: {message}"),
	}
}

pub fn print_error(err: &CliError) {
	eprintln!("{} [{}]: {err}", "error".red().bold(), err.code());
}

pub fn print_status(message: &str) {
	eprintln!("{} {message}", "::".green().bold());
}

/// One line per target; the one a connection would attach to is starred.
pub fn format_targets(targets: &[DebugTarget], selected: Option<&DebugTarget>) -> String {
	let mut out = String::new();
	for target in targets {
		let marker = if Some(target) == selected { "*" } else { " " };
		let ws = target.web_socket_debugger_url.as_deref().unwrap_or("-");
		out.push_str(&format!(
			"{marker} {:<12} {:<8} {:<24} {ws}\n",
			target.id.as_deref().unwrap_or("-"),
			target.target_type.as_deref().unwrap_or("-"),
			target.title.as_deref().unwrap_or(""),
		));
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn target(id: &str, ws: Option<&str>) -> DebugTarget {
		DebugTarget {
			id: Some(id.to_string()),
			target_type: Some("page".to_string()),
			title: Some("Workflows".to_string()),
			web_socket_debugger_url: ws.map(str::to_string),
			..Default::default()
		}
	}

	#[test]
	fn test_selected_target_is_starred() {
		colored::control::set_override(false);
		let targets = vec![target("1", None), target("2", Some("wss://yt/ws"))];
		let out = format_targets(&targets, targets.last());
		let lines: Vec<&str> = out.lines().collect();

		assert_eq!(lines.len(), 2);
		assert!(lines[0].starts_with("  1"));
		assert!(lines[0].ends_with(" -"));
		assert!(lines[1].starts_with("* 2"));
		assert!(lines[1].ends_with("wss://yt/ws"));
	}

	#[test]
	fn test_notification_with_action_shows_link() {
		colored::control::set_override(false);
		let action = NotificationAction {
			label: "Settings".into(),
			url: "https://yt/admin/settings".into(),
		};
		let text = format_notification("check the URL", Severity::Warning, Some(&action));
		assert_eq!(text, "warning: check the URL\n  Settings: https://yt/admin/settings");
	}
}
