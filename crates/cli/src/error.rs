use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

/// Exit code for an interrupted `connect`.
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Error)]
pub enum CliError {
	/// The session ended on the server side before the user stopped it.
	#[error("session ended: {0}")]
	SessionEnded(String),

	#[error("interrupted")]
	Interrupted,

	#[error(transparent)]
	Debugger(#[from] ytdebug_runtime::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	pub fn exit_code(&self) -> i32 {
		match self {
			Self::Interrupted => EXIT_INTERRUPTED,
			Self::Debugger(e) if e.is_advisory() => 2,
			_ => 1,
		}
	}

	/// Short machine-readable code printed with the message.
	pub fn code(&self) -> &'static str {
		use ytdebug_runtime::Error as E;

		match self {
			Self::SessionEnded(_) => "SESSION_ENDED",
			Self::Interrupted => "INTERRUPTED",
			Self::Debugger(e) => match e {
				E::InvalidConfig(_) => "INVALID_CONFIG",
				E::UnsupportedServerVersion { .. } => "UNSUPPORTED_VERSION",
				E::Transport(_) => "TRANSPORT",
				E::Discovery(_) => "DISCOVERY",
				E::NotConfigured => "NOT_CONFIGURED",
				E::NoDebuggableTarget => "NO_TARGET",
				E::OriginMismatch { .. } => "ORIGIN_MISMATCH",
				E::AlreadyAttached => "ALREADY_ATTACHED",
				E::AlreadyConnected(_) => "ALREADY_CONNECTED",
				E::Handshake(_) => "HANDSHAKE",
				E::Remote { .. } => "REMOTE",
				E::Timeout(_) => "TIMEOUT",
				E::Cancelled => "CANCELLED",
				_ => "PROTOCOL",
			},
			Self::Io(_) => "IO",
			Self::Json(_) => "JSON",
			Self::Anyhow(_) => "INTERNAL",
		}
	}
}
