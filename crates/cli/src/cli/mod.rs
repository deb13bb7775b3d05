
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ytdebug_runtime::{DebugConfig, TargetSelection};

use crate::styles::cli_styles;

/// Root CLI for ytdebug.
#[derive(Parser, Debug)]
#[command(name = "ytdebug")]
#[command(about = "Attach to the YouTrack workflow script debugger")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Attach to the debug target and stream Inspector events as NDJSON.
	Connect(ConnectArgs),
	/// List the targets advertised by the discovery endpoint.
	Targets(TargetsArgs),
}

/// Where and how to reach the server.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
	/// Base URL of the YouTrack site, e.g. https://youtrack.example.com/youtrack
	#[arg(long, env = "YTDEBUG_SERVER_URL", value_name = "URL")]
	pub server_url: Option<String>,

	#[arg(long, short = 'u', env = "YTDEBUG_USERNAME", default_value = "")]
	pub username: String,

	#[arg(long, env = "YTDEBUG_PASSWORD", default_value = "", hide_env_values = true)]
	pub password: String,

	/// Debug host, when it differs from the server URL's host
	#[arg(long, env = "YTDEBUG_HOST")]
	pub host: Option<String>,

	/// Debug port; zero or negative means 443
	#[arg(long, short = 'p', env = "YTDEBUG_PORT", allow_negative_numbers = true)]
	pub port: Option<i64>,

	/// Skip server certificate verification
	#[arg(long, short = 'k')]
	pub accept_invalid_certs: bool,

	/// Which advertised target to attach to
	#[arg(long, value_enum, default_value = "last")]
	pub select: SelectionArg,

	/// Connection deadline in seconds; 0 disables it
	#[arg(long, value_name = "SECS", default_value_t = 30)]
	pub timeout: u64,

	/// YouTrack release, checked before connecting
	#[arg(long, env = "YTDEBUG_SERVER_VERSION", value_name = "VERSION")]
	pub server_version: Option<String>,
}

impl ConnectionArgs {
	/// Builds the runtime configuration from the parsed flags.
	pub fn debug_config(&self) -> ytdebug_runtime::Result<DebugConfig> {
		let mut builder = DebugConfig::builder()
			.credentials(self.username.clone(), self.password.clone())
			.accept_invalid_certs(self.accept_invalid_certs)
			.selection(self.select.into());

		if let Some(url) = &self.server_url {
			builder = builder.server_url(url.clone());
		}
		if let Some(host) = &self.host {
			builder = builder.host(host.clone());
		}
		if let Some(port) = self.port {
			builder = builder.port(port);
		}
		if self.timeout > 0 {
			builder = builder.connect_timeout(Duration::from_secs(self.timeout));
		}
		if let Some(version) = &self.server_version {
			builder = builder.server_version(version.clone());
		}
		builder.build()
	}
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
	#[command(flatten)]
	pub connection: ConnectionArgs,

	/// Do not send Runtime.enable and Debugger.enable after attaching
	#[arg(long)]
	pub no_enable: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TargetsArgs {
	#[command(flatten)]
	pub connection: ConnectionArgs,

	/// Print the targets as JSON
	#[arg(long)]
	pub json: bool,
}

/// Target selection policy (CLI wrapper for [`TargetSelection`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SelectionArg {
	/// Last advertised target
	#[default]
	Last,
	/// First target with a debugger URL
	FirstDebuggable,
	/// First attachable page
	FirstPage,
}

impl From<SelectionArg> for TargetSelection {
	fn from(arg: SelectionArg) -> Self {
		match arg {
			SelectionArg::Last => TargetSelection::Last,
			SelectionArg::FirstDebuggable => TargetSelection::FirstDebuggable,
			SelectionArg::FirstPage => TargetSelection::FirstPage,
		}
	}
}
