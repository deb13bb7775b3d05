use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	// 0 = warnings only, connection failures are reported by the command itself
	// 1 (-v) = connection stages
	// 2+ (-vv) = protocol frames and TLS details
	let filter = match verbosity {
		0 => "warn,ytdebug_runtime=error,rustls=off",
		1 => "info,rustls=warn,tungstenite=warn",
		_ => "debug",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
