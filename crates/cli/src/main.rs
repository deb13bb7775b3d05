use clap::Parser;
use ytdebug_cli::{cli::Cli, commands, console, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = commands::dispatch(cli).await {
		console::print_error(&err);
		std::process::exit(err.exit_code());
	}
}
