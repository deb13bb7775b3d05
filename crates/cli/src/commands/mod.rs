mod connect;
mod targets;

use crate::cli::{Cli, Commands};
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	match cli.command {
		Commands::Connect(args) => connect::execute(args).await,
		Commands::Targets(args) => targets::execute(args).await,
	}
}
