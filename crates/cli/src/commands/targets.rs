use std::sync::Arc;

use serde::Serialize;
use ytdebug_runtime::{ConnectionOrchestrator, DebugTarget, Error as DebugError};

use crate::cli::TargetsArgs;
use crate::console::{self, ConsoleSink};
use crate::error::Result;

#[derive(Debug, Serialize)]
struct TargetListing<'a> {
	selected: Option<&'a str>,
	targets: &'a [DebugTarget],
}

pub async fn execute(args: TargetsArgs) -> Result<()> {
	let config = args.connection.debug_config()?;
	let orchestrator = ConnectionOrchestrator::new(Arc::new(ConsoleSink));

	let lookup = orchestrator.list_targets(&config);
	let outcome = match config.connect_timeout {
		Some(limit) => tokio::time::timeout(limit, lookup)
			.await
			.map_err(|_| DebugError::Timeout(format!("discovery exceeded {}ms", limit.as_millis())))??,
		None => lookup.await?,
	};
	tracing::debug!(count = outcome.targets.len(), "Discovered targets");

	if args.json {
		let listing = TargetListing {
			selected: outcome.selected.as_ref().and_then(|t| t.id.as_deref()),
			targets: &outcome.targets,
		};
		println!("{}", serde_json::to_string_pretty(&listing)?);
	} else if outcome.targets.is_empty() {
		console::print_status("No targets advertised");
	} else {
		print!("{}", console::format_targets(&outcome.targets, outcome.selected.as_ref()));
	}
	Ok(())
}
