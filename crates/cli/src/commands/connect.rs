use std::io::Write;
use std::sync::Arc;

use anyhow::anyhow;
use ytdebug_runtime::{ConnectionOrchestrator, ProtocolEvent};

use crate::cli::ConnectArgs;
use crate::console::{self, ConsoleSink};
use crate::error::{CliError, Result};

/// Status text recorded when the user stops the session.
const STOPPED_STATUS: &str = "Stopped by user";

pub async fn execute(args: ConnectArgs) -> Result<()> {
	let config = args.connection.debug_config()?;
	let orchestrator = ConnectionOrchestrator::new(Arc::new(ConsoleSink));

	// Dropping the pending attempt on Ctrl-C cancels it.
	let pending = orchestrator.start(config);
	let session = tokio::select! {
		result = pending => result?,
		_ = tokio::signal::ctrl_c() => return Err(CliError::Interrupted),
	};
	console::print_status(&format!("Connected to {}", session.connected_address()));

	let mut events = session
		.take_events()
		.ok_or_else(|| anyhow!("event stream already taken"))?;
	if !args.no_enable {
		session.enable_domains().await?;
		tracing::info!("Runtime and Debugger domains enabled");
	}

	let mut stdout = std::io::stdout();
	loop {
		tokio::select! {
			event = events.recv() => {
				let Some(event) = event else { break };
				write_event(&mut stdout, &event)?;
				if event.is_terminal() {
					break;
				}
			}
			_ = tokio::signal::ctrl_c() => {
				orchestrator.close_active(STOPPED_STATUS);
				console::print_status(STOPPED_STATUS);
				return Ok(());
			}
		}
	}

	let status = session.terminated().await;
	Err(CliError::SessionEnded(
		status.reason.unwrap_or_else(|| status.state.to_string()),
	))
}

/// Writes one event as a JSON line and flushes so pipes see it immediately.
fn write_event<W: Write>(out: &mut W, event: &ProtocolEvent) -> Result<()> {
	serde_json::to_writer(&mut *out, event)?;
	out.write_all(b"\n")?;
	out.flush()?;
	Ok(())
}
