//! `dd listeners`: inspect and toggle save listeners.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};
use datademo_core::error::ErrorCode;
use datademo_core::session::ListenerRegistry;
use serde::Serialize;

use crate::cmd::{fail, open_repository};
use crate::output::{CliError, OutputMode, render, render_error};

#[derive(Args, Debug)]
pub struct ListenersArgs {
    #[command(subcommand)]
    pub command: ListenerCommand,
}

#[derive(Subcommand, Debug)]
pub enum ListenerCommand {
    /// Show every registered listener and whether it is enabled.
    List,
    /// Enable a listener.
    Enable { name: String },
    /// Disable a listener.
    Disable { name: String },
}

#[derive(Debug, Serialize)]
struct ListenerLine {
    name: String,
    enabled: bool,
}

pub fn run_listeners(args: &ListenersArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let repo = open_repository(project_root, output)?;
    let store = &repo.store;

    let (name, enabled) = match &args.command {
        ListenerCommand::List => {
            let lines: Vec<ListenerLine> = store
                .listeners()
                .into_iter()
                .map(|(name, enabled)| ListenerLine { name, enabled })
                .collect();
            return render(output, &lines, |lines, w| {
                for line in lines {
                    let state = if line.enabled { "enabled" } else { "disabled" };
                    writeln!(w, "{}\t{state}", line.name)?;
                }
                Ok(())
            });
        }
        ListenerCommand::Enable { name } => (name, true),
        ListenerCommand::Disable { name } => (name, false),
    };

    if !store.is_registered(name).map_err(|e| fail(output, &e))? {
        let msg = format!("no listener named '{name}'");
        render_error(output, &CliError::with_code(&msg, ErrorCode::ListenerStateViolation)).ok();
        anyhow::bail!(msg);
    }
    store
        .set_enabled(name, enabled)
        .and_then(|()| store.recompute_enabled())
        .map_err(|e| fail(output, &e))?;
    tracing::info!(listener = %name, enabled, "listener updated");

    let line = ListenerLine {
        name: name.clone(),
        enabled,
    };
    render(output, &line, |l, w| {
        let state = if l.enabled { "enabled" } else { "disabled" };
        writeln!(w, "✓ {} {state}", l.name)
    })
}
