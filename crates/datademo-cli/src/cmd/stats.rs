//! `dd stats`: document counts and listener state.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use clap::Args;
use datademo_core::config::run_lock_path;
use datademo_core::lock::RunLock;
use serde::Serialize;

use crate::cmd::{fail, open_repository};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `dd stats`.
#[derive(Args, Debug, Default)]
pub struct StatsArgs {}

/// Report payload for `dd stats`.
#[derive(Debug, Serialize)]
pub struct RepositoryStats {
    pub total: u64,
    pub by_type: BTreeMap<String, u64>,
    pub listeners: BTreeMap<String, bool>,
    /// Another process holds the bulk-update lock.
    pub update_running: bool,
}

/// Execute `dd stats`.
pub fn run_stats(_args: &StatsArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let repo = open_repository(project_root, output)?;
    let by_type: BTreeMap<String, u64> = repo
        .store
        .count_by_type()
        .map_err(|e| fail(output, &e))?
        .into_iter()
        .collect();

    let payload = RepositoryStats {
        total: by_type.values().sum(),
        by_type,
        listeners: repo.store.listeners().into_iter().collect(),
        update_running: RunLock::acquire(&run_lock_path(&repo.root), Duration::ZERO).is_err(),
    };

    render_mode(
        output,
        &payload,
        |s, w| {
            writeln!(w, "total\t{}", s.total)?;
            for (doc_type, count) in &s.by_type {
                writeln!(w, "{doc_type}\t{count}")?;
            }
            Ok(())
        },
        |s, w| {
            pretty_section(w, "Documents")?;
            for (doc_type, count) in &s.by_type {
                pretty_kv(w, doc_type, count.to_string())?;
            }
            pretty_kv(w, "total", s.total.to_string())?;
            if s.update_running {
                pretty_kv(w, "update", "running")?;
            }
            writeln!(w)?;
            pretty_section(w, "Listeners")?;
            for (name, enabled) in &s.listeners {
                pretty_kv(w, name, if *enabled { "enabled" } else { "disabled" })?;
            }
            Ok(())
        },
    )
}
