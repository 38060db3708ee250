//! `dd randomize`: give documents a random creation/modification history.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::Args;
use datademo_core::random::RandomModificationInfo;
use datademo_core::session::TransactionManager;
use serde::Serialize;

use crate::cmd::{fail, open_repository};
use crate::output::{OutputMode, render};

/// Arguments for `dd randomize`.
#[derive(Args, Debug)]
pub struct RandomizeArgs {
    /// Restrict to this document type (repeatable).
    #[arg(long = "type", value_name = "TYPE")]
    pub doc_types: Vec<String>,

    /// Candidate last contributor (repeatable). Overrides `[random] users`.
    #[arg(long = "user", value_name = "USER")]
    pub users: Vec<String>,

    /// Creation dates start this many days back at the earliest.
    #[arg(long)]
    pub created_from_days: Option<u32>,

    /// Creation dates reach this many days back at most.
    #[arg(long)]
    pub created_to_days: Option<u32>,

    /// Modification follows creation by up to this many days.
    #[arg(long)]
    pub modified_up_to_days: Option<u32>,

    /// Seed for reproducible dates.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct RandomizeOutput {
    query: String,
    documents_updated: usize,
    commits: usize,
}

/// Execute `dd randomize`.
pub fn run_randomize(args: &RandomizeArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let repo = open_repository(project_root, output)?;
    let _lock = repo.lock_for_update(output)?;

    let mut options = repo.config.random.to_options(
        repo.config.store.page_size,
        repo.config.shift.docs_per_transaction,
    );
    options.doc_types.clone_from(&args.doc_types);
    if !args.users.is_empty() {
        options.users.clone_from(&args.users);
    }
    if let Some(days) = args.created_from_days {
        options.created_from_days = days;
    }
    if let Some(days) = args.created_to_days {
        options.created_to_days = days;
    }
    if let Some(days) = args.modified_up_to_days {
        options.modified_up_to_days = days;
    }

    let mut info = RandomModificationInfo::new(options, args.seed);
    let query = info.query();

    let store = &repo.store;
    store.start().map_err(|e| fail(output, &e))?;
    let report = info.run(store).map_err(|e| fail(output, &e))?;
    store.commit_or_rollback().map_err(|e| fail(output, &e))?;

    let result = RandomizeOutput {
        query,
        documents_updated: report.documents_updated,
        commits: report.commits,
    };
    render(output, &result, |r, w| {
        writeln!(w, "✓ Randomized history of {} documents ({})", r.documents_updated, r.query)
    })
}
