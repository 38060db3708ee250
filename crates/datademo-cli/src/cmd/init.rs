use anyhow::{Context as _, Result};
use clap::Args;
use datademo_core::config::{DATADEMO_DIR, repository_db_path};
use datademo_core::db::SqliteStore;
use datademo_core::db::migrations::LATEST_SCHEMA_VERSION;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite config files even if `.datademo/` already exists.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[shift]\n\
    docs_per_page = 500\n\
    docs_per_transaction = 50\n\
    log_every_n_docs = 500\n\
    listeners_to_disable = []\n\
    \n\
    [random]\n\
    users = []\n\
    created_from_days = 0\n\
    created_to_days = 90\n\
    modified_up_to_days = 20\n\
    \n\
    [store]\n\
    page_size = 500\n";

const GITIGNORE: &str = "repository.sqlite3\nrepository.sqlite3-wal\nrepository.sqlite3-shm\nrun.lock\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    ok: bool,
    path: String,
    schema_version: u32,
}

/// Execute `dd init`. Creates the project skeleton:
///
/// ```text
/// .datademo/
///   config.toml         (default project config)
///   .gitignore          (database and lock files)
///   repository.sqlite3  (migrated, empty document store)
/// ```
///
/// An existing repository database is kept; `--force` only rewrites the
/// config files.
pub fn run_init(args: &InitArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    let dir = project_root.join(DATADEMO_DIR);

    if dir.exists() && !args.force {
        anyhow::bail!("{DATADEMO_DIR}/ already exists. Use `dd init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, CONFIG_TOML)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let db_path = repository_db_path(project_root);
    SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to create repository: {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "repository initialized");

    let result = InitOutput {
        ok: true,
        path: dir.display().to_string(),
        schema_version: LATEST_SCHEMA_VERSION,
    };
    render(output, &result, |r, w| {
        writeln!(w, "✓ Initialized {}", r.path)?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  dd seed --count 50          # create demo documents")?;
        writeln!(w, "  dd shift-dates --days 30    # age them forward")
    })
}
