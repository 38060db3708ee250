pub mod completions;
pub mod config;
pub mod init;
pub mod listeners;
pub mod randomize;
pub mod seed;
pub mod shift_dates;
pub mod stats;
pub mod types;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use datademo_core::config::{
    DATADEMO_DIR, ProjectConfig, load_project_config, load_type_registry, repository_db_path,
    run_lock_path,
};
use datademo_core::db::SqliteStore;
use datademo_core::error::{CoreError, ErrorCode};
use datademo_core::lock::RunLock;
use datademo_core::model::SchemaManager;

use crate::output::{CliError, OutputMode, render_error};

/// An opened, initialized repository and its configuration.
pub struct Repository {
    pub root: PathBuf,
    pub store: SqliteStore,
    pub config: ProjectConfig,
    pub types: SchemaManager,
}

impl Repository {
    pub fn db_path(&self) -> PathBuf {
        repository_db_path(&self.root)
    }

    /// Take the cross-process bulk-update lock without waiting.
    pub fn lock_for_update(&self, output: OutputMode) -> anyhow::Result<RunLock> {
        RunLock::acquire(&run_lock_path(&self.root), Duration::ZERO)
            .map_err(|err| fail(output, &CoreError::Lock(err)))
    }
}

/// Walk up from `start` to the nearest directory holding `.datademo/`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(DATADEMO_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Open the repository containing `start`, or report that none exists.
pub fn open_repository(start: &Path, output: OutputMode) -> anyhow::Result<Repository> {
    let root = find_project_root(start).ok_or_else(|| {
        let msg = format!("no {DATADEMO_DIR}/ directory found from {}", start.display());
        render_error(output, &CliError::with_code(&msg, ErrorCode::NotInitialized)).ok();
        anyhow::anyhow!(msg)
    })?;

    let config = load_project_config(&root).map_err(|err| {
        render_error(
            output,
            &CliError::with_code(format!("{err:#}"), ErrorCode::ConfigParseError),
        )
        .ok();
        err
    })?;
    let types = load_type_registry(&root).map_err(|err| {
        render_error(
            output,
            &CliError::with_code(format!("{err:#}"), ErrorCode::ConfigParseError),
        )
        .ok();
        err
    })?;
    let store = SqliteStore::open(&repository_db_path(&root))
        .with_context(|| format!("open repository under {}", root.display()))?;

    Ok(Repository {
        root,
        store,
        config,
        types,
    })
}

/// Report `err` on stderr and turn it into the command's failure.
pub fn fail(output: OutputMode, err: &CoreError) -> anyhow::Error {
    render_error(output, &CliError::from(err)).ok();
    anyhow::anyhow!("{err}")
}
