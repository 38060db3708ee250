use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::db::REPOSITORY_DB_FILE;
use crate::lock::RUN_LOCK_FILE;
use crate::model::SchemaManager;
use crate::random::RandomInfoOptions;
use crate::shift::{DEFAULT_LOG_EVERY_N_DOCS, ShiftOptions};
use crate::txn::DEFAULT_COMMIT_MODULO;
use crate::walker::DEFAULT_PAGE_SIZE;

/// Per-repository state directory.
pub const DATADEMO_DIR: &str = ".datademo";

#[must_use]
pub fn repository_db_path(project_root: &Path) -> PathBuf {
    project_root.join(DATADEMO_DIR).join(REPOSITORY_DB_FILE)
}

#[must_use]
pub fn run_lock_path(project_root: &Path) -> PathBuf {
    project_root.join(DATADEMO_DIR).join(RUN_LOCK_FILE)
}

#[must_use]
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(DATADEMO_DIR).join("config.toml")
}

/// `<config dir>/datademo/config.toml`, when the platform has a config dir.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("datademo").join("config.toml"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub shift: ShiftConfig,
    #[serde(default)]
    pub random: RandomConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftConfig {
    #[serde(default = "default_page_size")]
    pub docs_per_page: usize,
    #[serde(default = "default_docs_per_transaction")]
    pub docs_per_transaction: usize,
    #[serde(default = "default_log_every_n_docs")]
    pub log_every_n_docs: usize,
    /// Suspended alongside the dublincore listener.
    #[serde(default)]
    pub listeners_to_disable: Vec<String>,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            docs_per_page: default_page_size(),
            docs_per_transaction: default_docs_per_transaction(),
            log_every_n_docs: default_log_every_n_docs(),
            listeners_to_disable: Vec::new(),
        }
    }
}

impl ShiftConfig {
    #[must_use]
    pub fn to_options(&self) -> ShiftOptions {
        ShiftOptions {
            docs_per_page: self.docs_per_page,
            docs_per_transaction: self.docs_per_transaction,
            log_every_n_docs: self.log_every_n_docs,
            do_log: true,
            extra_listeners: self.listeners_to_disable.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomConfig {
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub created_from_days: u32,
    #[serde(default = "default_created_to_days")]
    pub created_to_days: u32,
    #[serde(default = "default_modified_up_to_days")]
    pub modified_up_to_days: u32,
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            created_from_days: 0,
            created_to_days: default_created_to_days(),
            modified_up_to_days: default_modified_up_to_days(),
        }
    }
}

impl RandomConfig {
    #[must_use]
    pub fn to_options(&self, page_size: usize, docs_per_transaction: usize) -> RandomInfoOptions {
        RandomInfoOptions {
            doc_types: Vec::new(),
            users: self.users.clone(),
            created_from_days: self.created_from_days,
            created_to_days: self.created_to_days,
            modified_up_to_days: self.modified_up_to_days,
            docs_per_page: page_size,
            docs_per_transaction,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Page size for commands that walk documents outside a shift.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Load `.datademo/config.toml`, falling back to defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_config_path(project_root);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// # Errors
///
/// Returns an error if the user config exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(path) = user_config_path() else {
        return Ok(UserConfig::default());
    };
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Builtin schemas plus any defined in `.datademo/types.toml`.
///
/// # Errors
///
/// Returns an error if `types.toml` exists but cannot be read or parsed.
pub fn load_type_registry(project_root: &Path) -> Result<SchemaManager> {
    let mut registry = SchemaManager::builtin();
    let path = project_root.join(DATADEMO_DIR).join("types.toml");
    if !path.exists() {
        return Ok(registry);
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let extra = SchemaManager::from_toml_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    registry.merge(extra);
    Ok(registry)
}

/// # Errors
///
/// Returns an error if either config file is unreadable or malformed.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.as_deref(), env_format.as_deref());

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

/// Output mode name: `--json`, then `FORMAT`, then the user config, then
/// `pretty` on a terminal and `text` otherwise. Unknown names are skipped.
#[must_use]
pub fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "plain" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

const fn default_docs_per_transaction() -> usize {
    DEFAULT_COMMIT_MODULO
}

const fn default_log_every_n_docs() -> usize {
    DEFAULT_LOG_EVERY_N_DOCS
}

const fn default_created_to_days() -> u32 {
    90
}

const fn default_modified_up_to_days() -> u32 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TypeRegistry;

    fn write_datademo_file(root: &Path, name: &str, content: &str) {
        let dir = root.join(DATADEMO_DIR);
        std::fs::create_dir_all(&dir).expect("create .datademo");
        std::fs::write(dir.join(name), content).expect("write config");
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("tempdir");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.shift.docs_per_page, 500);
        assert_eq!(cfg.shift.docs_per_transaction, 50);
        assert_eq!(cfg.shift.log_every_n_docs, 500);
        assert!(cfg.shift.listeners_to_disable.is_empty());
        assert_eq!(cfg.random.created_to_days, 90);
        assert_eq!(cfg.random.modified_up_to_days, 20);
        assert_eq!(cfg.store.page_size, 500);
    }

    #[test]
    fn partial_project_config_keeps_other_defaults() {
        let root = tempfile::tempdir().expect("tempdir");
        write_datademo_file(
            root.path(),
            "config.toml",
            r#"
[shift]
docs_per_transaction = 10
listeners_to_disable = ["opchainlistener"]

[random]
users = ["jdoe", "alice"]
"#,
        );

        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.shift.docs_per_transaction, 10);
        assert_eq!(cfg.shift.docs_per_page, 500);
        assert_eq!(cfg.random.users, vec!["jdoe", "alice"]);

        let options = cfg.shift.to_options();
        assert_eq!(options.extra_listeners, vec!["opchainlistener"]);
        assert!(options.do_log);
    }

    #[test]
    fn malformed_project_config_is_an_error() {
        let root = tempfile::tempdir().expect("tempdir");
        write_datademo_file(root.path(), "config.toml", "[shift\ndocs_per_page = 1");
        let err = load_project_config(root.path()).expect_err("parse failure");
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn types_file_extends_builtin_registry() {
        let root = tempfile::tempdir().expect("tempdir");
        write_datademo_file(
            root.path(),
            "types.toml",
            r#"
[[schemas]]
name = "event"
prefix = "ev"
fields = [{ name = "starts", type = "date" }]

[[types]]
name = "Event"
schemas = ["dublincore", "event"]
"#,
        );

        let registry = load_type_registry(root.path()).expect("load types");
        assert!(registry.document_type("Project").is_some());
        assert_eq!(registry.schemas_for("Event").len(), 2);
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        assert_eq!(resolve_output(true, Some("pretty"), Some("text")), "json");
    }

    #[test]
    fn env_format_beats_user_config() {
        assert_eq!(resolve_output(false, Some("json"), Some("text")), "text");
        assert_eq!(resolve_output(false, Some("human"), Some("bogus")), "pretty");
    }

    #[test]
    fn repository_paths_live_under_state_dir() {
        let root = Path::new("/tmp/demo");
        assert_eq!(
            repository_db_path(root),
            PathBuf::from("/tmp/demo/.datademo/repository.sqlite3")
        );
        assert_eq!(run_lock_path(root), PathBuf::from("/tmp/demo/.datademo/run.lock"));
    }
}
