use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Subcommand, ValueEnum};
use datademo_core::config::{EffectiveConfig, project_config_path, resolve_config, user_config_path};
use std::path::{Path, PathBuf};
use toml::Value;

use crate::cmd::find_project_root;
use crate::output::OutputMode;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Show resolved or raw configuration
    Show(ShowArgs),
    /// Set a configuration key in project or user scope
    Set(SetArgs),
    /// Unset a configuration key in project or user scope
    Unset(UnsetArgs),
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Show raw project config only
    #[arg(long, conflicts_with = "user")]
    project: bool,

    /// Show raw user config only
    #[arg(long)]
    user: bool,
}

#[derive(Args, Debug)]
struct SetArgs {
    /// Scope to mutate
    #[arg(long, default_value = "project")]
    scope: ConfigScope,

    /// Dot path key (e.g. shift.docs_per_transaction, user.output)
    key: String,

    /// New value; list keys take a comma-separated value
    value: String,
}

#[derive(Args, Debug)]
struct UnsetArgs {
    /// Scope to mutate
    #[arg(long, default_value = "project")]
    scope: ConfigScope,

    /// Dot path key (e.g. shift.docs_per_transaction, user.output)
    key: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum ConfigScope {
    Project,
    User,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum KeyKind {
    Count,
    Days,
    Names,
    Text,
}

/// Execute `dd config`.
pub fn run_config(args: &ConfigArgs, start: &Path, output: OutputMode) -> Result<()> {
    let project_root = find_project_root(start).unwrap_or_else(|| start.to_path_buf());
    match &args.command {
        ConfigCommand::Show(show) => run_show(show, &project_root, output),
        ConfigCommand::Set(set) => run_set(set, &project_root, output),
        ConfigCommand::Unset(unset) => run_unset(unset, &project_root, output),
    }
}

fn run_show(args: &ShowArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    if args.project {
        let value = load_toml_table(&project_config_path(project_root))?;
        return print_toml_or_json(&value, output);
    }

    if args.user {
        let value = load_toml_table(&user_path()?)?;
        return print_toml_or_json(&value, output);
    }

    let effective = resolve_config(project_root, output.is_json())?;
    print_effective(&effective, output)
}

fn run_set(args: &SetArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    let path = scope_path(args.scope, project_root)?;
    let mut value = load_toml_table(&path)?;
    apply_set(&mut value, args.scope, &args.key, &args.value)?;
    write_toml_table(&path, &value)?;
    tracing::info!(key = %args.key, scope = scope_label(args.scope), "config updated");
    render_mutation(output, "set", scope_label(args.scope), &args.key)
}

fn run_unset(args: &UnsetArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    let path = scope_path(args.scope, project_root)?;
    let mut value = load_toml_table(&path)?;
    apply_unset(&mut value, args.scope, &args.key)?;
    write_toml_table(&path, &value)?;
    render_mutation(output, "unset", scope_label(args.scope), &args.key)
}

fn apply_set(root: &mut Value, scope: ConfigScope, key: &str, raw: &str) -> Result<()> {
    let parsed = parse_value(scope, key, raw)?;
    let (section, leaf) = split_known_key(scope, key)?;

    let table = root
        .as_table_mut()
        .ok_or_else(|| anyhow!("Config root must be a TOML table"))?;

    let section_entry = table
        .entry(section.to_string())
        .or_insert_with(|| Value::Table(toml::map::Map::new()));

    let section_table = section_entry
        .as_table_mut()
        .ok_or_else(|| anyhow!("Section {section} must be a TOML table"))?;

    section_table.insert(leaf.to_string(), parsed);
    Ok(())
}

fn apply_unset(root: &mut Value, scope: ConfigScope, key: &str) -> Result<()> {
    let (section, leaf) = split_known_key(scope, key)?;
    let table = root
        .as_table_mut()
        .ok_or_else(|| anyhow!("Config root must be a TOML table"))?;

    let now_empty = match table.get_mut(section).and_then(Value::as_table_mut) {
        Some(section_table) => {
            section_table.remove(leaf);
            section_table.is_empty()
        }
        None => false,
    };
    if now_empty {
        table.remove(section);
    }
    Ok(())
}

fn key_kind(scope: ConfigScope, section: &str, leaf: &str) -> Option<KeyKind> {
    match scope {
        ConfigScope::Project => match (section, leaf) {
            ("shift", "docs_per_page" | "docs_per_transaction" | "log_every_n_docs")
            | ("store", "page_size") => Some(KeyKind::Count),
            ("shift", "listeners_to_disable") | ("random", "users") => Some(KeyKind::Names),
            ("random", "created_from_days" | "created_to_days" | "modified_up_to_days") => {
                Some(KeyKind::Days)
            }
            _ => None,
        },
        ConfigScope::User => match (section, leaf) {
            ("user", "output") => Some(KeyKind::Text),
            _ => None,
        },
    }
}

fn split_known_key(scope: ConfigScope, key: &str) -> Result<(&str, &str)> {
    let (section, leaf) = key
        .split_once('.')
        .ok_or_else(|| anyhow!("Key must use section.key format"))?;

    if key_kind(scope, section, leaf).is_some() {
        Ok((section, leaf))
    } else {
        bail!("Unsupported key `{key}` for {} scope", scope_label(scope));
    }
}

fn parse_value(scope: ConfigScope, key: &str, raw: &str) -> Result<Value> {
    let (section, leaf) = split_known_key(scope, key)?;
    let kind = key_kind(scope, section, leaf).ok_or_else(|| anyhow!("Unsupported key `{key}`"))?;

    match kind {
        KeyKind::Text => Ok(Value::String(raw.to_string())),
        KeyKind::Names => Ok(Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| Value::String(name.to_string()))
                .collect(),
        )),
        KeyKind::Count => {
            let number: u32 = raw
                .parse()
                .with_context(|| format!("{key} expects a positive integer"))?;
            if number == 0 {
                bail!("{key} must be at least 1");
            }
            Ok(Value::Integer(i64::from(number)))
        }
        KeyKind::Days => {
            let days: u32 = raw
                .parse()
                .with_context(|| format!("{key} expects a number of days"))?;
            Ok(Value::Integer(i64::from(days)))
        }
    }
}

fn load_toml_table(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Table(toml::map::Map::new()));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let value: Value =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

    if !value.is_table() {
        bail!("{} must contain a top-level TOML table", path.display());
    }

    Ok(value)
}

fn write_toml_table(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let serialized = toml::to_string_pretty(value)?;
    std::fs::write(path, serialized).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_toml_or_json(value: &Value, output: OutputMode) -> Result<()> {
    match output {
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputMode::Text | OutputMode::Pretty => println!("{}", toml::to_string_pretty(value)?),
    }
    Ok(())
}

fn print_effective(value: &EffectiveConfig, output: OutputMode) -> Result<()> {
    let shift = &value.project.shift;
    let random = &value.project.random;
    match output {
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputMode::Text => {
            println!("resolved_output={}", value.resolved_output);
            println!("shift.docs_per_page={}", shift.docs_per_page);
            println!("shift.docs_per_transaction={}", shift.docs_per_transaction);
            println!("shift.log_every_n_docs={}", shift.log_every_n_docs);
            println!("shift.listeners_to_disable={}", shift.listeners_to_disable.join(","));
            println!("random.users={}", random.users.join(","));
            println!("random.created_from_days={}", random.created_from_days);
            println!("random.created_to_days={}", random.created_to_days);
            println!("random.modified_up_to_days={}", random.modified_up_to_days);
            println!("store.page_size={}", value.project.store.page_size);
            if let Some(out) = &value.user.output {
                println!("user.output={out}");
            }
        }
        OutputMode::Pretty => {
            println!("resolved_output = \"{}\"", value.resolved_output);
            println!();
            println!("{}", toml::to_string_pretty(&value.project)?);
            if let Some(out) = &value.user.output {
                println!("[user]");
                println!("output = \"{out}\"");
            }
        }
    }

    Ok(())
}

fn render_mutation(output: OutputMode, action: &str, scope: &str, key: &str) -> Result<()> {
    match output {
        OutputMode::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "ok": true,
                    "action": action,
                    "scope": scope,
                    "key": key,
                }))?
            );
        }
        OutputMode::Text => {
            println!("ok=true action={action} scope={scope} key={key}");
        }
        OutputMode::Pretty => {
            let title = if action == "set" { "Set" } else { "Unset" };
            println!("{title} {key} in {scope} config");
        }
    }
    Ok(())
}

fn scope_path(scope: ConfigScope, project_root: &Path) -> Result<PathBuf> {
    match scope {
        ConfigScope::Project => Ok(project_config_path(project_root)),
        ConfigScope::User => user_path(),
    }
}

fn user_path() -> Result<PathBuf> {
    user_config_path().ok_or_else(|| anyhow!("Unable to resolve user config directory"))
}

const fn scope_label(scope: ConfigScope) -> &'static str {
    match scope {
        ConfigScope::Project => "project",
        ConfigScope::User => "user",
    }
}
