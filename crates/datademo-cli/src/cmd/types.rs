//! `dd types`: document types and the date fields a shift would touch.

use std::io::Write;
use std::path::Path;

use clap::Args;
use datademo_core::fields::date_fields;
use datademo_core::session::TypeRegistry;
use serde::Serialize;

use crate::cmd::open_repository;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `dd types`.
#[derive(Args, Debug, Default)]
pub struct TypesArgs {
    /// Only list types that carry date fields.
    #[arg(long)]
    pub with_dates: bool,
}

#[derive(Debug, Serialize)]
struct TypeEntry {
    name: String,
    schemas: Vec<String>,
    date_fields: Vec<String>,
}

/// Execute `dd types`.
pub fn run_types(args: &TypesArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let repo = open_repository(project_root, output)?;
    let entries: Vec<TypeEntry> = repo
        .types
        .document_types()
        .into_iter()
        .map(|doc_type| TypeEntry {
            name: doc_type.name.clone(),
            schemas: doc_type.schemas.clone(),
            date_fields: date_fields(&repo.types.schemas_for(&doc_type.name))
                .iter()
                .map(ToString::to_string)
                .collect(),
        })
        .filter(|entry| !args.with_dates || !entry.date_fields.is_empty())
        .collect();

    render_mode(
        output,
        &entries,
        |list, w| {
            for entry in list {
                writeln!(w, "{}\t{}", entry.name, entry.date_fields.join(","))?;
            }
            Ok(())
        },
        |list, w| {
            for entry in list {
                pretty_section(w, &entry.name)?;
                pretty_kv(w, "schemas", entry.schemas.join(", "))?;
                if entry.date_fields.is_empty() {
                    pretty_kv(w, "dates", "(none)")?;
                }
                for field in &entry.date_fields {
                    pretty_kv(w, "date", field)?;
                }
                writeln!(w)?;
            }
            Ok(())
        },
    )
}
