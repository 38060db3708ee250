//! `dd seed`: populate the repository with synthetic documents.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use datademo_core::listeners::dublincore::{
    CONTRIBUTORS, CREATED, CREATOR, LAST_CONTRIBUTOR, MODIFIED,
};
use datademo_core::model::{Document, FieldType, ScalarType, SchemaManager, Value};
use datademo_core::random::random_date;
use datademo_core::session::{TransactionManager, TypeRegistry};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::cmd::{fail, open_repository};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `dd seed`.
#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Number of documents to create, spread evenly across types.
    #[arg(long, default_value_t = 20)]
    pub count: usize,

    /// Document type to create (repeatable). Defaults to every known type.
    #[arg(long = "type", value_name = "TYPE")]
    pub doc_types: Vec<String>,

    /// Seed for reproducible content.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Principal recorded as creator.
    #[arg(long = "as", value_name = "USER")]
    pub principal: Option<String>,
}

#[derive(Debug, Serialize)]
struct SeedOutput {
    created: usize,
    by_type: BTreeMap<String, usize>,
}

const WORDS: &[&str] = &[
    "alpha", "budget", "contract", "draft", "estimate", "forecast", "guide", "harbor",
    "invoice", "journal", "kickoff", "ledger", "memo", "notes", "outline", "plan",
    "quarterly", "review", "summary", "timeline",
];

/// Fields the dublincore listener stamps on save.
const STAMPED: &[&str] = &[CREATED, CREATOR, MODIFIED, LAST_CONTRIBUTOR, CONTRIBUTORS];

/// Execute `dd seed`.
pub fn run_seed(args: &SeedArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let repo = open_repository(project_root, output)?;
    let store = match &args.principal {
        Some(user) => repo.store.with_principal(user.clone()),
        None => repo.store,
    };

    let doc_types: Vec<String> = if args.doc_types.is_empty() {
        repo.types
            .document_types()
            .into_iter()
            .map(|t| t.name.clone())
            .collect()
    } else {
        for name in &args.doc_types {
            if repo.types.document_type(name).is_none() {
                anyhow::bail!("unknown document type '{name}' (see `dd types`)");
            }
        }
        args.doc_types.clone()
    };
    if doc_types.is_empty() {
        anyhow::bail!("no document types to seed");
    }

    let mut rng = args
        .seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    let now = Utc::now();
    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();

    store.start().map_err(|e| fail(output, &e))?;
    for n in 0..args.count {
        let doc_type = &doc_types[n % doc_types.len()];
        let doc = sample_document(&repo.types, doc_type, &mut rng, now);
        if let Err(err) = store.create_document(doc) {
            store.rollback().ok();
            return Err(fail(output, &err));
        }
        *by_type.entry(doc_type.clone()).or_default() += 1;
    }
    store.commit_or_rollback().map_err(|e| fail(output, &e))?;
    tracing::info!(created = args.count, "seeded documents");

    let result = SeedOutput {
        created: args.count,
        by_type,
    };
    render_mode(
        output,
        &result,
        |r, w| {
            for (doc_type, count) in &r.by_type {
                writeln!(w, "{doc_type}\t{count}")?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, &format!("Created {} documents", r.created))?;
            for (doc_type, count) in &r.by_type {
                pretty_kv(w, doc_type, count.to_string())?;
            }
            Ok(())
        },
    )
}

/// A document of `doc_type` with every schema field filled in, except the
/// ones the dublincore listener stamps.
fn sample_document(
    types: &SchemaManager,
    doc_type: &str,
    rng: &mut StdRng,
    now: DateTime<Utc>,
) -> Document {
    let mut doc = Document::new(doc_type);
    for schema in types.schemas_for(doc_type) {
        for def in &schema.fields {
            let name = schema.prefixed(&def.name);
            if STAMPED.contains(&name.as_str()) {
                continue;
            }
            doc.fields.insert(name, sample_value(&def.field_type, rng, now));
        }
    }
    doc
}

fn sample_value(field_type: &FieldType, rng: &mut StdRng, now: DateTime<Utc>) -> Value {
    match field_type {
        FieldType::Scalar(ScalarType::Date) => Value::Date(random_date(rng, now, 0, 365)),
        FieldType::Scalar(ScalarType::String) => {
            let first = WORDS.choose(rng).copied().unwrap_or("doc");
            let second = WORDS.choose(rng).copied().unwrap_or("draft");
            Value::from(format!("{first} {second}"))
        }
        FieldType::Scalar(ScalarType::Long) => Value::Long(rng.gen_range(0..100_000)),
        FieldType::Scalar(ScalarType::Double) => Value::Double(rng.gen_range(0.0..1_000.0)),
        FieldType::Scalar(ScalarType::Boolean) => Value::Boolean(rng.gen_bool(0.5)),
        FieldType::List(inner) => {
            let len = rng.gen_range(0..=3);
            Value::List((0..len).map(|_| sample_value(inner, rng, now)).collect())
        }
        FieldType::Complex(fields) => Value::Complex(
            fields
                .iter()
                .map(|f| (f.name.clone(), sample_value(&f.field_type, rng, now)))
                .collect(),
        ),
    }
}
