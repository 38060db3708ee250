//! `dd shift-dates`: move every date in the repository by whole days.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{ArgGroup, Args};
use datademo_core::db::SqliteStore;
use datademo_core::error::CoreError;
use datademo_core::model::SchemaManager;
use datademo_core::shift::{DateShifter, ShiftReport};
use datademo_core::worker::{ShiftWorker, run_foreground};
use serde::Serialize;

use crate::cmd::{fail, open_repository};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Arguments for `dd shift-dates`.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("amount").required(true).args(["days", "since"])))]
pub struct ShiftDatesArgs {
    /// Shift by this many days.
    #[arg(long, allow_negative_numbers = true)]
    pub days: Option<i64>,

    /// Shift by the whole days elapsed since this date (`YYYY-MM-DD` or RFC 3339).
    #[arg(long, value_parser = parse_reference_date)]
    pub since: Option<DateTime<Utc>>,

    /// Extra listener to suspend during the run (repeatable).
    #[arg(long = "disable-listener", value_name = "NAME")]
    pub listeners: Vec<String>,

    /// Documents fetched per page.
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Saves per committed batch.
    #[arg(long)]
    pub per_transaction: Option<usize>,

    /// Silence per-type progress logging.
    #[arg(long)]
    pub no_log: bool,

    /// Run on a worker thread and report status lines while it runs.
    #[arg(long)]
    pub background: bool,
}

#[derive(Debug, Serialize)]
struct TypeLine {
    doc_type: String,
    date_fields: usize,
    pages: usize,
    documents: usize,
}

#[derive(Debug, Serialize)]
struct ShiftOutput {
    days: i64,
    rejected: bool,
    documents_updated: usize,
    commits: usize,
    types: Vec<TypeLine>,
}

impl From<ShiftReport> for ShiftOutput {
    fn from(report: ShiftReport) -> Self {
        Self {
            days: report.days,
            rejected: report.rejected,
            documents_updated: report.documents_updated,
            commits: report.commits,
            types: report
                .types
                .into_iter()
                .map(|t| TypeLine {
                    doc_type: t.doc_type,
                    date_fields: t.date_fields,
                    pages: t.pages,
                    documents: t.documents,
                })
                .collect(),
        }
    }
}

fn parse_reference_date(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| format!("expected YYYY-MM-DD or RFC 3339: {e}"))
}

/// Execute `dd shift-dates`.
pub fn run_shift_dates(args: &ShiftDatesArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let repo = open_repository(project_root, output)?;
    let _lock = repo.lock_for_update(output)?;

    let mut options = repo.config.shift.to_options();
    options.extra_listeners.extend(args.listeners.iter().cloned());
    if let Some(page_size) = args.page_size {
        options.docs_per_page = page_size;
    }
    if let Some(per_transaction) = args.per_transaction {
        options.docs_per_transaction = per_transaction;
    }
    options.do_log = !args.no_log;

    let shifter = match (args.days, args.since) {
        (Some(days), _) => DateShifter::by_days(days),
        (None, Some(since)) => DateShifter::since(since, Utc::now()),
        (None, None) => anyhow::bail!("one of --days or --since is required"),
    }
    .with_options(options);

    let report = if args.background {
        let db_path = repo.db_path();
        let types = repo.types.clone();
        drop(repo);
        run_in_background(shifter, types, db_path, output)?
    } else {
        let mut shifter = shifter;
        run_foreground(&repo.store, &repo.types, &mut shifter).map_err(|e| fail(output, &e))?
    };

    let result = ShiftOutput::from(report);
    render_mode(
        output,
        &result,
        |r, w| {
            writeln!(w, "days\t{}", r.days)?;
            writeln!(w, "documents\t{}", r.documents_updated)?;
            for t in &r.types {
                writeln!(w, "{}\t{}\t{}", t.doc_type, t.date_fields, t.documents)?;
            }
            Ok(())
        },
        |r, w| {
            if r.rejected {
                writeln!(w, "No update done: shift is under one day ({} days).", r.days)?;
                return Ok(());
            }
            pretty_section(w, &format!("Shifted dates by {} days", r.days))?;
            for t in &r.types {
                pretty_kv(
                    w,
                    &t.doc_type,
                    format!("{} documents, {} date fields", t.documents, t.date_fields),
                )?;
            }
            pretty_kv(w, "total", r.documents_updated.to_string())?;
            pretty_kv(w, "commits", r.commits.to_string())
        },
    )
}

fn run_in_background(
    shifter: DateShifter,
    types: SchemaManager,
    db_path: PathBuf,
    output: OutputMode,
) -> Result<ShiftReport> {
    let handle = ShiftWorker::schedule(move || SqliteStore::open(&db_path), types, shifter)
        .map_err(|err| match err.downcast::<CoreError>() {
            Ok(core) => fail(output, &core),
            Err(other) => other,
        })?;

    let status = handle.status().clone();
    let mut last = None;
    while !handle.is_finished() {
        let current = status.current();
        if current != last {
            if let Some(line) = current.as_ref().filter(|_| !output.is_json()) {
                eprintln!("{line}");
            }
            last = current;
        }
        thread::sleep(POLL_INTERVAL);
    }

    handle.join().map_err(|err| match err.downcast::<CoreError>() {
        Ok(core) => fail(output, &core),
        Err(other) => other.context("background shift failed"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_dates_accept_plain_and_rfc3339() {
        let plain = parse_reference_date("2015-03-01").expect("plain");
        assert_eq!(plain.to_rfc3339(), "2015-03-01T00:00:00+00:00");
        let full = parse_reference_date("2015-03-01T12:00:00+02:00").expect("rfc3339");
        assert_eq!(full.to_rfc3339(), "2015-03-01T10:00:00+00:00");
        assert!(parse_reference_date("March 1st").is_err());
    }
}
