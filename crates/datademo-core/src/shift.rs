//! Bulk date shifting.
//!
//! [`DateShifter`] moves every date field of every document forward by a
//! whole number of days so an aging demo repository looks current again.
//! It visits each document type whose schemas carry date fields, walks the
//! matching documents page by page, and saves through a
//! [`TransactionBoundary`] with the auto-timestamp listener suspended so
//! `dc:modified` is shifted rather than overwritten.
//!
//! Arithmetic is done on absolute milliseconds (`days × 86_400_000`), never
//! on calendar days, so instants keep their wall-clock distance across DST
//! changes.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::db::DocumentQuery;
use crate::error::{CoreError, Result};
use crate::fields::{FieldDescriptor, Nesting, date_fields};
use crate::listeners::{DUBLINCORE_LISTENER, ListenerSuspension};
use crate::model::{FieldPath, Value};
use crate::session::{
    DocumentAccess, DocumentStore, ListenerRegistry, ProgressSink, TransactionManager,
    TypeRegistry,
};
use crate::txn::{DEFAULT_COMMIT_MODULO, TransactionBoundary};
use crate::walker::{DEFAULT_PAGE_SIZE, DocumentsCallback, PagedQueryWalker, WalkStatus};

pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Documents between two progress log lines when the caller passes zero.
pub const DEFAULT_LOG_EVERY_N_DOCS: usize = 500;

/// Status reported to the progress sink while a shift runs.
pub const RUNNING_STATUS: &str = "Updating all dates";

/// Status reported to the progress sink once a shift completes.
pub const DONE_STATUS: &str = "Updating all dates: Done";

/// Tuning knobs for a shift run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftOptions {
    pub docs_per_page: usize,
    pub docs_per_transaction: usize,
    pub log_every_n_docs: usize,
    /// Emit per-type and progress `info` lines.
    pub do_log: bool,
    /// Listeners suspended in addition to the dublincore listener.
    pub extra_listeners: Vec<String>,
}

impl Default for ShiftOptions {
    fn default() -> Self {
        Self {
            docs_per_page: DEFAULT_PAGE_SIZE,
            docs_per_transaction: DEFAULT_COMMIT_MODULO,
            log_every_n_docs: DEFAULT_LOG_EVERY_N_DOCS,
            do_log: true,
            extra_listeners: Vec::new(),
        }
    }
}

/// Lifecycle of one [`DateShifter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftState {
    Idle,
    ScanningTypes,
    ProcessingType,
    Done,
    Rejected,
}

/// Per-type outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeReport {
    pub doc_type: String,
    pub date_fields: usize,
    pub pages: usize,
    pub documents: usize,
}

/// Outcome of a shift run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShiftReport {
    pub days: i64,
    /// The shift was under one day; nothing was touched.
    pub rejected: bool,
    pub types: Vec<TypeReport>,
    pub documents_updated: usize,
    pub commits: usize,
}

impl ShiftReport {
    #[must_use]
    pub fn types_processed(&self) -> usize {
        self.types.len()
    }
}

/// Shifts every date field of every document by a fixed number of days.
pub struct DateShifter {
    days: i64,
    options: ShiftOptions,
    progress: Option<Arc<dyn ProgressSink + Send + Sync>>,
    state: ShiftState,
}

impl std::fmt::Debug for DateShifter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateShifter")
            .field("days", &self.days)
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl DateShifter {
    #[must_use]
    pub fn by_days(days: i64) -> Self {
        Self {
            days,
            options: ShiftOptions::default(),
            progress: None,
            state: ShiftState::Idle,
        }
    }

    /// Shift by the whole days elapsed between `last_update` and `now`.
    /// Less than one full day, or a reference in the future, yields zero.
    #[must_use]
    pub fn since(last_update: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let elapsed = now.signed_duration_since(last_update).num_milliseconds();
        let days = if elapsed < MILLIS_PER_DAY {
            0
        } else {
            elapsed / MILLIS_PER_DAY
        };
        Self::by_days(days)
    }

    #[must_use]
    pub fn with_options(mut self, options: ShiftOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink + Send + Sync>) -> Self {
        self.progress = Some(sink);
        self
    }

    #[must_use]
    pub const fn days(&self) -> i64 {
        self.days
    }

    #[must_use]
    pub const fn state(&self) -> ShiftState {
        self.state
    }

    #[must_use]
    pub const fn options(&self) -> &ShiftOptions {
        &self.options
    }

    /// Run the shift with a suspension owned by this call.
    ///
    /// On success the shifted documents and the restored listener flags are
    /// committed, and an empty unit of work is left open. A failure leaves
    /// the suspended listeners disabled; use
    /// [`DateShifter::run_with`] to restore them on error.
    ///
    /// # Errors
    ///
    /// Propagates store, field and listener registry failures.
    pub fn run<S, T>(&mut self, store: &S, types: &T) -> Result<ShiftReport>
    where
        S: DocumentStore + TransactionManager + ListenerRegistry,
        T: TypeRegistry + ?Sized,
    {
        let mut suspension = ListenerSuspension::new(store);
        self.run_with(store, types, &mut suspension)
    }

    /// Run the shift using the caller's suspension, so the caller can
    /// restore listeners if this fails midway.
    ///
    /// # Errors
    ///
    /// Propagates store, field and listener registry failures.
    pub fn run_with<S, T>(
        &mut self,
        store: &S,
        types: &T,
        suspension: &mut ListenerSuspension<'_, S>,
    ) -> Result<ShiftReport>
    where
        S: DocumentStore + TransactionManager + ListenerRegistry,
        T: TypeRegistry + ?Sized,
    {
        if self.days < 1 {
            self.state = ShiftState::Rejected;
            warn!(
                days = self.days,
                "shift is in the future or under one day, no update done"
            );
            return Ok(ShiftReport {
                days: self.days,
                rejected: true,
                ..ShiftReport::default()
            });
        }

        if self.options.do_log {
            info!(days = self.days, "increasing all dates");
        }
        suspension
            .add_listener(DUBLINCORE_LISTENER)
            .add_listeners(&self.options.extra_listeners);
        suspension.suspend()?;
        if self.options.do_log {
            info!(listeners = ?suspension.names(), "listeners suspended");
        }

        self.state = ShiftState::ScanningTypes;
        let mut report = ShiftReport {
            days: self.days,
            ..ShiftReport::default()
        };
        let mut boundary = TransactionBoundary::new(store, self.options.docs_per_transaction);
        let mut progress = Progress::new(&self.options);

        for doc_type in types.document_types() {
            let descriptors = date_fields(&types.schemas_for(&doc_type.name));
            if descriptors.is_empty() {
                continue;
            }
            let query = DocumentQuery::all_of(&doc_type.name).to_string();
            if store.query_page(&query, 0, 1)?.is_empty() {
                debug!(doc_type = %doc_type.name, "no documents, skipping type");
                continue;
            }

            self.state = ShiftState::ProcessingType;
            if self.options.do_log {
                info!(doc_type = %doc_type.name, fields = descriptors.len(), "updating dates");
            }
            if let Some(sink) = &self.progress {
                sink.set_status(&format!("{RUNNING_STATUS}: {}", doc_type.name));
            }

            let mut pages = ShiftPages {
                boundary: &mut boundary,
                descriptors: &descriptors,
                days: self.days,
                progress: &mut progress,
            };
            let walk = PagedQueryWalker::new(query, self.options.docs_per_page)
                .run_for_each_page(store, &mut pages)?;

            if self.options.do_log {
                info!(doc_type = %doc_type.name, documents = walk.documents, "documents updated");
            }
            report.documents_updated += walk.documents;
            report.types.push(TypeReport {
                doc_type: doc_type.name.clone(),
                date_fields: descriptors.len(),
                pages: walk.pages,
                documents: walk.documents,
            });
            self.state = ShiftState::ScanningTypes;
        }

        suspension.restore()?;
        // The last page flush reopened a unit of work; the restored flags
        // live in it until this commit.
        boundary.flush()?;
        if self.options.do_log {
            info!(documents = report.documents_updated, "listeners restored, shift complete");
        }
        report.commits = boundary.commits();
        self.state = ShiftState::Done;
        if let Some(sink) = &self.progress {
            sink.set_status(DONE_STATUS);
        }
        Ok(report)
    }
}

struct Progress {
    every: usize,
    enabled: bool,
    updated: usize,
}

impl Progress {
    const fn new(options: &ShiftOptions) -> Self {
        Self {
            every: if options.log_every_n_docs == 0 {
                DEFAULT_LOG_EVERY_N_DOCS
            } else {
                options.log_every_n_docs
            },
            enabled: options.do_log,
            updated: 0,
        }
    }

    fn tick(&mut self) {
        self.updated += 1;
        if self.enabled && self.updated % self.every == 0 {
            info!(total = self.updated, "dates shifted on {} documents", self.updated);
        }
    }
}

/// Page callback: flush, shift and save every document, flush again.
struct ShiftPages<'a, 's, S> {
    boundary: &'a mut TransactionBoundary<'s, S>,
    descriptors: &'a [FieldDescriptor],
    days: i64,
    progress: &'a mut Progress,
}

impl<S> DocumentsCallback<S> for ShiftPages<'_, '_, S>
where
    S: DocumentStore + TransactionManager,
{
    fn on_page(&mut self, _store: &S, documents: Vec<S::Doc>) -> Result<WalkStatus> {
        self.boundary.flush()?;
        for mut doc in documents {
            shift_fields(&mut doc, self.descriptors, self.days)?;
            self.boundary.save_and_count(doc)?;
            self.progress.tick();
        }
        self.boundary.flush()?;
        Ok(WalkStatus::Continue)
    }
}

/// Shift every field named by `descriptors` on `doc` by `days` (which may
/// be negative). Unset fields and null list entries are left alone.
///
/// Dates inside list-of-complex fields are handled two ways: a single date
/// sub-field is rewritten in every entry and the whole list written back;
/// a date-list sub-field is updated entry by entry through `parent/<i>/sub`.
///
/// # Errors
///
/// Returns [`CoreError::TypeMismatch`] when a value does not have the
/// classified shape and [`CoreError::DateOutOfRange`] on overflow.
pub fn shift_fields<D: DocumentAccess>(
    doc: &mut D,
    descriptors: &[FieldDescriptor],
    days: i64,
) -> Result<()> {
    for descriptor in descriptors {
        match &descriptor.nesting {
            Nesting::TopLevel | Nesting::InComplex { .. } => {
                if let Some(path) = descriptor.direct_path() {
                    shift_at(doc, &path, descriptor.is_list, days)?;
                }
            }
            Nesting::InComplexList { sub_field } => {
                let parent = descriptor.parent_path();
                let mut entries = match doc.get(&parent)? {
                    Value::Null => continue,
                    Value::List(entries) => entries,
                    other => return Err(mismatch(&parent, "list", &other)),
                };
                if entries.is_empty() {
                    continue;
                }

                if descriptor.is_list {
                    for index in 0..entries.len() {
                        if let Some(path) = descriptor.entry_path(index) {
                            shift_at(doc, &path, true, days)?;
                        }
                    }
                } else {
                    for (index, entry) in entries.iter_mut().enumerate() {
                        let Value::Complex(map) = entry else {
                            continue;
                        };
                        if let Some(value) = map.get_mut(sub_field) {
                            let path = parent.clone().index(index).child(sub_field);
                            *value = shift_value(value, &path, days)?;
                        }
                    }
                    doc.set(&parent, Value::List(entries))?;
                }
            }
        }
    }
    Ok(())
}

fn shift_at<D: DocumentAccess>(doc: &mut D, path: &FieldPath, is_list: bool, days: i64) -> Result<()> {
    let current = doc.get(path)?;
    let shifted = match (is_list, &current) {
        (_, Value::Null) => return Ok(()),
        (false, Value::Date(_)) => shift_value(&current, path, days)?,
        (true, Value::List(items)) => {
            if items.is_empty() {
                return Ok(());
            }
            Value::List(
                items
                    .iter()
                    .map(|item| shift_value(item, path, days))
                    .collect::<Result<_>>()?,
            )
        }
        (true, other) => return Err(mismatch(path, "list", other)),
        (false, other) => return Err(mismatch(path, "date", other)),
    };
    doc.set(path, shifted)
}

fn shift_value(value: &Value, path: &FieldPath, days: i64) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Date(date) => shift_date(*date, days)
            .map(Value::Date)
            .ok_or_else(|| CoreError::DateOutOfRange {
                path: path.to_string(),
                days,
            }),
        other => Err(mismatch(path, "date", other)),
    }
}

/// `date + days × 86_400_000 ms`, or `None` when out of range.
#[must_use]
pub fn shift_date(date: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    let millis = days.checked_mul(MILLIS_PER_DAY)?;
    date.checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

fn mismatch(path: &FieldPath, expected: &'static str, found: &Value) -> CoreError {
    CoreError::TypeMismatch {
        path: path.to_string(),
        expected,
        found: found.kind_name(),
    }
}
