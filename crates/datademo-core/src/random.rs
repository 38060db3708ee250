//! Random creation/modification info.
//!
//! Gives every matching document a plausible history: a creation date some
//! random number of days in the past, a modification date a few days later
//! (never after now), and optionally a random last contributor. The
//! auto-timestamp listener is suspended so the values stick.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::db::DocumentQuery;
use crate::error::Result;
use crate::listeners::dublincore::{CREATED, LAST_CONTRIBUTOR, MODIFIED, add_contributor};
use crate::listeners::{DUBLINCORE_LISTENER, ListenerSuspension};
use crate::model::{FieldPath, Value};
use crate::session::{DocumentAccess, DocumentStore, ListenerRegistry, TransactionManager};
use crate::shift::shift_date;
use crate::txn::{DEFAULT_COMMIT_MODULO, TransactionBoundary};
use crate::walker::{DEFAULT_PAGE_SIZE, DocumentsCallback, PagedQueryWalker, WalkStatus};

/// What to randomize and within which bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomInfoOptions {
    /// Restrict to these types; empty means every type.
    pub doc_types: Vec<String>,
    /// Pick the last contributor among these; empty leaves contributors alone.
    pub users: Vec<String>,
    /// Creation date is now minus a random day count in
    /// `created_from_days..=created_to_days`.
    pub created_from_days: u32,
    pub created_to_days: u32,
    /// Modification date is creation plus `0..=modified_up_to_days` days,
    /// capped at now.
    pub modified_up_to_days: u32,
    pub docs_per_page: usize,
    pub docs_per_transaction: usize,
}

impl Default for RandomInfoOptions {
    fn default() -> Self {
        Self {
            doc_types: Vec::new(),
            users: Vec::new(),
            created_from_days: 0,
            created_to_days: 90,
            modified_up_to_days: 20,
            docs_per_page: DEFAULT_PAGE_SIZE,
            docs_per_transaction: DEFAULT_COMMIT_MODULO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RandomInfoReport {
    pub documents_updated: usize,
    pub commits: usize,
}

/// `date + days`, never later than `cap`. Overflow yields `cap`.
#[must_use]
pub fn add_days_capped(date: DateTime<Utc>, days: i64, cap: DateTime<Utc>) -> DateTime<Utc> {
    shift_date(date, days).map_or(cap, |shifted| shifted.min(cap))
}

/// `now` minus a random whole number of days between `from_days` and
/// `to_days` (in either order), inclusive.
pub fn random_date<R: Rng + ?Sized>(
    rng: &mut R,
    now: DateTime<Utc>,
    from_days: u32,
    to_days: u32,
) -> DateTime<Utc> {
    let (lo, hi) = if from_days <= to_days {
        (from_days, to_days)
    } else {
        (to_days, from_days)
    };
    let days = i64::from(rng.gen_range(lo..=hi));
    shift_date(now, -days).unwrap_or(now)
}

/// Applies random modification info to documents.
#[derive(Debug)]
pub struct RandomModificationInfo {
    options: RandomInfoOptions,
    rng: StdRng,
    now: DateTime<Utc>,
}

impl RandomModificationInfo {
    /// `seed` makes runs reproducible; `None` seeds from the OS.
    #[must_use]
    pub fn new(options: RandomInfoOptions, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            options,
            rng,
            now: Utc::now(),
        }
    }

    /// Reference instant used as "today".
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    #[must_use]
    pub fn query(&self) -> String {
        DocumentQuery::any_of(self.options.doc_types.iter().map(String::as_str)).to_string()
    }

    /// Randomize every matching document, restoring listeners even when a
    /// save fails. On success the restored flags are committed and a fresh
    /// unit of work is left open; on failure the open batch is rolled back
    /// before listeners are restored.
    ///
    /// # Errors
    ///
    /// Propagates store, field and listener registry failures.
    pub fn run<S>(&mut self, store: &S) -> Result<RandomInfoReport>
    where
        S: DocumentStore + TransactionManager + ListenerRegistry,
    {
        let mut suspension = ListenerSuspension::new(store);
        suspension.add_listener(DUBLINCORE_LISTENER);
        suspension.suspend()?;

        let outcome = self.walk(store);
        if outcome.is_err() {
            // Restored flags must not be discarded with the failed batch.
            if let Err(err) = store.rollback() {
                warn!(error = %err, "rollback after failed randomize failed");
            }
        }
        if let Err(err) = suspension.restore() {
            warn!(error = %err, "failed to restore listeners after randomizing");
            if outcome.is_ok() {
                return Err(err);
            }
        }
        let report = outcome?;
        store.commit_or_rollback()?;
        store.start()?;
        info!(documents = report.documents_updated, "random modification info applied");
        Ok(report)
    }

    fn walk<S>(&mut self, store: &S) -> Result<RandomInfoReport>
    where
        S: DocumentStore + TransactionManager,
    {
        let query = self.query();
        let mut boundary = TransactionBoundary::new(store, self.options.docs_per_transaction);
        boundary.flush()?;

        let mut callback = Randomize {
            boundary: &mut boundary,
            options: &self.options,
            rng: &mut self.rng,
            now: self.now,
        };
        let walk = PagedQueryWalker::new(query, self.options.docs_per_page)
            .run_for_each_document(store, &mut callback)?;
        boundary.flush()?;

        Ok(RandomInfoReport {
            documents_updated: walk.documents,
            commits: boundary.commits(),
        })
    }
}

struct Randomize<'a, 's, S> {
    boundary: &'a mut TransactionBoundary<'s, S>,
    options: &'a RandomInfoOptions,
    rng: &'a mut StdRng,
    now: DateTime<Utc>,
}

impl<S> DocumentsCallback<S> for Randomize<'_, '_, S>
where
    S: DocumentStore + TransactionManager,
{
    fn on_document(&mut self, _store: &S, mut doc: S::Doc) -> Result<WalkStatus> {
        let created = random_date(
            &mut *self.rng,
            self.now,
            self.options.created_from_days,
            self.options.created_to_days,
        );
        let extra = i64::from(self.rng.gen_range(0..=self.options.modified_up_to_days));
        let modified = add_days_capped(created, extra, self.now);

        doc.set(&FieldPath::field(CREATED), Value::Date(created))?;
        doc.set(&FieldPath::field(MODIFIED), Value::Date(modified))?;
        if let Some(user) = self.options.users.choose(&mut *self.rng) {
            doc.set(&FieldPath::field(LAST_CONTRIBUTOR), Value::from(user.as_str()))?;
            add_contributor(&mut doc, user)?;
        }

        self.boundary.save_and_count(doc)?;
        Ok(WalkStatus::Continue)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::listeners::dublincore::CONTRIBUTORS;
    use crate::model::Document;
    use crate::testing::MemoryStore;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().expect("valid date")
    }

    #[test]
    fn capped_addition_never_passes_cap() {
        let now = now();
        let start = now - Duration::days(3);
        assert_eq!(add_days_capped(start, 2, now), now - Duration::days(1));
        assert_eq!(add_days_capped(start, 10, now), now);
    }

    #[test]
    fn random_dates_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = now();
        for _ in 0..200 {
            let d = random_date(&mut rng, now, 90, 10);
            assert!(d <= now - Duration::days(10));
            assert!(d >= now - Duration::days(90));
        }
    }

    #[test]
    fn run_sets_dates_and_contributors_on_matching_types() {
        let store = MemoryStore::default();
        let note = store.insert(Document::new("Note"));
        let file = store.insert(Document::new("File"));

        let options = RandomInfoOptions {
            doc_types: vec!["Note".into()],
            users: vec!["alice".into()],
            created_from_days: 5,
            created_to_days: 30,
            modified_up_to_days: 40,
            ..RandomInfoOptions::default()
        };
        let report = RandomModificationInfo::new(options, Some(42))
            .with_now(now())
            .run(&store)
            .expect("run");

        assert_eq!(report.documents_updated, 1);
        let updated = store.get(&note.id).expect("note");
        let created = updated.fields[CREATED].as_date().expect("created");
        let modified = updated.fields[MODIFIED].as_date().expect("modified");
        assert!(created <= now() - Duration::days(5));
        assert!(modified >= created && modified <= now());
        assert_eq!(updated.fields[LAST_CONTRIBUTOR].as_str(), Some("alice"));
        assert_eq!(updated.fields[CONTRIBUTORS], Value::List(vec![Value::from("alice")]));
        assert_eq!(store.get(&file.id), Some(file));
        assert_eq!(store.is_enabled(DUBLINCORE_LISTENER).expect("lookup"), Some(true));
    }

    #[test]
    fn same_seed_gives_same_dates() {
        let run = || {
            let store = MemoryStore::default();
            let doc = store.insert(Document::new("Note"));
            RandomModificationInfo::new(RandomInfoOptions::default(), Some(9))
                .with_now(now())
                .run(&store)
                .expect("run");
            store.get(&doc.id).expect("doc").fields
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn empty_type_list_queries_every_document() {
        let info = RandomModificationInfo::new(RandomInfoOptions::default(), Some(1));
        assert_eq!(info.query(), "SELECT * FROM Document");
    }
}
