//! Batched unit-of-work control for bulk saves.

use tracing::debug;

use crate::error::Result;
use crate::session::{DocumentStore, TransactionManager};

/// Saves per commit when the caller passes zero.
pub const DEFAULT_COMMIT_MODULO: usize = 50;

/// Counts saves and commits the unit of work every `commit_modulo` saves.
///
/// The boundary never retries: a failed commit propagates, batches that were
/// already committed stay committed, and the failing batch is lost.
#[derive(Debug)]
pub struct TransactionBoundary<'s, S> {
    store: &'s S,
    commit_modulo: usize,
    pending: usize,
    saves: usize,
    commits: usize,
}

impl<'s, S> TransactionBoundary<'s, S>
where
    S: DocumentStore + TransactionManager,
{
    /// A `commit_modulo` of zero selects [`DEFAULT_COMMIT_MODULO`].
    #[must_use]
    pub const fn new(store: &'s S, commit_modulo: usize) -> Self {
        Self {
            store,
            commit_modulo: if commit_modulo == 0 {
                DEFAULT_COMMIT_MODULO
            } else {
                commit_modulo
            },
            pending: 0,
            saves: 0,
            commits: 0,
        }
    }

    /// Save `doc`, committing and starting a new unit of work when the
    /// pending count reaches `commit_modulo`.
    ///
    /// # Errors
    ///
    /// Propagates save and commit failures.
    pub fn save_and_count(&mut self, doc: S::Doc) -> Result<S::Doc> {
        let saved = self.store.save(doc)?;
        self.pending += 1;
        self.saves += 1;
        if self.pending >= self.commit_modulo {
            self.commit()?;
        }
        Ok(saved)
    }

    /// Commit and start a new unit of work regardless of the pending count.
    ///
    /// # Errors
    ///
    /// Propagates commit failures.
    pub fn flush(&mut self) -> Result<()> {
        self.commit()
    }

    fn commit(&mut self) -> Result<()> {
        debug!(pending = self.pending, "committing batch");
        self.store.commit_or_rollback()?;
        self.store.start()?;
        self.pending = 0;
        self.commits += 1;
        Ok(())
    }

    #[must_use]
    pub const fn commit_modulo(&self) -> usize {
        self.commit_modulo
    }

    /// Saves since the last commit.
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.pending
    }

    #[must_use]
    pub const fn saves(&self) -> usize {
        self.saves
    }

    /// Commits issued, flushes included.
    #[must_use]
    pub const fn commits(&self) -> usize {
        self.commits
    }
}
