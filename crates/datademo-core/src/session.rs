//! Capabilities the bulk-update core needs from a document repository.
//!
//! Every method takes `&self`: one session handle is shared by the walker,
//! the transaction boundary and the mutators for the duration of a run, so
//! implementations keep their mutable state behind interior mutability.

use crate::error::Result;
use crate::model::{DocumentType, FieldPath, Schema, Value};

/// One bounded batch of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<D> {
    pub documents: Vec<D>,
    pub has_next: bool,
}

impl<D> Page<D> {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            documents: Vec::new(),
            has_next: false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Field access on a loaded document.
pub trait DocumentAccess {
    fn id(&self) -> &str;

    fn doc_type(&self) -> &str;

    /// Read the value at `path`; unset fields read as [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Fails when the path does not fit the stored value.
    fn get(&self, path: &FieldPath) -> Result<Value>;

    /// Write `value` at `path`.
    ///
    /// # Errors
    ///
    /// Fails when the path does not fit the stored value.
    fn set(&mut self, path: &FieldPath, value: Value) -> Result<()>;
}

/// Paged query execution and persistence.
pub trait DocumentStore {
    type Doc: DocumentAccess;

    /// Fetch page `page_index` (0-based) of `query` results, `page_size`
    /// documents at most.
    ///
    /// # Errors
    ///
    /// Fails on malformed queries and store faults.
    fn query_page(&self, query: &str, page_index: usize, page_size: usize)
    -> Result<Page<Self::Doc>>;

    /// Persist `doc` and return the stored version.
    ///
    /// # Errors
    ///
    /// Fails on store faults or when the document no longer exists.
    fn save(&self, doc: Self::Doc) -> Result<Self::Doc>;
}

/// Unit-of-work control.
pub trait TransactionManager {
    /// Commit the current unit of work, or roll it back if the commit fails.
    ///
    /// # Errors
    ///
    /// Returns the commit failure after rolling back.
    fn commit_or_rollback(&self) -> Result<()>;

    /// Begin a new unit of work.
    ///
    /// # Errors
    ///
    /// Fails on store faults.
    fn start(&self) -> Result<()>;

    /// Discard the current unit of work.
    ///
    /// # Errors
    ///
    /// Fails on store faults.
    fn rollback(&self) -> Result<()>;
}

/// Named side-effecting listeners with enabled flags.
pub trait ListenerRegistry {
    /// `None` when no listener of that name is registered.
    ///
    /// # Errors
    ///
    /// Fails on store faults.
    fn is_enabled(&self, name: &str) -> Result<Option<bool>>;

    /// # Errors
    ///
    /// Fails on store faults.
    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()>;

    /// Rebuild the effective (active) listener set after flag changes.
    ///
    /// # Errors
    ///
    /// Fails on store faults.
    fn recompute_enabled(&self) -> Result<()>;

    /// # Errors
    ///
    /// Fails on store faults.
    fn is_registered(&self, name: &str) -> Result<bool> {
        Ok(self.is_enabled(name)?.is_some())
    }
}

/// Document types and the schemas they carry.
pub trait TypeRegistry {
    fn document_types(&self) -> Vec<&DocumentType>;

    fn schemas_for(&self, doc_type: &str) -> Vec<&Schema>;
}

/// Receives human-readable status lines from long runs.
pub trait ProgressSink {
    fn set_status(&self, status: &str);
}
