//! In-memory session used by unit tests.

use std::cell::{Cell, RefCell};

use crate::db::DocumentQuery;
use crate::error::{CoreError, Result};
use crate::listeners::EventListenerList;
use crate::model::Document;
use crate::session::{DocumentStore, ListenerRegistry, Page, TransactionManager};

/// Records saves, commits and listener toggles. Saves apply immediately;
/// commit counts are tracked only for assertions.
pub struct MemoryStore {
    docs: RefCell<Vec<Document>>,
    listeners: RefCell<EventListenerList>,
    next_id: Cell<usize>,
    pending_saves: Cell<usize>,
    committed_saves: Cell<usize>,
    commits: Cell<usize>,
    starts: Cell<usize>,
    recomputes: Cell<usize>,
    set_enabled_calls: Cell<usize>,
    fail_commit_after: Cell<Option<usize>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            docs: RefCell::new(Vec::new()),
            listeners: RefCell::new(EventListenerList::with_defaults()),
            next_id: Cell::new(0),
            pending_saves: Cell::new(0),
            committed_saves: Cell::new(0),
            commits: Cell::new(0),
            starts: Cell::new(0),
            recomputes: Cell::new(0),
            set_enabled_calls: Cell::new(0),
            fail_commit_after: Cell::new(None),
        }
    }
}

impl MemoryStore {
    /// Store `doc` with a sequential id, bypassing listeners.
    pub fn insert(&self, mut doc: Document) -> Document {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        doc.id = format!("doc-{id:04}");
        self.docs.borrow_mut().push(doc.clone());
        doc
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.docs.borrow().iter().find(|d| d.id == id).cloned()
    }

    pub fn register_listener(&self, name: &str, enabled: bool) {
        let mut list = self.listeners.borrow_mut();
        list.register(name, enabled, None);
        list.recompute_enabled();
    }

    pub fn active_listeners(&self) -> Vec<String> {
        self.listeners
            .borrow()
            .active_names()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Let `n` commits succeed, then fail every later one.
    pub fn fail_commit_after(&self, n: usize) {
        self.fail_commit_after.set(Some(n));
    }

    pub fn commit_count(&self) -> usize {
        self.commits.get()
    }

    pub fn start_count(&self) -> usize {
        self.starts.get()
    }

    pub fn save_count(&self) -> usize {
        self.committed_saves.get() + self.pending_saves.get()
    }

    pub fn committed_saves(&self) -> usize {
        self.committed_saves.get()
    }

    pub fn recompute_count(&self) -> usize {
        self.recomputes.get()
    }

    pub fn set_enabled_calls(&self) -> usize {
        self.set_enabled_calls.get()
    }
}

impl DocumentStore for MemoryStore {
    type Doc = Document;

    fn query_page(&self, query: &str, page_index: usize, page_size: usize) -> Result<Page<Document>> {
        let parsed: DocumentQuery = query.parse()?;
        let docs = self.docs.borrow();
        let matching: Vec<&Document> = docs
            .iter()
            .filter(|d| parsed.matches(&d.doc_type, &d.lifecycle_state))
            .collect();
        let start = page_index * page_size;
        let documents: Vec<Document> = matching
            .iter()
            .skip(start)
            .take(page_size)
            .map(|d| (*d).clone())
            .collect();
        Ok(Page {
            has_next: start + documents.len() < matching.len(),
            documents,
        })
    }

    fn save(&self, doc: Document) -> Result<Document> {
        let mut docs = self.docs.borrow_mut();
        let slot = docs
            .iter_mut()
            .find(|d| d.id == doc.id)
            .ok_or_else(|| CoreError::DocumentNotFound(doc.id.clone()))?;
        *slot = doc.clone();
        self.pending_saves.set(self.pending_saves.get() + 1);
        Ok(doc)
    }
}

impl TransactionManager for MemoryStore {
    fn commit_or_rollback(&self) -> Result<()> {
        if let Some(limit) = self.fail_commit_after.get() {
            if self.commits.get() >= limit {
                self.pending_saves.set(0);
                return Err(CoreError::Store(rusqlite::Error::InvalidQuery));
            }
        }
        self.committed_saves
            .set(self.committed_saves.get() + self.pending_saves.get());
        self.pending_saves.set(0);
        self.commits.set(self.commits.get() + 1);
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.starts.set(self.starts.get() + 1);
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.pending_saves.set(0);
        Ok(())
    }
}

impl ListenerRegistry for MemoryStore {
    fn is_enabled(&self, name: &str) -> Result<Option<bool>> {
        Ok(self.listeners.borrow().is_enabled(name))
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        self.set_enabled_calls.set(self.set_enabled_calls.get() + 1);
        self.listeners.borrow_mut().set_enabled(name, enabled);
        Ok(())
    }

    fn recompute_enabled(&self) -> Result<()> {
        self.recomputes.set(self.recomputes.get() + 1);
        self.listeners.borrow_mut().recompute_enabled();
        Ok(())
    }
}
