//! Paged query walker.
//!
//! Streams the results of a query page by page and hands either whole pages
//! or single documents to a callback. The callback can stop the walk early by
//! returning [`WalkStatus::Stop`]. Paging is offset based and makes no
//! guarantee when the matching set changes between fetches.

use tracing::debug;

use crate::error::Result;
use crate::session::DocumentStore;

/// Page size used when the caller passes zero.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Whether a walk should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WalkStatus {
    #[default]
    Continue,
    Stop,
}

impl WalkStatus {
    #[must_use]
    pub const fn is_stop(self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Per-walk hooks. Only the method matching the walk mode is called; the
/// defaults continue.
///
/// Returning an error is a fault, not a stop signal: it propagates out of
/// the run and `on_end` is not called.
pub trait DocumentsCallback<S: DocumentStore> {
    fn on_init(&mut self) {}

    /// # Errors
    ///
    /// Any error aborts the walk.
    fn on_page(&mut self, _store: &S, _documents: Vec<S::Doc>) -> Result<WalkStatus> {
        Ok(WalkStatus::Continue)
    }

    /// # Errors
    ///
    /// Any error aborts the walk.
    fn on_document(&mut self, _store: &S, _document: S::Doc) -> Result<WalkStatus> {
        Ok(WalkStatus::Continue)
    }

    fn on_end(&mut self, _status: WalkStatus) {}
}

/// Counts from a finished walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalkReport {
    /// Pages handed to the callback (document mode counts pages fetched).
    pub pages: usize,
    pub documents: usize,
    pub status: WalkStatus,
}

/// Walks the results of one query.
#[derive(Debug, Clone)]
pub struct PagedQueryWalker {
    query: String,
    page_size: usize,
    page_index: usize,
}

impl PagedQueryWalker {
    /// A `page_size` of zero selects [`DEFAULT_PAGE_SIZE`].
    #[must_use]
    pub fn new(query: impl Into<String>, page_size: usize) -> Self {
        Self {
            query: query.into(),
            page_size: if page_size == 0 {
                DEFAULT_PAGE_SIZE
            } else {
                page_size
            },
            page_index: 0,
        }
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Call `on_page` once per non-empty page, in order.
    ///
    /// # Errors
    ///
    /// Propagates fetch failures and callback faults.
    pub fn run_for_each_page<S, C>(&mut self, store: &S, callback: &mut C) -> Result<WalkReport>
    where
        S: DocumentStore,
        C: DocumentsCallback<S>,
    {
        self.page_index = 0;
        let mut report = WalkReport::default();
        callback.on_init();

        let mut page = store.query_page(&self.query, self.page_index, self.page_size)?;
        while !page.is_empty() {
            report.pages += 1;
            report.documents += page.len();
            debug!(query = %self.query, page = self.page_index, size = page.len(), "walking page");

            let has_next = page.has_next;
            report.status = callback.on_page(store, page.documents)?;
            if report.status.is_stop() || !has_next {
                break;
            }
            self.page_index += 1;
            page = store.query_page(&self.query, self.page_index, self.page_size)?;
        }

        callback.on_end(report.status);
        Ok(report)
    }

    /// Call `on_document` once per result, in page order.
    ///
    /// # Errors
    ///
    /// Propagates fetch failures and callback faults.
    pub fn run_for_each_document<S, C>(
        &mut self,
        store: &S,
        callback: &mut C,
    ) -> Result<WalkReport>
    where
        S: DocumentStore,
        C: DocumentsCallback<S>,
    {
        self.page_index = 0;
        let mut report = WalkReport::default();
        callback.on_init();

        let mut page = store.query_page(&self.query, self.page_index, self.page_size)?;
        'pages: while !page.is_empty() {
            report.pages += 1;
            debug!(query = %self.query, page = self.page_index, size = page.len(), "walking page");

            let has_next = page.has_next;
            for document in page.documents {
                report.documents += 1;
                report.status = callback.on_document(store, document)?;
                if report.status.is_stop() {
                    break 'pages;
                }
            }
            if !has_next {
                break;
            }
            self.page_index += 1;
            page = store.query_page(&self.query, self.page_index, self.page_size)?;
        }

        callback.on_end(report.status);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::model::Document;
    use crate::testing::MemoryStore;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        page_sizes: Vec<usize>,
        seen: usize,
        stop_after: Option<usize>,
        fail_on: Option<usize>,
    }

    impl DocumentsCallback<MemoryStore> for Recorder {
        fn on_init(&mut self) {
            self.events.push("init".into());
        }

        fn on_page(&mut self, _store: &MemoryStore, documents: Vec<Document>) -> Result<WalkStatus> {
            self.page_sizes.push(documents.len());
            self.seen += documents.len();
            if self.fail_on == Some(self.page_sizes.len()) {
                return Err(CoreError::InvalidFieldPath("boom".into()));
            }
            Ok(match self.stop_after {
                Some(limit) if self.seen >= limit => WalkStatus::Stop,
                _ => WalkStatus::Continue,
            })
        }

        fn on_document(&mut self, _store: &MemoryStore, _document: Document) -> Result<WalkStatus> {
            self.seen += 1;
            Ok(match self.stop_after {
                Some(limit) if self.seen >= limit => WalkStatus::Stop,
                _ => WalkStatus::Continue,
            })
        }

        fn on_end(&mut self, status: WalkStatus) {
            self.events.push(format!("end:{status:?}"));
        }
    }

    fn store_with(count: usize) -> MemoryStore {
        let store = MemoryStore::default();
        for _ in 0..count {
            store.insert(Document::new("File"));
        }
        store
    }

    #[test]
    fn zero_page_size_uses_default() {
        assert_eq!(PagedQueryWalker::new("q", 0).page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(PagedQueryWalker::new("q", 7).page_size(), 7);
    }

    #[test]
    fn pages_are_exhaustive_and_ordered() {
        let store = store_with(22);
        let mut recorder = Recorder::default();
        let report = PagedQueryWalker::new("SELECT * FROM File", 5)
            .run_for_each_page(&store, &mut recorder)
            .expect("walk");

        assert_eq!(recorder.page_sizes, [5, 5, 5, 5, 2]);
        assert_eq!(recorder.events, ["init", "end:Continue"]);
        assert_eq!(report.pages, 5);
        assert_eq!(report.documents, 22);
    }

    #[test]
    fn empty_result_calls_init_then_end() {
        let store = store_with(0);
        let mut recorder = Recorder::default();
        let report = PagedQueryWalker::new("SELECT * FROM File", 5)
            .run_for_each_document(&store, &mut recorder)
            .expect("walk");

        assert_eq!(recorder.events, ["init", "end:Continue"]);
        assert_eq!(report, WalkReport::default());
    }

    #[test]
    fn stop_in_page_mode_ends_after_current_page() {
        let store = store_with(22);
        let mut recorder = Recorder {
            stop_after: Some(8),
            ..Recorder::default()
        };
        let report = PagedQueryWalker::new("SELECT * FROM File", 5)
            .run_for_each_page(&store, &mut recorder)
            .expect("walk");

        assert_eq!(recorder.page_sizes, [5, 5]);
        assert_eq!(recorder.events.last().map(String::as_str), Some("end:Stop"));
        assert_eq!(report.status, WalkStatus::Stop);
    }

    #[test]
    fn stop_in_document_mode_short_circuits_both_loops() {
        let store = store_with(22);
        let mut recorder = Recorder {
            stop_after: Some(7),
            ..Recorder::default()
        };
        let report = PagedQueryWalker::new("SELECT * FROM File", 5)
            .run_for_each_document(&store, &mut recorder)
            .expect("walk");

        assert_eq!(recorder.seen, 7);
        assert_eq!(report.documents, 7);
        assert_eq!(report.pages, 2);
        assert_eq!(recorder.events, ["init", "end:Stop"]);
    }

    #[test]
    fn callback_fault_propagates_without_on_end() {
        let store = store_with(12);
        let mut recorder = Recorder {
            fail_on: Some(2),
            ..Recorder::default()
        };
        let err = PagedQueryWalker::new("SELECT * FROM File", 5)
            .run_for_each_page(&store, &mut recorder)
            .expect_err("fault");

        assert!(matches!(err, CoreError::InvalidFieldPath(_)));
        assert_eq!(recorder.events, ["init"]);
    }

    #[test]
    fn rerun_restarts_from_first_page() {
        let store = store_with(6);
        let mut walker = PagedQueryWalker::new("SELECT * FROM File", 4);
        let mut first = Recorder::default();
        walker.run_for_each_page(&store, &mut first).expect("first walk");
        let mut second = Recorder::default();
        walker.run_for_each_page(&store, &mut second).expect("second walk");

        assert_eq!(first.page_sizes, second.page_sizes);
    }
}
