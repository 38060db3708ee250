//! [`SqliteStore`]: documents as JSON rows, offset paging, explicit
//! `BEGIN`/`COMMIT` units of work and persisted listener flags.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, warn};

use crate::db::{self, DocumentQuery};
use crate::error::{CoreError, Result};
use crate::listeners::{EventListenerList, SaveContext};
use crate::model::{Document, Value};
use crate::session::{DocumentStore, ListenerRegistry, Page, TransactionManager};

/// Principal recorded by the dublincore listener when none is set.
pub const DEFAULT_PRINCIPAL: &str = "Administrator";

/// Reference document store backed by SQLite.
///
/// The connection starts in autocommit mode. [`TransactionManager::start`]
/// opens an explicit transaction that stays open until
/// [`TransactionManager::commit_or_rollback`].
pub struct SqliteStore {
    conn: Connection,
    listeners: RefCell<EventListenerList>,
    principal: String,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("principal", &self.principal)
            .field("autocommit", &self.conn.is_autocommit())
            .finish_non_exhaustive()
    }
}

type RawRow = (String, String, String, String);

impl SqliteStore {
    /// Open the repository at `path`, creating and migrating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::from_connection(db::open_repository(path)?)?)
    }

    /// Throwaway repository for tests and dry runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::from_connection(db::open_in_memory()?)?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let mut listeners = EventListenerList::with_defaults();
        {
            let mut stmt =
                conn.prepare("SELECT name, enabled FROM listeners ORDER BY position, name")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)))?;
            for row in rows {
                let (name, enabled) = row?;
                if !listeners.set_enabled(&name, enabled) {
                    listeners.register(name, enabled, None);
                }
            }
        }
        listeners.recompute_enabled();

        Ok(Self {
            conn,
            listeners: RefCell::new(listeners),
            principal: DEFAULT_PRINCIPAL.to_string(),
        })
    }

    /// Principal recorded as creator/contributor on saves.
    #[must_use]
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = principal.into();
        self
    }

    #[must_use]
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Insert a new document, firing the active listeners first. An empty id
    /// is replaced by a random one.
    ///
    /// # Errors
    ///
    /// Fails on hook, encoding or store errors, including duplicate ids.
    pub fn create_document(&self, mut doc: Document) -> Result<Document> {
        if doc.id.is_empty() {
            doc.id = format!("{:016x}", rand::random::<u64>());
        }
        self.fire_listeners(&mut doc, true)?;

        let fields_json = serde_json::to_string(&doc.fields)?;
        self.conn.execute(
            "INSERT INTO documents (id, doc_type, lifecycle_state, fields_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![doc.id, doc.doc_type, doc.lifecycle_state, fields_json],
        )?;
        Ok(doc)
    }

    /// # Errors
    ///
    /// Fails on store or decoding errors.
    pub fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let raw: Option<RawRow> = self
            .conn
            .query_row(
                "SELECT id, doc_type, lifecycle_state, fields_json FROM documents WHERE id = ?1",
                [id],
                read_raw,
            )
            .optional()?;
        raw.map(decode).transpose()
    }

    /// Document counts per type, ordered by type name.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn count_by_type(&self) -> Result<Vec<(String, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT doc_type, COUNT(*) FROM documents GROUP BY doc_type ORDER BY doc_type")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every registered listener with its enabled flag, in registration order.
    #[must_use]
    pub fn listeners(&self) -> Vec<(String, bool)> {
        self.listeners
            .borrow()
            .descriptors()
            .map(|d| (d.name.clone(), d.enabled))
            .collect()
    }

    /// Listeners that currently fire on save.
    #[must_use]
    pub fn active_listeners(&self) -> Vec<String> {
        self.listeners
            .borrow()
            .active_names()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    fn fire_listeners(&self, doc: &mut Document, is_new: bool) -> Result<()> {
        let ctx = SaveContext {
            principal: &self.principal,
            now: Utc::now(),
            is_new,
        };
        self.listeners.borrow().fire_before_save(doc, &ctx)
    }
}

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode((id, doc_type, lifecycle_state, fields_json): RawRow) -> Result<Document> {
    let fields: BTreeMap<String, Value> = serde_json::from_str(&fields_json)?;
    Ok(Document {
        id,
        doc_type,
        lifecycle_state,
        fields,
    })
}

impl DocumentStore for SqliteStore {
    type Doc = Document;

    fn query_page(&self, query: &str, page_index: usize, page_size: usize) -> Result<Page<Document>> {
        let parsed: DocumentQuery = query.parse()?;
        let (where_sql, where_params) = parsed.where_clause();
        let offset = page_index.saturating_mul(page_size);
        // One extra row tells whether another page follows.
        let sql = format!(
            "SELECT id, doc_type, lifecycle_state, fields_json FROM documents{where_sql}
             ORDER BY seq LIMIT {} OFFSET {offset}",
            page_size.saturating_add(1)
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut raw = stmt
            .query_map(params_from_iter(where_params.iter()), read_raw)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let has_next = raw.len() > page_size;
        raw.truncate(page_size);
        let documents = raw.into_iter().map(decode).collect::<Result<Vec<_>>>()?;
        debug!(query, page_index, fetched = documents.len(), has_next, "fetched page");

        Ok(Page {
            documents,
            has_next,
        })
    }

    fn save(&self, mut doc: Document) -> Result<Document> {
        self.fire_listeners(&mut doc, false)?;

        let fields_json = serde_json::to_string(&doc.fields)?;
        let changed = self.conn.execute(
            "UPDATE documents SET doc_type = ?1, lifecycle_state = ?2, fields_json = ?3
             WHERE id = ?4",
            params![doc.doc_type, doc.lifecycle_state, fields_json, doc.id],
        )?;
        if changed == 0 {
            return Err(CoreError::DocumentNotFound(doc.id));
        }
        Ok(doc)
    }
}

impl TransactionManager for SqliteStore {
    fn commit_or_rollback(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            return Ok(());
        }
        if let Err(err) = self.conn.execute_batch("COMMIT") {
            warn!(error = %err, "commit failed, rolling back");
            if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %rollback_err, "rollback failed");
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn start(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}

impl ListenerRegistry for SqliteStore {
    fn is_enabled(&self, name: &str) -> Result<Option<bool>> {
        Ok(self.listeners.borrow().is_enabled(name))
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        if !self.listeners.borrow_mut().set_enabled(name, enabled) {
            return Ok(());
        }
        self.conn.execute(
            "INSERT INTO listeners (name, enabled, position)
             VALUES (?1, ?2, (SELECT COALESCE(MAX(position), -1) + 1 FROM listeners))
             ON CONFLICT(name) DO UPDATE SET enabled = excluded.enabled",
            params![name, enabled],
        )?;
        Ok(())
    }

    fn recompute_enabled(&self) -> Result<()> {
        self.listeners.borrow_mut().recompute_enabled();
        Ok(())
    }
}
