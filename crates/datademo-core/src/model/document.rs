use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::model::path::{FieldPath, Segment};
use crate::model::value::Value;
use crate::session::DocumentAccess;

/// Lifecycle state given to newly created documents.
pub const DEFAULT_LIFECYCLE_STATE: &str = "project";

/// A repository document: id, type, lifecycle state and top-level fields
/// keyed by prefixed name (`dc:title`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub doc_type: String,
    pub lifecycle_state: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Document {
    /// New, not yet persisted document. The store assigns an id on create
    /// when `id` is empty.
    #[must_use]
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            doc_type: doc_type.into(),
            lifecycle_state: DEFAULT_LIFECYCLE_STATE.to_string(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style top-level field assignment.
    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Read the value at `path`. Unset fields and unset sub-fields read as
    /// [`Value::Null`]; an index past the end of a list is an error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FieldNotFound`] for out-of-range indexes and
    /// [`CoreError::TypeMismatch`] when a segment does not fit the value.
    pub fn get_path(&self, path: &FieldPath) -> Result<Value> {
        let Some(mut current) = self.fields.get(path.root()) else {
            return Ok(Value::Null);
        };

        for segment in path.segments() {
            current = match (segment, current) {
                (_, Value::Null) => return Ok(Value::Null),
                (Segment::Name(name), Value::Complex(map)) => match map.get(name) {
                    Some(v) => v,
                    None => return Ok(Value::Null),
                },
                (Segment::Index(index), Value::List(items)) => {
                    items.get(*index).ok_or_else(|| self.not_found(path))?
                }
                (Segment::Name(_), other) => return Err(mismatch(path, "complex", other)),
                (Segment::Index(_), other) => return Err(mismatch(path, "list", other)),
            };
        }

        Ok(current.clone())
    }

    /// Write `value` at `path`, creating intermediate complex values for
    /// named segments. Indexed segments must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FieldNotFound`] for out-of-range indexes and
    /// [`CoreError::TypeMismatch`] when a segment does not fit the value.
    pub fn set_path(&mut self, path: &FieldPath, value: Value) -> Result<()> {
        let doc_id = self.id.clone();
        let not_found = || CoreError::FieldNotFound {
            doc_id: doc_id.clone(),
            path: path.to_string(),
        };
        // Work on a copy so a failed write leaves no placeholder behind.
        let mut root = self.fields.get(path.root()).cloned().unwrap_or_default();
        let mut current = &mut root;

        for segment in path.segments() {
            current = match segment {
                Segment::Name(name) => {
                    if current.is_null() {
                        *current = Value::Complex(BTreeMap::new());
                    }
                    match current {
                        Value::Complex(map) => map.entry(name.clone()).or_insert(Value::Null),
                        other => return Err(mismatch(path, "complex", other)),
                    }
                }
                Segment::Index(index) => match current {
                    Value::List(items) => items.get_mut(*index).ok_or_else(not_found)?,
                    other => return Err(mismatch(path, "list", other)),
                },
            };
        }

        *current = value;
        self.fields.insert(path.root().to_string(), root);
        Ok(())
    }

    fn not_found(&self, path: &FieldPath) -> CoreError {
        CoreError::FieldNotFound {
            doc_id: self.id.clone(),
            path: path.to_string(),
        }
    }
}

fn mismatch(path: &FieldPath, expected: &'static str, found: &Value) -> CoreError {
    CoreError::TypeMismatch {
        path: path.to_string(),
        expected,
        found: found.kind_name(),
    }
}

impl DocumentAccess for Document {
    fn id(&self) -> &str {
        &self.id
    }

    fn doc_type(&self) -> &str {
        &self.doc_type
    }

    fn get(&self, path: &FieldPath) -> Result<Value> {
        self.get_path(path)
    }

    fn set(&mut self, path: &FieldPath, value: Value) -> Result<()> {
        self.set_path(path, value)
    }
}
