//! Dublin Core auto-timestamp listener.

use crate::error::{CoreError, Result};
use crate::listeners::registry::{BeforeSaveHook, SaveContext};
use crate::model::{Document, FieldPath, Value};
use crate::session::DocumentAccess;

pub const CREATED: &str = "dc:created";
pub const CREATOR: &str = "dc:creator";
pub const MODIFIED: &str = "dc:modified";
pub const LAST_CONTRIBUTOR: &str = "dc:lastContributor";
pub const CONTRIBUTORS: &str = "dc:contributors";

/// Stamps creation info on first save, and modification info plus the
/// contributor list on every save.
#[derive(Debug, Clone, Copy, Default)]
pub struct DublinCoreHook;

impl BeforeSaveHook for DublinCoreHook {
    fn before_save(&self, doc: &mut Document, ctx: &SaveContext<'_>) -> Result<()> {
        if ctx.is_new {
            let created = FieldPath::field(CREATED);
            if doc.get_path(&created)?.is_null() {
                doc.set_path(&created, Value::Date(ctx.now))?;
            }
            let creator = FieldPath::field(CREATOR);
            if doc.get_path(&creator)?.is_null() {
                doc.set_path(&creator, Value::from(ctx.principal))?;
            }
        }

        doc.set_path(&FieldPath::field(MODIFIED), Value::Date(ctx.now))?;
        doc.set_path(
            &FieldPath::field(LAST_CONTRIBUTOR),
            Value::from(ctx.principal),
        )?;
        add_contributor(doc, ctx.principal)
    }
}

/// Append `user` to `dc:contributors` unless already listed.
///
/// # Errors
///
/// Fails when `dc:contributors` holds something other than a list.
pub fn add_contributor<D: DocumentAccess + ?Sized>(doc: &mut D, user: &str) -> Result<()> {
    let path = FieldPath::field(CONTRIBUTORS);
    let mut contributors = match doc.get(&path)? {
        Value::Null => Vec::new(),
        Value::List(items) => items,
        other => {
            return Err(CoreError::TypeMismatch {
                path: CONTRIBUTORS.to_string(),
                expected: "list",
                found: other.kind_name(),
            });
        }
    };
    if !contributors.iter().any(|v| v.as_str() == Some(user)) {
        contributors.push(Value::from(user));
        doc.set(&path, Value::List(contributors))?;
    }
    Ok(())
}
