//! Field classification.
//!
//! Turns a document type's schemas into the list of fields a bulk mutator
//! has to visit for a given scalar type. Fields are found at top level,
//! inside a complex field, or inside each entry of a list-of-complex field.
//! Anything nested deeper is not reported.

use std::fmt;

use tracing::trace;

use crate::model::{FieldDef, FieldPath, FieldType, ScalarType, Schema};

/// Where a matching field sits relative to its top-level field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nesting {
    TopLevel,
    /// Sub-field of a complex field: `parent/sub_field`.
    InComplex { sub_field: String },
    /// Sub-field of every entry of a list-of-complex field:
    /// `parent/<index>/sub_field`.
    InComplexList { sub_field: String },
}

/// A field to mutate, resolved once per document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Prefixed top-level field name; the parent for nested fields.
    pub field: String,
    /// The matching value is a list of scalars rather than a single one.
    pub is_list: bool,
    pub nesting: Nesting,
}

impl FieldDescriptor {
    /// Path to the value for top-level and complex-nested fields; `None`
    /// for fields inside a list-of-complex.
    #[must_use]
    pub fn direct_path(&self) -> Option<FieldPath> {
        match &self.nesting {
            Nesting::TopLevel => Some(FieldPath::field(&self.field)),
            Nesting::InComplex { sub_field } => Some(FieldPath::field(&self.field).child(sub_field)),
            Nesting::InComplexList { .. } => None,
        }
    }

    /// Path to the value inside entry `index` of a list-of-complex field.
    #[must_use]
    pub fn entry_path(&self, index: usize) -> Option<FieldPath> {
        match &self.nesting {
            Nesting::InComplexList { sub_field } => {
                Some(FieldPath::field(&self.field).index(index).child(sub_field))
            }
            _ => None,
        }
    }

    /// Path to the top-level field.
    #[must_use]
    pub fn parent_path(&self) -> FieldPath {
        FieldPath::field(&self.field)
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.nesting {
            Nesting::TopLevel => f.write_str(&self.field)?,
            Nesting::InComplex { sub_field } => write!(f, "{}/{sub_field}", self.field)?,
            Nesting::InComplexList { sub_field } => write!(f, "{}/*/{sub_field}", self.field)?,
        }
        if self.is_list {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

/// Scalar-or-list match of `field_type` against `wanted`.
fn matches(field_type: &FieldType, wanted: ScalarType) -> Option<bool> {
    match field_type {
        FieldType::Scalar(s) if *s == wanted => Some(false),
        FieldType::List(inner) if matches!(**inner, FieldType::Scalar(s) if s == wanted) => {
            Some(true)
        }
        _ => None,
    }
}

fn nested(
    parent: &str,
    subs: &[FieldDef],
    wanted: ScalarType,
    in_list: bool,
    out: &mut Vec<FieldDescriptor>,
) {
    for sub in subs {
        if let Some(is_list) = matches(&sub.field_type, wanted) {
            let sub_field = sub.name.clone();
            out.push(FieldDescriptor {
                field: parent.to_string(),
                is_list,
                nesting: if in_list {
                    Nesting::InComplexList { sub_field }
                } else {
                    Nesting::InComplex { sub_field }
                },
            });
        } else if is_complex_like(&sub.field_type) {
            trace!(parent, sub_field = %sub.name, "skipping field nested two levels deep");
        }
    }
}

fn is_complex_like(field_type: &FieldType) -> bool {
    match field_type {
        FieldType::Complex(_) => true,
        FieldType::List(inner) => matches!(**inner, FieldType::Complex(_)),
        FieldType::Scalar(_) => false,
    }
}

/// Every field of type `wanted` (or list of `wanted`) reachable within one
/// level of nesting, in schema order.
#[must_use]
pub fn classify(schemas: &[&Schema], wanted: ScalarType) -> Vec<FieldDescriptor> {
    let mut out = Vec::new();
    for schema in schemas {
        for def in &schema.fields {
            let field = schema.prefixed(&def.name);
            if let Some(is_list) = matches(&def.field_type, wanted) {
                out.push(FieldDescriptor {
                    field,
                    is_list,
                    nesting: Nesting::TopLevel,
                });
                continue;
            }
            match &def.field_type {
                FieldType::Complex(subs) => nested(&field, subs, wanted, false, &mut out),
                FieldType::List(inner) => {
                    if let FieldType::Complex(subs) = inner.as_ref() {
                        nested(&field, subs, wanted, true, &mut out);
                    }
                }
                FieldType::Scalar(_) => {}
            }
        }
    }
    out
}

/// Date and date-list fields.
#[must_use]
pub fn date_fields(schemas: &[&Schema]) -> Vec<FieldDescriptor> {
    classify(schemas, ScalarType::Date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchemaManager;
    use crate::session::TypeRegistry;

    fn project_dates() -> Vec<String> {
        let types = SchemaManager::builtin();
        date_fields(&types.schemas_for("Project"))
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn classifies_every_shape_of_date_field() {
        assert_eq!(
            project_dates(),
            [
                "dc:created",
                "dc:modified",
                "dc:issued",
                "dc:valid",
                "dc:expired",
                "dp:kickoff",
                "dp:review_dates[]",
                "dp:contract/signed",
                "dp:contract/renewals[]",
                "dp:milestones/*/due",
                "dp:milestones/*/reminders[]",
            ]
        );
    }

    #[test]
    fn two_level_nesting_is_not_reported() {
        assert!(project_dates().iter().all(|d| !d.starts_with("dp:phases")));
    }

    #[test]
    fn types_without_dates_yield_nothing() {
        let schema = Schema {
            name: "plain".into(),
            prefix: "pl".into(),
            fields: vec![FieldDef::scalar("title", ScalarType::String)],
        };
        assert!(date_fields(&[&schema]).is_empty());
        assert_eq!(classify(&[&schema], ScalarType::String).len(), 1);
    }

    #[test]
    fn paths_follow_nesting() {
        let schema = Schema {
            name: "s".into(),
            prefix: "s".into(),
            fields: vec![
                FieldDef::complex("c", vec![FieldDef::scalar("d", ScalarType::Date)]),
                FieldDef::complex_list("l", vec![FieldDef::scalar("d", ScalarType::Date)]),
            ],
        };
        let found = date_fields(&[&schema]);
        assert_eq!(found[0].direct_path().map(|p| p.to_string()), Some("s:c/d".into()));
        assert_eq!(found[0].entry_path(0), None);
        assert_eq!(found[1].direct_path(), None);
        assert_eq!(found[1].entry_path(2).map(|p| p.to_string()), Some("s:l/2/d".into()));
        assert_eq!(found[1].parent_path().to_string(), "s:l");
    }
}
