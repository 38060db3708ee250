//! Schema and document type descriptions.
//!
//! A document type lists schema names; a schema has a prefix and a list of
//! field definitions. Field types are scalars, lists, or complex values with
//! their own sub-fields. Definitions load from TOML using a compact type
//! syntax:
//!
//! ```toml
//! [[schemas]]
//! name = "invoice"
//! prefix = "inv"
//! fields = [
//!   { name = "due", type = "date" },
//!   { name = "reminders", type = "date[]" },
//!   { name = "lines", type = "complex[]", fields = [{ name = "shipped", type = "date" }] },
//! ]
//!
//! [[types]]
//! name = "Invoice"
//! schemas = ["dublincore", "invoice"]
//! ```

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::session::TypeRegistry;

/// Scalar field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Long,
    Double,
    Boolean,
    Date,
}

impl ScalarType {
    const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Long => "long",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Date => "date",
        }
    }
}

impl FromStr for ScalarType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "long" | "integer" => Ok(Self::Long),
            "double" => Ok(Self::Double),
            "boolean" => Ok(Self::Boolean),
            "date" => Ok(Self::Date),
            other => bail!(
                "unknown scalar type '{other}': expected one of string, long, double, boolean, date"
            ),
        }
    }
}

/// Type of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Scalar(ScalarType),
    List(Box<FieldType>),
    Complex(Vec<FieldDef>),
}

impl FieldType {
    #[must_use]
    pub const fn is_date(&self) -> bool {
        matches!(self, Self::Scalar(ScalarType::Date))
    }

    /// `List(Scalar(Date))`.
    #[must_use]
    pub fn is_date_list(&self) -> bool {
        matches!(self, Self::List(inner) if inner.is_date())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => f.write_str(scalar.name()),
            Self::List(inner) => write!(f, "{inner}[]"),
            Self::Complex(_) => f.write_str("complex"),
        }
    }
}

/// A named field inside a schema or a complex type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FieldSpec", into = "FieldSpec")]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldDef {
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    #[must_use]
    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldType::Scalar(scalar))
    }

    #[must_use]
    pub fn list_of(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldType::List(Box::new(FieldType::Scalar(scalar))))
    }

    #[must_use]
    pub fn complex(name: impl Into<String>, fields: Vec<Self>) -> Self {
        Self::new(name, FieldType::Complex(fields))
    }

    #[must_use]
    pub fn complex_list(name: impl Into<String>, fields: Vec<Self>) -> Self {
        Self::new(name, FieldType::List(Box::new(FieldType::Complex(fields))))
    }
}

/// Serialized form of [`FieldDef`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FieldSpec {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldSpec>,
}

impl TryFrom<FieldSpec> for FieldDef {
    type Error = anyhow::Error;

    fn try_from(spec: FieldSpec) -> Result<Self> {
        let (base, is_list) = spec
            .type_name
            .strip_suffix("[]")
            .map_or((spec.type_name.as_str(), false), |base| (base, true));

        let inner = if base.trim().eq_ignore_ascii_case("complex") {
            let fields = spec
                .fields
                .into_iter()
                .map(Self::try_from)
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("in complex field '{}'", spec.name))?;
            FieldType::Complex(fields)
        } else {
            if !spec.fields.is_empty() {
                bail!("field '{}' lists sub-fields but is not complex", spec.name);
            }
            FieldType::Scalar(base.parse()?)
        };

        let field_type = if is_list {
            FieldType::List(Box::new(inner))
        } else {
            inner
        };

        Ok(Self {
            name: spec.name,
            field_type,
        })
    }
}

impl From<FieldDef> for FieldSpec {
    fn from(def: FieldDef) -> Self {
        let (inner, suffix) = match def.field_type {
            FieldType::List(inner) => (*inner, "[]"),
            other => (other, ""),
        };
        let (base, fields) = match inner {
            FieldType::Complex(fields) => ("complex".to_string(), fields),
            // Lists of lists are not representable; they flatten to the element type.
            other => (other.to_string().trim_end_matches("[]").to_string(), Vec::new()),
        };
        Self {
            name: def.name,
            type_name: format!("{base}{suffix}"),
            fields: fields.into_iter().map(Self::from).collect(),
        }
    }
}

/// A schema: a named, prefixed group of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub prefix: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl Schema {
    /// Prefixed field name as stored on documents (`dc:created`).
    #[must_use]
    pub fn prefixed(&self, field: &str) -> String {
        format!("{}:{field}", self.prefix)
    }
}

/// A document type and the schemas it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentType {
    pub name: String,
    #[serde(default)]
    pub schemas: Vec<String>,
}

/// In-process schema/type registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaManager {
    #[serde(default)]
    pub schemas: Vec<Schema>,
    #[serde(default)]
    pub types: Vec<DocumentType>,
}

impl SchemaManager {
    /// Built-in demo types: `Folder`, `File`, `Note` and `Project`.
    ///
    /// `Project` carries `demo_project`, which exercises every date field
    /// shape, including a two-level nesting (`dp:phases/*/window/start`) that
    /// bulk mutators leave alone.
    #[must_use]
    pub fn builtin() -> Self {
        use ScalarType::{Date, String as Str};

        let dublincore = Schema {
            name: "dublincore".into(),
            prefix: "dc".into(),
            fields: vec![
                FieldDef::scalar("title", Str),
                FieldDef::scalar("description", Str),
                FieldDef::scalar("creator", Str),
                FieldDef::scalar("lastContributor", Str),
                FieldDef::list_of("contributors", Str),
                FieldDef::list_of("subjects", Str),
                FieldDef::scalar("created", Date),
                FieldDef::scalar("modified", Date),
                FieldDef::scalar("issued", Date),
                FieldDef::scalar("valid", Date),
                FieldDef::scalar("expired", Date),
            ],
        };
        let common = Schema {
            name: "common".into(),
            prefix: "common".into(),
            fields: vec![FieldDef::scalar("icon", Str)],
        };
        let file = Schema {
            name: "file".into(),
            prefix: "file".into(),
            fields: vec![
                FieldDef::scalar("filename", Str),
                FieldDef::scalar("size", ScalarType::Long),
            ],
        };
        let demo_project = Schema {
            name: "demo_project".into(),
            prefix: "dp".into(),
            fields: vec![
                FieldDef::scalar("code", Str),
                FieldDef::scalar("kickoff", Date),
                FieldDef::list_of("review_dates", Date),
                FieldDef::complex(
                    "contract",
                    vec![
                        FieldDef::scalar("owner", Str),
                        FieldDef::scalar("signed", Date),
                        FieldDef::list_of("renewals", Date),
                    ],
                ),
                FieldDef::complex_list(
                    "milestones",
                    vec![
                        FieldDef::scalar("label", Str),
                        FieldDef::scalar("due", Date),
                        FieldDef::list_of("reminders", Date),
                    ],
                ),
                FieldDef::complex_list(
                    "phases",
                    vec![
                        FieldDef::scalar("name", Str),
                        FieldDef::complex("window", vec![FieldDef::scalar("start", Date)]),
                    ],
                ),
            ],
        };

        let doc_type = |name: &str, schemas: &[&str]| DocumentType {
            name: name.to_string(),
            schemas: schemas.iter().map(ToString::to_string).collect(),
        };

        Self {
            schemas: vec![dublincore, common, file, demo_project],
            types: vec![
                doc_type("Folder", &["dublincore", "common"]),
                doc_type("File", &["dublincore", "common", "file"]),
                doc_type("Note", &["dublincore", "common"]),
                doc_type("Project", &["dublincore", "common", "demo_project"]),
            ],
        }
    }

    /// Parse schema/type definitions from TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or a field type is unknown.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("parse schema definitions")
    }

    /// Add or replace schemas and types from `other`, matched by name.
    pub fn merge(&mut self, other: Self) {
        for schema in other.schemas {
            match self.schemas.iter_mut().find(|s| s.name == schema.name) {
                Some(existing) => *existing = schema,
                None => self.schemas.push(schema),
            }
        }
        for doc_type in other.types {
            match self.types.iter_mut().find(|t| t.name == doc_type.name) {
                Some(existing) => *existing = doc_type,
                None => self.types.push(doc_type),
            }
        }
    }

    #[must_use]
    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.name == name)
    }

    #[must_use]
    pub fn document_type(&self, name: &str) -> Option<&DocumentType> {
        self.types.iter().find(|t| t.name == name)
    }
}

impl TypeRegistry for SchemaManager {
    fn document_types(&self) -> Vec<&DocumentType> {
        self.types.iter().collect()
    }

    fn schemas_for(&self, doc_type: &str) -> Vec<&Schema> {
        let Some(ty) = self.document_type(doc_type) else {
            return Vec::new();
        };
        ty.schemas
            .iter()
            .filter_map(|name| {
                let schema = self.schema(name);
                if schema.is_none() {
                    tracing::warn!(doc_type, schema = %name, "document type references unknown schema");
                }
                schema
            })
            .collect()
    }
}
