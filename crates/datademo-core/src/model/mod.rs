//! Document model: values, field paths, documents and schema descriptions.

pub mod document;
pub mod path;
pub mod schema;
pub mod value;

pub use document::Document;
pub use path::{FieldPath, Segment};
pub use schema::{DocumentType, FieldDef, FieldType, ScalarType, Schema, SchemaManager};
pub use value::Value;
