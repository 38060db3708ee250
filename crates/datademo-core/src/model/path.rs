//! Field path addressing.
//!
//! A path names a top-level schema field by its prefixed name and descends
//! through `/`-separated segments: a sub-field name inside a complex value,
//! or a positional index inside a list.
//!
//! ```text
//! dc:created                         top-level scalar
//! dp:contract/signed                 sub-field of a complex field
//! dp:milestones/0/reminders          list inside entry 0 of a list-of-complex
//! ```
//!
//! Indexes are positions in the current value, not persisted keys.

use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// One step below the root field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Name(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Parsed field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    root: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parse a path such as `dp:milestones/0/due`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFieldPath`] for empty paths, empty
    /// segments, or a root that is itself an index.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || CoreError::InvalidFieldPath(raw.to_string());
        let mut parts = raw.split('/');
        let root = parts.next().filter(|r| !r.trim().is_empty()).ok_or_else(invalid)?;
        if root.chars().all(|c| c.is_ascii_digit()) || root.trim() != root {
            return Err(invalid());
        }

        let mut segments = Vec::new();
        for part in parts {
            if part.is_empty() {
                return Err(invalid());
            }
            let segment = if part.chars().all(|c| c.is_ascii_digit()) {
                Segment::Index(part.parse().map_err(|_| invalid())?)
            } else {
                Segment::Name(part.to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            root: root.to_string(),
            segments,
        })
    }

    /// A top-level field path.
    #[must_use]
    pub fn field(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            segments: Vec::new(),
        }
    }

    /// Extend with a sub-field name.
    #[must_use]
    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.segments.push(Segment::Name(name.into()));
        self
    }

    /// Extend with a list position.
    #[must_use]
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(Segment::Index(index));
        self
    }

    /// Prefixed name of the top-level field.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_list_path() {
        let path = FieldPath::parse("dp:milestones/2/reminders").expect("parse");
        assert_eq!(path.root(), "dp:milestones");
        assert_eq!(
            path.segments(),
            &[Segment::Index(2), Segment::Name("reminders".into())]
        );
        assert_eq!(path.to_string(), "dp:milestones/2/reminders");
    }

    #[test]
    fn builder_matches_parser() {
        let built = FieldPath::field("dp:milestones").index(0).child("due");
        assert_eq!(built, FieldPath::parse("dp:milestones/0/due").expect("parse"));
        assert!(!built.is_top_level());
        assert!(FieldPath::field("dc:created").is_top_level());
    }

    #[test]
    fn rejects_malformed_paths() {
        for raw in ["", "/x", "dc:created/", "dc:a//b", "3/x", " dc:title"] {
            assert!(
                matches!(FieldPath::parse(raw), Err(CoreError::InvalidFieldPath(_))),
                "{raw:?} should be rejected"
            );
        }
    }
}
