//! Document query language accepted by the reference store.
//!
//! ```text
//! SELECT * FROM <Type|Document>
//!     [WHERE <cond> [AND <cond>]*]
//!
//! cond := ecm:primaryType IN ('A', 'B')
//!       | ecm:primaryType = 'A'
//!       | ecm:lifeCycleState = 'x'
//! ```
//!
//! Keywords and property names are case-insensitive; type names and quoted
//! values are not. `FROM Document` matches every type. A `FROM <Type>` clause
//! combined with a primary-type filter matches their intersection.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Pseudo-type matching every document.
pub const ANY_TYPE: &str = "Document";

const PRIMARY_TYPE: &str = "ecm:primarytype";
const LIFECYCLE_STATE: &str = "ecm:lifecyclestate";

/// Parsed document query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    from: String,
    primary_types: Vec<String>,
    lifecycle_state: Option<String>,
}

impl DocumentQuery {
    /// Query for every document of `doc_type`.
    #[must_use]
    pub fn all_of(doc_type: impl Into<String>) -> Self {
        Self {
            from: doc_type.into(),
            primary_types: Vec::new(),
            lifecycle_state: None,
        }
    }

    /// Query over every document, restricted to `types` when non-empty.
    #[must_use]
    pub fn any_of<I, T>(types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            from: ANY_TYPE.to_string(),
            primary_types: types.into_iter().map(Into::into).collect(),
            lifecycle_state: None,
        }
    }

    #[must_use]
    pub fn in_state(mut self, state: impl Into<String>) -> Self {
        self.lifecycle_state = Some(state.into());
        self
    }

    /// Types this query can match; `None` means any type.
    #[must_use]
    pub fn type_filter(&self) -> Option<Vec<String>> {
        let from_any = self.from == ANY_TYPE;
        match (from_any, self.primary_types.is_empty()) {
            (true, true) => None,
            (true, false) => Some(self.primary_types.clone()),
            (false, true) => Some(vec![self.from.clone()]),
            (false, false) => Some(
                self.primary_types
                    .iter()
                    .filter(|t| **t == self.from)
                    .cloned()
                    .collect(),
            ),
        }
    }

    #[must_use]
    pub fn lifecycle_state(&self) -> Option<&str> {
        self.lifecycle_state.as_deref()
    }

    #[must_use]
    pub fn matches(&self, doc_type: &str, lifecycle_state: &str) -> bool {
        let type_ok = self
            .type_filter()
            .is_none_or(|types| types.iter().any(|t| t == doc_type));
        let state_ok = self
            .lifecycle_state
            .as_deref()
            .is_none_or(|state| state == lifecycle_state);
        type_ok && state_ok
    }

    /// SQL `WHERE` clause over the `documents` table and its positional
    /// parameters. Empty when the query matches everything.
    #[must_use]
    pub fn where_clause(&self) -> (String, Vec<String>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(types) = self.type_filter() {
            if types.is_empty() {
                conditions.push("0".to_string());
            } else {
                let placeholders = vec!["?"; types.len()].join(", ");
                conditions.push(format!("doc_type IN ({placeholders})"));
                params.extend(types);
            }
        }
        if let Some(state) = &self.lifecycle_state {
            conditions.push("lifecycle_state = ?".to_string());
            params.push(state.clone());
        }

        if conditions.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), params)
        }
    }
}

impl fmt::Display for DocumentQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT * FROM {}", self.from)?;
        let mut joiner = " WHERE ";
        match self.primary_types.as_slice() {
            [] => {}
            [single] => {
                write!(f, "{joiner}ecm:primaryType = '{single}'")?;
                joiner = " AND ";
            }
            many => {
                let mut list = String::new();
                for (i, t) in many.iter().enumerate() {
                    if i > 0 {
                        list.push_str(", ");
                    }
                    let _ = write!(list, "'{t}'");
                }
                write!(f, "{joiner}ecm:primaryType IN ({list})")?;
                joiner = " AND ";
            }
        }
        if let Some(state) = &self.lifecycle_state {
            write!(f, "{joiner}ecm:lifeCycleState = '{state}'")?;
        }
        Ok(())
    }
}

impl FromStr for DocumentQuery {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Parser::new(s)?.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Star,
    Comma,
    Equals,
    Open,
    Close,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(w) => f.write_str(w),
            Self::Quoted(q) => write!(f, "'{q}'"),
            Self::Star => f.write_str("*"),
            Self::Comma => f.write_str(","),
            Self::Equals => f.write_str("="),
            Self::Open => f.write_str("("),
            Self::Close => f.write_str(")"),
        }
    }
}

struct Parser<'a> {
    raw: &'a str,
    tokens: std::vec::IntoIter<Token>,
}

impl<'a> Parser<'a> {
    fn new(raw: &'a str) -> Result<Self> {
        Ok(Self {
            raw,
            tokens: tokenize(raw)?.into_iter(),
        })
    }

    fn error(&self, reason: impl Into<String>) -> CoreError {
        CoreError::InvalidQuery {
            query: self.raw.to_string(),
            reason: reason.into(),
        }
    }

    fn next(&mut self, expected: &str) -> Result<Token> {
        self.tokens
            .next()
            .ok_or_else(|| self.error(format!("expected {expected}, found end of query")))
    }

    fn keyword(&mut self, keyword: &str) -> Result<()> {
        match self.next(keyword)? {
            Token::Word(w) if w.eq_ignore_ascii_case(keyword) => Ok(()),
            other => Err(self.error(format!("expected {keyword}, found {other}"))),
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        let found = self.next(&token.to_string())?;
        if &found == token {
            Ok(())
        } else {
            Err(self.error(format!("expected {token}, found {found}")))
        }
    }

    fn quoted(&mut self) -> Result<String> {
        match self.next("a quoted value")? {
            Token::Quoted(value) => Ok(value),
            other => Err(self.error(format!("expected a quoted value, found {other}"))),
        }
    }

    fn parse(mut self) -> Result<DocumentQuery> {
        self.keyword("SELECT")?;
        self.expect(&Token::Star)?;
        self.keyword("FROM")?;
        let from = match self.next("a document type")? {
            Token::Word(w) if w.eq_ignore_ascii_case(ANY_TYPE) => ANY_TYPE.to_string(),
            Token::Word(w) => w,
            other => return Err(self.error(format!("expected a document type, found {other}"))),
        };

        let mut query = DocumentQuery::all_of(from);
        match self.tokens.next() {
            None => return Ok(query),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("WHERE") => {}
            Some(other) => return Err(self.error(format!("expected WHERE, found {other}"))),
        }

        loop {
            self.condition(&mut query)?;
            match self.tokens.next() {
                None => return Ok(query),
                Some(Token::Word(w)) if w.eq_ignore_ascii_case("AND") => {}
                Some(other) => return Err(self.error(format!("expected AND, found {other}"))),
            }
        }
    }

    fn condition(&mut self, query: &mut DocumentQuery) -> Result<()> {
        let property = match self.next("a property")? {
            Token::Word(w) => w.to_ascii_lowercase(),
            other => return Err(self.error(format!("expected a property, found {other}"))),
        };

        match property.as_str() {
            PRIMARY_TYPE => match self.next("= or IN")? {
                Token::Equals => {
                    let value = self.quoted()?;
                    query.primary_types.push(value);
                    Ok(())
                }
                Token::Word(w) if w.eq_ignore_ascii_case("IN") => {
                    self.expect(&Token::Open)?;
                    loop {
                        let value = self.quoted()?;
                        query.primary_types.push(value);
                        match self.next(", or )")? {
                            Token::Comma => {}
                            Token::Close => return Ok(()),
                            other => {
                                return Err(self.error(format!("expected , or ), found {other}")));
                            }
                        }
                    }
                }
                other => Err(self.error(format!("expected = or IN, found {other}"))),
            },
            LIFECYCLE_STATE => {
                self.expect(&Token::Equals)?;
                query.lifecycle_state = Some(self.quoted()?);
                Ok(())
            }
            _ => Err(self.error(format!("unsupported property {property}"))),
        }
    }
}

fn tokenize(raw: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '*' | ',' | '=' | '(' | ')' => {
                chars.next();
                tokens.push(match c {
                    '*' => Token::Star,
                    ',' => Token::Comma,
                    '=' => Token::Equals,
                    '(' => Token::Open,
                    _ => Token::Close,
                });
            }
            '\'' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => value.push(ch),
                        None => {
                            return Err(CoreError::InvalidQuery {
                                query: raw.to_string(),
                                reason: "unterminated quoted value".to_string(),
                            });
                        }
                    }
                }
                tokens.push(Token::Quoted(value));
            }
            c if c.is_alphanumeric() || c == ':' || c == '_' => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == ':' || ch == '_' {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            other => {
                return Err(CoreError::InvalidQuery {
                    query: raw.to_string(),
                    reason: format!("unexpected character '{other}'"),
                });
            }
        }
    }

    Ok(tokens)
}
