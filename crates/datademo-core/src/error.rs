use std::fmt;

/// Machine-readable error codes for operator-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    InvalidQuery,
    InvalidFieldPath,
    FieldNotFound,
    TypeMismatch,
    DateOutOfRange,
    ListenerStateViolation,
    AlreadyRunning,
    StoreFailure,
    CorruptDocument,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidQuery => "E2001",
            Self::InvalidFieldPath => "E2002",
            Self::FieldNotFound => "E2003",
            Self::TypeMismatch => "E2004",
            Self::DateOutOfRange => "E2005",
            Self::ListenerStateViolation => "E3001",
            Self::AlreadyRunning => "E3002",
            Self::StoreFailure => "E5001",
            Self::CorruptDocument => "E5002",
            Self::LockContention => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Repository not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidQuery => "Invalid document query",
            Self::InvalidFieldPath => "Invalid field path",
            Self::FieldNotFound => "Field not found",
            Self::TypeMismatch => "Field value has unexpected type",
            Self::DateOutOfRange => "Shifted date out of range",
            Self::ListenerStateViolation => "Listener suspension used out of order",
            Self::AlreadyRunning => "Bulk update already running",
            Self::StoreFailure => "Document store failure",
            Self::CorruptDocument => "Corrupt stored document",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `dd init` to initialize this repository."),
            Self::ConfigParseError => Some("Fix syntax in .datademo/config.toml and retry."),
            Self::InvalidQuery => {
                Some("Use `SELECT * FROM <Type>` with optional primaryType/lifeCycleState filters.")
            }
            Self::InvalidFieldPath => Some("Use `prefix:field` with optional `/sub` or `/<index>` segments."),
            Self::FieldNotFound | Self::TypeMismatch => None,
            Self::DateOutOfRange => Some("Use a smaller day count."),
            Self::ListenerStateViolation => Some("Call suspend() once, then restore() once."),
            Self::AlreadyRunning => Some("Wait for the running update to finish."),
            Self::StoreFailure => Some("Check disk space and write permissions."),
            Self::CorruptDocument => Some("Re-seed the repository with `dd seed`."),
            Self::LockContention => Some("Retry after the other `dd` process releases its lock."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the bulk-update core and the reference document store.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("document encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid query '{query}': {reason}")]
    InvalidQuery { query: String, reason: String },

    #[error("invalid field path '{0}'")]
    InvalidFieldPath(String),

    #[error("field '{path}' not found on document {doc_id}")]
    FieldNotFound { doc_id: String, path: String },

    #[error("field '{path}' expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("shifting field '{path}' by {days} days leaves the supported date range")]
    DateOutOfRange { path: String, days: i64 },

    #[error("listeners must be suspended before they can be restored")]
    ListenersNotSuspended,

    #[error("listeners are already suspended")]
    ListenersAlreadySuspended,

    #[error("a bulk update is already running")]
    AlreadyRunning,

    #[error("document {0} not found")]
    DocumentNotFound(String),

    #[error("lock error: {0}")]
    Lock(#[from] crate::lock::LockError),
}

impl CoreError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Store(_) => ErrorCode::StoreFailure,
            Self::Json(_) => ErrorCode::CorruptDocument,
            Self::InvalidQuery { .. } => ErrorCode::InvalidQuery,
            Self::InvalidFieldPath(_) => ErrorCode::InvalidFieldPath,
            Self::FieldNotFound { .. } | Self::DocumentNotFound(_) => ErrorCode::FieldNotFound,
            Self::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Self::DateOutOfRange { .. } => ErrorCode::DateOutOfRange,
            Self::ListenersNotSuspended | Self::ListenersAlreadySuspended => {
                ErrorCode::ListenerStateViolation
            }
            Self::AlreadyRunning => ErrorCode::AlreadyRunning,
            Self::Lock(err) => err.code(),
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

/// Result alias used across the core.
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{CoreError, ErrorCode};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::InvalidQuery,
            ErrorCode::InvalidFieldPath,
            ErrorCode::FieldNotFound,
            ErrorCode::TypeMismatch,
            ErrorCode::DateOutOfRange,
            ErrorCode::ListenerStateViolation,
            ErrorCode::AlreadyRunning,
            ErrorCode::StoreFailure,
            ErrorCode::CorruptDocument,
            ErrorCode::LockContention,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::ListenerStateViolation.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn listener_misuse_maps_to_state_violation() {
        assert_eq!(
            CoreError::ListenersNotSuspended.code(),
            ErrorCode::ListenerStateViolation
        );
        assert_eq!(
            CoreError::ListenersAlreadySuspended.code(),
            ErrorCode::ListenerStateViolation
        );
        assert!(CoreError::ListenersNotSuspended.hint().is_some());
    }
}
