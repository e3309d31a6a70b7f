use std::io;

use thiserror::Error;

/// Classification of every failure the engine can surface. The wire
/// layer maps variants to response error codes via [`DbError::error_code`].
#[derive(Debug, Error)]
pub enum DbError {
    /// Grammatically invalid SQL.
    #[error("{0}")]
    Parse(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Value failed the declared-type check.
    #[error("{0}")]
    TypeMismatch(String),

    /// Declared type outside the closed INT/VARCHAR/BOOLEAN/TIMESTAMP set.
    #[error("Unsupported column type: {0}")]
    UnsupportedType(String),

    #[error("Table already exists: {0}")]
    AlreadyExists(String),

    /// Bad magic/version or a short file while loading a table.
    /// Never fatal at startup: the table is skipped, the rest load.
    #[error("corrupt table file {path}: {reason}")]
    CorruptFile { path: String, reason: String },

    /// Byte stream ended before a complete value.
    #[error("incomplete data: {0}")]
    Incomplete(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("planner is not configured")]
    PlannerUnavailable,

    /// Bad framing or an unreadable request; the connection is closed.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Internal(String),
}

impl DbError {
    /// Wire error code for the response envelope. `None` means the
    /// failure carries no specific classification.
    pub fn error_code(&self) -> Option<u16> {
        match self {
            DbError::Parse(_)
            | DbError::TableNotFound(_)
            | DbError::ColumnNotFound(_)
            | DbError::TypeMismatch(_)
            | DbError::UnsupportedType(_) => Some(400),
            DbError::AlreadyExists(_) => Some(409),
            DbError::CorruptFile { .. }
            | DbError::Incomplete(_)
            | DbError::Io(_)
            | DbError::Internal(_) => Some(500),
            DbError::PlannerUnavailable => Some(503),
            DbError::Config(_) | DbError::Protocol(_) => None,
        }
    }
}
