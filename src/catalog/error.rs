//! Error types for catalog operations.

use std::fmt;

use thiserror::Error;

/// Structured classification for catalog/database failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogDbErrorKind {
    /// `SQLite` returned busy/locked under concurrent access.
    BusyOrLocked,
    /// Constraint failure (unique/foreign-key/check/not-null).
    ConstraintViolation,
    /// Connection pool timed out waiting for a free connection.
    PoolTimeout,
    /// Connection pool is closed.
    PoolClosed,
    /// Expected row was not found.
    RowNotFound,
    /// A stored value could not be mapped back to its Rust type.
    Decode,
    /// Filesystem or transport IO failure.
    Io,
    /// SQL protocol/driver error.
    Protocol,
    /// Unclassified database failure.
    Other,
}

impl CatalogDbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::RowNotFound => Self::RowNotFound,
            sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => Self::Decode,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Protocol(_) => Self::Protocol,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for CatalogDbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::RowNotFound => "row_not_found",
            Self::Decode => "decode",
            Self::Io => "io",
            Self::Protocol => "protocol",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> CatalogDbErrorKind {
    let code = database_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return CatalogDbErrorKind::BusyOrLocked;
    }

    if database_error.is_unique_violation()
        || database_error.is_foreign_key_violation()
        || database_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        return CatalogDbErrorKind::ConstraintViolation;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("database is busy")
    {
        return CatalogDbErrorKind::BusyOrLocked;
    }

    CatalogDbErrorKind::Other
}

/// A persisted integer code outside the known mapping for its enum.
#[derive(Debug, Clone, Error)]
#[error("unknown {enum_name} code {code}")]
pub struct UnknownEnumCode {
    /// Name of the enum being decoded.
    pub enum_name: &'static str,
    /// The offending stored value.
    pub code: i64,
}

/// Errors that can occur during catalog operations.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Typed classification used for failure handling.
        kind: CatalogDbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// A referenced catalog row does not exist.
    #[error(
        "{entity} not found: id {id}\n  Suggestion: The row may have been removed by cleanup or the ID is incorrect"
    )]
    NotFound {
        /// Entity table name (series, season, episode, link).
        entity: &'static str,
        /// Primary key that was looked up.
        id: i64,
    },

    /// A number outside the storable range was supplied.
    #[error("invalid {field} value {value}: must be between 0 and {max}")]
    OutOfRange {
        /// Which field was out of range.
        field: &'static str,
        /// Supplied value.
        value: u64,
        /// Largest storable value.
        max: u64,
    },
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: CatalogDbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl CatalogError {
    /// Returns the database classification when this is a database error.
    #[must_use]
    pub fn db_kind(&self) -> Option<CatalogDbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// True when the failure is a uniqueness/constraint conflict.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        self.db_kind() == Some(CatalogDbErrorKind::ConstraintViolation)
    }
}
