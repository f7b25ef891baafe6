use crate::types::EntryId;
use thiserror::Error;

/// The four error classes callers branch on.
///
/// HTTP-facing layers map these to status codes; retry decisions should use
/// [`DbError::is_retryable`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Entity, or a reference to an entity in another account, does not exist
    NotFound,
    /// Unique constraint violation, e.g. a duplicate category name within one account
    Conflict,
    /// Malformed filter or request rejected before reaching the database
    Invalid,
    /// Engine/driver failures, pool exhaustion, busy timeouts and cancellation
    Internal,
}

/// Unified error type for database operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier (within the caller's account)
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// Unique constraint violation
    #[error("Unique constraint violation")]
    UniqueViolation {
        table: Option<String>,
        message: String,
        /// The conflicting value that caused the violation (if known)
        conflicting_value: Option<String>,
    },

    /// Foreign key constraint violation
    #[error("Foreign key constraint violation")]
    ForeignKeyViolation { message: String },

    /// Check constraint violation
    #[error("Check constraint violation")]
    CheckViolation { message: String },

    /// Caller contract violation caught before any SQL was built
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The database stayed locked for longer than the busy timeout, or no pooled
    /// connection became available in time
    #[error("Database busy during {operation}")]
    Busy { operation: &'static str },

    /// The caller's cancellation token fired before the operation completed
    #[error("{operation} was cancelled")]
    Cancelled { operation: &'static str },

    /// The entry row was committed but its category snapshot could not be read back.
    /// Retry the read, not the write.
    #[error("Entry {entry_id} was created but its category could not be resolved")]
    EntryCreatedCategoryUnresolved {
        entry_id: EntryId,
        #[source]
        source: Box<DbError>,
    },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DbError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        DbError::Invalid {
            field,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::UniqueViolation { .. } => ErrorKind::Conflict,
            DbError::Invalid { .. } | DbError::CheckViolation { .. } | DbError::ForeignKeyViolation { .. } => ErrorKind::Invalid,
            DbError::Busy { .. } | DbError::Cancelled { .. } | DbError::Other(_) => ErrorKind::Internal,
            DbError::EntryCreatedCategoryUnresolved { source, .. } => source.kind(),
        }
    }

    /// Whether repeating the same call may succeed without any change on the caller's side.
    ///
    /// A partial create is never retryable as a whole: the write already happened.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Busy { .. })
    }

    /// Attach the failing operation's name. Constraint and lookup errors are already
    /// specific enough and pass through unchanged.
    pub fn with_operation(self, operation: &'static str) -> Self {
        match self {
            DbError::Other(err) => DbError::Other(err.context(format!("{operation} failed"))),
            DbError::Busy { .. } => DbError::Busy { operation },
            other => other,
        }
    }
}

/// SQLite primary result codes that mean "someone else holds the lock".
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

fn is_busy(db_err: &dyn sqlx::error::DatabaseError) -> bool {
    db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        // extended codes keep the primary code in the low byte
        .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
}

/// Extract the offending column list from SQLite's "UNIQUE constraint failed: t.a, t.b" message
fn extract_unique_columns(message: &str) -> Option<String> {
    message
        .split_once("UNIQUE constraint failed:")
        .map(|(_, columns)| columns.trim().to_string())
        .filter(|columns| !columns.is_empty())
}

/// Convert from sqlx::Error using sqlx's error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound { entity: "row" },
            sqlx::Error::PoolTimedOut => DbError::Busy { operation: "pool acquire" },
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    let message = db_err.message().to_string();
                    DbError::UniqueViolation {
                        table: db_err.table().map(|s| s.to_string()),
                        conflicting_value: extract_unique_columns(&message),
                        message,
                    }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation {
                        message: db_err.message().to_string(),
                    }
                } else if db_err.is_check_violation() {
                    DbError::CheckViolation {
                        message: db_err.message().to_string(),
                    }
                } else if is_busy(&**db_err) {
                    DbError::Busy { operation: "statement" }
                } else {
                    // All other database errors are non-recoverable - convert to anyhow
                    DbError::Other(anyhow::Error::from(err))
                }
            }
            // All other sqlx errors are non-recoverable - convert to anyhow with context
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Wrap engine errors with the name of the operation that produced them.
pub trait ResultExt<T> {
    fn op(self, operation: &'static str) -> Result<T>;
}

impl<T> ResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn op(self, operation: &'static str) -> Result<T> {
        self.map_err(|err| DbError::from(err).with_operation(operation))
    }
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;
