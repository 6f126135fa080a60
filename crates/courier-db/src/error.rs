use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A UNIQUE constraint rejected the write.
    #[error("{0}")]
    Conflict(String),

    #[error("DB lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Turn a UNIQUE violation on `users` into [`DbError::Conflict`].
    pub(crate) fn from_user_insert(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let detail = msg.as_deref().unwrap_or_default();
                if detail.contains("users.username") {
                    DbError::Conflict("Username already taken".into())
                } else if detail.contains("users.email") {
                    DbError::Conflict("Email already registered".into())
                } else {
                    DbError::Sqlite(err)
                }
            }
            _ => DbError::Sqlite(err),
        }
    }
}
