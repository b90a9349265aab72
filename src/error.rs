use thiserror::Error;

/// Errors surfaced by the catalog initializer.
///
/// Storage failures are passed through untouched so the caller sees exactly
/// what SQLite reported (constraint violation, type mismatch, busy database).
#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// True when SQLite rejected a write because of a column constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::Storage(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
