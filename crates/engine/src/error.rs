//! The module contains the error the engine can throw.
//!
//! Every [`EngineError`] maps onto one [`ErrorKind`], which is what callers
//! (the pipeline workers in particular) use to decide between dropping and
//! retrying a piece of work:
//!
//! - [`InvalidInput`] rejected before any write.
//! - [`NotFound`] the addressed row does not exist.
//! - [`OwnershipViolation`] the row belongs to another account.
//! - [`Conflict`] a uniqueness rule was hit.
//! - [`DependencyFailure`] the store is unreachable or failed; retryable.
//!
//!  [`InvalidInput`]: ErrorKind::InvalidInput
//!  [`NotFound`]: ErrorKind::NotFound
//!  [`OwnershipViolation`]: ErrorKind::OwnershipViolation
//!  [`Conflict`]: ErrorKind::Conflict
//!  [`DependencyFailure`]: ErrorKind::DependencyFailure
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    /// Generic denial: the message never names the resource.
    #[error("Access denied")]
    Forbidden,
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Coarse classification of an [`EngineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    OwnershipViolation,
    Conflict,
    DependencyFailure,
}

impl ErrorKind {
    /// Only dependency failures are worth another attempt.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::DependencyFailure)
    }
}

impl EngineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_)
            | Self::CurrencyMismatch(_)
            | Self::InvalidCursor(_)
            | Self::Serialization(_) => ErrorKind::InvalidInput,
            Self::KeyNotFound(_) => ErrorKind::NotFound,
            Self::Forbidden => ErrorKind::OwnershipViolation,
            Self::ExistingKey(_) => ErrorKind::Conflict,
            Self::Database(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => ErrorKind::Conflict,
                _ => ErrorKind::DependencyFailure,
            },
        }
    }

    /// Turns a unique-constraint violation into [`EngineError::ExistingKey`],
    /// leaving every other database error untouched.
    pub(crate) fn from_insert(err: DbErr, key: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Self::ExistingKey(key.to_string()),
            _ => Self::Database(err),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::Forbidden, Self::Forbidden) => true,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::Serialization(a), Self::Serialization(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
