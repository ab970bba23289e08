//! The module contains the errors the engine can throw.
//!
//! State-transition misuse surfaces as [`AlreadyDeleted`]/[`NotDeleted`],
//! business-rule violations as [`InsufficientBalance`], and store-level
//! failures as [`Database`]. Nothing is downgraded to a warning: any failure
//! inside a transaction aborts it and propagates.
//!
//!  [`AlreadyDeleted`]: EngineError::AlreadyDeleted
//!  [`NotDeleted`]: EngineError::NotDeleted
//!  [`InsufficientBalance`]: EngineError::InsufficientBalance
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0} is already deleted")]
    AlreadyDeleted(String),
    #[error("{0} is not deleted")]
    NotDeleted(String),
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: i64, requested: i64 },
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid entity kind: {0}")]
    InvalidKind(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::AlreadyDeleted(a), Self::AlreadyDeleted(b)) => a == b,
            (Self::NotDeleted(a), Self::NotDeleted(b)) => a == b,
            (
                Self::InsufficientBalance {
                    available: a,
                    requested: r,
                },
                Self::InsufficientBalance {
                    available: b,
                    requested: s,
                },
            ) => a == b && r == s,
            (Self::ConstraintViolation(a), Self::ConstraintViolation(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidKind(a), Self::InvalidKind(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
