use thiserror::Error;

use crate::core::types::RecordId;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Model '{0}' is not registered")]
    ModelNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Record {0} not found in table '{1}'")]
    RecordNotFound(RecordId, String),

    #[error("Record is read-only: {0}")]
    ReadOnly(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("'{0}' halted by a callback")]
    CallbackHalted(&'static str),

    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
