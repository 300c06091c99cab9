//! Affiliate Store Error Types

use thiserror::Error;

/// Store Result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Store Error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    /// Duplicate entity
    #[error("Duplicate entity: {entity_type} with id {id}")]
    Duplicate { entity_type: String, id: String },

    /// Row changed status since it was read
    #[error("Stale write: {entity_type} {id} is {actual}, expected {expected}")]
    StaleWrite {
        entity_type: String,
        id: String,
        expected: String,
        actual: String,
    },

    /// Invalid entity state
    #[error("Invalid entity state: {message}")]
    InvalidState { message: String },

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Database driver error
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Duplicate {
                entity_type: "row".to_string(),
                id: db.message().to_string(),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::Transaction(err.to_string()),
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("document codec: {}", err))
    }
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Create a duplicate error
    pub fn duplicate(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Create a stale write error
    pub fn stale(
        entity_type: impl Into<String>,
        id: impl ToString,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::StaleWrite {
            entity_type: entity_type.into(),
            id: id.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}
