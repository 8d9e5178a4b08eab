//! Error taxonomy for store operations.
//!
//! Validation failures are detected before any write and carry the offending
//! column names. Conflict variants cover the guarded lead re-conversion and
//! relationship cardinality checks. Everything else is storage-level.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Required columns whose submitted value was missing or falsy.
    #[error("missing required fields: {}", .missing.join(", "))]
    MissingRequired { missing: Vec<String> },

    /// A submitted value does not match the column type's shape.
    #[error("invalid value for column '{column}': {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("lead {0} is already converted")]
    LeadAlreadyConverted(i64),

    /// A link rejected by the declared cardinality of its relationship.
    #[error("relationship {relationship_id} ({cardinality}): {reason}")]
    CardinalityViolation {
        relationship_id: i64,
        cardinality: &'static str,
        reason: String,
    },

    #[error("column '{0}' references a board that does not exist")]
    DanglingLinkedBoard(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn invalid_value(column: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}
