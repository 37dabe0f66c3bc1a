// src/error.rs

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by store implementations. Handlers map these onto
/// HTTP status codes; the import runner records chunk-level failures
/// and keeps going.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("cannot delete {entity} {id}: referenced by {references} row(s)")]
    ReferentialIntegrity {
        entity: &'static str,
        id: Uuid,
        references: i64,
    },

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

/// Errors from reading an import file before any row reaches the store.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot read import file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
