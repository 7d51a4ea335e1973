//! Error types for ODM operations.

use thiserror::Error;

/// Error type covering schema derivation, result hydration, and
/// search-service failures.
#[derive(Error, Debug)]
pub enum Error {
    /// A declared field could not be derived from a source record: the
    /// named attribute is absent and no custom getter is configured.
    #[error("source attribute not found: {field}")]
    Schema {
        /// Attribute name that was looked up on the source record.
        field: String,
    },

    /// A search result's `_source` payload is missing a declared field.
    #[error("search result is missing declared field: {field}")]
    Hydration {
        /// The declared field name absent from the payload.
        field: String,
    },

    /// Single-document fetch matched nothing.
    #[error("document not found: {index}/{key}")]
    DocumentNotFound {
        /// Index name.
        index: String,
        /// Document id or the query that matched nothing.
        key: String,
    },

    /// Index already exists.
    #[error("index already exists: {0}")]
    IndexExists(String),

    /// Index not found.
    #[error("index not found: {0}")]
    IndexNotFound(String),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error reported by the search service for an otherwise delivered
    /// request.
    #[error("search service error: {0}")]
    Service(String),

    /// Transport-level failure from the opensearch client.
    #[error("transport error: {0}")]
    Transport(#[from] opensearch::Error),

    /// Bulk request with item-level failures.
    #[error("bulk operation failed: {succeeded} succeeded, {failed} failed")]
    Bulk {
        /// Number of successful operations.
        succeeded: usize,
        /// Number of failed operations.
        failed: usize,
        /// Error details.
        errors: Vec<String>,
    },
}

/// Result type alias for ODM operations.
pub type Result<T> = std::result::Result<T, Error>;
