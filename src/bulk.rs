//! Bulk request payloads and response parsing.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One operation in a bulk request scoped to a single index.
///
/// The action lines carry only the document id; the target index is given
/// once on the bulk call itself.
#[derive(Debug, Clone)]
pub enum BulkOperation {
    /// Index (upsert) a document.
    Index {
        /// Document ID.
        id: String,
        /// Document body.
        doc: Value,
    },
    /// Create a document, failing if it exists.
    Create {
        /// Document ID.
        id: String,
        /// Document body.
        doc: Value,
    },
    /// Partially update a document.
    Update {
        /// Document ID.
        id: String,
        /// Partial document body.
        doc: Value,
    },
    /// Delete a document.
    Delete {
        /// Document ID.
        id: String,
    },
}

impl BulkOperation {
    /// Convert to bulk request lines: the action entry, followed by the
    /// document body where the action carries one.
    pub fn to_lines(&self) -> Vec<Value> {
        match self {
            BulkOperation::Index { id, doc } => {
                vec![json!({ "index": { "_id": id } }), doc.clone()]
            }
            BulkOperation::Create { id, doc } => {
                vec![json!({ "create": { "_id": id } }), doc.clone()]
            }
            BulkOperation::Update { id, doc } => {
                vec![json!({ "update": { "_id": id } }), json!({ "doc": doc })]
            }
            BulkOperation::Delete { id } => {
                vec![json!({ "delete": { "_id": id } })]
            }
        }
    }
}

/// Bulk operation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResponse {
    /// Time taken in milliseconds.
    pub took: u64,
    /// Whether any item failed.
    pub errors: bool,
    /// Individual item results.
    pub items: Vec<BulkItem>,
}

impl BulkResponse {
    /// Error reasons for every failed item.
    pub fn failures(&self) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|item| item.operation.status().error.as_ref())
            .map(|error| error.reason.clone())
            .collect()
    }
}

/// Individual bulk item result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItem {
    /// Operation result, keyed by operation type.
    #[serde(flatten)]
    pub operation: BulkItemResult,
}

/// Bulk item result, tagged by operation type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkItemResult {
    /// Index result.
    Index(BulkItemStatus),
    /// Create result.
    Create(BulkItemStatus),
    /// Update result.
    Update(BulkItemStatus),
    /// Delete result.
    Delete(BulkItemStatus),
}

impl BulkItemResult {
    /// The status payload regardless of operation type.
    pub fn status(&self) -> &BulkItemStatus {
        match self {
            BulkItemResult::Index(status)
            | BulkItemResult::Create(status)
            | BulkItemResult::Update(status)
            | BulkItemResult::Delete(status) => status,
        }
    }
}

/// Status of one bulk item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemStatus {
    /// Index name.
    #[serde(rename = "_index")]
    pub index: String,
    /// Document ID.
    #[serde(rename = "_id")]
    pub id: String,
    /// Document version.
    #[serde(rename = "_version")]
    pub version: Option<i64>,
    /// Result status string.
    pub result: Option<String>,
    /// HTTP status code.
    pub status: u16,
    /// Error details.
    pub error: Option<BulkItemError>,
}

impl BulkItemStatus {
    /// Check if the operation was successful.
    pub fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Bulk item error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemError {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error reason.
    pub reason: String,
}
