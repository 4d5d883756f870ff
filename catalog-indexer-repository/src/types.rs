//! Request and response types for bulk index operations.

use serde_json::{json, Value};

use catalog_indexer_shared::SearchDocument;

/// Operation requested for one bulk item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOperation {
    /// Create or fully replace the document with the given id.
    Index,
}

impl BulkOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkOperation::Index => "index",
        }
    }
}

/// One item of a bulk request: `{operation, target_index, id, body}`.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    pub operation: BulkOperation,
    pub target_index: String,
    pub id: String,
    pub body: Value,
}

impl BulkItem {
    /// Build an upsert item for a document, targeting its kind's index.
    pub fn upsert(document: &SearchDocument) -> Result<Self, serde_json::Error> {
        Ok(Self {
            operation: BulkOperation::Index,
            target_index: document.kind().index_name().to_string(),
            id: document.id().to_string(),
            body: document.to_body()?,
        })
    }

    /// The action line preceding the body in a `_bulk` request.
    pub fn action_line(&self) -> Value {
        json!({
            self.operation.as_str(): {
                "_index": self.target_index,
                "_id": self.id,
            }
        })
    }
}

/// Result of a bulk operation for a single item.
///
/// Results are returned in the same order as the submitted items.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResult {
    /// The document id.
    pub id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Rejection reason if the operation failed.
    pub error: Option<String>,
}

impl BulkItemResult {
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            error: Some(reason.into()),
        }
    }
}
