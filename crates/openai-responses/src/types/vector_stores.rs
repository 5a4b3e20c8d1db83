//! Vector store, vector store file and file batch resources.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::{FileCounts, Metadata};

/// A collection of processed files usable by `file_search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStore {
    pub id: String,
    pub created_at: i64,
    #[serde(default)]
    pub file_counts: FileCounts,
    pub last_active_at: Option<i64>,
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub name: String,
    pub object: String,
    pub status: String,
    #[serde(default)]
    pub usage_bytes: u64,
    pub expires_after: Option<ExpiresAfter>,
    pub expires_at: Option<i64>,
}

/// Expiration policy of a vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiresAfter {
    pub anchor: String,
    pub days: u32,
}

/// A file attached to a vector store. Its id is the id of the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreFile {
    pub id: String,
    pub created_at: i64,
    pub last_error: Option<Value>,
    pub object: String,
    pub status: String,
    #[serde(default)]
    pub usage_bytes: u64,
    pub vector_store_id: String,
    pub chunking_strategy: Option<Value>,
}

/// A batch of files attached to a vector store in one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreFileBatch {
    pub id: String,
    pub created_at: i64,
    #[serde(default)]
    pub file_counts: FileCounts,
    pub object: String,
    pub status: String,
    pub vector_store_id: String,
}
