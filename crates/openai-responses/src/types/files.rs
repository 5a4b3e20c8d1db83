//! File resource.

use serde::{Deserialize, Serialize};

/// Metadata of an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileObject {
    pub id: String,
    pub bytes: u64,
    pub created_at: i64,
    pub filename: String,
    pub object: String,
    pub purpose: String,
    pub status: String,
    pub status_details: Option<String>,
}
