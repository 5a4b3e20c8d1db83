//! Shapes shared by several resources.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key/value pairs attached to a resource.
pub type Metadata = BTreeMap<String, String>;

// ============================================================================
// Tools
// ============================================================================

/// A tool enabled on an assistant or run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantTool {
    CodeInterpreter,
    FileSearch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_search: Option<Value>,
    },
    Function {
        function: FunctionDefinition,
    },
}

/// Signature of a callable function tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// Per-tool resources attached to an assistant or thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_interpreter: Option<CodeInterpreterResources>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_search: Option<FileSearchResources>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeInterpreterResources {
    #[serde(default)]
    pub file_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileSearchResources {
    #[serde(default)]
    pub vector_store_ids: Vec<String>,
}

// ============================================================================
// Vector store counters
// ============================================================================

/// Per-status file counters on vector stores and file batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCounts {
    #[serde(default)]
    pub cancelled: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub in_progress: u64,
    #[serde(default)]
    pub total: u64,
}

impl FileCounts {
    /// Counters for `n` files that all finished processing.
    pub fn completed(n: u64) -> Self {
        Self {
            completed: n,
            total: n,
            ..Self::default()
        }
    }
}

// ============================================================================
// List and delete envelopes
// ============================================================================

/// A cursor-paginated list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub object: String,
    pub data: Vec<T>,
    pub first_id: Option<String>,
    pub last_id: Option<String>,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// An unpaginated list (used by endpoints without cursors).
    pub fn unpaginated(data: Vec<T>) -> Self
    where
        T: crate::store::Keyed,
    {
        let first_id = data.first().map(|item| item.id().to_string());
        let last_id = data.last().map(|item| item.id().to_string());
        Self {
            object: "list".to_string(),
            data,
            first_id,
            last_id,
            has_more: false,
        }
    }
}

/// Response body of every delete endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedObject {
    pub id: String,
    pub object: String,
    pub deleted: bool,
}

impl DeletedObject {
    pub fn new(id: impl Into<String>, object: impl Into<String>, deleted: bool) -> Self {
        Self {
            id: id.into(),
            object: object.into(),
            deleted,
        }
    }
}
