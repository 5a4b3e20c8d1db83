//! Assistant resource.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::{AssistantTool, Metadata, ToolResources};

/// An assistant that can call the model and use tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    pub created_at: i64,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub metadata: Option<Metadata>,
    pub model: String,
    pub name: Option<String>,
    pub object: String,
    #[serde(default)]
    pub tools: Vec<AssistantTool>,
    pub response_format: Option<Value>,
    pub temperature: Option<f64>,
    pub tool_resources: Option<ToolResources>,
    pub top_p: Option<f64>,
}
