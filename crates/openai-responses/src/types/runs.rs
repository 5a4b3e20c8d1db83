//! Run resource.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::{AssistantTool, Metadata};

/// An execution of an assistant on a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub assistant_id: String,
    pub cancelled_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub failed_at: Option<i64>,
    pub incomplete_details: Option<Value>,
    pub instructions: String,
    pub last_error: Option<Value>,
    pub max_completion_tokens: Option<u64>,
    pub max_prompt_tokens: Option<u64>,
    pub metadata: Option<Metadata>,
    pub model: String,
    pub object: String,
    #[serde(default = "default_parallel_tool_calls")]
    pub parallel_tool_calls: bool,
    pub required_action: Option<RequiredAction>,
    pub response_format: Option<Value>,
    pub started_at: Option<i64>,
    pub status: RunStatus,
    pub thread_id: String,
    pub tool_choice: Option<Value>,
    #[serde(default)]
    pub tools: Vec<AssistantTool>,
    pub truncation_strategy: Option<Value>,
    pub usage: Option<RunUsage>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
}

fn default_parallel_tool_calls() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
}

impl RunStatus {
    /// Whether the run can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Cancelled
                | RunStatus::Failed
                | RunStatus::Completed
                | RunStatus::Incomplete
                | RunStatus::Expired
        )
    }
}

/// What the client must do before the run can continue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub submit_tool_outputs: SubmitToolOutputs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitToolOutputs {
    pub tool_calls: Vec<RequiredToolCall>,
}

/// A function call the run is waiting on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Token usage of a finished run or run step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunUsage {
    pub completion_tokens: u64,
    pub prompt_tokens: u64,
    pub total_tokens: u64,
}
