//! Run step resource.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::Metadata;
use super::runs::RunUsage;

/// One step taken by a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStep {
    pub id: String,
    pub assistant_id: String,
    pub cancelled_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub expired_at: Option<i64>,
    pub failed_at: Option<i64>,
    pub last_error: Option<Value>,
    pub metadata: Option<Metadata>,
    pub object: String,
    pub run_id: String,
    pub status: RunStepStatus,
    pub step_details: StepDetails,
    pub thread_id: String,
    #[serde(rename = "type")]
    pub kind: RunStepType,
    pub usage: Option<RunUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStepStatus {
    InProgress,
    Cancelled,
    Failed,
    Completed,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStepType {
    MessageCreation,
    ToolCalls,
}

/// Details of what a step did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDetails {
    MessageCreation { message_creation: MessageCreation },
    ToolCalls { tool_calls: Vec<Value> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCreation {
    pub message_id: String,
}
