//! Thread message resource.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::Metadata;

/// A message within a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub assistant_id: Option<String>,
    pub attachments: Option<Vec<Attachment>>,
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    pub created_at: i64,
    pub incomplete_at: Option<i64>,
    pub incomplete_details: Option<Value>,
    pub metadata: Option<Metadata>,
    pub object: String,
    pub role: MessageRole,
    pub run_id: Option<String>,
    pub status: MessageStatus,
    pub thread_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    InProgress,
    Incomplete,
    Completed,
}

/// A file attached to a message, and the tools it should be added to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_id: Option<String>,
    pub tools: Option<Vec<Value>>,
}

/// One block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    ImageFile { image_file: Value },
    ImageUrl { image_url: Value },
    Refusal { refusal: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub annotations: Vec<Value>,
    pub value: String,
}

impl MessageContent {
    /// A plain text block with no annotations.
    pub fn text(value: impl Into<String>) -> Self {
        MessageContent::Text {
            text: TextContent {
                annotations: Vec::new(),
                value: value.into(),
            },
        }
    }

    /// The text of a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text { text } => Some(&text.value),
            _ => None,
        }
    }
}
