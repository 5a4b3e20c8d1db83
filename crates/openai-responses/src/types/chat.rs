//! Chat completion responses and stream chunks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::runs::FunctionCall;

/// A chat completion returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    pub created: i64,
    pub model: String,
    pub object: String,
    pub service_tier: Option<String>,
    pub system_fingerprint: Option<String>,
    pub usage: Option<CompletionUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    pub finish_reason: String,
    pub index: u32,
    pub logprobs: Option<Value>,
    pub message: ChatCompletionMessage,
}

/// The assistant message of a choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionMessage {
    pub content: Option<String>,
    pub refusal: Option<String>,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionUsage {
    pub completion_tokens: u64,
    pub prompt_tokens: u64,
    pub total_tokens: u64,
}

/// One streamed piece of a chat completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub choices: Vec<ChunkChoice>,
    pub created: i64,
    pub model: String,
    pub object: String,
    pub system_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<CompletionUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
    pub index: u32,
    pub logprobs: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
}

impl ChatCompletion {
    /// Split the completion into the chunks a streaming call would produce:
    /// a role/content delta per choice followed by a finishing delta.
    pub fn to_chunks(&self) -> Vec<ChatCompletionChunk> {
        let chunk = |choices: Vec<ChunkChoice>| ChatCompletionChunk {
            id: self.id.clone(),
            choices,
            created: self.created,
            model: self.model.clone(),
            object: "chat.completion.chunk".to_string(),
            system_fingerprint: self.system_fingerprint.clone(),
            usage: None,
        };

        let mut chunks = Vec::with_capacity(self.choices.len() * 2);
        for choice in &self.choices {
            let tool_calls = choice.message.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .enumerate()
                    .filter_map(|(index, call)| {
                        let mut value = serde_json::to_value(call).ok()?;
                        value["index"] = Value::from(index);
                        Some(value)
                    })
                    .collect()
            });
            chunks.push(chunk(vec![ChunkChoice {
                delta: ChunkDelta {
                    content: choice.message.content.clone(),
                    role: Some(choice.message.role.clone()),
                    tool_calls,
                },
                finish_reason: None,
                index: choice.index,
                logprobs: None,
            }]));
            chunks.push(chunk(vec![ChunkChoice {
                delta: ChunkDelta::default(),
                finish_reason: Some(choice.finish_reason.clone()),
                index: choice.index,
                logprobs: None,
            }]));
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn completion() -> ChatCompletion {
        serde_json::from_value(json!({
            "id": "chatcmpl-abc",
            "created": 1,
            "model": "gpt-4o",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": {"role": "assistant", "content": "Hello!"}
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_optional_fields_default() {
        let c = completion();
        assert!(c.usage.is_none());
        assert!(c.choices[0].logprobs.is_none());
        assert!(c.choices[0].message.tool_calls.is_none());
    }

    #[test]
    fn test_to_chunks() {
        let chunks = completion().to_chunks();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].object, "chat.completion.chunk");
        assert_eq!(chunks[0].choices[0].delta.content.as_deref(), Some("Hello!"));
        assert_eq!(chunks[0].choices[0].delta.role.as_deref(), Some("assistant"));
        assert_eq!(chunks[1].choices[0].finish_reason.as_deref(), Some("stop"));
        assert!(chunks[1].choices[0].delta.content.is_none());
    }
}
