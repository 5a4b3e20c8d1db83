//! Token counting for usage blocks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde_json::Value;
use tiktoken_rs::CoreBPE;

use crate::error::{MockError, Result};
use crate::types::{ChatCompletion, CompletionUsage};

fn encoders() -> &'static Mutex<HashMap<String, Arc<CoreBPE>>> {
    static ENCODERS: OnceLock<Mutex<HashMap<String, Arc<CoreBPE>>>> = OnceLock::new();
    ENCODERS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// The encoder for a model, `cl100k_base` for models tiktoken doesn't know.
fn encoder(model: &str) -> Result<Arc<CoreBPE>> {
    let mut cache = encoders().lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(bpe) = cache.get(model) {
        return Ok(Arc::clone(bpe));
    }

    let bpe = match tiktoken_rs::get_bpe_from_model(model) {
        Ok(bpe) => bpe,
        Err(_) => {
            tracing::debug!(model, "Unknown model for tokenizer, using cl100k_base");
            tiktoken_rs::cl100k_base().map_err(|e| MockError::Tokenizer(e.to_string()))?
        }
    };
    let bpe = Arc::new(bpe);
    cache.insert(model.to_string(), Arc::clone(&bpe));
    Ok(bpe)
}

/// Number of tokens `text` encodes to for `model`.
pub fn count_tokens(model: &str, text: &str) -> Result<u64> {
    if text.is_empty() {
        return Ok(0);
    }
    let bpe = encoder(model)?;
    Ok(bpe.encode_with_special_tokens(text).len() as u64)
}

/// The prompt text of a chat request: every message's content joined.
pub fn prompt_text(messages: &[Value]) -> String {
    messages
        .iter()
        .map(|m| match m.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(""),
            _ => String::new(),
        })
        .collect()
}

/// Text the completion generated: message content, or tool call arguments
/// when there is no content.
pub fn generated_text(completion: &ChatCompletion) -> String {
    let mut generated = String::new();
    for choice in &completion.choices {
        if let Some(content) = &choice.message.content {
            generated.push_str(content);
        } else if let Some(calls) = &choice.message.tool_calls {
            for call in calls {
                generated.push_str(&call.function.arguments);
            }
        }
    }
    generated
}

/// Fill in `usage` from the request's messages unless it is already set.
pub fn add_token_usage_for_completion(
    completion: &mut ChatCompletion,
    messages: &[Value],
) -> Result<()> {
    if completion.usage.is_some() {
        return Ok(());
    }
    let completion_tokens = count_tokens(&completion.model, &generated_text(completion))?;
    let prompt_tokens = count_tokens(&completion.model, &prompt_text(messages))?;
    completion.usage = Some(CompletionUsage {
        completion_tokens,
        prompt_tokens,
        total_tokens: completion_tokens + prompt_tokens,
    });
    Ok(())
}
