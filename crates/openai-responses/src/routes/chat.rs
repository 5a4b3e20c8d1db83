//! `/chat/completions`.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use super::{Route, RouteContext, wants_stream};
use crate::error::Result;
use crate::ids::{IdPrefix, generate_id, now_unix};
use crate::merge::{self, Fields};
use crate::request::MockResponse;
use crate::store::StateCell;
use crate::streaming::{Event, EventStream};
use crate::tokens;
use crate::types::{ChatCompletion, ChatCompletionChunk};

/// `chat`, and its `beta.chat` alias.
pub struct Chat {
    pub completions: Completions,
}

/// `chat.completions`.
pub struct Completions {
    pub create: Arc<Route>,
}

impl Chat {
    pub(crate) fn new(state: &StateCell) -> Self {
        Self {
            completions: Completions {
                create: Route::stateless(
                    "chat.completions.create",
                    Method::POST,
                    "/chat/completions",
                    StatusCode::CREATED,
                    state,
                    create,
                ),
            },
        }
    }

    /// A second handle on the same routes, for the `beta` namespace.
    pub(crate) fn alias(&self) -> Self {
        Self {
            completions: Completions {
                create: Arc::clone(&self.completions.create),
            },
        }
    }

    pub(crate) fn routes(&self) -> Vec<Arc<Route>> {
        vec![Arc::clone(&self.completions.create)]
    }
}

/// Build a completion for a create body. `usage` is counted from the
/// request's messages and the generated text unless the partial sets it.
pub fn build_chat_completion(partial: &Fields, mut request: Fields) -> Result<ChatCompletion> {
    let messages = match request.remove("messages") {
        Some(Value::Array(messages)) => messages,
        _ => Vec::new(),
    };
    let defaults = merge::object(json!({
        "id": generate_id(IdPrefix::ChatCompletion),
        "choices": [],
        "created": now_unix(),
        "object": "chat.completion",
    }));
    let mut completion: ChatCompletion =
        merge::build("chat.completion", merge::merge_layers(defaults, partial, request))?;
    tokens::add_token_usage_for_completion(&mut completion, &messages)?;
    Ok(completion)
}

/// Data-only chunk events for a completion, with a trailing usage chunk
/// when the request asked for one.
pub fn chunk_stream(completion: &ChatCompletion, include_usage: bool) -> EventStream {
    let mut chunks = completion.to_chunks();
    if include_usage {
        chunks.push(ChatCompletionChunk {
            id: completion.id.clone(),
            choices: Vec::new(),
            created: completion.created,
            model: completion.model.clone(),
            object: "chat.completion.chunk".to_string(),
            system_fingerprint: completion.system_fingerprint.clone(),
            usage: completion.usage,
        });
    }
    EventStream::new(chunks.into_iter().map(Event::data_only))
}

fn create(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let body = ctx.body()?;
    let stream = wants_stream(&body);
    let include_usage = body
        .get("stream_options")
        .and_then(|o| o.get("include_usage"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let completion = build_chat_completion(partial, body)?;
    if stream {
        return Ok(MockResponse::stream(
            StatusCode::OK,
            chunk_stream(&completion, include_usage),
        ));
    }
    ctx.respond(&completion)
}
