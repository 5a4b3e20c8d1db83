//! `/threads/{thread_id}/messages` routes.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use super::{Route, RouteContext, deleted, overlay};
use crate::error::{MockError, Result};
use crate::ids::{IdPrefix, generate_id, now_unix};
use crate::merge::{self, Fields};
use crate::request::MockResponse;
use crate::store::StateCell;
use crate::types::Message;

/// `beta.threads.messages`.
pub struct Messages {
    pub create: Arc<Route>,
    pub list: Arc<Route>,
    pub retrieve: Arc<Route>,
    pub update: Arc<Route>,
    pub delete: Arc<Route>,
}

impl Messages {
    pub(crate) fn new(state: &StateCell) -> Self {
        Self {
            create: Route::stateful(
                "beta.threads.messages.create",
                Method::POST,
                "/threads/{thread_id}/messages",
                StatusCode::CREATED,
                state,
                create,
            ),
            list: Route::stateful(
                "beta.threads.messages.list",
                Method::GET,
                "/threads/{thread_id}/messages",
                StatusCode::OK,
                state,
                list,
            ),
            retrieve: Route::stateful(
                "beta.threads.messages.retrieve",
                Method::GET,
                "/threads/{thread_id}/messages/{message_id}",
                StatusCode::OK,
                state,
                retrieve,
            ),
            update: Route::stateful(
                "beta.threads.messages.update",
                Method::POST,
                "/threads/{thread_id}/messages/{message_id}",
                StatusCode::OK,
                state,
                update,
            ),
            delete: Route::stateful(
                "beta.threads.messages.delete",
                Method::DELETE,
                "/threads/{thread_id}/messages/{message_id}",
                StatusCode::OK,
                state,
                delete,
            ),
        }
    }

    pub(crate) fn routes(&self) -> Vec<Arc<Route>> {
        vec![
            Arc::clone(&self.create),
            Arc::clone(&self.list),
            Arc::clone(&self.retrieve),
            Arc::clone(&self.update),
            Arc::clone(&self.delete),
        ]
    }
}

// ============================================================================
// Building
// ============================================================================

fn defaults(thread_id: &str) -> Fields {
    merge::object(json!({
        "id": generate_id(IdPrefix::Message),
        "created_at": now_unix(),
        "content": [],
        "object": "thread.message",
        "role": "user",
        "status": "completed",
        "thread_id": thread_id,
    }))
}

/// Turn create-request content into response content blocks.
///
/// A plain string becomes one text block; `text` blocks whose `text` is a
/// string gain an empty annotation list. Image blocks pass through.
fn normalize_content(content: Value) -> Result<Value> {
    match content {
        Value::String(text) => Ok(json!([
            {"type": "text", "text": {"value": text, "annotations": []}}
        ])),
        Value::Array(blocks) => Ok(Value::Array(
            blocks
                .into_iter()
                .map(|block| match block {
                    Value::Object(mut fields) => {
                        if let Some(Value::String(text)) = fields.get("text") {
                            let text = text.clone();
                            fields.insert("text".into(), json!({"value": text, "annotations": []}));
                        }
                        Value::Object(fields)
                    }
                    other => other,
                })
                .collect(),
        )),
        Value::Null => Ok(json!([])),
        _ => Err(MockError::InvalidRequest(
            "message content must be a string or an array of content blocks".into(),
        )),
    }
}

/// Build a message in `thread_id` from a create-message body.
pub fn build_message(thread_id: &str, partial: &Fields, mut request: Fields) -> Result<Message> {
    if let Some(content) = request.remove("content") {
        request.insert("content".into(), normalize_content(content)?);
    }
    let mut fields = merge::merge_layers(defaults(thread_id), partial, request);
    fields.insert("thread_id".into(), json!(thread_id));
    merge::build("thread.message", fields)
}

/// Build the initial messages of a new thread from the `messages` value of
/// its create body.
pub(crate) fn build_initial_messages(
    thread_id: &str,
    messages: Option<Value>,
) -> Result<Vec<Message>> {
    let requested = match messages {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(messages)) => messages,
        Some(_) => {
            return Err(MockError::InvalidRequest("messages must be an array".into()));
        }
    };
    requested
        .into_iter()
        .map(|message| build_message(thread_id, &Fields::new(), merge::object(message)))
        .collect()
}

/// The message named in the path, if it belongs to the thread in the path.
fn find_message(ctx: &RouteContext<'_>) -> Result<Option<Message>> {
    let thread_id = ctx.param("thread_id")?;
    if !ctx.store.beta.threads.contains(thread_id) {
        return Ok(None);
    }
    Ok(ctx
        .store
        .beta
        .threads
        .messages
        .get(ctx.param("message_id")?)
        .filter(|m| m.thread_id == thread_id))
}

// ============================================================================
// Handlers
// ============================================================================

fn create(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let thread_id = ctx.param("thread_id")?;
    if !ctx.store.beta.threads.contains(thread_id) {
        return Ok(MockResponse::not_found());
    }
    let message = build_message(thread_id, partial, ctx.body()?)?;
    ctx.store.beta.threads.messages.put(message.clone());
    ctx.respond(&message)
}

fn list(ctx: &RouteContext<'_>, _partial: &Fields) -> Result<MockResponse> {
    let thread_id = ctx.param("thread_id")?;
    if !ctx.store.beta.threads.contains(thread_id) {
        return Ok(MockResponse::not_found());
    }
    let page = ctx.store.beta.threads.messages.list(
        thread_id,
        &ctx.list_params(),
        ctx.request.query_param("run_id"),
    );
    ctx.respond(&page)
}

fn retrieve(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(found) = find_message(ctx)? else {
        return Ok(MockResponse::not_found());
    };
    let message = overlay("thread.message", found, partial)?;
    if !partial.is_empty() {
        ctx.store.beta.threads.messages.put(message.clone());
    }
    ctx.respond(&message)
}

fn update(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(found) = find_message(ctx)? else {
        return Ok(MockResponse::not_found());
    };
    let updated = merge::update("thread.message", &found, partial, ctx.body()?)?;
    ctx.store.beta.threads.messages.put(updated.clone());
    ctx.respond(&updated)
}

fn delete(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let thread_id = ctx.param("thread_id")?;
    if !ctx.store.beta.threads.contains(thread_id) {
        return Ok(MockResponse::not_found());
    }
    let message_id = ctx.param("message_id")?;
    let was_deleted = find_message(ctx)?.is_some()
        && ctx.store.beta.threads.messages.delete(message_id);
    deleted(ctx, message_id, "thread.message.deleted", was_deleted, partial)
}
