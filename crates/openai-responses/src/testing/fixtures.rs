//! Test fixtures: resources with fixed ids and helpers to drive a mock.

use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::mock::OpenAiMock;
use crate::request::MockRequest;
use crate::types::{
    Assistant, FileObject, Message, Run, Thread, VectorStore, VectorStoreFile,
};

// ============================================================================
// Resources
// ============================================================================

pub fn assistant(id: &str) -> Assistant {
    serde_json::from_value(json!({
        "id": id,
        "created_at": 1_700_000_000,
        "instructions": "You are a helpful assistant.",
        "model": "gpt-4o",
        "name": "Fixture",
        "object": "assistant",
        "tools": [{"type": "code_interpreter"}]
    }))
    .unwrap()
}

pub fn thread(id: &str) -> Thread {
    serde_json::from_value(json!({
        "id": id,
        "created_at": 1_700_000_000,
        "object": "thread"
    }))
    .unwrap()
}

pub fn message(id: &str, thread_id: &str, text: &str) -> Message {
    serde_json::from_value(json!({
        "id": id,
        "created_at": 1_700_000_000,
        "content": [{"type": "text", "text": {"value": text, "annotations": []}}],
        "object": "thread.message",
        "role": "user",
        "status": "completed",
        "thread_id": thread_id
    }))
    .unwrap()
}

pub fn run(id: &str, thread_id: &str, assistant_id: &str) -> Run {
    serde_json::from_value(json!({
        "id": id,
        "assistant_id": assistant_id,
        "created_at": 1_700_000_000,
        "instructions": "",
        "model": "gpt-4o",
        "object": "thread.run",
        "status": "queued",
        "thread_id": thread_id
    }))
    .unwrap()
}

pub fn file(id: &str) -> FileObject {
    serde_json::from_value(json!({
        "id": id,
        "bytes": 5,
        "created_at": 1_700_000_000,
        "filename": "fixture.txt",
        "object": "file",
        "purpose": "assistants",
        "status": "uploaded"
    }))
    .unwrap()
}

pub fn vector_store(id: &str) -> VectorStore {
    serde_json::from_value(json!({
        "id": id,
        "created_at": 1_700_000_000,
        "name": "fixture",
        "object": "vector_store",
        "status": "completed"
    }))
    .unwrap()
}

pub fn vector_store_file(vector_store_id: &str, file_id: &str) -> VectorStoreFile {
    serde_json::from_value(json!({
        "id": file_id,
        "created_at": 1_700_000_000,
        "object": "vector_store.file",
        "status": "completed",
        "vector_store_id": vector_store_id
    }))
    .unwrap()
}

// ============================================================================
// Requests
// ============================================================================

/// A JSON POST under the default base path.
pub fn post(path: &str, body: Value) -> MockRequest {
    MockRequest::post(&format!("/v1{}", path)).with_json(&body)
}

pub fn get(path: &str) -> MockRequest {
    MockRequest::get(&format!("/v1{}", path))
}

pub fn delete(path: &str) -> MockRequest {
    MockRequest::delete(&format!("/v1{}", path))
}

/// Dispatch a request and decode the response. Bodiless responses decode
/// to `null`.
pub async fn send(mock: &OpenAiMock, request: MockRequest) -> (StatusCode, Value) {
    let response = mock.handle(request).await;
    let status = response.status;
    (status, response.into_json().unwrap_or(Value::Null))
}
