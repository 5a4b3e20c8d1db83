//! `/vector_stores/{vector_store_id}/files` routes.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use super::vector_stores::refresh_file_counts;
use super::{Route, RouteContext, deleted, overlay};
use crate::error::{MockError, Result};
use crate::ids::now_unix;
use crate::merge::{self, Fields};
use crate::request::MockResponse;
use crate::store::StateCell;
use crate::types::VectorStoreFile;

/// `beta.vector_stores.files`.
pub struct VectorStoreFiles {
    pub create: Arc<Route>,
    pub list: Arc<Route>,
    pub retrieve: Arc<Route>,
    pub delete: Arc<Route>,
}

impl VectorStoreFiles {
    pub(crate) fn new(state: &StateCell) -> Self {
        Self {
            create: Route::stateful(
                "beta.vector_stores.files.create",
                Method::POST,
                "/vector_stores/{vector_store_id}/files",
                StatusCode::CREATED,
                state,
                create,
            ),
            list: Route::stateful(
                "beta.vector_stores.files.list",
                Method::GET,
                "/vector_stores/{vector_store_id}/files",
                StatusCode::OK,
                state,
                list,
            ),
            retrieve: Route::stateful(
                "beta.vector_stores.files.retrieve",
                Method::GET,
                "/vector_stores/{vector_store_id}/files/{file_id}",
                StatusCode::OK,
                state,
                retrieve,
            ),
            delete: Route::stateful(
                "beta.vector_stores.files.delete",
                Method::DELETE,
                "/vector_stores/{vector_store_id}/files/{file_id}",
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
            Arc::clone(&self.delete),
        ]
    }
}

/// A processed file attached to a vector store.
pub fn attach_file(
    vector_store_id: &str,
    file_id: &str,
    chunking_strategy: Option<Value>,
) -> VectorStoreFile {
    VectorStoreFile {
        id: file_id.to_string(),
        created_at: now_unix(),
        last_error: None,
        object: "vector_store.file".to_string(),
        status: "completed".to_string(),
        usage_bytes: 0,
        vector_store_id: vector_store_id.to_string(),
        chunking_strategy,
    }
}

fn create(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let vector_store_id = ctx.param("vector_store_id")?;
    if !ctx.store.beta.vector_stores.contains(vector_store_id) {
        return Ok(MockResponse::not_found());
    }

    let mut body = ctx.body()?;
    let file_id = match body.remove("file_id") {
        Some(Value::String(id)) => id,
        _ => return Err(MockError::InvalidRequest("file_id is required".into())),
    };
    if !ctx.store.files.contains(&file_id) {
        return Ok(MockResponse::not_found());
    }

    let defaults = merge::object(json!({
        "id": file_id,
        "created_at": now_unix(),
        "object": "vector_store.file",
        "status": "completed",
        "usage_bytes": 0,
    }));
    let mut fields = merge::merge_layers(defaults, partial, body);
    // Identity comes from the path and the request, never from a partial.
    fields.insert("id".into(), json!(file_id));
    fields.insert("vector_store_id".into(), json!(vector_store_id));
    let file: VectorStoreFile = merge::build("vector_store.file", fields)?;

    ctx.store.beta.vector_stores.files.put(file.clone());
    refresh_file_counts(&ctx.store, vector_store_id);
    ctx.respond(&file)
}

fn list(ctx: &RouteContext<'_>, _partial: &Fields) -> Result<MockResponse> {
    let vector_store_id = ctx.param("vector_store_id")?;
    if !ctx.store.beta.vector_stores.contains(vector_store_id) {
        return Ok(MockResponse::not_found());
    }
    let page = ctx.store.beta.vector_stores.files.list(
        vector_store_id,
        &ctx.list_params(),
        ctx.request.query_param("filter"),
    );
    ctx.respond(&page)
}

fn retrieve(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let vector_store_id = ctx.param("vector_store_id")?;
    if !ctx.store.beta.vector_stores.contains(vector_store_id) {
        return Ok(MockResponse::not_found());
    }
    let Some(found) = ctx
        .store
        .beta
        .vector_stores
        .files
        .get(vector_store_id, ctx.param("file_id")?)
    else {
        return Ok(MockResponse::not_found());
    };
    let file = overlay("vector_store.file", found, partial)?;
    if !partial.is_empty() {
        ctx.store.beta.vector_stores.files.put(file.clone());
    }
    ctx.respond(&file)
}

fn delete(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let vector_store_id = ctx.param("vector_store_id")?;
    if !ctx.store.beta.vector_stores.contains(vector_store_id) {
        return Ok(MockResponse::not_found());
    }
    let file_id = ctx.param("file_id")?;
    let was_deleted = ctx
        .store
        .beta
        .vector_stores
        .files
        .delete(vector_store_id, file_id);
    if was_deleted {
        refresh_file_counts(&ctx.store, vector_store_id);
    }
    deleted(ctx, file_id, "vector_store.file.deleted", was_deleted, partial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::OpenAiMock;
    use crate::testing::fixtures::{self, delete as delete_req, get, post, send};

    fn seeded() -> OpenAiMock {
        let mock = OpenAiMock::new();
        mock.state().blind_put(fixtures::vector_store("vs_1"));
        mock.state().blind_put(fixtures::file("file-1"));
        mock.state().blind_put(fixtures::file("file-2"));
        mock
    }

    #[tokio::test]
    async fn test_attach_updates_counts() {
        let mock = seeded();
        let (status, body) =
            send(&mock, post("/vector_stores/vs_1/files", json!({"file_id": "file-1"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], "file-1");
        assert_eq!(body["vector_store_id"], "vs_1");
        assert_eq!(body["object"], "vector_store.file");

        let vector_store = mock.state().beta.vector_stores.get("vs_1").unwrap();
        assert_eq!(vector_store.file_counts.completed, 1);
        assert_eq!(vector_store.file_counts.total, 1);

        send(&mock, delete_req("/vector_stores/vs_1/files/file-1")).await;
        let vector_store = mock.state().beta.vector_stores.get("vs_1").unwrap();
        assert_eq!(vector_store.file_counts.total, 0);
    }

    #[tokio::test]
    async fn test_unknown_parent_or_file() {
        let mock = seeded();
        let (status, _) =
            send(&mock, post("/vector_stores/vs_x/files", json!({"file_id": "file-1"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            send(&mock, post("/vector_stores/vs_1/files", json!({"file_id": "file-x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(mock.state().beta.vector_stores.files.count("vs_1"), 0);

        let (status, _) = send(&mock, post("/vector_stores/vs_1/files", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_filter() {
        let mock = seeded();
        mock.state().blind_put(fixtures::vector_store_file("vs_1", "file-1"));
        let mut failed = fixtures::vector_store_file("vs_1", "file-2");
        failed.status = "failed".into();
        mock.state().blind_put(failed);

        let (_, body) = send(&mock, get("/vector_stores/vs_1/files?filter=failed")).await;
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["id"], "file-2");

        let (_, body) = send(&mock, get("/vector_stores/vs_1/files")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_same_file_in_two_stores() {
        let mock = seeded();
        mock.state().blind_put(fixtures::vector_store("vs_2"));
        send(&mock, post("/vector_stores/vs_1/files", json!({"file_id": "file-1"}))).await;
        send(&mock, post("/vector_stores/vs_2/files", json!({"file_id": "file-1"}))).await;

        let (_, body) = send(&mock, delete_req("/vector_stores/vs_1/files/file-1")).await;
        assert_eq!(body["deleted"], true);
        let (status, _) = send(&mock, get("/vector_stores/vs_2/files/file-1")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
