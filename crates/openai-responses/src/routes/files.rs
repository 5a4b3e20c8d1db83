//! `/files` routes.

use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, StatusCode};
use serde_json::{Value, json};

use super::{Route, RouteContext, deleted, overlay};
use crate::error::{MockError, Result};
use crate::ids::{IdPrefix, generate_id, now_unix};
use crate::merge::{self, Fields};
use crate::request::{MockResponse, ResponseBody};
use crate::store::StateCell;
use crate::types::FileObject;

/// Purpose of an upload that names none.
pub const DEFAULT_PURPOSE: &str = "assistants";

/// `files`.
pub struct Files {
    pub create: Arc<Route>,
    pub list: Arc<Route>,
    pub retrieve: Arc<Route>,
    pub delete: Arc<Route>,
    pub content: Arc<Route>,
}

impl Files {
    pub(crate) fn new(state: &StateCell) -> Self {
        Self {
            create: Route::stateful(
                "files.create",
                Method::POST,
                "/files",
                StatusCode::CREATED,
                state,
                create,
            ),
            list: Route::stateful("files.list", Method::GET, "/files", StatusCode::OK, state, list),
            retrieve: Route::stateful(
                "files.retrieve",
                Method::GET,
                "/files/{file_id}",
                StatusCode::OK,
                state,
                retrieve,
            ),
            delete: Route::stateful(
                "files.delete",
                Method::DELETE,
                "/files/{file_id}",
                StatusCode::OK,
                state,
                delete,
            ),
            content: Route::stateful(
                "files.content",
                Method::GET,
                "/files/{file_id}/content",
                StatusCode::OK,
                state,
                content,
            ),
        }
    }

    pub(crate) fn routes(&self) -> Vec<Arc<Route>> {
        vec![
            Arc::clone(&self.create),
            Arc::clone(&self.list),
            Arc::clone(&self.retrieve),
            Arc::clone(&self.delete),
            Arc::clone(&self.content),
        ]
    }
}

fn create(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let form = ctx.request.form.as_ref().ok_or_else(|| {
        MockError::InvalidRequest("file uploads must be multipart/form-data".into())
    })?;
    let upload = form
        .file()
        .ok_or_else(|| MockError::InvalidRequest("missing file part".into()))?;
    let purpose = form
        .text("purpose")
        .unwrap_or_else(|| DEFAULT_PURPOSE.to_string());

    let defaults = merge::object(json!({
        "id": generate_id(IdPrefix::File),
        "bytes": upload.data.len(),
        "created_at": now_unix(),
        "filename": upload.filename.clone().unwrap_or_default(),
        "object": "file",
        "purpose": purpose,
        "status": "uploaded",
    }));
    let file: FileObject =
        merge::build("file", merge::merge_layers(defaults, partial, Fields::new()))?;

    ctx.store.files.content.put(file.id.clone(), upload.data.clone());
    ctx.store.files.put(file.clone());
    ctx.respond(&file)
}

fn list(ctx: &RouteContext<'_>, _partial: &Fields) -> Result<MockResponse> {
    let page = ctx
        .store
        .files
        .list(ctx.request.query_param("purpose"), &ctx.list_params());
    ctx.respond(&page)
}

fn retrieve(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(found) = ctx.store.files.get(ctx.param("file_id")?) else {
        return Ok(MockResponse::not_found());
    };
    let file = overlay("file", found, partial)?;
    if !partial.is_empty() {
        ctx.store.files.put(file.clone());
    }
    ctx.respond(&file)
}

fn delete(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let id = ctx.param("file_id")?;
    let was_deleted = ctx.store.files.delete(id);
    deleted(ctx, id, "file", was_deleted, partial)
}

/// Raw bytes of an upload. A partial may replace them with `{"content": "..."}`.
fn content(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let id = ctx.param("file_id")?;
    if !ctx.store.files.contains(id) {
        return Ok(MockResponse::not_found());
    }
    let bytes = match partial.get("content") {
        Some(Value::String(text)) => text.clone().into(),
        _ => ctx.store.files.content.get(id).unwrap_or_default(),
    };
    Ok(MockResponse::empty(ctx.status)
        .with_header(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        )
        .with_body(ResponseBody::Bytes(bytes)))
}
