//! `/vector_stores/{vector_store_id}/file_batches` routes.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use super::vector_store_files::attach_file;
use super::vector_stores::{missing_file, refresh_file_counts, take_file_ids};
use super::{Route, RouteContext, overlay};
use crate::error::Result;
use crate::ids::{IdPrefix, generate_id, now_unix};
use crate::merge::{self, Fields};
use crate::request::MockResponse;
use crate::store::StateCell;
use crate::types::{FileCounts, VectorStoreFileBatch};

/// `beta.vector_stores.file_batches`.
pub struct VectorStoreFileBatches {
    pub create: Arc<Route>,
    pub retrieve: Arc<Route>,
    pub cancel: Arc<Route>,
    pub list_files: Arc<Route>,
}

impl VectorStoreFileBatches {
    pub(crate) fn new(state: &StateCell) -> Self {
        Self {
            create: Route::stateful(
                "beta.vector_stores.file_batches.create",
                Method::POST,
                "/vector_stores/{vector_store_id}/file_batches",
                StatusCode::CREATED,
                state,
                create,
            ),
            retrieve: Route::stateful(
                "beta.vector_stores.file_batches.retrieve",
                Method::GET,
                "/vector_stores/{vector_store_id}/file_batches/{batch_id}",
                StatusCode::OK,
                state,
                retrieve,
            ),
            cancel: Route::stateful(
                "beta.vector_stores.file_batches.cancel",
                Method::POST,
                "/vector_stores/{vector_store_id}/file_batches/{batch_id}/cancel",
                StatusCode::OK,
                state,
                cancel,
            ),
            list_files: Route::stateful(
                "beta.vector_stores.file_batches.list_files",
                Method::GET,
                "/vector_stores/{vector_store_id}/file_batches/{batch_id}/files",
                StatusCode::OK,
                state,
                list_files,
            ),
        }
    }

    pub(crate) fn routes(&self) -> Vec<Arc<Route>> {
        vec![
            Arc::clone(&self.create),
            Arc::clone(&self.retrieve),
            Arc::clone(&self.cancel),
            Arc::clone(&self.list_files),
        ]
    }
}

/// The batch named in the path, if it belongs to the vector store in the path.
fn find_batch(ctx: &RouteContext<'_>) -> Result<Option<VectorStoreFileBatch>> {
    let vector_store_id = ctx.param("vector_store_id")?;
    if !ctx.store.beta.vector_stores.contains(vector_store_id) {
        return Ok(None);
    }
    Ok(ctx
        .store
        .beta
        .vector_stores
        .file_batches
        .get(ctx.param("batch_id")?)
        .filter(|batch| batch.vector_store_id == vector_store_id))
}

fn create(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let vector_store_id = ctx.param("vector_store_id")?;
    if !ctx.store.beta.vector_stores.contains(vector_store_id) {
        return Ok(MockResponse::not_found());
    }

    let mut body = ctx.body()?;
    let file_ids = take_file_ids(&mut body)?;
    if missing_file(&ctx.store, &file_ids).is_some() {
        return Ok(MockResponse::not_found());
    }
    let chunking_strategy = body.get("chunking_strategy").cloned().filter(|v| !v.is_null());

    let defaults = merge::object(json!({
        "id": generate_id(IdPrefix::VectorStoreFileBatch),
        "created_at": now_unix(),
        "file_counts": FileCounts::completed(file_ids.len() as u64),
        "object": "vector_store.files_batch",
        "status": "completed",
    }));
    let mut fields = merge::merge_layers(defaults, partial, Fields::new());
    fields.insert("vector_store_id".into(), Value::String(vector_store_id.into()));
    let batch: VectorStoreFileBatch = merge::build("vector_store.files_batch", fields)?;

    let batches = &ctx.store.beta.vector_stores.file_batches;
    for file_id in &file_ids {
        ctx.store.beta.vector_stores.files.put(attach_file(
            vector_store_id,
            file_id,
            chunking_strategy.clone(),
        ));
        batches.add_file(&batch.id, file_id);
    }
    batches.put(batch.clone());
    refresh_file_counts(&ctx.store, vector_store_id);
    ctx.respond(&batch)
}

fn retrieve(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(found) = find_batch(ctx)? else {
        return Ok(MockResponse::not_found());
    };
    let batch = overlay("vector_store.files_batch", found, partial)?;
    if !partial.is_empty() {
        ctx.store.beta.vector_stores.file_batches.put(batch.clone());
    }
    ctx.respond(&batch)
}

fn cancel(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(mut batch) = find_batch(ctx)? else {
        return Ok(MockResponse::not_found());
    };
    batch.status = "cancelled".to_string();
    let batch = overlay("vector_store.files_batch", batch, partial)?;
    ctx.store.beta.vector_stores.file_batches.put(batch.clone());
    ctx.respond(&batch)
}

fn list_files(ctx: &RouteContext<'_>, _partial: &Fields) -> Result<MockResponse> {
    let Some(batch) = find_batch(ctx)? else {
        return Ok(MockResponse::not_found());
    };
    let page = ctx.store.beta.vector_stores.list_files_for_batch(
        &batch.vector_store_id,
        &batch.id,
        &ctx.list_params(),
        ctx.request.query_param("filter"),
    );
    ctx.respond(&page)
}
