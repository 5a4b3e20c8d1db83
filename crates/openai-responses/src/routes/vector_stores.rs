//! `/vector_stores` routes, plus the nested vector store creation shared by
//! assistants and threads.

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use super::vector_store_file_batches::VectorStoreFileBatches;
use super::vector_store_files::{VectorStoreFiles, attach_file};
use super::{Route, RouteContext, deleted, overlay};
use crate::error::{MockError, Result};
use crate::ids::{IdPrefix, generate_id, now_unix};
use crate::merge::{self, Fields};
use crate::request::MockResponse;
use crate::store::{StateCell, StateStore};
use crate::types::{FileCounts, VectorStore, VectorStoreFile};

/// `beta.vector_stores`.
pub struct VectorStores {
    pub create: Arc<Route>,
    pub list: Arc<Route>,
    pub retrieve: Arc<Route>,
    pub update: Arc<Route>,
    pub delete: Arc<Route>,
    pub files: VectorStoreFiles,
    pub file_batches: VectorStoreFileBatches,
}

impl VectorStores {
    pub(crate) fn new(state: &StateCell) -> Self {
        Self {
            create: Route::stateful(
                "beta.vector_stores.create",
                Method::POST,
                "/vector_stores",
                StatusCode::CREATED,
                state,
                create,
            ),
            list: Route::stateful(
                "beta.vector_stores.list",
                Method::GET,
                "/vector_stores",
                StatusCode::OK,
                state,
                list,
            ),
            retrieve: Route::stateful(
                "beta.vector_stores.retrieve",
                Method::GET,
                "/vector_stores/{vector_store_id}",
                StatusCode::OK,
                state,
                retrieve,
            ),
            update: Route::stateful(
                "beta.vector_stores.update",
                Method::POST,
                "/vector_stores/{vector_store_id}",
                StatusCode::OK,
                state,
                update,
            ),
            delete: Route::stateful(
                "beta.vector_stores.delete",
                Method::DELETE,
                "/vector_stores/{vector_store_id}",
                StatusCode::OK,
                state,
                delete,
            ),
            files: VectorStoreFiles::new(state),
            file_batches: VectorStoreFileBatches::new(state),
        }
    }

    pub(crate) fn routes(&self) -> Vec<Arc<Route>> {
        let mut routes = vec![
            Arc::clone(&self.create),
            Arc::clone(&self.list),
            Arc::clone(&self.retrieve),
            Arc::clone(&self.update),
            Arc::clone(&self.delete),
        ];
        routes.extend(self.files.routes());
        routes.extend(self.file_batches.routes());
        routes
    }
}

// ============================================================================
// Building
// ============================================================================

fn defaults() -> Fields {
    merge::object(json!({
        "id": generate_id(IdPrefix::VectorStore),
        "created_at": now_unix(),
        "file_counts": FileCounts::default(),
        "name": "",
        "object": "vector_store",
        "status": "completed",
        "usage_bytes": 0,
    }))
}

/// Build a vector store from defaults, a test partial and a create body.
pub fn build_vector_store(partial: &Fields, request: Fields) -> Result<VectorStore> {
    merge::build("vector_store", merge::merge_layers(defaults(), partial, request))
}

/// Remove `file_ids` from a body. A missing key reads as no files; a
/// repeated id is kept once, at its first position.
pub(crate) fn take_file_ids(body: &mut Fields) -> Result<Vec<String>> {
    let mut file_ids: Vec<String> = match body.remove("file_ids") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| MockError::InvalidRequest(format!("file_ids: {}", e)))?,
    };
    let mut seen = HashSet::new();
    file_ids.retain(|id| seen.insert(id.clone()));
    Ok(file_ids)
}

/// The first id that names no uploaded file.
pub(crate) fn missing_file<'a>(
    store: &StateStore,
    file_ids: impl IntoIterator<Item = &'a String>,
) -> Option<&'a String> {
    file_ids.into_iter().find(|id| !store.files.contains(id))
}

/// Recount a vector store's files by status.
pub(crate) fn refresh_file_counts(store: &StateStore, vector_store_id: &str) {
    let Some(mut vector_store) = store.beta.vector_stores.get(vector_store_id) else {
        return;
    };
    let files = store.beta.vector_stores.files.scoped(vector_store_id, None);
    let count = |status: &str| files.iter().filter(|f| f.status == status).count() as u64;
    vector_store.file_counts = FileCounts {
        cancelled: count("cancelled"),
        completed: count("completed"),
        failed: count("failed"),
        in_progress: count("in_progress"),
        total: files.len() as u64,
    };
    store.beta.vector_stores.put(vector_store);
}

// ============================================================================
// Nested creation
// ============================================================================

/// Vector stores requested inside a parent's `tool_resources`, built but not
/// yet stored.
#[derive(Debug, Default)]
pub(crate) struct VectorStorePlan {
    vector_stores: Vec<VectorStore>,
    files: Vec<VectorStoreFile>,
}

impl VectorStorePlan {
    pub(crate) fn is_empty(&self) -> bool {
        self.vector_stores.is_empty()
    }

    /// Write the planned records.
    pub(crate) fn commit(self, store: &StateStore) {
        for vector_store in self.vector_stores {
            store.beta.vector_stores.put(vector_store);
        }
        for file in self.files {
            store.beta.vector_stores.files.put(file);
        }
    }
}

/// Take `tool_resources.file_search.vector_stores` out of `body`, plan one
/// vector store per entry and append their ids to
/// `tool_resources.file_search.vector_store_ids`.
///
/// Every referenced file is checked before anything is planned; `Ok(None)`
/// means one of them does not exist and the body is left untouched.
pub(crate) fn plan_nested(store: &StateStore, body: &mut Fields) -> Result<Option<VectorStorePlan>> {
    let Some(file_search) = body
        .get_mut("tool_resources")
        .and_then(|r| r.get_mut("file_search"))
        .and_then(Value::as_object_mut)
    else {
        return Ok(Some(VectorStorePlan::default()));
    };

    let requested = match file_search.get("vector_stores") {
        None | Some(Value::Null) => return Ok(Some(VectorStorePlan::default())),
        Some(Value::Array(entries)) => entries
            .iter()
            .map(|entry| match entry {
                Value::Object(fields) => Ok(fields.clone()),
                _ => Err(MockError::InvalidRequest(
                    "tool_resources.file_search.vector_stores entries must be objects".into(),
                )),
            })
            .collect::<Result<Vec<Fields>>>()?,
        Some(_) => {
            return Err(MockError::InvalidRequest(
                "tool_resources.file_search.vector_stores must be an array".into(),
            ));
        }
    };

    let mut nested = Vec::with_capacity(requested.len());
    for mut entry in requested {
        let file_ids = take_file_ids(&mut entry)?;
        nested.push((entry, file_ids));
    }
    if let Some(missing) = missing_file(store, nested.iter().flat_map(|(_, ids)| ids)) {
        tracing::debug!(file_id = %missing, "Nested vector store references unknown file");
        return Ok(None);
    }

    let mut plan = VectorStorePlan::default();
    for (mut entry, file_ids) in nested {
        let chunking_strategy = entry.remove("chunking_strategy");
        let mut request = Fields::new();
        if let Some(metadata) = entry.remove("metadata") {
            request.insert("metadata".into(), metadata);
        }
        request.insert(
            "file_counts".into(),
            serde_json::to_value(FileCounts::completed(file_ids.len() as u64))?,
        );
        let vector_store = build_vector_store(&Fields::new(), request)?;
        for file_id in &file_ids {
            plan.files.push(attach_file(
                &vector_store.id,
                file_id,
                chunking_strategy.clone(),
            ));
        }
        plan.vector_stores.push(vector_store);
    }

    file_search.remove("vector_stores");
    let ids = file_search
        .entry("vector_store_ids")
        .or_insert(Value::Null);
    if ids.is_null() {
        *ids = Value::Array(Vec::new());
    }
    match ids {
        Value::Array(ids) => ids.extend(
            plan.vector_stores
                .iter()
                .map(|vs| Value::String(vs.id.clone())),
        ),
        _ => {
            return Err(MockError::InvalidRequest(
                "tool_resources.file_search.vector_store_ids must be an array".into(),
            ));
        }
    }
    Ok(Some(plan))
}

// ============================================================================
// Handlers
// ============================================================================

fn create(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let mut body = ctx.body()?;
    let file_ids = take_file_ids(&mut body)?;
    let chunking_strategy = body.remove("chunking_strategy");
    if missing_file(&ctx.store, &file_ids).is_some() {
        return Ok(MockResponse::not_found());
    }

    let mut defaults = defaults();
    defaults.insert(
        "file_counts".into(),
        serde_json::to_value(FileCounts::completed(file_ids.len() as u64))?,
    );
    let vector_store: VectorStore =
        merge::build("vector_store", merge::merge_layers(defaults, partial, body))?;

    for file_id in &file_ids {
        ctx.store.beta.vector_stores.files.put(attach_file(
            &vector_store.id,
            file_id,
            chunking_strategy.clone(),
        ));
    }
    ctx.store.beta.vector_stores.put(vector_store.clone());
    ctx.respond(&vector_store)
}

fn list(ctx: &RouteContext<'_>, _partial: &Fields) -> Result<MockResponse> {
    ctx.respond(&ctx.store.beta.vector_stores.list(&ctx.list_params()))
}

fn retrieve(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(found) = ctx.store.beta.vector_stores.get(ctx.param("vector_store_id")?) else {
        return Ok(MockResponse::not_found());
    };
    let vector_store = overlay("vector_store", found, partial)?;
    if !partial.is_empty() {
        ctx.store.beta.vector_stores.put(vector_store.clone());
    }
    ctx.respond(&vector_store)
}

fn update(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(found) = ctx.store.beta.vector_stores.get(ctx.param("vector_store_id")?) else {
        return Ok(MockResponse::not_found());
    };
    let updated = merge::update("vector_store", &found, partial, ctx.body()?)?;
    ctx.store.beta.vector_stores.put(updated.clone());
    ctx.respond(&updated)
}

fn delete(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let id = ctx.param("vector_store_id")?;
    let was_deleted = ctx.store.beta.vector_stores.delete(id);
    deleted(ctx, id, "vector_store.deleted", was_deleted, partial)
}
