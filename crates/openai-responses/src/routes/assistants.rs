//! `/assistants` routes.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::json;

use super::vector_stores::plan_nested;
use super::{Route, RouteContext, deleted, overlay};
use crate::error::Result;
use crate::ids::{IdPrefix, generate_id, now_unix};
use crate::merge::{self, Fields};
use crate::request::MockResponse;
use crate::store::StateCell;
use crate::types::Assistant;

/// `beta.assistants`.
pub struct Assistants {
    pub create: Arc<Route>,
    pub list: Arc<Route>,
    pub retrieve: Arc<Route>,
    pub update: Arc<Route>,
    pub delete: Arc<Route>,
}

impl Assistants {
    pub(crate) fn new(state: &StateCell) -> Self {
        Self {
            create: Route::stateful(
                "beta.assistants.create",
                Method::POST,
                "/assistants",
                StatusCode::CREATED,
                state,
                create,
            ),
            list: Route::stateful(
                "beta.assistants.list",
                Method::GET,
                "/assistants",
                StatusCode::OK,
                state,
                list,
            ),
            retrieve: Route::stateful(
                "beta.assistants.retrieve",
                Method::GET,
                "/assistants/{assistant_id}",
                StatusCode::OK,
                state,
                retrieve,
            ),
            update: Route::stateful(
                "beta.assistants.update",
                Method::POST,
                "/assistants/{assistant_id}",
                StatusCode::OK,
                state,
                update,
            ),
            delete: Route::stateful(
                "beta.assistants.delete",
                Method::DELETE,
                "/assistants/{assistant_id}",
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

fn defaults() -> Fields {
    merge::object(json!({
        "id": generate_id(IdPrefix::Assistant),
        "created_at": now_unix(),
        "object": "assistant",
        "tools": [],
    }))
}

/// Build an assistant from defaults, a test partial and a create body.
pub fn build_assistant(partial: &Fields, request: Fields) -> Result<Assistant> {
    merge::build("assistant", merge::merge_layers(defaults(), partial, request))
}

fn create(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let mut body = ctx.body()?;
    let Some(plan) = plan_nested(&ctx.store, &mut body)? else {
        return Ok(MockResponse::not_found());
    };
    let assistant = build_assistant(partial, body)?;

    plan.commit(&ctx.store);
    ctx.store.beta.assistants.put(assistant.clone());
    ctx.respond(&assistant)
}

fn list(ctx: &RouteContext<'_>, _partial: &Fields) -> Result<MockResponse> {
    ctx.respond(&ctx.store.beta.assistants.list(&ctx.list_params()))
}

fn retrieve(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(found) = ctx.store.beta.assistants.get(ctx.param("assistant_id")?) else {
        return Ok(MockResponse::not_found());
    };
    let assistant = overlay("assistant", found, partial)?;
    if !partial.is_empty() {
        ctx.store.beta.assistants.put(assistant.clone());
    }
    ctx.respond(&assistant)
}

fn update(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(found) = ctx.store.beta.assistants.get(ctx.param("assistant_id")?) else {
        return Ok(MockResponse::not_found());
    };
    let updated = merge::update("assistant", &found, partial, ctx.body()?)?;
    ctx.store.beta.assistants.put(updated.clone());
    ctx.respond(&updated)
}

fn delete(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let id = ctx.param("assistant_id")?;
    let was_deleted = ctx.store.beta.assistants.delete(id);
    deleted(ctx, id, "assistant.deleted", was_deleted, partial)
}
