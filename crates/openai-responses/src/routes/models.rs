//! `/models` routes.

use std::sync::Arc;

use axum::http::{Method, StatusCode};

use super::{Route, RouteContext, deleted, overlay};
use crate::error::Result;
use crate::merge::Fields;
use crate::request::MockResponse;
use crate::store::StateCell;

/// `models`.
pub struct Models {
    pub list: Arc<Route>,
    pub retrieve: Arc<Route>,
    pub delete: Arc<Route>,
}

impl Models {
    pub(crate) fn new(state: &StateCell) -> Self {
        Self {
            list: Route::stateful("models.list", Method::GET, "/models", StatusCode::OK, state, list),
            retrieve: Route::stateful(
                "models.retrieve",
                Method::GET,
                "/models/{model}",
                StatusCode::OK,
                state,
                retrieve,
            ),
            delete: Route::stateful(
                "models.delete",
                Method::DELETE,
                "/models/{model}",
                StatusCode::OK,
                state,
                delete,
            ),
        }
    }

    pub(crate) fn routes(&self) -> Vec<Arc<Route>> {
        vec![
            Arc::clone(&self.list),
            Arc::clone(&self.retrieve),
            Arc::clone(&self.delete),
        ]
    }
}

fn list(ctx: &RouteContext<'_>, _partial: &Fields) -> Result<MockResponse> {
    ctx.respond(&ctx.store.models.list())
}

fn retrieve(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(found) = ctx.store.models.get(ctx.param("model")?) else {
        return Ok(MockResponse::not_found());
    };
    let model = overlay("model", found, partial)?;
    if !partial.is_empty() {
        ctx.store.models.put(model.clone());
    }
    ctx.respond(&model)
}

fn delete(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let id = ctx.param("model")?;
    let was_deleted = ctx.store.models.delete(id);
    deleted(ctx, id, "model", was_deleted, partial)
}
