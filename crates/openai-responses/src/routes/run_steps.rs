//! `/threads/{thread_id}/runs/{run_id}/steps` routes.
//!
//! Steps are never created by a request; tests seed them with
//! [`StateStore::blind_put`](crate::store::StateStore::blind_put) or build
//! them with [`build_run_step`].

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::json;

use super::{Route, RouteContext, overlay};
use crate::error::Result;
use crate::ids::{IdPrefix, generate_id, now_unix};
use crate::merge::{self, Fields};
use crate::request::MockResponse;
use crate::store::StateCell;
use crate::types::{Run, RunStep};

/// `beta.threads.runs.steps`.
pub struct RunSteps {
    pub list: Arc<Route>,
    pub retrieve: Arc<Route>,
}

impl RunSteps {
    pub(crate) fn new(state: &StateCell) -> Self {
        Self {
            list: Route::stateful(
                "beta.threads.runs.steps.list",
                Method::GET,
                "/threads/{thread_id}/runs/{run_id}/steps",
                StatusCode::OK,
                state,
                list,
            ),
            retrieve: Route::stateful(
                "beta.threads.runs.steps.retrieve",
                Method::GET,
                "/threads/{thread_id}/runs/{run_id}/steps/{step_id}",
                StatusCode::OK,
                state,
                retrieve,
            ),
        }
    }

    pub(crate) fn routes(&self) -> Vec<Arc<Route>> {
        vec![Arc::clone(&self.list), Arc::clone(&self.retrieve)]
    }
}

/// Build a step of `run`. Without a partial the step is an in-progress
/// tool-calls step with no calls yet.
pub fn build_run_step(run: &Run, partial: &Fields) -> Result<RunStep> {
    let defaults = merge::object(json!({
        "id": generate_id(IdPrefix::RunStep),
        "assistant_id": run.assistant_id,
        "created_at": now_unix(),
        "object": "thread.run.step",
        "run_id": run.id,
        "status": "in_progress",
        "step_details": {"type": "tool_calls", "tool_calls": []},
        "thread_id": run.thread_id,
        "type": "tool_calls",
    }));
    merge::build(
        "thread.run.step",
        merge::merge_layers(defaults, partial, Fields::new()),
    )
}

/// Whether the thread exists and the run belongs to it.
fn run_exists(ctx: &RouteContext<'_>) -> Result<bool> {
    let thread_id = ctx.param("thread_id")?;
    if !ctx.store.beta.threads.contains(thread_id) {
        return Ok(false);
    }
    Ok(ctx
        .store
        .beta
        .threads
        .runs
        .get(ctx.param("run_id")?)
        .is_some_and(|run| run.thread_id == thread_id))
}

fn list(ctx: &RouteContext<'_>, _partial: &Fields) -> Result<MockResponse> {
    if !run_exists(ctx)? {
        return Ok(MockResponse::not_found());
    }
    let page = ctx.store.beta.threads.runs.steps.list(
        ctx.param("thread_id")?,
        ctx.param("run_id")?,
        &ctx.list_params(),
    );
    ctx.respond(&page)
}

fn retrieve(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    if !run_exists(ctx)? {
        return Ok(MockResponse::not_found());
    }
    let run_id = ctx.param("run_id")?;
    let Some(found) = ctx
        .store
        .beta
        .threads
        .runs
        .steps
        .get(ctx.param("step_id")?)
        .filter(|step| step.run_id == run_id)
    else {
        return Ok(MockResponse::not_found());
    };
    let step = overlay("thread.run.step", found, partial)?;
    if !partial.is_empty() {
        ctx.store.beta.threads.runs.steps.put(step.clone());
    }
    ctx.respond(&step)
}
