//! `/threads` routes.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::json;

use super::messages::{Messages, build_initial_messages};
use super::runs::{Runs, create_and_run};
use super::vector_stores::plan_nested;
use super::{Route, RouteContext, deleted, overlay};
use crate::error::Result;
use crate::ids::{IdPrefix, generate_id, now_unix};
use crate::merge::{self, Fields};
use crate::request::MockResponse;
use crate::store::StateCell;
use crate::types::Thread;

/// `beta.threads`.
pub struct Threads {
    pub create: Arc<Route>,
    pub retrieve: Arc<Route>,
    pub update: Arc<Route>,
    pub delete: Arc<Route>,
    pub create_and_run: Arc<Route>,
    pub messages: Messages,
    pub runs: Runs,
}

impl Threads {
    pub(crate) fn new(state: &StateCell) -> Self {
        Self {
            create: Route::stateful(
                "beta.threads.create",
                Method::POST,
                "/threads",
                StatusCode::CREATED,
                state,
                create,
            ),
            retrieve: Route::stateful(
                "beta.threads.retrieve",
                Method::GET,
                "/threads/{thread_id}",
                StatusCode::OK,
                state,
                retrieve,
            ),
            update: Route::stateful(
                "beta.threads.update",
                Method::POST,
                "/threads/{thread_id}",
                StatusCode::OK,
                state,
                update,
            ),
            delete: Route::stateful(
                "beta.threads.delete",
                Method::DELETE,
                "/threads/{thread_id}",
                StatusCode::OK,
                state,
                delete,
            ),
            create_and_run: Route::stateful(
                "beta.threads.create_and_run",
                Method::POST,
                "/threads/runs",
                StatusCode::CREATED,
                state,
                create_and_run,
            ),
            messages: Messages::new(state),
            runs: Runs::new(state),
        }
    }

    pub(crate) fn routes(&self) -> Vec<Arc<Route>> {
        let mut routes = vec![
            Arc::clone(&self.create),
            Arc::clone(&self.retrieve),
            Arc::clone(&self.update),
            Arc::clone(&self.delete),
            Arc::clone(&self.create_and_run),
        ];
        routes.extend(self.messages.routes());
        routes.extend(self.runs.routes());
        routes
    }
}

fn defaults() -> Fields {
    merge::object(json!({
        "id": generate_id(IdPrefix::Thread),
        "created_at": now_unix(),
        "object": "thread",
    }))
}

/// Build a thread from defaults, a test partial and a create body. The
/// body must no longer carry `messages`.
pub fn build_thread(partial: &Fields, request: Fields) -> Result<Thread> {
    merge::build("thread", merge::merge_layers(defaults(), partial, request))
}

fn create(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let mut body = ctx.body()?;
    let messages = body.remove("messages");
    let Some(plan) = plan_nested(&ctx.store, &mut body)? else {
        return Ok(MockResponse::not_found());
    };
    let thread = build_thread(partial, body)?;
    let messages = build_initial_messages(&thread.id, messages)?;

    plan.commit(&ctx.store);
    ctx.store.beta.threads.put(thread.clone());
    for message in messages {
        ctx.store.beta.threads.messages.put(message);
    }
    ctx.respond(&thread)
}

fn retrieve(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(found) = ctx.store.beta.threads.get(ctx.param("thread_id")?) else {
        return Ok(MockResponse::not_found());
    };
    let thread = overlay("thread", found, partial)?;
    if !partial.is_empty() {
        ctx.store.beta.threads.put(thread.clone());
    }
    ctx.respond(&thread)
}

fn update(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(found) = ctx.store.beta.threads.get(ctx.param("thread_id")?) else {
        return Ok(MockResponse::not_found());
    };
    let updated = merge::update("thread", &found, partial, ctx.body()?)?;
    ctx.store.beta.threads.put(updated.clone());
    ctx.respond(&updated)
}

fn delete(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let id = ctx.param("thread_id")?;
    let was_deleted = ctx.store.beta.threads.delete(id);
    deleted(ctx, id, "thread.deleted", was_deleted, partial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::OpenAiMock;
    use crate::testing::fixtures::{self, delete as delete_req, get, post, send};

    #[tokio::test]
    async fn test_create_with_messages() {
        let mock = OpenAiMock::new();
        let (status, body) = send(
            &mock,
            post(
                "/threads",
                json!({
                    "messages": [
                        {"role": "user", "content": "Hello"},
                        {"role": "user", "content": "Anyone there?"}
                    ],
                    "metadata": {"topic": "greeting"}
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["object"], "thread");
        assert_eq!(body["metadata"]["topic"], "greeting");
        assert!(body.get("messages").is_none());

        let thread_id = body["id"].as_str().unwrap();
        assert!(thread_id.starts_with("thread_"));
        let (_, page) = send(&mock, get(&format!("/threads/{}/messages?order=asc", thread_id))).await;
        assert_eq!(page["data"][0]["content"][0]["text"]["value"], "Hello");
        assert_eq!(page["data"][1]["thread_id"], thread_id);
    }

    #[tokio::test]
    async fn test_bad_messages_store_nothing() {
        let mock = OpenAiMock::new();
        let (status, _) =
            send(&mock, post("/threads", json!({"messages": [{"content": 3}]}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(mock.state().beta.threads.is_empty());
    }

    #[tokio::test]
    async fn test_nested_vector_store() {
        let mock = OpenAiMock::new();
        mock.state().blind_put(fixtures::file("file-1"));
        let (status, body) = send(
            &mock,
            post(
                "/threads",
                json!({
                    "tool_resources": {"file_search": {"vector_stores": [{"file_ids": ["file-1"]}]}}
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body["tool_resources"]["file_search"]["vector_store_ids"]
                .as_array()
                .unwrap()
                .len(),
            1
        );
        assert_eq!(mock.state().beta.vector_stores.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_leaves_messages() {
        let mock = OpenAiMock::new();
        mock.state().blind_put(fixtures::thread("thread_1"));
        mock.state().blind_put(fixtures::message("msg_1", "thread_1", "hi"));

        let (_, body) = send(&mock, delete_req("/threads/thread_1")).await;
        assert_eq!(body["object"], "thread.deleted");
        assert_eq!(body["deleted"], true);
        assert!(mock.state().beta.threads.messages.get("msg_1").is_some());

        let (status, _) = send(&mock, get("/threads/thread_1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&mock, delete_req("/threads/thread_1")).await;
        assert_eq!(body["deleted"], false);
    }

    #[tokio::test]
    async fn test_create_and_run_is_not_a_thread_lookup() {
        let mock = OpenAiMock::new();
        mock.state().blind_put(fixtures::assistant("asst_1"));
        let (status, _) =
            send(&mock, post("/threads/runs", json!({"assistant_id": "asst_1"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        mock.beta.threads.update.assert_call_count(0);
        mock.beta.threads.create_and_run.assert_call_count(1);
    }
}
