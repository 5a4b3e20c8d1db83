//! `/threads/{thread_id}/runs` routes and `/threads/runs`.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use super::messages::build_initial_messages;
use super::run_steps::RunSteps;
use super::threads::build_thread;
use super::vector_stores::plan_nested;
use super::{Route, RouteContext, overlay, wants_stream};
use crate::error::{MockError, Result};
use crate::ids::{IdPrefix, generate_id, now_unix};
use crate::merge::{self, Fields};
use crate::request::MockResponse;
use crate::store::{SharedStateStore, StateCell};
use crate::streaming::{Event, EventStream, EventType};
use crate::types::{Assistant, Message, Run, RunStatus, Thread};

/// `beta.threads.runs`.
pub struct Runs {
    pub create: Arc<Route>,
    pub list: Arc<Route>,
    pub retrieve: Arc<Route>,
    pub update: Arc<Route>,
    pub submit_tool_outputs: Arc<Route>,
    pub cancel: Arc<Route>,
    pub steps: RunSteps,
}

impl Runs {
    pub(crate) fn new(state: &StateCell) -> Self {
        Self {
            create: Route::stateful(
                "beta.threads.runs.create",
                Method::POST,
                "/threads/{thread_id}/runs",
                StatusCode::CREATED,
                state,
                create,
            ),
            list: Route::stateful(
                "beta.threads.runs.list",
                Method::GET,
                "/threads/{thread_id}/runs",
                StatusCode::OK,
                state,
                list,
            ),
            retrieve: Route::stateful(
                "beta.threads.runs.retrieve",
                Method::GET,
                "/threads/{thread_id}/runs/{run_id}",
                StatusCode::OK,
                state,
                retrieve,
            ),
            update: Route::stateful(
                "beta.threads.runs.update",
                Method::POST,
                "/threads/{thread_id}/runs/{run_id}",
                StatusCode::OK,
                state,
                update,
            ),
            submit_tool_outputs: Route::stateful(
                "beta.threads.runs.submit_tool_outputs",
                Method::POST,
                "/threads/{thread_id}/runs/{run_id}/submit_tool_outputs",
                StatusCode::OK,
                state,
                submit_tool_outputs,
            ),
            cancel: Route::stateful(
                "beta.threads.runs.cancel",
                Method::POST,
                "/threads/{thread_id}/runs/{run_id}/cancel",
                StatusCode::OK,
                state,
                cancel,
            ),
            steps: RunSteps::new(state),
        }
    }

    pub(crate) fn routes(&self) -> Vec<Arc<Route>> {
        let mut routes = vec![
            Arc::clone(&self.create),
            Arc::clone(&self.list),
            Arc::clone(&self.retrieve),
            Arc::clone(&self.update),
            Arc::clone(&self.submit_tool_outputs),
            Arc::clone(&self.cancel),
        ];
        routes.extend(self.steps.routes());
        routes
    }
}

// ============================================================================
// Building
// ============================================================================

/// Request keys that steer creation but are not part of a run.
const CREATE_ONLY_KEYS: &[&str] = &[
    "additional_messages",
    "additional_instructions",
    "stream",
    "thread",
    "tool_resources",
];

fn defaults(thread_id: &str, assistant: &Assistant) -> Result<Fields> {
    Ok(merge::object(json!({
        "id": generate_id(IdPrefix::Run),
        "assistant_id": assistant.id,
        "created_at": now_unix(),
        "instructions": assistant.instructions.clone().unwrap_or_default(),
        "model": assistant.model,
        "object": "thread.run",
        "status": "queued",
        "thread_id": thread_id,
        "tools": serde_json::to_value(&assistant.tools)?,
    })))
}

/// Build a queued run of `assistant` on `thread_id`.
///
/// The assistant's instructions, model and tools are defaults that the
/// partial and then the request override. `additional_instructions` is
/// appended to whatever instructions win.
pub fn build_run(
    thread_id: &str,
    assistant: &Assistant,
    partial: &Fields,
    mut request: Fields,
) -> Result<Run> {
    let additional = match request.remove("additional_instructions") {
        Some(Value::String(extra)) => Some(extra),
        _ => None,
    };
    for key in CREATE_ONLY_KEYS {
        request.remove(*key);
    }

    let mut fields = merge::merge_layers(defaults(thread_id, assistant)?, partial, request);
    fields.insert("thread_id".into(), json!(thread_id));
    if let Some(extra) = additional {
        let base = fields
            .get("instructions")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let joined = if base.is_empty() {
            extra
        } else {
            format!("{}\n\n{}", base, extra)
        };
        fields.insert("instructions".into(), Value::String(joined));
    }
    merge::build("thread.run", fields)
}

/// The assistant a create body refers to.
fn find_assistant(ctx: &RouteContext<'_>, body: &Fields) -> Result<Option<Assistant>> {
    let assistant_id = body
        .get("assistant_id")
        .and_then(Value::as_str)
        .ok_or_else(|| MockError::InvalidRequest("assistant_id is required".into()))?;
    Ok(ctx.store.beta.assistants.get(assistant_id))
}

/// The run named in the path, if it belongs to the thread in the path.
fn find_run(ctx: &RouteContext<'_>) -> Result<Option<Run>> {
    let thread_id = ctx.param("thread_id")?;
    if !ctx.store.beta.threads.contains(thread_id) {
        return Ok(None);
    }
    Ok(ctx
        .store
        .beta
        .threads
        .runs
        .get(ctx.param("run_id")?)
        .filter(|r| r.thread_id == thread_id))
}

/// Messages passed as `additional_messages` on run creation.
fn additional_messages(thread_id: &str, body: &Fields) -> Result<Vec<Message>> {
    build_initial_messages(thread_id, body.get("additional_messages").cloned())
}

// ============================================================================
// Streaming
// ============================================================================

/// Events of a run that goes straight through to completion.
///
/// The stored run advances to `in_progress` and then `completed` as the
/// matching events are pulled, so a client polling between events sees
/// each state. A `thread.created` event comes first when `thread` is set;
/// `thread.run.created` is skipped for resumed runs.
pub fn run_event_stream(
    store: SharedStateStore,
    run: Run,
    thread: Option<Thread>,
    announce_creation: bool,
) -> EventStream {
    let mut thread = thread;
    let mut run = run;
    let mut stage: u8 = if announce_creation { 0 } else { 1 };
    EventStream::from_fn(move || {
        if let Some(thread) = thread.take() {
            return Some(Event::new(EventType::ThreadCreated, &thread));
        }
        let event = match stage {
            0 => Event::new(EventType::ThreadRunCreated, &run),
            1 => Event::new(EventType::ThreadRunQueued, &run),
            2 => {
                run.status = RunStatus::InProgress;
                run.started_at = Some(now_unix());
                store.beta.threads.runs.put(run.clone());
                Event::new(EventType::ThreadRunInProgress, &run)
            }
            3 => {
                run.status = RunStatus::Completed;
                run.completed_at = Some(now_unix());
                store.beta.threads.runs.put(run.clone());
                Event::new(EventType::ThreadRunCompleted, &run)
            }
            _ => return None,
        };
        stage += 1;
        Some(event)
    })
}

// ============================================================================
// Handlers
// ============================================================================

fn create(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let thread_id = ctx.param("thread_id")?;
    if !ctx.store.beta.threads.contains(thread_id) {
        return Ok(MockResponse::not_found());
    }
    let body = ctx.body()?;
    let Some(assistant) = find_assistant(ctx, &body)? else {
        return Ok(MockResponse::not_found());
    };

    let stream = wants_stream(&body);
    let messages = additional_messages(thread_id, &body)?;
    let run = build_run(thread_id, &assistant, partial, body)?;

    for message in messages {
        ctx.store.beta.threads.messages.put(message);
    }
    ctx.store.beta.threads.runs.put(run.clone());

    if stream {
        let events = run_event_stream(Arc::clone(&ctx.store), run, None, true);
        return Ok(MockResponse::stream(StatusCode::OK, events));
    }
    ctx.respond(&run)
}

/// `POST /threads/runs`: create a thread with its messages, then run it.
pub(crate) fn create_and_run(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let mut body = ctx.body()?;
    let Some(assistant) = find_assistant(ctx, &body)? else {
        return Ok(MockResponse::not_found());
    };

    let mut thread_body = match body.remove("thread") {
        None | Some(Value::Null) => Fields::new(),
        Some(Value::Object(fields)) => fields,
        Some(_) => return Err(MockError::InvalidRequest("thread must be an object".into())),
    };
    let messages = thread_body.remove("messages");
    let Some(plan) = plan_nested(&ctx.store, &mut thread_body)? else {
        return Ok(MockResponse::not_found());
    };
    let thread = build_thread(&Fields::new(), thread_body)?;
    let messages = build_initial_messages(&thread.id, messages)?;

    let stream = wants_stream(&body);
    let run = build_run(&thread.id, &assistant, partial, body)?;

    plan.commit(&ctx.store);
    ctx.store.beta.threads.put(thread.clone());
    for message in messages {
        ctx.store.beta.threads.messages.put(message);
    }
    ctx.store.beta.threads.runs.put(run.clone());

    if stream {
        let events = run_event_stream(Arc::clone(&ctx.store), run, Some(thread), true);
        return Ok(MockResponse::stream(StatusCode::OK, events));
    }
    ctx.respond(&run)
}

fn list(ctx: &RouteContext<'_>, _partial: &Fields) -> Result<MockResponse> {
    let thread_id = ctx.param("thread_id")?;
    if !ctx.store.beta.threads.contains(thread_id) {
        return Ok(MockResponse::not_found());
    }
    ctx.respond(&ctx.store.beta.threads.runs.list(thread_id, &ctx.list_params()))
}

fn retrieve(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(found) = find_run(ctx)? else {
        return Ok(MockResponse::not_found());
    };
    let run = overlay("thread.run", found, partial)?;
    if !partial.is_empty() {
        ctx.store.beta.threads.runs.put(run.clone());
    }
    ctx.respond(&run)
}

fn update(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(found) = find_run(ctx)? else {
        return Ok(MockResponse::not_found());
    };
    let updated = merge::update("thread.run", &found, partial, ctx.body()?)?;
    ctx.store.beta.threads.runs.put(updated.clone());
    ctx.respond(&updated)
}

fn submit_tool_outputs(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(mut run) = find_run(ctx)? else {
        return Ok(MockResponse::not_found());
    };
    let body = ctx.body()?;
    if !matches!(body.get("tool_outputs"), Some(Value::Array(_))) {
        return Err(MockError::InvalidRequest("tool_outputs must be an array".into()));
    }

    run.required_action = None;
    run.status = RunStatus::Queued;
    let run = overlay("thread.run", run, partial)?;
    ctx.store.beta.threads.runs.put(run.clone());

    if wants_stream(&body) {
        let events = run_event_stream(Arc::clone(&ctx.store), run, None, false);
        return Ok(MockResponse::stream(StatusCode::OK, events));
    }
    ctx.respond(&run)
}

/// The store moves straight to `cancelled`; the caller is shown
/// `cancelling` and has to poll to see the final state.
fn cancel(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    let Some(mut run) = find_run(ctx)? else {
        return Ok(MockResponse::not_found());
    };
    run.status = RunStatus::Cancelled;
    run.cancelled_at = Some(now_unix());
    ctx.store.beta.threads.runs.put(run.clone());

    let mut shown = run;
    shown.status = RunStatus::Cancelling;
    shown.cancelled_at = None;
    ctx.respond(&overlay("thread.run", shown, partial)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::OpenAiMock;
    use crate::streaming::parse_sse;
    use crate::testing::fixtures::{self, get, post, send};
    use crate::types::RequiredAction;

    fn seeded() -> OpenAiMock {
        let mock = OpenAiMock::new();
        mock.state().blind_put(fixtures::assistant("asst_1"));
        mock.state().blind_put(fixtures::thread("thread_1"));
        mock
    }

    #[tokio::test]
    async fn test_create_copies_assistant_defaults() {
        let mock = seeded();
        let (status, body) =
            send(&mock, post("/threads/thread_1/runs", json!({"assistant_id": "asst_1"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "queued");
        assert_eq!(body["thread_id"], "thread_1");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["instructions"], "You are a helpful assistant.");
        assert_eq!(body["tools"], json!([{"type": "code_interpreter"}]));
        assert!(body["id"].as_str().unwrap().starts_with("run_"));
    }

    #[tokio::test]
    async fn test_request_overrides_assistant() {
        let mock = seeded();
        let (_, body) = send(
            &mock,
            post(
                "/threads/thread_1/runs",
                json!({
                    "assistant_id": "asst_1",
                    "model": "gpt-4o-mini",
                    "instructions": "Be terse.",
                    "additional_instructions": "Use metric units."
                }),
            ),
        )
        .await;
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["instructions"], "Be terse.\n\nUse metric units.");
    }

    #[tokio::test]
    async fn test_unknown_thread_or_assistant() {
        let mock = seeded();
        let (status, _) =
            send(&mock, post("/threads/thread_x/runs", json!({"assistant_id": "asst_1"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            send(&mock, post("/threads/thread_1/runs", json!({"assistant_id": "asst_x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&mock, post("/threads/thread_1/runs", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(mock.state().beta.threads.runs.count("thread_1"), 0);
    }

    #[tokio::test]
    async fn test_additional_messages() {
        let mock = seeded();
        send(
            &mock,
            post(
                "/threads/thread_1/runs",
                json!({
                    "assistant_id": "asst_1",
                    "additional_messages": [{"role": "user", "content": "extra"}]
                }),
            ),
        )
        .await;
        assert_eq!(mock.state().beta.threads.messages.count("thread_1"), 1);
    }

    #[tokio::test]
    async fn test_cancel_lags_one_step() {
        let mock = seeded();
        mock.state()
            .blind_put(fixtures::run("run_1", "thread_1", "asst_1"));

        let (_, body) =
            send(&mock, post("/threads/thread_1/runs/run_1/cancel", json!({}))).await;
        assert_eq!(body["status"], "cancelling");

        let (_, body) = send(&mock, get("/threads/thread_1/runs/run_1")).await;
        assert_eq!(body["status"], "cancelled");
    }

    #[tokio::test]
    async fn test_submit_tool_outputs_requeues() {
        let mock = seeded();
        let mut run = fixtures::run("run_1", "thread_1", "asst_1");
        run.status = RunStatus::RequiresAction;
        run.required_action = Some(
            serde_json::from_value::<RequiredAction>(json!({
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {"tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "lookup", "arguments": "{}"}
                }]}
            }))
            .unwrap(),
        );
        mock.state().blind_put(run);

        let (status, body) = send(
            &mock,
            post(
                "/threads/thread_1/runs/run_1/submit_tool_outputs",
                json!({"tool_outputs": [{"tool_call_id": "call_1", "output": "42"}]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "queued");
        assert!(body["required_action"].is_null());

        let stored = mock.state().beta.threads.runs.get("run_1").unwrap();
        assert_eq!(stored.status, RunStatus::Queued);
    }

    #[tokio::test]
    async fn test_run_in_other_thread_is_not_found() {
        let mock = seeded();
        mock.state().blind_put(fixtures::thread("thread_2"));
        mock.state()
            .blind_put(fixtures::run("run_1", "thread_1", "asst_1"));
        let (status, _) = send(&mock, get("/threads/thread_2/runs/run_1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_streamed_create() {
        let mock = seeded();
        let response = mock
            .handle(fixtures::post(
                "/threads/thread_1/runs",
                json!({"assistant_id": "asst_1", "stream": true}),
            ))
            .await;
        assert!(response.is_stream());
        let events = parse_sse(&response.into_bytes());
        let names: Vec<&str> = events.iter().filter_map(|(e, _)| e.as_deref()).collect();
        assert_eq!(
            names,
            vec![
                "thread.run.created",
                "thread.run.queued",
                "thread.run.in_progress",
                "thread.run.completed",
                "done"
            ]
        );

        let run_id = events[0].1["id"].as_str().unwrap();
        let stored = mock.state().beta.threads.runs.get(run_id).unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
    }

    #[test]
    fn test_stream_advances_store_between_events() {
        let store = crate::store::StateStore::shared();
        let run = fixtures::run("run_1", "thread_1", "asst_1");
        store.blind_put(run.clone());

        let mut events = run_event_stream(Arc::clone(&store), run, None, true);
        events.next();
        events.next();
        assert_eq!(
            store.beta.threads.runs.get("run_1").unwrap().status,
            RunStatus::Queued
        );
        events.next();
        assert_eq!(
            store.beta.threads.runs.get("run_1").unwrap().status,
            RunStatus::InProgress
        );
        events.next();
        assert_eq!(
            store.beta.threads.runs.get("run_1").unwrap().status,
            RunStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_create_and_run() {
        let mock = seeded();
        let (status, body) = send(
            &mock,
            post(
                "/threads/runs",
                json!({
                    "assistant_id": "asst_1",
                    "thread": {"messages": [{"role": "user", "content": "Hi"}]}
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let thread_id = body["thread_id"].as_str().unwrap();
        assert!(thread_id.starts_with("thread_"));
        assert!(mock.state().beta.threads.get(thread_id).is_some());
        assert_eq!(mock.state().beta.threads.messages.count(thread_id), 1);
        mock.beta.threads.create_and_run.assert_call_count(1);
        mock.beta.threads.create.assert_call_count(0);
    }
}
