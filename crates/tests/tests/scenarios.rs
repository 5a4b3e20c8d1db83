//! End-to-end client scenarios
//!
//! Each test plays a client workflow against a mock served over HTTP and
//! checks what the client sees and what the mock recorded.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use openai_responses::{
    MockConfig, MockResponse, MockServer, OpenAiMock, StateStore, handler, parse_sse,
    with_mock, with_shared_state, with_store,
};
use openai_responses::types::RunStatus;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::{Value, json};

/// Thin JSON client over a base URL.
struct Client {
    http: reqwest::Client,
    base: String,
}

impl Client {
    fn new(base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .http
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        decode(response).await
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .http
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        decode(response).await
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .http
            .delete(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        decode(response).await
    }

    /// POST, retrying on 5xx up to `attempts` times.
    async fn post_with_retries(
        &self,
        path: &str,
        body: Value,
        attempts: usize,
    ) -> (StatusCode, Value) {
        let mut last = (StatusCode::INTERNAL_SERVER_ERROR, Value::Null);
        for _ in 0..attempts {
            last = self.post(path, body.clone()).await;
            if !last.0.is_server_error() {
                break;
            }
        }
        last
    }
}

async fn decode(response: reqwest::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.bytes().await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn upload(client: &Client, name: &str) -> String {
    let form = reqwest::multipart::Form::new().text("purpose", "assistants").part(
        "file",
        reqwest::multipart::Part::bytes(format!("contents of {}", name).into_bytes())
            .file_name(name.to_string()),
    );
    let response = client
        .http
        .post(format!("{}/files", client.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let (_, body) = decode(response).await;
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_default_page_reports_has_more() {
    with_mock(MockConfig::default(), |mock| async move {
        let client = Client::new(&mock.base_url);
        for i in 0..21 {
            let (status, _) = client
                .post("/assistants", json!({"model": "gpt-4o", "name": format!("n{}", i)}))
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, page) = client.get("/assistants").await;
        let data = page["data"].as_array().unwrap();
        assert_eq!(data.len(), 20);
        assert_eq!(page["has_more"], true);
        // Newest first by default.
        assert_eq!(data[0]["name"], "n20");
        assert_eq!(page["first_id"], data[0]["id"]);
        assert_eq!(page["last_id"], data[19]["id"]);

        let (_, rest) = client
            .get(&format!("/assistants?after={}", page["last_id"].as_str().unwrap()))
            .await;
        assert_eq!(rest["data"].as_array().unwrap().len(), 1);
        assert_eq!(rest["data"][0]["name"], "n0");
        assert_eq!(rest["has_more"], false);

        mock.mock.beta.assistants.create.assert_call_count(21);
        mock.mock.beta.assistants.list.assert_call_count(2);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_client_retries_through_injected_failures() {
    with_mock(MockConfig::default(), |mock| async move {
        let client = Client::new(&mock.base_url);
        mock.mock.beta.threads.create.fail_first(2);

        let (status, thread) = client
            .post_with_retries("/threads", json!({"metadata": {"k": "v"}}), 5)
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(thread["metadata"]["k"], "v");
        mock.mock.beta.threads.create.assert_call_count(3);

        // Only the successful call wrote state.
        let (status, _) = client
            .get(&format!("/threads/{}", thread["id"].as_str().unwrap()))
            .await;
        assert_eq!(status, StatusCode::OK);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_polling_until_a_scripted_run_completes() {
    with_mock(MockConfig::default(), |mock| async move {
        let client = Client::new(&mock.base_url);
        let (_, assistant) = client.post("/assistants", json!({"model": "gpt-4o"})).await;
        let (_, thread) = client.post("/threads", json!({})).await;
        let thread_id = thread["id"].as_str().unwrap().to_string();
        let (_, run) = client
            .post(
                &format!("/threads/{}/runs", thread_id),
                json!({"assistant_id": assistant["id"]}),
            )
            .await;
        let run_id = run["id"].as_str().unwrap().to_string();

        mock.mock.beta.threads.runs.retrieve.set_response(with_store(
            |_, route, params, store| {
                let run_id = params.get("run_id").unwrap_or_default();
                let Some(mut run) = store.beta.threads.runs.get(run_id) else {
                    return MockResponse::not_found();
                };
                run.status = if route.call_count < 2 {
                    RunStatus::InProgress
                } else {
                    RunStatus::Completed
                };
                store.blind_put(run.clone());
                MockResponse::json(reqwest::StatusCode::OK, &run)
            },
        ));

        let path = format!("/threads/{}/runs/{}", thread_id, run_id);
        let mut polls = 0;
        loop {
            polls += 1;
            let (_, current) = client.get(&path).await;
            if current["status"] == "completed" {
                break;
            }
            assert!(polls < 10, "run never completed");
        }
        assert_eq!(polls, 3);
        mock.mock.beta.threads.runs.retrieve.assert_call_count(3);

        let (_, runs) = client.get(&format!("/threads/{}/runs", thread_id)).await;
        assert_eq!(runs["data"][0]["status"], "completed");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_cancel_is_observed_on_next_poll() {
    with_mock(MockConfig::default(), |mock| async move {
        let client = Client::new(&mock.base_url);
        let (_, assistant) = client.post("/assistants", json!({"model": "gpt-4o"})).await;
        let (_, run) = client
            .post(
                "/threads/runs",
                json!({
                    "assistant_id": assistant["id"],
                    "thread": {"messages": [{"role": "user", "content": "Start"}]}
                }),
            )
            .await;
        let thread_id = run["thread_id"].as_str().unwrap();
        let run_id = run["id"].as_str().unwrap();

        let (status, cancelling) = client
            .post(&format!("/threads/{}/runs/{}/cancel", thread_id, run_id), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelling["status"], "cancelling");

        let (_, cancelled) = client
            .get(&format!("/threads/{}/runs/{}", thread_id, run_id))
            .await;
        assert_eq!(cancelled["status"], "cancelled");
        assert!(cancelled["cancelled_at"].is_i64());

        let (_, messages) = client.get(&format!("/threads/{}/messages", thread_id)).await;
        assert_eq!(messages["data"][0]["content"][0]["text"]["value"], "Start");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_tool_call_round_trip() {
    with_mock(MockConfig::default(), |mock| async move {
        let client = Client::new(&mock.base_url);
        let (_, assistant) = client
            .post(
                "/assistants",
                json!({
                    "model": "gpt-4o",
                    "tools": [{"type": "function", "function": {"name": "lookup"}}]
                }),
            )
            .await;
        let (_, thread) = client.post("/threads", json!({})).await;
        let thread_id = thread["id"].as_str().unwrap();

        mock.mock.beta.threads.runs.create.set_response(json!({
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {"tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "lookup", "arguments": "{\"q\":\"x\"}"}
                }]}
            }
        }));
        let (_, run) = client
            .post(
                &format!("/threads/{}/runs", thread_id),
                json!({"assistant_id": assistant["id"]}),
            )
            .await;
        assert_eq!(run["status"], "requires_action");
        let call = &run["required_action"]["submit_tool_outputs"]["tool_calls"][0];
        assert_eq!(call["function"]["name"], "lookup");

        let (status, resumed) = client
            .post(
                &format!(
                    "/threads/{}/runs/{}/submit_tool_outputs",
                    thread_id,
                    run["id"].as_str().unwrap()
                ),
                json!({"tool_outputs": [{"tool_call_id": "call_1", "output": "42"}]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resumed["status"], "queued");
        assert!(resumed["required_action"].is_null());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_update_keeps_values_of_earlier_calls() {
    with_mock(MockConfig::default(), |mock| async move {
        let client = Client::new(&mock.base_url);
        let (_, assistant) = client
            .post(
                "/assistants",
                json!({"model": "gpt-4o", "name": "Original", "instructions": "Be kind."}),
            )
            .await;
        let id = assistant["id"].as_str().unwrap();

        let (_, updated) = client
            .post(&format!("/assistants/{}", id), json!({"name": "Renamed"}))
            .await;
        assert_eq!(updated["name"], "Renamed");
        assert_eq!(updated["instructions"], "Be kind.");
        assert_eq!(updated["created_at"], assistant["created_at"]);

        let (_, fetched) = client.get(&format!("/assistants/{}", id)).await;
        assert_eq!(fetched, updated);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_nested_vector_stores_are_all_or_nothing() {
    with_mock(MockConfig::default(), |mock| async move {
        let client = Client::new(&mock.base_url);
        let file_id = upload(&client, "guide.md").await;

        let (status, _) = client
            .post(
                "/threads",
                json!({"tool_resources": {"file_search": {"vector_stores": [
                    {"file_ids": [file_id]},
                    {"file_ids": ["file-missing"]}
                ]}}}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let state = mock.mock.state();
        assert!(state.beta.threads.is_empty());
        assert!(state.beta.vector_stores.is_empty());

        let (status, thread) = client
            .post(
                "/threads",
                json!({"tool_resources": {"file_search": {"vector_stores": [
                    {"file_ids": [file_id]}
                ]}}}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let vs_id = thread["tool_resources"]["file_search"]["vector_store_ids"][0]
            .as_str()
            .unwrap();

        let (_, vector_store) = client.get(&format!("/vector_stores/{}", vs_id)).await;
        assert_eq!(vector_store["file_counts"]["total"], 1);
        assert_eq!(vector_store["file_counts"]["completed"], 1);
        let (_, files) = client.get(&format!("/vector_stores/{}/files", vs_id)).await;
        assert_eq!(files["data"][0]["id"], file_id);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_missing_parent_is_404_without_side_effects() {
    with_mock(MockConfig::default(), |mock| async move {
        let client = Client::new(&mock.base_url);
        let (status, body) = client
            .post(
                "/threads/thread_nope/messages",
                json!({"role": "user", "content": "hello?"}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_null());
        assert!(mock.mock.state().beta.threads.messages.is_empty());

        let (status, deleted) = client.delete("/assistants/asst_nope").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["deleted"], false);
        assert_eq!(deleted["object"], "assistant.deleted");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_stream_of_create_and_run() {
    with_mock(MockConfig::default(), |mock| async move {
        let client = Client::new(&mock.base_url);
        let (_, assistant) = client.post("/assistants", json!({"model": "gpt-4o"})).await;

        let response = client
            .http
            .post(format!("{}/threads/runs", client.base))
            .json(&json!({"assistant_id": assistant["id"], "stream": true}))
            .send()
            .await
            .unwrap();
        let events = parse_sse(&response.bytes().await.unwrap());
        let names: Vec<&str> = events
            .iter()
            .filter_map(|(event, _)| event.as_deref())
            .collect();
        assert_eq!(names.first(), Some(&"thread.created"));
        assert_eq!(names.last(), Some(&"done"));
        assert!(names.contains(&"thread.run.completed"));

        let thread_id = events[0].1["id"].as_str().unwrap();
        let (_, runs) = client.get(&format!("/threads/{}/runs", thread_id)).await;
        assert_eq!(runs["data"][0]["status"], "completed");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_shared_state_outlives_one_server() {
    let store = Arc::new(StateStore::new());

    let thread_id = with_shared_state(MockConfig::default(), Arc::clone(&store), |mock| async move {
        let (_, thread) = Client::new(&mock.base_url).post("/threads", json!({})).await;
        thread["id"].as_str().unwrap().to_string()
    })
    .await
    .unwrap();

    assert!(store.beta.threads.get(&thread_id).is_some());

    let server = MockServer::start(OpenAiMock::with_state(Arc::clone(&store)))
        .await
        .unwrap();
    let (status, _) = Client::new(server.base_url())
        .get(&format!("/threads/{}", thread_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    server.shutdown().await;
}

#[tokio::test]
async fn test_generated_ids_have_api_shape() {
    with_mock(MockConfig::default(), |mock| async move {
        let client = Client::new(&mock.base_url);
        let (_, assistant) = client.post("/assistants", json!({"model": "gpt-4o"})).await;
        let (_, thread) = client.post("/threads", json!({})).await;
        let (_, vector_store) = client.post("/vector_stores", json!({})).await;
        let file_id = upload(&client, "a.txt").await;

        let underscore = Regex::new(r"^(asst|thread|vs)_[A-Za-z0-9]{24}$").unwrap();
        let dash = Regex::new(r"^file-[A-Za-z0-9]{24}$").unwrap();
        assert!(underscore.is_match(assistant["id"].as_str().unwrap()));
        assert!(underscore.is_match(thread["id"].as_str().unwrap()));
        assert!(underscore.is_match(vector_store["id"].as_str().unwrap()));
        assert!(dash.is_match(&file_id));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_custom_endpoint_beside_the_api() {
    let mock = OpenAiMock::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);
    mock.add_route(
        reqwest::Method::GET,
        openai_responses::RoutePattern::template("/internal/health"),
        handler(move |_, _, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            MockResponse::json(reqwest::StatusCode::OK, &json!({"ok": true}))
        }),
    );
    let server = MockServer::start(mock).await.unwrap();

    let (status, body) = Client::new(server.url()).get("/internal/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    server.shutdown().await;
}

#[tokio::test]
async fn test_models_and_embeddings() {
    with_mock(MockConfig::default(), |mock| async move {
        let client = Client::new(&mock.base_url);
        let (_, models) = client.get("/models").await;
        assert!(
            models["data"]
                .as_array()
                .unwrap()
                .iter()
                .any(|m| m["id"] == "gpt-4o")
        );

        let (status, embeddings) = client
            .post(
                "/embeddings",
                json!({"model": "text-embedding-3-small", "input": "hello", "dimensions": 4}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(embeddings["data"][0]["embedding"].as_array().unwrap().len(), 4);

        let (_, deleted) = client.delete("/models/gpt-4o").await;
        assert_eq!(deleted["deleted"], true);
        let (status, _) = client.get("/models/gpt-4o").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    })
    .await
    .unwrap();
}
