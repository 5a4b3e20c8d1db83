//! Serving a mock over real HTTP.
//!
//! Clients that insist on a base URL talk to a [`MockServer`]; everything
//! else can call [`OpenAiMock::handle`] directly.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::config::MockConfig;
use crate::error::Result;
use crate::mock::OpenAiMock;
use crate::request::{MockRequest, MockResponse};
use crate::store::SharedStateStore;

/// A mock listening on a local port.
pub struct MockServer {
    mock: Arc<OpenAiMock>,
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Bind to the mock's configured address and start serving.
    pub async fn start(mock: OpenAiMock) -> Result<Self> {
        mock.config().ensure_valid()?;
        let mock = Arc::new(mock);
        let listener = TcpListener::bind(mock.config().bind_addr).await?;
        let addr = listener.local_addr()?;
        let app = Self::router(Arc::clone(&mock));

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Mock server stopped with an error");
            }
        });
        tracing::info!(%addr, "Started mock server");

        Ok(Self {
            mock,
            addr,
            shutdown: Some(shutdown),
            task: Some(task),
        })
    }

    /// Start a default mock, configured from the environment.
    pub async fn start_default() -> Result<Self> {
        Self::start(OpenAiMock::with_config(MockConfig::from_env()?)).await
    }

    /// The axum app serving `mock`: every request goes to the mock.
    pub fn router(mock: Arc<OpenAiMock>) -> axum::Router {
        let tracing = mock.config().http_tracing;
        let router = axum::Router::new().fallback(serve).with_state(mock);
        if tracing {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://host:port`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The URL a client should use as its API base, e.g.
    /// `http://127.0.0.1:40123/v1`.
    pub fn base_url(&self) -> String {
        format!("{}{}", self.url(), self.mock.config().base_path)
    }

    pub fn mock(&self) -> &Arc<OpenAiMock> {
        &self.mock
    }

    /// A cloneable handle for test code.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            mock: Arc::clone(&self.mock),
            base_url: self.base_url(),
        }
    }

    /// Stop accepting connections and wait for the server task.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Mock server task failed");
            }
        }
        tracing::info!(addr = %self.addr, "Stopped mock server");
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Convert an HTTP request, dispatch it and convert the answer back.
async fn serve(State(mock): State<Arc<OpenAiMock>>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(e) => {
            return MockResponse::error(
                StatusCode::BAD_REQUEST,
                &format!("failed to read request body: {}", e),
            )
            .into_response();
        }
    };

    let uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let mut request = MockRequest::new(parts.method, uri).with_body(body);
    request.headers = parts.headers;

    mock.handle(request).await.into_response()
}

// ============================================================================
// Test-scoped activation
// ============================================================================

/// What a test body gets from [`with_mock`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    pub mock: Arc<OpenAiMock>,
    /// Base URL to point the client under test at.
    pub base_url: String,
}

/// Run `test` against a fresh mock served on a local port, then stop the
/// server and return the test's output.
pub async fn with_mock<F, Fut, T>(config: MockConfig, test: F) -> Result<T>
where
    F: FnOnce(MockHandle) -> Fut,
    Fut: Future<Output = T>,
{
    run_scoped(OpenAiMock::with_config(config), test).await
}

/// Like [`with_mock`], over an existing store.
pub async fn with_shared_state<F, Fut, T>(
    config: MockConfig,
    store: SharedStateStore,
    test: F,
) -> Result<T>
where
    F: FnOnce(MockHandle) -> Fut,
    Fut: Future<Output = T>,
{
    run_scoped(OpenAiMock::from_parts(config, store), test).await
}

async fn run_scoped<F, Fut, T>(mock: OpenAiMock, test: F) -> Result<T>
where
    F: FnOnce(MockHandle) -> Fut,
    Fut: Future<Output = T>,
{
    let server = MockServer::start(mock).await?;
    let output = test(server.handle()).await;
    server.shutdown().await;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MockError;
    use axum::http::Method;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_router_dispatches_to_mock() {
        let mock = Arc::new(OpenAiMock::with_config(
            MockConfig::default().with_http_tracing(false),
        ));
        let app = MockServer::router(Arc::clone(&mock));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/v1/threads")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"metadata": {"a": "b"}}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["metadata"]["a"], "b");
        mock.beta.threads.create.assert_call_count(1);
    }

    #[tokio::test]
    async fn test_query_string_reaches_route() {
        let mock = Arc::new(OpenAiMock::new());
        for i in 0..3 {
            mock.state()
                .blind_put(crate::testing::fixtures::assistant(&format!("asst_{}", i)));
        }
        let app = MockServer::router(Arc::clone(&mock));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/assistants?limit=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["has_more"], true);
    }

    #[tokio::test]
    async fn test_server_over_tcp() {
        let server = MockServer::start(OpenAiMock::new()).await.unwrap();
        assert!(server.base_url().ends_with("/v1"));

        let client = reqwest::Client::new();
        let response = client
            .get(format!("{}/models/gpt-4o", server.base_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["id"], "gpt-4o");

        server.mock().models.retrieve.assert_call_count(1);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_with_mock_scopes_a_server() {
        let seen = with_mock(MockConfig::default(), |handle| async move {
            let response = reqwest::Client::new()
                .post(format!("{}/threads", handle.base_url))
                .json(&json!({}))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status().as_u16(), 201);
            handle.mock.beta.threads.create.call_count()
        })
        .await
        .unwrap();
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let result = with_mock(
            MockConfig::default().with_base_path("v1"),
            |_| async move {},
        )
        .await;
        assert!(matches!(result, Err(MockError::Config(_))));
    }
}
