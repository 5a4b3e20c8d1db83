//! The mock: every route, grouped the way the API groups them.

use std::sync::Arc;

use axum::http::{Method, StatusCode};

use crate::config::MockConfig;
use crate::request::{MockRequest, MockResponse};
use crate::router::{MockRouter, not_matched};
use crate::routes::assistants::Assistants;
use crate::routes::chat::Chat;
use crate::routes::embeddings::Embeddings;
use crate::routes::files::Files;
use crate::routes::models::Models;
use crate::routes::moderations::Moderations;
use crate::routes::threads::Threads;
use crate::routes::vector_stores::VectorStores;
use crate::routes::{MockOverride, Route, RoutePattern};
use crate::store::{SharedStateStore, StateCell, StateStore};

/// Routes of the `beta` namespace.
pub struct Beta {
    pub assistants: Assistants,
    pub threads: Threads,
    pub vector_stores: VectorStores,
    /// The same routes as [`OpenAiMock::chat`].
    pub chat: Chat,
}

/// An in-memory stand-in for the OpenAI API.
///
/// Routes are public fields, so a test reaches any operation by its client
/// path:
///
/// ```ignore
/// let mock = OpenAiMock::new();
/// mock.beta.threads.runs.create.set_response(json!({"status": "in_progress"}));
/// mock.beta.threads.runs.create.assert_call_count(0);
/// ```
pub struct OpenAiMock {
    pub chat: Chat,
    pub embeddings: Embeddings,
    pub moderations: Moderations,
    pub files: Files,
    pub models: Models,
    pub beta: Beta,
    config: MockConfig,
    state: StateCell,
    router: MockRouter,
}

impl Default for OpenAiMock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OpenAiMock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiMock")
            .field("config", &self.config)
            .field("routes", &self.router.routes().len())
            .finish_non_exhaustive()
    }
}

impl OpenAiMock {
    /// A mock with the default configuration and a fresh store.
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// A mock with a fresh store, seeded with models if the config says so.
    pub fn with_config(config: MockConfig) -> Self {
        let store = if config.seed_models {
            StateStore::new()
        } else {
            StateStore::with_models(Vec::new())
        };
        Self::from_parts(config, Arc::new(store))
    }

    /// A mock over an existing store, e.g. one shared between tests.
    pub fn with_state(store: SharedStateStore) -> Self {
        Self::from_parts(MockConfig::default(), store)
    }

    pub fn from_parts(config: MockConfig, store: SharedStateStore) -> Self {
        let state = StateCell::new(store);
        let chat = Chat::new(&state);
        let mock = Self {
            beta: Beta {
                assistants: Assistants::new(&state),
                threads: Threads::new(&state),
                vector_stores: VectorStores::new(&state),
                chat: chat.alias(),
            },
            chat,
            embeddings: Embeddings::new(&state),
            moderations: Moderations::new(&state),
            files: Files::new(&state),
            models: Models::new(&state),
            router: MockRouter::new(state.clone()),
            state,
            config,
        };
        mock.router.register(mock.builtin_routes());
        mock
    }

    fn builtin_routes(&self) -> Vec<Arc<Route>> {
        let mut routes = Vec::new();
        routes.extend(self.chat.routes());
        routes.extend(self.embeddings.routes());
        routes.extend(self.moderations.routes());
        routes.extend(self.files.routes());
        routes.extend(self.models.routes());
        routes.extend(self.beta.assistants.routes());
        routes.extend(self.beta.threads.routes());
        routes.extend(self.beta.vector_stores.routes());
        routes
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    /// The store every stateful route currently uses.
    pub fn state(&self) -> SharedStateStore {
        self.state.current()
    }

    /// Point every route at another store.
    pub fn set_state(&self, store: SharedStateStore) {
        self.state.replace(store);
        self.router.resort();
        tracing::debug!("Swapped mock state store");
    }

    pub fn router(&self) -> &MockRouter {
        &self.router
    }

    /// Register an ad-hoc route next to the API routes.
    pub fn add_route(
        &self,
        method: Method,
        pattern: RoutePattern,
        response: impl Into<MockOverride>,
    ) -> Arc<Route> {
        self.router.add_route(method, pattern, response)
    }

    /// Zero the call counters of every route.
    pub fn reset_calls(&self) {
        for route in self.router.routes() {
            route.reset_calls();
        }
    }

    /// The request path relative to the base path. Paths outside the base
    /// path are returned whole.
    fn relative_path<'a>(&self, path: &'a str) -> &'a str {
        let base = self.config.base_path.as_str();
        if base.is_empty() || base == "/" {
            return path;
        }
        match path.strip_prefix(base) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => path,
        }
    }

    /// Serve one request.
    ///
    /// A multipart body is parsed into [`MockRequest::form`] first, and the
    /// configured latency plus the route's own latency is awaited before
    /// the route runs.
    pub async fn handle(&self, mut request: MockRequest) -> MockResponse {
        if request.form.is_none() && request.is_multipart() {
            match request.read_multipart().await {
                Ok(form) => request.form = Some(form),
                Err(e) => {
                    tracing::debug!(error = %e, "Rejected multipart body");
                    return MockResponse::error(StatusCode::BAD_REQUEST, &e.to_string());
                }
            }
        }

        let path = self.relative_path(&request.path).to_string();
        let Some((route, params)) = self.router.find(&request.method, &path) else {
            return not_matched(&request.method, &request.path);
        };

        let latency = self.config.latency() + route.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let response = route.call(&request, &params);
        tracing::debug!(
            route = %route.name(),
            method = %request.method,
            path = %request.path,
            status = response.status.as_u16(),
            "Served mocked request"
        );
        response
    }
}
