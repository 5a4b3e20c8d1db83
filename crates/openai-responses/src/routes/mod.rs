//! Routes: one (method, path pattern) per API operation.
//!
//! A [`Route`] owns its default [`RouteHandler`], the override a test put in
//! place, a call counter and the requests it has seen. Handlers are plain
//! functions that read the request, consult the store and build a response.

pub mod assistants;
pub mod chat;
pub mod embeddings;
pub mod files;
pub mod messages;
pub mod models;
pub mod moderations;
pub mod run_steps;
pub mod runs;
pub mod threads;
pub mod vector_store_file_batches;
pub mod vector_store_files;
pub mod vector_stores;

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use axum::http::{Method, StatusCode};
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{MockError, Result};
use crate::merge::{self, Fields};
use crate::request::{MockRequest, MockResponse, PathParams, RawResponse};
use crate::store::{ListParams, Resource, SharedStateStore, StateCell, StateStore};
use crate::types::{
    Assistant, ChatCompletion, CreateEmbeddingResponse, DeletedObject, FileObject, Message, Model,
    ModerationCreateResponse, Page, Run, RunStep, Thread, VectorStore, VectorStoreFile,
    VectorStoreFileBatch,
};

// ============================================================================
// Patterns
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Path pattern of a route, relative to the API base path.
#[derive(Debug, Clone)]
pub enum RoutePattern {
    /// `/threads/{thread_id}/runs`: `{name}` captures one path segment.
    Template {
        source: String,
        segments: Vec<Segment>,
    },
    /// An anchored regex whose named groups become path parameters.
    Regex(Regex),
}

impl RoutePattern {
    pub fn template(source: &str) -> Self {
        let segments = source
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        RoutePattern::Template {
            source: source.to_string(),
            segments,
        }
    }

    /// Compile a regex pattern, anchoring it at both ends.
    pub fn regex(source: &str) -> Result<Self> {
        let anchored = format!(
            "^{}$",
            source.trim_start_matches('^').trim_end_matches('$')
        );
        Regex::new(&anchored)
            .map(RoutePattern::Regex)
            .map_err(|e| MockError::Config(format!("invalid route pattern {}: {}", source, e)))
    }

    pub fn as_str(&self) -> &str {
        match self {
            RoutePattern::Template { source, .. } => source,
            RoutePattern::Regex(re) => re.as_str(),
        }
    }

    /// Captures of `path` if the pattern matches it.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        match self {
            RoutePattern::Template { segments, .. } => {
                let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if parts.len() != segments.len() {
                    return None;
                }
                let mut params = PathParams::new();
                for (segment, part) in segments.iter().zip(parts) {
                    match segment {
                        Segment::Literal(lit) if lit == part => {}
                        Segment::Literal(_) => return None,
                        Segment::Param(name) => params.insert(name.as_str(), decode(part)),
                    }
                }
                Some(params)
            }
            RoutePattern::Regex(re) => {
                let caps = re.captures(path)?;
                Some(
                    re.capture_names()
                        .flatten()
                        .filter_map(|name| caps.name(name).map(|m| (name, decode(m.as_str()))))
                        .collect(),
                )
            }
        }
    }

    /// Sort key: longer, more literal patterns are tried first so that
    /// `/threads/runs` wins over `/threads/{thread_id}`.
    pub fn specificity(&self) -> (usize, usize, usize) {
        match self {
            RoutePattern::Template { source, segments } => {
                let literals = segments
                    .iter()
                    .filter(|s| matches!(s, Segment::Literal(_)))
                    .count();
                (segments.len(), literals, source.len())
            }
            RoutePattern::Regex(re) => {
                let source = re.as_str();
                (source.matches('/').count(), 0, source.len())
            }
        }
    }
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// Everything a default handler gets to see.
pub struct RouteContext<'a> {
    pub request: &'a MockRequest,
    pub params: &'a PathParams,
    pub store: SharedStateStore,
    /// Status code of a successful response.
    pub status: StatusCode,
}

impl RouteContext<'_> {
    pub fn param(&self, name: &str) -> Result<&str> {
        self.params.require(name)
    }

    /// The request body as a JSON object.
    pub fn body(&self) -> Result<Fields> {
        self.request.json_object()
    }

    pub fn list_params(&self) -> ListParams {
        ListParams::from_query(&self.request.query)
    }

    /// Respond with `body` and the route's success status.
    pub fn respond<T: Serialize + ?Sized>(&self, body: &T) -> Result<MockResponse> {
        Ok(MockResponse::json(self.status, body))
    }
}

/// Default behaviour of a route.
///
/// `partial` holds fields a test asked to override; handlers layer it
/// between their computed defaults and the request body.
pub trait RouteHandler: Send + Sync {
    fn handle(&self, ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse>;
}

impl<F> RouteHandler for F
where
    F: Fn(&RouteContext<'_>, &Fields) -> Result<MockResponse> + Send + Sync,
{
    fn handle(&self, ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
        self(ctx, partial)
    }
}

/// What a custom response handler learns about the route it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub name: String,
    /// Calls made to the route before this one.
    pub call_count: usize,
}

/// One call handed to a [`ResponseHandler`].
pub struct HandlerCall<'a> {
    pub request: &'a MockRequest,
    pub route: &'a RouteInfo,
    pub params: &'a PathParams,
    /// The route's store, present when the handler asked for it.
    pub store: Option<SharedStateStore>,
}

/// A test-supplied function that replaces a route's behaviour.
pub trait ResponseHandler: Send + Sync {
    fn respond(&self, call: &HandlerCall<'_>) -> MockResponse;

    /// Whether the handler wants the store passed in.
    fn needs_store(&self) -> bool {
        false
    }
}

/// A closure of `(request, route, params)`.
pub struct FnHandler<F>(F);

impl<F> ResponseHandler for FnHandler<F>
where
    F: Fn(&MockRequest, &RouteInfo, &PathParams) -> MockResponse + Send + Sync,
{
    fn respond(&self, call: &HandlerCall<'_>) -> MockResponse {
        (self.0)(call.request, call.route, call.params)
    }
}

/// A closure of `(request, route, params, store)`.
pub struct StoreHandler<F>(F);

impl<F> ResponseHandler for StoreHandler<F>
where
    F: Fn(&MockRequest, &RouteInfo, &PathParams, &StateStore) -> MockResponse + Send + Sync,
{
    fn respond(&self, call: &HandlerCall<'_>) -> MockResponse {
        match &call.store {
            Some(store) => (self.0)(call.request, call.route, call.params, store),
            None => MockResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store-aware handler called without a store",
            ),
        }
    }

    fn needs_store(&self) -> bool {
        true
    }
}

/// Wrap a closure as a response handler.
pub fn handler<F>(f: F) -> FnHandler<F>
where
    F: Fn(&MockRequest, &RouteInfo, &PathParams) -> MockResponse + Send + Sync,
{
    FnHandler(f)
}

/// Wrap a closure that also receives the route's store.
pub fn with_store<F>(f: F) -> StoreHandler<F>
where
    F: Fn(&MockRequest, &RouteInfo, &PathParams, &StateStore) -> MockResponse + Send + Sync,
{
    StoreHandler(f)
}

// ============================================================================
// Overrides
// ============================================================================

/// What a route answers with.
#[derive(Clone, Default)]
pub enum MockOverride {
    /// The route's own handler.
    #[default]
    Default,
    /// A full resource, returned as is and written to the store.
    Resource(Resource),
    /// A full JSON body, returned as is.
    Object(Value),
    /// Fields layered over the handler's defaults.
    Partial(Fields),
    /// A fixed HTTP response that bypasses the store.
    Raw(RawResponse),
    /// A custom function.
    Handler {
        handler: Arc<dyn ResponseHandler>,
        needs_store: bool,
    },
}

impl MockOverride {
    /// Wrap any response handler, recording whether it needs the store.
    pub fn handler(handler: impl ResponseHandler + 'static) -> Self {
        let needs_store = handler.needs_store();
        MockOverride::Handler {
            handler: Arc::new(handler),
            needs_store,
        }
    }

    /// A full JSON body built from any serializable value.
    pub fn object<T: Serialize>(body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => MockOverride::Object(value),
            Err(e) => MockOverride::Raw(
                RawResponse::new(StatusCode::INTERNAL_SERVER_ERROR)
                    .with_body(format!("failed to serialize override: {}", e)),
            ),
        }
    }
}

impl fmt::Debug for MockOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockOverride::Default => f.write_str("Default"),
            MockOverride::Resource(r) => f.debug_tuple("Resource").field(&r.kind()).finish(),
            MockOverride::Object(v) => f.debug_tuple("Object").field(v).finish(),
            MockOverride::Partial(p) => f.debug_tuple("Partial").field(p).finish(),
            MockOverride::Raw(r) => f.debug_tuple("Raw").field(&r.status).finish(),
            MockOverride::Handler { needs_store, .. } => f
                .debug_struct("Handler")
                .field("needs_store", needs_store)
                .finish_non_exhaustive(),
        }
    }
}

impl From<Resource> for MockOverride {
    fn from(r: Resource) -> Self {
        MockOverride::Resource(r)
    }
}

macro_rules! override_from_resource {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for MockOverride {
                fn from(r: $ty) -> Self {
                    MockOverride::Resource(r.into())
                }
            }
        )*
    };
}

override_from_resource!(
    Assistant,
    Thread,
    Message,
    Run,
    RunStep,
    FileObject,
    VectorStore,
    VectorStoreFile,
    VectorStoreFileBatch,
    Model,
);

macro_rules! override_from_object {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for MockOverride {
                fn from(body: $ty) -> Self {
                    MockOverride::object(&body)
                }
            }
        )*
    };
}

override_from_object!(
    ChatCompletion,
    CreateEmbeddingResponse,
    ModerationCreateResponse,
    DeletedObject,
);

impl<T: Serialize> From<Page<T>> for MockOverride {
    fn from(page: Page<T>) -> Self {
        MockOverride::object(&page)
    }
}

/// A JSON object is a partial; any other JSON value is returned as is.
impl From<Value> for MockOverride {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => MockOverride::Partial(fields),
            other => MockOverride::Object(other),
        }
    }
}

impl From<Fields> for MockOverride {
    fn from(fields: Fields) -> Self {
        MockOverride::Partial(fields)
    }
}

impl From<RawResponse> for MockOverride {
    fn from(raw: RawResponse) -> Self {
        MockOverride::Raw(raw)
    }
}

impl From<StatusCode> for MockOverride {
    fn from(status: StatusCode) -> Self {
        MockOverride::Raw(RawResponse::new(status))
    }
}

impl<F> From<FnHandler<F>> for MockOverride
where
    F: Fn(&MockRequest, &RouteInfo, &PathParams) -> MockResponse + Send + Sync + 'static,
{
    fn from(h: FnHandler<F>) -> Self {
        MockOverride::handler(h)
    }
}

impl<F> From<StoreHandler<F>> for MockOverride
where
    F: Fn(&MockRequest, &RouteInfo, &PathParams, &StateStore) -> MockResponse
        + Send
        + Sync
        + 'static,
{
    fn from(h: StoreHandler<F>) -> Self {
        MockOverride::handler(h)
    }
}

// ============================================================================
// Route
// ============================================================================

/// One mocked API operation.
pub struct Route {
    name: String,
    method: Method,
    pattern: RoutePattern,
    status: StatusCode,
    handler: Arc<dyn RouteHandler>,
    stateful: bool,
    state: StateCell,
    response: RwLock<MockOverride>,
    calls: AtomicUsize,
    requests: Mutex<Vec<MockRequest>>,
    fail_first: AtomicUsize,
    latency_ms: AtomicU64,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

impl Route {
    /// A route whose resource overrides are also written to the store.
    pub fn stateful(
        name: &str,
        method: Method,
        pattern: &str,
        status: StatusCode,
        state: &StateCell,
        handler: impl RouteHandler + 'static,
    ) -> Arc<Self> {
        Arc::new(Self::build(
            name,
            method,
            RoutePattern::template(pattern),
            status,
            state,
            Arc::new(handler),
            true,
        ))
    }

    /// A route that never writes overrides to the store.
    pub fn stateless(
        name: &str,
        method: Method,
        pattern: &str,
        status: StatusCode,
        state: &StateCell,
        handler: impl RouteHandler + 'static,
    ) -> Arc<Self> {
        Arc::new(Self::build(
            name,
            method,
            RoutePattern::template(pattern),
            status,
            state,
            Arc::new(handler),
            false,
        ))
    }

    /// A route matched by an arbitrary pattern, answered only by `response`.
    pub fn custom(
        name: &str,
        method: Method,
        pattern: RoutePattern,
        state: &StateCell,
        response: impl Into<MockOverride>,
    ) -> Arc<Self> {
        let route = Self::build(
            name,
            method,
            pattern,
            StatusCode::OK,
            state,
            Arc::new(unhandled),
            false,
        );
        route.set_response(response);
        Arc::new(route)
    }

    fn build(
        name: &str,
        method: Method,
        pattern: RoutePattern,
        status: StatusCode,
        state: &StateCell,
        handler: Arc<dyn RouteHandler>,
        stateful: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            method,
            pattern,
            status,
            handler,
            stateful,
            state: state.clone(),
            response: RwLock::new(MockOverride::Default),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            fail_first: AtomicUsize::new(0),
            latency_ms: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Status of a successful default response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_stateful(&self) -> bool {
        self.stateful
    }

    /// The store this route reads and writes.
    pub fn state(&self) -> SharedStateStore {
        self.state.current()
    }

    /// Captures of the request if this route serves it.
    pub fn matches(&self, method: &Method, path: &str) -> Option<PathParams> {
        if &self.method != method {
            return None;
        }
        self.pattern.matches(path)
    }

    // ------------------------------------------------------------------------
    // Overrides
    // ------------------------------------------------------------------------

    /// Replace what the route answers with.
    pub fn set_response(&self, response: impl Into<MockOverride>) {
        *self.response.write().unwrap_or_else(PoisonError::into_inner) = response.into();
    }

    /// Go back to the default handler.
    pub fn reset_response(&self) {
        self.set_response(MockOverride::Default);
    }

    pub fn response(&self) -> MockOverride {
        self.response
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Answer the first `n` calls with a bodiless 500.
    pub fn fail_first(&self, n: usize) {
        self.fail_first.store(n, Ordering::SeqCst);
    }

    /// Delay every response of this route.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms.load(Ordering::SeqCst))
    }

    // ------------------------------------------------------------------------
    // Telemetry
    // ------------------------------------------------------------------------

    /// Number of requests this route has served.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether the route has been called at all.
    pub fn called(&self) -> bool {
        self.call_count() > 0
    }

    /// Requests this route has served, oldest first.
    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Assert that the route was hit exactly `expected` times.
    pub fn assert_call_count(&self, expected: usize) {
        let actual = self.call_count();
        assert_eq!(
            actual, expected,
            "route {} was called {} times, expected {}",
            self.name, actual, expected
        );
    }

    /// Zero the counter and forget captured requests.
    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Serve one matched request.
    pub fn call(&self, request: &MockRequest, params: &PathParams) -> MockResponse {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if call_index < self.fail_first.load(Ordering::SeqCst) {
            tracing::debug!(route = %self.name, call_index, "Injected failure");
            return MockResponse::empty(StatusCode::INTERNAL_SERVER_ERROR);
        }

        let store = self.state.current();
        let ctx = RouteContext {
            request,
            params,
            store: Arc::clone(&store),
            status: self.status,
        };

        match self.response() {
            MockOverride::Default => self.run_default(&ctx, &Fields::new()),
            MockOverride::Partial(partial) => match self.handler.handle(&ctx, &partial) {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        route = %self.name,
                        error = %e,
                        "Failed to build response from partial, falling back to default handler"
                    );
                    self.run_default(&ctx, &Fields::new())
                }
            },
            MockOverride::Resource(resource) => match resource.to_value() {
                Ok(body) => {
                    if self.stateful {
                        store.blind_put(resource);
                    }
                    MockResponse::json(self.status, &body)
                }
                Err(e) => self.failure(e),
            },
            MockOverride::Object(body) => MockResponse::json(self.status, &body),
            MockOverride::Raw(raw) => raw.into(),
            MockOverride::Handler {
                handler,
                needs_store,
            } => {
                let info = RouteInfo {
                    name: self.name.clone(),
                    call_count: call_index,
                };
                handler.respond(&HandlerCall {
                    request,
                    route: &info,
                    params,
                    store: needs_store.then_some(store),
                })
            }
        }
    }

    fn run_default(&self, ctx: &RouteContext<'_>, partial: &Fields) -> MockResponse {
        self.handler
            .handle(ctx, partial)
            .unwrap_or_else(|e| self.failure(e))
    }

    fn failure(&self, e: MockError) -> MockResponse {
        if e.is_client_error() {
            tracing::debug!(route = %self.name, error = %e, "Rejected request");
            MockResponse::error(StatusCode::BAD_REQUEST, &e.to_string())
        } else {
            tracing::error!(route = %self.name, error = %e, "Route handler failed");
            MockResponse::error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// Handler of custom routes whose override was reset.
fn unhandled(_: &RouteContext<'_>, _: &Fields) -> Result<MockResponse> {
    Ok(MockResponse::error(
        StatusCode::NOT_IMPLEMENTED,
        "custom route has no response configured",
    ))
}

// ============================================================================
// Handler helpers
// ============================================================================

/// Layer a test partial over a found record. Without a partial the record
/// is returned untouched.
pub(crate) fn overlay<T: Serialize + DeserializeOwned>(
    kind: &'static str,
    found: T,
    partial: &Fields,
) -> Result<T> {
    if partial.is_empty() {
        Ok(found)
    } else {
        merge::merge_with_partial(kind, &found, partial)
    }
}

/// The body of a delete call.
pub(crate) fn deleted(
    ctx: &RouteContext<'_>,
    id: &str,
    object: &str,
    was_deleted: bool,
    partial: &Fields,
) -> Result<MockResponse> {
    let body = overlay("deleted", DeletedObject::new(id, object, was_deleted), partial)?;
    ctx.respond(&body)
}

/// Whether a request asked for a streamed response.
pub(crate) fn wants_stream(body: &Fields) -> bool {
    body.get("stream").and_then(Value::as_bool).unwrap_or(false)
}
