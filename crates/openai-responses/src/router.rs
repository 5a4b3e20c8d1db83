//! Route table: finds the route that serves a request.

use std::sync::{Arc, PoisonError, RwLock};

use axum::http::{Method, StatusCode};

use crate::request::{MockRequest, MockResponse, PathParams};
use crate::routes::{MockOverride, Route, RoutePattern};
use crate::store::StateCell;

/// Every registered route, most specific pattern first.
#[derive(Debug)]
pub struct MockRouter {
    routes: RwLock<Vec<Arc<Route>>>,
    state: StateCell,
}

impl MockRouter {
    pub fn new(state: StateCell) -> Self {
        Self {
            routes: RwLock::new(Vec::new()),
            state,
        }
    }

    /// Register routes and re-sort the table.
    pub fn register(&self, routes: impl IntoIterator<Item = Arc<Route>>) {
        let mut table = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        table.extend(routes);
        sort(&mut table);
    }

    /// Register an ad-hoc route answered by `response`.
    ///
    /// The pattern is matched against the path with the mock's base path
    /// removed, or against the full path for requests outside it.
    pub fn add_route(
        &self,
        method: Method,
        pattern: RoutePattern,
        response: impl Into<MockOverride>,
    ) -> Arc<Route> {
        let name = format!("{} {}", method, pattern.as_str());
        let route = Route::custom(&name, method, pattern, &self.state, response);
        tracing::debug!(route = %name, "Registered custom route");
        self.register([Arc::clone(&route)]);
        route
    }

    /// Sort the table again.
    pub fn resort(&self) {
        sort(&mut self.routes.write().unwrap_or_else(PoisonError::into_inner));
    }

    /// Registered routes in match order.
    pub fn routes(&self) -> Vec<Arc<Route>> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Look a route up by its name, e.g. `beta.threads.runs.create`.
    pub fn get(&self, name: &str) -> Option<Arc<Route>> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.name() == name)
            .cloned()
    }

    /// The first route matching `method` and `path`, with its captures.
    pub fn find(&self, method: &Method, path: &str) -> Option<(Arc<Route>, PathParams)> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find_map(|route| {
                route
                    .matches(method, path)
                    .map(|params| (Arc::clone(route), params))
            })
    }

    /// Serve `request` against `path`, or answer `404` when nothing matches.
    pub fn dispatch(&self, request: &MockRequest, path: &str) -> MockResponse {
        match self.find(&request.method, path) {
            Some((route, params)) => route.call(request, &params),
            None => not_matched(&request.method, &request.path),
        }
    }
}

/// The answer to a request no route serves.
pub(crate) fn not_matched(method: &Method, path: &str) -> MockResponse {
    tracing::warn!(%method, path, "No route matches request");
    MockResponse::error(
        StatusCode::NOT_FOUND,
        &format!("no mocked route for {} {}", method, path),
    )
}

/// Longest, most literal patterns first. The sort is stable, so routes of
/// equal specificity keep registration order.
fn sort(routes: &mut [Arc<Route>]) {
    routes.sort_by(|a, b| b.pattern().specificity().cmp(&a.pattern().specificity()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::Fields;
    use crate::routes::RouteContext;
    use serde_json::json;

    fn named(
        name: &'static str,
    ) -> impl Fn(&RouteContext<'_>, &Fields) -> crate::Result<MockResponse> + Send + Sync + 'static
    {
        move |ctx, _| ctx.respond(&json!({"route": name}))
    }

    fn route(state: &StateCell, name: &'static str, method: Method, pattern: &str) -> Arc<Route> {
        Route::stateless(name, method, pattern, StatusCode::OK, state, named(name))
    }

    #[test]
    fn test_specific_routes_win_regardless_of_order() {
        let state = StateCell::default();
        let router = MockRouter::new(state.clone());
        router.register([route(&state, "retrieve", Method::GET, "/threads/{thread_id}")]);
        router.register([route(&state, "list", Method::GET, "/threads/{thread_id}/runs")]);
        router.register([route(&state, "special", Method::GET, "/threads/runs")]);

        let (found, params) = router.find(&Method::GET, "/threads/runs").unwrap();
        assert_eq!(found.name(), "special");
        assert!(params.get("thread_id").is_none());

        let (found, params) = router.find(&Method::GET, "/threads/thread_1").unwrap();
        assert_eq!(found.name(), "retrieve");
        assert_eq!(params.get("thread_id"), Some("thread_1"));

        let (found, _) = router.find(&Method::GET, "/threads/thread_1/runs").unwrap();
        assert_eq!(found.name(), "list");
    }

    #[test]
    fn test_method_must_match() {
        let state = StateCell::default();
        let router = MockRouter::new(state.clone());
        router.register([route(&state, "get", Method::GET, "/files")]);
        assert!(router.find(&Method::POST, "/files").is_none());
    }

    #[test]
    fn test_unmatched_request_is_404() {
        let router = MockRouter::new(StateCell::default());
        let request = MockRequest::get("/v1/nowhere");
        let response = router.dispatch(&request, "/nowhere");
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        let body = response.into_json().unwrap();
        assert_eq!(body["error"]["message"], "no mocked route for GET /v1/nowhere");
    }

    #[test]
    fn test_add_route() {
        let router = MockRouter::new(StateCell::default());
        let route = router.add_route(
            Method::GET,
            RoutePattern::regex(r"/health/(?P<check>[a-z]+)").unwrap(),
            json!(["ok"]),
        );
        let response = router.dispatch(&MockRequest::get("/health/live"), "/health/live");
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.into_json().unwrap(), json!(["ok"]));
        assert_eq!(route.call_count(), 1);
        assert!(router.get("GET ^/health/(?P<check>[a-z]+)$").is_some());
    }
}
