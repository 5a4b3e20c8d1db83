//! openai-responses: an in-memory stand-in for the OpenAI API
//!
//! This crate lets code that talks to the OpenAI API be tested without a
//! network or a live backend:
//! - Stateful resource simulation (assistants, threads, messages, runs,
//!   files, vector stores, models) with cursor pagination
//! - One route per API operation, with call counts and captured requests
//! - Per-route overrides: fixed objects, partial overlays, raw responses
//!   and custom handlers, including injected failures
//! - Server-sent event streams for runs and chat completions
//! - A local HTTP host for clients that need a base URL

pub mod config;
pub mod error;
pub mod helpers;
pub mod ids;
pub mod logging;
pub mod merge;
pub mod mock;
pub mod request;
pub mod router;
pub mod routes;
pub mod server;
pub mod store;
pub mod streaming;
pub mod tokens;
pub mod types;

// Testing utilities - available in test builds
#[cfg(test)]
pub mod testing;

pub use config::{ConfigValidationError, MockConfig};
pub use error::{MockError, Result};
pub use helpers::{
    add_resource_to_state_store, chat_completion_from_create_request, merge_run_with_partial,
    message_from_create_request, run_from_create_request,
};
pub use ids::{IdPrefix, generate_id, now_unix};
pub use merge::{Fields, merge_with_partial};
pub use mock::{Beta, OpenAiMock};
pub use request::{FormData, FormField, MockRequest, MockResponse, PathParams, RawResponse};
pub use router::MockRouter;
pub use routes::{
    HandlerCall, MockOverride, ResponseHandler, Route, RouteInfo, RoutePattern, handler,
    with_store,
};
pub use server::{MockHandle, MockServer, with_mock, with_shared_state};
pub use store::{ListParams, Order, Resource, SharedStateStore, StateStore};
pub use streaming::{Event, EventStream, EventType, parse_sse};
