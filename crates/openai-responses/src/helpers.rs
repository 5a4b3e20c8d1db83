//! Builders for custom response handlers.
//!
//! Each builder produces the same resource the default route would, so a
//! handler can tweak one field and still answer with a complete object:
//!
//! ```ignore
//! mock.beta.threads.runs.create.set_response(with_store(|request, _, params, store| {
//!     let thread_id = params.get("thread_id").unwrap_or_default();
//!     let assistant = store.beta.assistants.get("asst_1").unwrap();
//!     let run = run_from_create_request(thread_id, &assistant, request, &Fields::new()).unwrap();
//!     let run = merge_run_with_partial(&run, &object(json!({"status": "requires_action"}))).unwrap();
//!     add_resource_to_state_store(store, run.clone());
//!     MockResponse::json(StatusCode::CREATED, &run)
//! }));
//! ```

use crate::error::Result;
use crate::merge::{self, Fields};
use crate::request::MockRequest;
use crate::store::{Resource, StateStore};
use crate::types::{Assistant, ChatCompletion, Message, Run};

pub use crate::merge::{merge_with_partial, object};
pub use crate::routes::assistants::build_assistant;
pub use crate::routes::chat::build_chat_completion;
pub use crate::routes::embeddings::build_embeddings;
pub use crate::routes::messages::build_message;
pub use crate::routes::moderations::build_moderation;
pub use crate::routes::run_steps::build_run_step;
pub use crate::routes::runs::build_run;
pub use crate::routes::threads::build_thread;
pub use crate::routes::vector_stores::build_vector_store;

/// Build the run a `POST /threads/{thread_id}/runs` request would create.
pub fn run_from_create_request(
    thread_id: &str,
    assistant: &Assistant,
    request: &MockRequest,
    partial: &Fields,
) -> Result<Run> {
    build_run(thread_id, assistant, partial, request.json_object()?)
}

/// Build the message a `POST /threads/{thread_id}/messages` request would
/// create.
pub fn message_from_create_request(
    thread_id: &str,
    request: &MockRequest,
    partial: &Fields,
) -> Result<Message> {
    build_message(thread_id, partial, request.json_object()?)
}

/// Build the completion a `POST /chat/completions` request would return.
pub fn chat_completion_from_create_request(
    request: &MockRequest,
    partial: &Fields,
) -> Result<ChatCompletion> {
    build_chat_completion(partial, request.json_object()?)
}

/// Layer `partial` over `run`.
pub fn merge_run_with_partial(run: &Run, partial: &Fields) -> Result<Run> {
    merge::merge_with_partial("thread.run", run, partial)
}

/// Put a resource into the store it belongs to.
pub fn add_resource_to_state_store(store: &StateStore, resource: impl Into<Resource>) {
    store.blind_put(resource);
}
