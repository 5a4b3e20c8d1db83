//! `/moderations`.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use super::{Route, RouteContext};
use crate::error::Result;
use crate::ids::{IdPrefix, generate_id};
use crate::merge::{self, Fields};
use crate::request::MockResponse;
use crate::store::StateCell;
use crate::types::{Moderation, ModerationCreateResponse};

/// Model reported when the request names none.
pub const DEFAULT_MODERATION_MODEL: &str = "text-moderation-007";

/// `moderations`.
pub struct Moderations {
    pub create: Arc<Route>,
}

impl Moderations {
    pub(crate) fn new(state: &StateCell) -> Self {
        Self {
            create: Route::stateless(
                "moderations.create",
                Method::POST,
                "/moderations",
                StatusCode::OK,
                state,
                create,
            ),
        }
    }

    pub(crate) fn routes(&self) -> Vec<Arc<Route>> {
        vec![Arc::clone(&self.create)]
    }
}

fn input_count(input: Option<&Value>) -> usize {
    match input {
        Some(Value::Array(items)) => items.len(),
        _ => 1,
    }
}

/// Build a moderation response with one unflagged result per input item.
pub fn build_moderation(partial: &Fields, request: &Fields) -> Result<ModerationCreateResponse> {
    let model = request
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_MODERATION_MODEL);
    let results = vec![Moderation::default(); input_count(request.get("input"))];
    let defaults = merge::object(json!({
        "id": generate_id(IdPrefix::Moderation),
        "model": model,
        "results": results,
    }));
    merge::build("moderation", merge::merge_layers(defaults, partial, Fields::new()))
}

fn create(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    ctx.respond(&build_moderation(partial, &ctx.body()?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::OpenAiMock;
    use crate::testing::fixtures::{post, send};

    #[tokio::test]
    async fn test_unflagged_results() {
        let mock = OpenAiMock::new();
        let (status, body) = send(
            &mock,
            post("/moderations", json!({"input": ["fine", "also fine"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model"], DEFAULT_MODERATION_MODEL);
        assert!(body["id"].as_str().unwrap().starts_with("modr-"));
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["flagged"], false);
        assert_eq!(results[1]["categories"]["violence"], false);
    }

    #[tokio::test]
    async fn test_flagged_partial() {
        let mock = OpenAiMock::new();
        let mut flagged = Moderation::default();
        flagged.flagged = true;
        flagged.categories.harassment = true;
        flagged.category_scores.harassment = 0.97;
        mock.moderations
            .create
            .set_response(json!({"results": [flagged]}));

        let (_, body) = send(
            &mock,
            post("/moderations", json!({"input": "mean", "model": "omni-moderation-latest"})),
        )
        .await;
        assert_eq!(body["model"], "omni-moderation-latest");
        assert_eq!(body["results"][0]["flagged"], true);
        assert_eq!(body["results"][0]["categories"]["harassment"], true);
    }
}
