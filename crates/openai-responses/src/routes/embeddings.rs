//! `/embeddings`.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};

use super::{Route, RouteContext};
use crate::error::{MockError, Result};
use crate::merge::{self, Fields};
use crate::request::MockResponse;
use crate::store::StateCell;
use crate::tokens;
use crate::types::{CreateEmbeddingResponse, Embedding, EmbeddingUsage, EmbeddingVector};

/// Length of a generated embedding when the request gives no `dimensions`.
pub const DEFAULT_DIMENSIONS: usize = 1536;

/// Largest `dimensions` any embedding model accepts.
pub const MAX_DIMENSIONS: usize = 3072;

/// `embeddings`.
pub struct Embeddings {
    pub create: Arc<Route>,
}

impl Embeddings {
    pub(crate) fn new(state: &StateCell) -> Self {
        Self {
            create: Route::stateless(
                "embeddings.create",
                Method::POST,
                "/embeddings",
                StatusCode::CREATED,
                state,
                create,
            ),
        }
    }

    pub(crate) fn routes(&self) -> Vec<Arc<Route>> {
        vec![Arc::clone(&self.create)]
    }
}

/// One input item of an embeddings request.
#[derive(Debug, Clone, PartialEq)]
enum EmbeddingInput {
    Text(String),
    Tokens(Vec<u64>),
}

impl EmbeddingInput {
    fn seed(&self) -> u64 {
        // FNV-1a, so the same input always maps to the same vector.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        let mut feed = |byte: u8| {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        };
        match self {
            EmbeddingInput::Text(text) => text.bytes().for_each(&mut feed),
            EmbeddingInput::Tokens(ids) => ids
                .iter()
                .flat_map(|id| id.to_le_bytes())
                .for_each(&mut feed),
        }
        hash
    }

    fn token_count(&self, model: &str) -> Result<u64> {
        match self {
            EmbeddingInput::Text(text) => tokens::count_tokens(model, text),
            EmbeddingInput::Tokens(ids) => Ok(ids.len() as u64),
        }
    }
}

/// Split `input` into items: a string, a token array, or an array of either.
fn parse_input(input: Option<&Value>) -> Result<Vec<EmbeddingInput>> {
    let invalid = || {
        MockError::InvalidRequest(
            "input must be a string, an array of strings or an array of token arrays".into(),
        )
    };
    let tokens_of = |items: &[Value]| -> Result<Vec<u64>> {
        items.iter().map(|v| v.as_u64().ok_or_else(invalid)).collect()
    };
    match input {
        Some(Value::String(text)) => Ok(vec![EmbeddingInput::Text(text.clone())]),
        Some(Value::Array(items)) if items.iter().all(Value::is_number) && !items.is_empty() => {
            Ok(vec![EmbeddingInput::Tokens(tokens_of(items)?)])
        }
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => Ok(EmbeddingInput::Text(text.clone())),
                Value::Array(ids) => Ok(EmbeddingInput::Tokens(tokens_of(ids)?)),
                _ => Err(invalid()),
            })
            .collect(),
        _ => Err(invalid()),
    }
}

/// A unit-length vector determined by the input.
fn vector_for(input: &EmbeddingInput, dimensions: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(input.seed());
    let mut vector: Vec<f32> = (0..dimensions).map(|_| rng.random_range(-1.0..1.0)).collect();
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
    vector
}

/// Little-endian `f32`s, base64 encoded, as the API sends them for
/// `encoding_format: "base64"`.
pub fn encode_base64(vector: &[f32]) -> String {
    let bytes: Vec<u8> = vector.iter().flat_map(|x| x.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

/// Build an embeddings response with one embedding per input item.
pub fn build_embeddings(partial: &Fields, request: &Fields) -> Result<CreateEmbeddingResponse> {
    let model = request
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| MockError::InvalidRequest("model is required".into()))?;
    let inputs = parse_input(request.get("input"))?;
    let dimensions = match request.get("dimensions") {
        None | Some(Value::Null) => DEFAULT_DIMENSIONS,
        Some(value) => value
            .as_u64()
            .and_then(|d| usize::try_from(d).ok())
            .filter(|d| (1..=MAX_DIMENSIONS).contains(d))
            .ok_or_else(|| {
                MockError::InvalidRequest(format!(
                    "dimensions must be an integer between 1 and {}",
                    MAX_DIMENSIONS
                ))
            })?,
    };
    let base64 = request.get("encoding_format").and_then(Value::as_str) == Some("base64");

    let mut prompt_tokens = 0;
    let mut data = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        prompt_tokens += input.token_count(model)?;
        let vector = vector_for(input, dimensions);
        data.push(Embedding {
            embedding: if base64 {
                EmbeddingVector::Base64(encode_base64(&vector))
            } else {
                EmbeddingVector::Float(vector)
            },
            index: index as u32,
            object: "embedding".to_string(),
        });
    }

    let defaults = merge::object(json!({
        "data": data,
        "model": model,
        "object": "list",
        "usage": EmbeddingUsage {
            prompt_tokens,
            total_tokens: prompt_tokens,
        },
    }));
    merge::build("list", merge::merge_layers(defaults, partial, Fields::new()))
}

fn create(ctx: &RouteContext<'_>, partial: &Fields) -> Result<MockResponse> {
    ctx.respond(&build_embeddings(partial, &ctx.body()?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::OpenAiMock;
    use crate::testing::fixtures::{post, send};

    #[tokio::test]
    async fn test_one_embedding_per_input() {
        let mock = OpenAiMock::new();
        let (status, body) = send(
            &mock,
            post(
                "/embeddings",
                json!({"model": "text-embedding-3-small", "input": ["one", "two", "three"]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["object"], "list");
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[2]["index"], 2);
        assert_eq!(data[0]["embedding"].as_array().unwrap().len(), DEFAULT_DIMENSIONS);
        assert!(body["usage"]["prompt_tokens"].as_u64().unwrap() >= 3);
    }

    #[tokio::test]
    async fn test_dimensions_and_base64() {
        let mock = OpenAiMock::new();
        let (_, body) = send(
            &mock,
            post(
                "/embeddings",
                json!({
                    "model": "text-embedding-3-small",
                    "input": "hello",
                    "dimensions": 8,
                    "encoding_format": "base64"
                }),
            ),
        )
        .await;
        let encoded = body["data"][0]["embedding"].as_str().unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(bytes.len(), 8 * 4);
    }

    #[test]
    fn test_same_input_same_vector() {
        let input = EmbeddingInput::Text("stable".into());
        let a = vector_for(&input, 16);
        let b = vector_for(&input, 16);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
        assert_ne!(a, vector_for(&EmbeddingInput::Text("other".into()), 16));
    }

    #[test]
    fn test_token_inputs() {
        assert_eq!(
            parse_input(Some(&json!([1, 2, 3]))).unwrap(),
            vec![EmbeddingInput::Tokens(vec![1, 2, 3])]
        );
        assert_eq!(parse_input(Some(&json!([[1], [2, 3]]))).unwrap().len(), 2);
        assert!(parse_input(Some(&json!(7))).is_err());
        assert!(parse_input(None).is_err());
    }

    #[tokio::test]
    async fn test_dimensions_out_of_range() {
        let mock = OpenAiMock::new();
        for dimensions in [json!(0), json!(MAX_DIMENSIONS + 1), json!(4_000_000_000_000u64)] {
            let (status, body) = send(
                &mock,
                post(
                    "/embeddings",
                    json!({
                        "model": "text-embedding-3-small",
                        "input": "hi",
                        "dimensions": dimensions
                    }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"]["type"], "invalid_request_error");
        }

        let (status, body) = send(
            &mock,
            post(
                "/embeddings",
                json!({"model": "text-embedding-3-large", "input": "hi", "dimensions": MAX_DIMENSIONS}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"][0]["embedding"].as_array().unwrap().len(), MAX_DIMENSIONS);
    }

    #[tokio::test]
    async fn test_missing_model() {
        let mock = OpenAiMock::new();
        let (status, _) = send(&mock, post("/embeddings", json!({"input": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
