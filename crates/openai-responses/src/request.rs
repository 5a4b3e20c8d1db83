//! Intercepted requests and the responses handed back for them.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{FromRequest, Multipart};
use axum::http::header::{CONTENT_TYPE, HeaderName};
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::{MockError, Result};
use crate::streaming::EventStream;

// ============================================================================
// Requests
// ============================================================================

/// A request as seen by a route.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    /// Decoded query parameters.
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Parsed `multipart/form-data` body, filled in before dispatch.
    pub form: Option<FormData>,
}

impl MockRequest {
    /// A request for `uri`, which may carry a query string.
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (uri, HashMap::new()),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            form: None,
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn delete(uri: &str) -> Self {
        Self::new(Method::DELETE, uri)
    }

    /// Attach a JSON body.
    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = Bytes::from(body.to_string());
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach an already parsed form.
    pub fn with_form(mut self, form: FormData) -> Self {
        self.form = Some(form);
        self
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.starts_with("multipart/form-data"))
    }

    /// The body parsed as JSON. An empty body reads as `null`.
    pub fn json(&self) -> Result<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| MockError::InvalidRequest(format!("body is not valid JSON: {}", e)))
    }

    /// The body as a JSON object. An empty body reads as an empty object.
    pub fn json_object(&self) -> Result<Map<String, Value>> {
        match self.json()? {
            Value::Null => Ok(Map::new()),
            Value::Object(map) => Ok(map),
            other => Err(MockError::InvalidRequest(format!(
                "expected a JSON object body, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Parse a `multipart/form-data` body into [`FormData`].
    pub async fn read_multipart(&self) -> Result<FormData> {
        let content_type = self
            .content_type()
            .ok_or_else(|| MockError::InvalidRequest("missing content type".to_string()))?;
        let request = Request::builder()
            .method(self.method.clone())
            .uri(self.path.as_str())
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(self.body.clone()))
            .map_err(|e| MockError::InvalidRequest(e.to_string()))?;

        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| MockError::InvalidRequest(e.to_string()))?;

        let mut form = FormData::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| MockError::InvalidRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| MockError::InvalidRequest(e.to_string()))?;
            form.fields.push(FormField {
                name,
                filename,
                content_type,
                data,
            });
        }
        Ok(form)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decode a query string into a map. Later duplicates win.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

/// A parsed `multipart/form-data` body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    pub fields: Vec<FormField>,
}

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FormData {
    /// Add a plain text field.
    pub fn text_field(mut self, name: &str, value: &str) -> Self {
        self.fields.push(FormField {
            name: name.to_string(),
            filename: None,
            content_type: None,
            data: Bytes::copy_from_slice(value.as_bytes()),
        });
        self
    }

    /// Add a file field.
    pub fn file_field(mut self, name: &str, filename: &str, data: impl Into<Bytes>) -> Self {
        self.fields.push(FormField {
            name: name.to_string(),
            filename: Some(filename.to_string()),
            content_type: Some("application/octet-stream".to_string()),
            data: data.into(),
        });
        self
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// A field's value as text.
    pub fn text(&self, name: &str) -> Option<String> {
        self.field(name)
            .map(|f| String::from_utf8_lossy(&f.data).into_owned())
    }

    /// The first field that carries a filename.
    pub fn file(&self) -> Option<&FormField> {
        self.fields.iter().find(|f| f.filename.is_some())
    }
}

// ============================================================================
// Path parameters
// ============================================================================

/// Named captures of a route pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// A capture the route pattern guarantees.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| MockError::InvalidRequest(format!("missing path parameter `{}`", name)))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Body of a [`MockResponse`].
#[derive(Debug)]
pub enum ResponseBody {
    Empty,
    Bytes(Bytes),
    Stream(EventStream),
}

/// A response produced by a route.
#[derive(Debug)]
pub struct MockResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl MockResponse {
    /// A response without a body.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
        }
    }

    /// `404` without a body, as the API answers for unknown ids.
    pub fn not_found() -> Self {
        Self::empty(StatusCode::NOT_FOUND)
    }

    /// A JSON response.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => Self::empty(status)
                .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .with_body(ResponseBody::Bytes(Bytes::from(bytes))),
            Err(e) => Self::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("failed to serialize response: {}", e),
            ),
        }
    }

    /// An error in the API's error envelope.
    pub fn error(status: StatusCode, message: &str) -> Self {
        let kind = if status.is_server_error() {
            "server_error"
        } else {
            "invalid_request_error"
        };
        let body = json!({
            "error": {
                "message": message,
                "type": kind,
                "param": null,
                "code": null
            }
        });
        Self::json(status, &body)
    }

    /// A server-sent event stream.
    pub fn stream(status: StatusCode, events: EventStream) -> Self {
        Self::empty(status)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"))
            .with_header(
                axum::http::header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache"),
            )
            .with_body(ResponseBody::Stream(events))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = body;
        self
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.body, ResponseBody::Stream(_))
    }

    /// Collect the body, draining a stream if there is one.
    pub fn into_bytes(self) -> Bytes {
        match self.body {
            ResponseBody::Empty => Bytes::new(),
            ResponseBody::Bytes(bytes) => bytes,
            ResponseBody::Stream(stream) => stream.collect_bytes(),
        }
    }

    /// Collect the body as JSON, if it is JSON.
    pub fn into_json(self) -> Option<Value> {
        serde_json::from_slice(&self.into_bytes()).ok()
    }
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        let body = match self.body {
            ResponseBody::Empty => Body::empty(),
            ResponseBody::Bytes(bytes) => Body::from(bytes),
            ResponseBody::Stream(stream) => {
                Body::from_stream(stream.into_async().map(Ok::<_, std::io::Error>))
            }
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// A fixed response a route can be told to return on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    /// A bodiless response, e.g. `RawResponse::new(StatusCode::INTERNAL_SERVER_ERROR)`.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = Bytes::from(body.to_string());
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

impl From<RawResponse> for MockResponse {
    fn from(raw: RawResponse) -> Self {
        let body = if raw.body.is_empty() {
            ResponseBody::Empty
        } else {
            ResponseBody::Bytes(raw.body)
        };
        MockResponse {
            status: raw.status,
            headers: raw.headers,
            body,
        }
    }
}
