//! Server-sent event streams.
//!
//! An [`EventStream`] pulls [`Event`]s from any iterator and renders each one
//! as `event: <type>\n` followed by `data: <json>\n\n`, then closes with
//! `event: done` / `data: [DONE]`. Events are produced lazily, so the source
//! iterator can advance state in the store between items and a client
//! polling in parallel sees the intermediate states.

use std::fmt;

use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use serde_json::Value;

/// Name of an assistant stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    ThreadCreated,
    ThreadRunCreated,
    ThreadRunQueued,
    ThreadRunInProgress,
    ThreadRunRequiresAction,
    ThreadRunCompleted,
    ThreadRunIncomplete,
    ThreadRunFailed,
    ThreadRunCancelling,
    ThreadRunCancelled,
    ThreadRunExpired,
    ThreadRunStepCreated,
    ThreadRunStepInProgress,
    ThreadRunStepDelta,
    ThreadRunStepCompleted,
    ThreadRunStepFailed,
    ThreadRunStepCancelled,
    ThreadRunStepExpired,
    ThreadMessageCreated,
    ThreadMessageInProgress,
    ThreadMessageDelta,
    ThreadMessageCompleted,
    ThreadMessageIncomplete,
    Error,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::ThreadCreated => "thread.created",
            EventType::ThreadRunCreated => "thread.run.created",
            EventType::ThreadRunQueued => "thread.run.queued",
            EventType::ThreadRunInProgress => "thread.run.in_progress",
            EventType::ThreadRunRequiresAction => "thread.run.requires_action",
            EventType::ThreadRunCompleted => "thread.run.completed",
            EventType::ThreadRunIncomplete => "thread.run.incomplete",
            EventType::ThreadRunFailed => "thread.run.failed",
            EventType::ThreadRunCancelling => "thread.run.cancelling",
            EventType::ThreadRunCancelled => "thread.run.cancelled",
            EventType::ThreadRunExpired => "thread.run.expired",
            EventType::ThreadRunStepCreated => "thread.run.step.created",
            EventType::ThreadRunStepInProgress => "thread.run.step.in_progress",
            EventType::ThreadRunStepDelta => "thread.run.step.delta",
            EventType::ThreadRunStepCompleted => "thread.run.step.completed",
            EventType::ThreadRunStepFailed => "thread.run.step.failed",
            EventType::ThreadRunStepCancelled => "thread.run.step.cancelled",
            EventType::ThreadRunStepExpired => "thread.run.step.expired",
            EventType::ThreadMessageCreated => "thread.message.created",
            EventType::ThreadMessageInProgress => "thread.message.in_progress",
            EventType::ThreadMessageDelta => "thread.message.delta",
            EventType::ThreadMessageCompleted => "thread.message.completed",
            EventType::ThreadMessageIncomplete => "thread.message.incomplete",
            EventType::Error => "error",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One server-sent event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name. Chat completion chunks are sent without one.
    pub event: Option<EventType>,
    pub data: Value,
}

impl Event {
    /// A named event carrying `data`.
    pub fn new(event: EventType, data: impl Serialize) -> Self {
        Self {
            event: Some(event),
            data: to_value(data),
        }
    }

    /// A data-only event, as chat completion streams use.
    pub fn data_only(data: impl Serialize) -> Self {
        Self {
            event: None,
            data: to_value(data),
        }
    }

    /// Render the event as SSE bytes.
    pub fn to_sse(&self) -> Bytes {
        let mut out = String::new();
        if let Some(event) = self.event {
            out.push_str("event: ");
            out.push_str(event.as_str());
            out.push('\n');
        }
        out.push_str("data: ");
        out.push_str(&self.data.to_string());
        out.push_str("\n\n");
        Bytes::from(out)
    }
}

fn to_value(data: impl Serialize) -> Value {
    match serde_json::to_value(data) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize stream event");
            Value::Null
        }
    }
}

/// The closing `done` event.
pub const DONE_EVENT: &[u8] = b"event: done\ndata: [DONE]\n\n";

/// A finite stream of events rendered as SSE bytes.
pub struct EventStream {
    events: Box<dyn Iterator<Item = Event> + Send>,
    finished: bool,
}

impl EventStream {
    pub fn new<I>(events: I) -> Self
    where
        I: IntoIterator<Item = Event>,
        I::IntoIter: Send + 'static,
    {
        Self {
            events: Box::new(events.into_iter()),
            finished: false,
        }
    }

    /// Build a stream from a generator closure, called once per event until
    /// it returns `None`.
    pub fn from_fn<F>(next: F) -> Self
    where
        F: FnMut() -> Option<Event> + Send + 'static,
    {
        Self::new(std::iter::from_fn(next))
    }

    /// The same bytes as an async stream, yielding to the runtime after every
    /// chunk.
    pub fn into_async(self) -> impl Stream<Item = Bytes> + Send + 'static {
        futures::stream::unfold(self, |mut stream| async move {
            let chunk = stream.next()?;
            tokio::task::yield_now().await;
            Some((chunk, stream))
        })
    }

    /// Drain the whole stream into one buffer.
    pub fn collect_bytes(self) -> Bytes {
        let mut out = Vec::new();
        for chunk in self {
            out.extend_from_slice(&chunk);
        }
        Bytes::from(out)
    }
}

impl Iterator for EventStream {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.finished {
            return None;
        }
        match self.events.next() {
            Some(event) => Some(event.to_sse()),
            None => {
                self.finished = true;
                Some(Bytes::from_static(DONE_EVENT))
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Parse SSE bytes back into `(event, data)` pairs. The closing `done`
/// event is included with `[DONE]` as a string.
pub fn parse_sse(body: &[u8]) -> Vec<(Option<String>, Value)> {
    let text = String::from_utf8_lossy(body);
    text.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .filter_map(|block| {
            let mut event = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(name) = line.strip_prefix("event: ") {
                    event = Some(name.to_string());
                } else if let Some(payload) = line.strip_prefix("data: ") {
                    data = Some(
                        serde_json::from_str(payload)
                            .unwrap_or_else(|_| Value::String(payload.to_string())),
                    );
                }
            }
            data.map(|d| (event, d))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_event_rendering() {
        let event = Event::new(EventType::ThreadRunCreated, json!({"id": "run_1"}));
        assert_eq!(
            event.to_sse(),
            Bytes::from("event: thread.run.created\ndata: {\"id\":\"run_1\"}\n\n")
        );

        let chunk = Event::data_only(json!({"id": "chatcmpl-1"}));
        assert_eq!(chunk.to_sse(), Bytes::from("data: {\"id\":\"chatcmpl-1\"}\n\n"));
    }

    #[test]
    fn test_stream_ends_with_done() {
        let stream = EventStream::new(vec![
            Event::new(EventType::ThreadRunQueued, json!({"status": "queued"})),
            Event::new(EventType::ThreadRunCompleted, json!({"status": "completed"})),
        ]);
        let chunks: Vec<Bytes> = stream.collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], Bytes::from_static(DONE_EVENT));
    }

    #[test]
    fn test_empty_stream_is_just_done() {
        let bytes = EventStream::new(Vec::new()).collect_bytes();
        assert_eq!(bytes, Bytes::from_static(DONE_EVENT));
    }

    #[test]
    fn test_events_are_produced_lazily() {
        let produced = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&produced);
        let mut remaining = 3;
        let mut stream = EventStream::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            *counter.lock().unwrap() += 1;
            Some(Event::new(EventType::ThreadRunInProgress, json!({})))
        });

        assert_eq!(*produced.lock().unwrap(), 0);
        stream.next();
        assert_eq!(*produced.lock().unwrap(), 1);
        assert_eq!(stream.count(), 3);
    }

    #[test]
    fn test_parse_sse_round_trip() {
        let body = EventStream::new(vec![
            Event::new(EventType::ThreadCreated, json!({"id": "thread_1"})),
            Event::data_only(json!({"n": 1})),
        ])
        .collect_bytes();

        let parsed = parse_sse(&body);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].0.as_deref(), Some("thread.created"));
        assert_eq!(parsed[1], (None, json!({"n": 1})));
        assert_eq!(parsed[2], (Some("done".to_string()), json!("[DONE]")));
    }

    #[tokio::test]
    async fn test_async_stream_matches_sync() {
        let make = || {
            EventStream::new(vec![
                Event::new(EventType::ThreadMessageCreated, json!({"id": "msg_1"})),
                Event::new(EventType::ThreadMessageCompleted, json!({"id": "msg_1"})),
            ])
        };
        let sync: Vec<Bytes> = make().collect();
        let asynchronous: Vec<Bytes> = make().into_async().collect().await;
        assert_eq!(sync, asynchronous);
    }
}
