//! Synthetic identifiers and timestamps.
//!
//! Every generated id is `<prefix><separator><24 base-62 chars>`, matching the
//! shapes the real API hands out (`asst_...`, `file-...`, `chatcmpl-...`).

use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of the random suffix.
pub const SUFFIX_LEN: usize = 24;

/// Resource kinds that get generated identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    Assistant,
    Thread,
    Message,
    Run,
    RunStep,
    ToolCall,
    File,
    VectorStore,
    VectorStoreFileBatch,
    ChatCompletion,
    Moderation,
}

impl IdPrefix {
    /// The literal prefix including its separator.
    pub fn as_str(self) -> &'static str {
        match self {
            IdPrefix::Assistant => "asst_",
            IdPrefix::Thread => "thread_",
            IdPrefix::Message => "msg_",
            IdPrefix::Run => "run_",
            IdPrefix::RunStep => "step_",
            IdPrefix::ToolCall => "call_",
            IdPrefix::File => "file-",
            IdPrefix::VectorStore => "vs_",
            IdPrefix::VectorStoreFileBatch => "vsfb_",
            IdPrefix::ChatCompletion => "chatcmpl-",
            IdPrefix::Moderation => "modr-",
        }
    }
}

/// Generate a fresh identifier for the given kind.
pub fn generate_id(prefix: IdPrefix) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", prefix.as_str(), suffix)
}

/// Current time as integer seconds since the Unix epoch.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
