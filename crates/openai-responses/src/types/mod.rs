//! Response and resource shapes of the simulated API.
//!
//! Building a resource from a JSON mapping is `serde_json::from_value`, so a
//! mapping that does not satisfy the schema fails to build instead of
//! producing a body the client library would reject.

pub mod assistants;
pub mod chat;
pub mod common;
pub mod embeddings;
pub mod files;
pub mod messages;
pub mod models;
pub mod moderations;
pub mod run_steps;
pub mod runs;
pub mod threads;
pub mod vector_stores;

pub use assistants::Assistant;
pub use chat::{
    ChatChoice, ChatCompletion, ChatCompletionChunk, ChatCompletionMessage, ChatToolCall,
    ChunkChoice, ChunkDelta, CompletionUsage,
};
pub use common::{
    AssistantTool, CodeInterpreterResources, DeletedObject, FileCounts, FileSearchResources,
    FunctionDefinition, Metadata, Page, ToolResources,
};
pub use embeddings::{CreateEmbeddingResponse, Embedding, EmbeddingUsage, EmbeddingVector};
pub use files::FileObject;
pub use messages::{Attachment, Message, MessageContent, MessageRole, MessageStatus, TextContent};
pub use models::{Model, SYSTEM_MODELS, SystemModel, system_models};
pub use moderations::{
    Moderation, ModerationCategories, ModerationCategoryScores, ModerationCreateResponse,
};
pub use run_steps::{MessageCreation, RunStep, RunStepStatus, RunStepType, StepDetails};
pub use runs::{
    FunctionCall, RequiredAction, RequiredToolCall, Run, RunStatus, RunUsage, SubmitToolOutputs,
};
pub use threads::Thread;
pub use vector_stores::{ExpiresAfter, VectorStore, VectorStoreFile, VectorStoreFileBatch};
