//! In-memory state behind the stateful routes.
//!
//! The store mirrors the API's resource hierarchy: a thread store owns message
//! and run stores, a run store owns a run step store, and a vector store store
//! owns its attached files and file batches. Every table returns copies, so a
//! change only becomes visible once it is `put` back.

mod assistants;
mod files;
mod models;
mod table;
mod threads;
mod vector_stores;

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

pub use assistants::AssistantStore;
pub use files::{ContentStore, FileStore};
pub use models::ModelStore;
pub use table::{DEFAULT_LIMIT, Keyed, ListParams, MAX_LIMIT, Order, Table, paginate};
pub use threads::{MessageStore, RunStepStore, RunStore, ThreadStore};
pub use vector_stores::{VectorStoreFileBatchStore, VectorStoreFileStore, VectorStoreStore};

use crate::error::{MockError, Result};
use crate::types::{
    Assistant, FileObject, Message, Model, Run, RunStep, Thread, VectorStore, VectorStoreFile,
    VectorStoreFileBatch, system_models,
};

// ============================================================================
// Keys
// ============================================================================

macro_rules! keyed_by_id {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Keyed for $ty {
                fn id(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

keyed_by_id!(
    Assistant,
    Thread,
    Message,
    Run,
    RunStep,
    FileObject,
    VectorStore,
    VectorStoreFileBatch,
    Model,
);

impl Keyed for VectorStoreFile {
    fn id(&self) -> &str {
        &self.id
    }

    fn store_key(&self) -> String {
        vector_stores::vector_store_file_key(&self.vector_store_id, &self.id)
    }
}

// ============================================================================
// Aggregate store
// ============================================================================

/// Thread-safe handle to a store.
pub type SharedStateStore = Arc<StateStore>;

/// Everything the mock remembers between requests.
#[derive(Debug)]
pub struct StateStore {
    pub files: FileStore,
    pub models: ModelStore,
    pub beta: BetaStore,
}

/// Stores of the `beta` namespace.
#[derive(Debug, Default)]
pub struct BetaStore {
    pub assistants: AssistantStore,
    pub threads: ThreadStore,
    pub vector_stores: VectorStoreStore,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// A fresh store seeded with the built-in model table.
    pub fn new() -> Self {
        Self::with_models(system_models())
    }

    /// A fresh store seeded with the given models.
    pub fn with_models(models: impl IntoIterator<Item = Model>) -> Self {
        Self {
            files: FileStore::default(),
            models: ModelStore::new(models),
            beta: BetaStore::default(),
        }
    }

    /// Create a shared instance.
    pub fn shared() -> SharedStateStore {
        Arc::new(Self::new())
    }

    /// Write a resource into whichever table holds its kind.
    pub fn blind_put(&self, resource: impl Into<Resource>) {
        match resource.into() {
            Resource::Assistant(a) => self.beta.assistants.put(a),
            Resource::Thread(t) => self.beta.threads.put(t),
            Resource::Message(m) => self.beta.threads.messages.put(m),
            Resource::Run(r) => self.beta.threads.runs.put(r),
            Resource::RunStep(s) => self.beta.threads.runs.steps.put(s),
            Resource::File(f) => self.files.put(f),
            Resource::VectorStore(v) => self.beta.vector_stores.put(v),
            Resource::VectorStoreFile(f) => self.beta.vector_stores.files.put(f),
            Resource::VectorStoreFileBatch(b) => self.beta.vector_stores.file_batches.put(b),
            Resource::Model(m) => self.models.put(m),
        }
    }

    /// Write a resource given as JSON, dispatching on its `object` field.
    ///
    /// Fails for objects the store has no table for, or that do not match
    /// their schema.
    pub fn put_value(&self, value: Value) -> Result<()> {
        let resource = Resource::from_value(value)?;
        self.blind_put(resource);
        Ok(())
    }
}

// ============================================================================
// Resources
// ============================================================================

/// Any record the store can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Assistant(Assistant),
    Thread(Thread),
    Message(Message),
    Run(Run),
    RunStep(RunStep),
    File(FileObject),
    VectorStore(VectorStore),
    VectorStoreFile(VectorStoreFile),
    VectorStoreFileBatch(VectorStoreFileBatch),
    Model(Model),
}

impl Resource {
    /// The `object` discriminator of the resource kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Assistant(_) => "assistant",
            Resource::Thread(_) => "thread",
            Resource::Message(_) => "thread.message",
            Resource::Run(_) => "thread.run",
            Resource::RunStep(_) => "thread.run.step",
            Resource::File(_) => "file",
            Resource::VectorStore(_) => "vector_store",
            Resource::VectorStoreFile(_) => "vector_store.file",
            Resource::VectorStoreFileBatch(_) => "vector_store.files_batch",
            Resource::Model(_) => "model",
        }
    }

    /// Build a resource from JSON using its `object` field.
    pub fn from_value(value: Value) -> Result<Self> {
        let kind = value
            .get("object")
            .and_then(Value::as_str)
            .ok_or_else(|| MockError::UnsupportedResource("missing `object` field".to_string()))?
            .to_string();
        let resource = match kind.as_str() {
            "assistant" => Resource::Assistant(serde_json::from_value(value)?),
            "thread" => Resource::Thread(serde_json::from_value(value)?),
            "thread.message" => Resource::Message(serde_json::from_value(value)?),
            "thread.run" => Resource::Run(serde_json::from_value(value)?),
            "thread.run.step" => Resource::RunStep(serde_json::from_value(value)?),
            "file" => Resource::File(serde_json::from_value(value)?),
            "vector_store" => Resource::VectorStore(serde_json::from_value(value)?),
            "vector_store.file" => Resource::VectorStoreFile(serde_json::from_value(value)?),
            "vector_store.files_batch" => {
                Resource::VectorStoreFileBatch(serde_json::from_value(value)?)
            }
            "model" => Resource::Model(serde_json::from_value(value)?),
            other => return Err(MockError::UnsupportedResource(other.to_string())),
        };
        Ok(resource)
    }

    /// The resource as a JSON body.
    pub fn to_value(&self) -> Result<Value> {
        let value = match self {
            Resource::Assistant(r) => serde_json::to_value(r)?,
            Resource::Thread(r) => serde_json::to_value(r)?,
            Resource::Message(r) => serde_json::to_value(r)?,
            Resource::Run(r) => serde_json::to_value(r)?,
            Resource::RunStep(r) => serde_json::to_value(r)?,
            Resource::File(r) => serde_json::to_value(r)?,
            Resource::VectorStore(r) => serde_json::to_value(r)?,
            Resource::VectorStoreFile(r) => serde_json::to_value(r)?,
            Resource::VectorStoreFileBatch(r) => serde_json::to_value(r)?,
            Resource::Model(r) => serde_json::to_value(r)?,
        };
        Ok(value)
    }
}

macro_rules! resource_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Resource {
                fn from(r: $ty) -> Self {
                    Resource::$variant(r)
                }
            }
        )*
    };
}

resource_from!(
    Assistant => Assistant,
    Thread => Thread,
    Message => Message,
    Run => Run,
    RunStep => RunStep,
    File => FileObject,
    VectorStore => VectorStore,
    VectorStoreFile => VectorStoreFile,
    VectorStoreFileBatch => VectorStoreFileBatch,
    Model => Model,
);

// ============================================================================
// Swappable store handle
// ============================================================================

/// The store a group of routes currently reads and writes.
///
/// Routes hold a clone of the cell, so replacing its content switches every
/// route over at once.
#[derive(Debug, Clone)]
pub struct StateCell {
    inner: Arc<RwLock<SharedStateStore>>,
}

impl StateCell {
    pub fn new(store: SharedStateStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// The store in use right now.
    pub fn current(&self) -> SharedStateStore {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap in another store.
    pub fn replace(&self, store: SharedStateStore) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = store;
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(StateStore::shared())
    }
}
