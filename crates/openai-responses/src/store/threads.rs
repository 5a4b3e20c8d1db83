//! Threads and the messages, runs and run steps they own.

use super::table::{ListParams, Table};
use crate::types::{Message, Page, Run, RunStep, Thread};

#[derive(Debug, Default)]
pub struct ThreadStore {
    table: Table<Thread>,
    pub messages: MessageStore,
    pub runs: RunStore,
}

impl ThreadStore {
    pub fn put(&self, thread: Thread) {
        self.table.put(thread);
    }

    pub fn get(&self, id: &str) -> Option<Thread> {
        self.table.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.table.contains(id)
    }

    /// Remove the thread record only. Its messages and runs stay behind.
    pub fn delete(&self, id: &str) -> bool {
        self.table.delete(id)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Default)]
pub struct MessageStore {
    table: Table<Message>,
}

impl MessageStore {
    pub fn put(&self, message: Message) {
        self.table.put(message);
    }

    pub fn get(&self, id: &str) -> Option<Message> {
        self.table.get(id)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.table.delete(id)
    }

    /// Messages of a thread, optionally only those produced by one run.
    pub fn list(
        &self,
        thread_id: &str,
        params: &ListParams,
        run_id: Option<&str>,
    ) -> Page<Message> {
        self.table.page(
            |m| m.thread_id == thread_id && run_id.is_none_or(|r| m.run_id.as_deref() == Some(r)),
            params,
        )
    }

    /// Number of messages in a thread.
    pub fn count(&self, thread_id: &str) -> usize {
        self.table.filtered(|m| m.thread_id == thread_id).len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

// ============================================================================
// Runs
// ============================================================================

#[derive(Debug, Default)]
pub struct RunStore {
    table: Table<Run>,
    pub steps: RunStepStore,
}

impl RunStore {
    pub fn put(&self, run: Run) {
        self.table.put(run);
    }

    pub fn get(&self, id: &str) -> Option<Run> {
        self.table.get(id)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.table.delete(id)
    }

    pub fn list(&self, thread_id: &str, params: &ListParams) -> Page<Run> {
        self.table.page(|r| r.thread_id == thread_id, params)
    }

    pub fn count(&self, thread_id: &str) -> usize {
        self.table.filtered(|r| r.thread_id == thread_id).len()
    }
}

#[derive(Debug, Default)]
pub struct RunStepStore {
    table: Table<RunStep>,
}

impl RunStepStore {
    pub fn put(&self, step: RunStep) {
        self.table.put(step);
    }

    pub fn get(&self, id: &str) -> Option<RunStep> {
        self.table.get(id)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.table.delete(id)
    }

    pub fn list(&self, thread_id: &str, run_id: &str, params: &ListParams) -> Page<RunStep> {
        self.table
            .page(|s| s.thread_id == thread_id && s.run_id == run_id, params)
    }
}
