//! Assistants.

use super::table::{ListParams, Table};
use crate::types::{Assistant, Page};

#[derive(Debug, Default)]
pub struct AssistantStore {
    table: Table<Assistant>,
}

impl AssistantStore {
    pub fn put(&self, assistant: Assistant) {
        self.table.put(assistant);
    }

    pub fn get(&self, id: &str) -> Option<Assistant> {
        self.table.get(id)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.table.delete(id)
    }

    pub fn list(&self, params: &ListParams) -> Page<Assistant> {
        self.table.page(|_| true, params)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
