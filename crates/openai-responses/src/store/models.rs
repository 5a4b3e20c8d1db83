//! Available models.

use super::table::Table;
use crate::types::{Model, Page};

/// Models, seeded from the table handed to the constructor.
#[derive(Debug, Default)]
pub struct ModelStore {
    table: Table<Model>,
}

impl ModelStore {
    pub fn new(models: impl IntoIterator<Item = Model>) -> Self {
        let store = Self::default();
        for model in models {
            store.put(model);
        }
        store
    }

    pub fn put(&self, model: Model) {
        self.table.put(model);
    }

    pub fn get(&self, id: &str) -> Option<Model> {
        self.table.get(id)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.table.delete(id)
    }

    /// Every model in the order it was added.
    pub fn list(&self) -> Page<Model> {
        Page::unpaginated(self.table.all())
    }
}
