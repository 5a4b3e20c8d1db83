//! Vector stores with their attached files and file batches.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::table::{ListParams, Table, paginate};
use crate::types::{Page, VectorStore, VectorStoreFile, VectorStoreFileBatch};

#[derive(Debug, Default)]
pub struct VectorStoreStore {
    table: Table<VectorStore>,
    pub files: VectorStoreFileStore,
    pub file_batches: VectorStoreFileBatchStore,
}

impl VectorStoreStore {
    pub fn put(&self, vector_store: VectorStore) {
        self.table.put(vector_store);
    }

    pub fn get(&self, id: &str) -> Option<VectorStore> {
        self.table.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.table.contains(id)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.table.delete(id)
    }

    pub fn list(&self, params: &ListParams) -> Page<VectorStore> {
        self.table.page(|_| true, params)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Files of a batch: the batch's file ids joined against the files
    /// attached to the vector store.
    pub fn list_files_for_batch(
        &self,
        vector_store_id: &str,
        batch_id: &str,
        params: &ListParams,
        status: Option<&str>,
    ) -> Page<VectorStoreFile> {
        let batch_files = self.file_batches.file_ids(batch_id);
        let files = self
            .files
            .scoped(vector_store_id, status)
            .into_iter()
            .filter(|f| batch_files.contains(&f.id))
            .collect();
        paginate(files, params)
    }
}

// ============================================================================
// Vector store files
// ============================================================================

/// Files attached to vector stores, keyed by (vector store, file).
#[derive(Debug, Default)]
pub struct VectorStoreFileStore {
    table: Table<VectorStoreFile>,
}

pub(crate) fn vector_store_file_key(vector_store_id: &str, file_id: &str) -> String {
    format!("{}/{}", vector_store_id, file_id)
}

impl VectorStoreFileStore {
    pub fn put(&self, file: VectorStoreFile) {
        self.table.put(file);
    }

    pub fn get(&self, vector_store_id: &str, file_id: &str) -> Option<VectorStoreFile> {
        self.table
            .get(&vector_store_file_key(vector_store_id, file_id))
    }

    pub fn delete(&self, vector_store_id: &str, file_id: &str) -> bool {
        self.table
            .delete(&vector_store_file_key(vector_store_id, file_id))
    }

    /// Every file of one vector store, in insertion order.
    pub fn scoped(&self, vector_store_id: &str, status: Option<&str>) -> Vec<VectorStoreFile> {
        self.table.filtered(|f| {
            f.vector_store_id == vector_store_id && status.is_none_or(|s| f.status == s)
        })
    }

    /// Files of one vector store, optionally restricted to one status.
    pub fn list(
        &self,
        vector_store_id: &str,
        params: &ListParams,
        status: Option<&str>,
    ) -> Page<VectorStoreFile> {
        paginate(self.scoped(vector_store_id, status), params)
    }

    pub fn count(&self, vector_store_id: &str) -> usize {
        self.scoped(vector_store_id, None).len()
    }
}

// ============================================================================
// File batches
// ============================================================================

#[derive(Debug, Default)]
pub struct VectorStoreFileBatchStore {
    table: Table<VectorStoreFileBatch>,
    batch_files: RwLock<HashMap<String, Vec<String>>>,
}

impl VectorStoreFileBatchStore {
    pub fn put(&self, batch: VectorStoreFileBatch) {
        self.table.put(batch);
    }

    pub fn get(&self, id: &str) -> Option<VectorStoreFileBatch> {
        self.table.get(id)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.batch_files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        self.table.delete(id)
    }

    /// Record that a file belongs to a batch.
    pub fn add_file(&self, batch_id: &str, file_id: &str) {
        let mut index = self
            .batch_files
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let files = index.entry(batch_id.to_string()).or_default();
        if !files.iter().any(|f| f == file_id) {
            files.push(file_id.to_string());
        }
    }

    /// Ids of the files recorded for a batch.
    pub fn file_ids(&self, batch_id: &str) -> Vec<String> {
        self.batch_files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(batch_id)
            .cloned()
            .unwrap_or_default()
    }
}
