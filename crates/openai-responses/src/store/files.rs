//! File metadata and file content.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;

use super::table::{ListParams, Table};
use crate::types::{FileObject, Page};

/// Raw file bytes by file id, kept apart from the metadata.
#[derive(Debug, Default)]
pub struct ContentStore {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl ContentStore {
    pub fn put(&self, file_id: impl Into<String>, content: Bytes) {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file_id.into(), content);
    }

    pub fn get(&self, file_id: &str) -> Option<Bytes> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(file_id)
            .cloned()
    }

    pub fn delete(&self, file_id: &str) -> bool {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(file_id)
            .is_some()
    }
}

/// Uploaded files.
#[derive(Debug, Default)]
pub struct FileStore {
    table: Table<FileObject>,
    pub content: ContentStore,
}

impl FileStore {
    pub fn put(&self, file: FileObject) {
        self.table.put(file);
    }

    pub fn get(&self, id: &str) -> Option<FileObject> {
        self.table.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.table.contains(id)
    }

    /// Remove a file and its content.
    pub fn delete(&self, id: &str) -> bool {
        self.content.delete(id);
        self.table.delete(id)
    }

    /// Files, optionally restricted to one purpose.
    pub fn list(&self, purpose: Option<&str>, params: &ListParams) -> Page<FileObject> {
        self.table
            .page(|f| purpose.is_none_or(|p| f.purpose == p), params)
    }
}
