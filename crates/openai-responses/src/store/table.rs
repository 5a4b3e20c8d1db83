//! Ordered in-memory tables with cursor pagination.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::Page;

/// Default page size of list endpoints.
pub const DEFAULT_LIMIT: usize = 20;
/// Largest page size the API accepts.
pub const MAX_LIMIT: usize = 100;

/// A record that can live in a [`Table`].
pub trait Keyed: Clone {
    /// The public id of the record.
    fn id(&self) -> &str;

    /// The key the record is stored under. Defaults to the id; records whose
    /// ids are only unique within a parent override this.
    fn store_key(&self) -> String {
        self.id().to_string()
    }
}

// ============================================================================
// List parameters
// ============================================================================

/// Sort order of a list call, by creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

/// Cursor pagination parameters of a list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub limit: usize,
    pub order: Order,
    pub after: Option<String>,
    pub before: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            order: Order::Desc,
            after: None,
            before: None,
        }
    }
}

impl ListParams {
    /// Read `limit`, `order`, `after` and `before` from query parameters.
    ///
    /// Anything missing or unparsable falls back to its default: descending
    /// order unless `order=asc`, a limit of 20 clamped to `1..=100`.
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        let limit = query
            .get("limit")
            .and_then(|l| l.parse::<usize>().ok())
            .map(|l| l.clamp(1, MAX_LIMIT))
            .unwrap_or(DEFAULT_LIMIT);
        let order = match query.get("order").map(String::as_str) {
            Some("asc") => Order::Asc,
            _ => Order::Desc,
        };
        Self {
            limit,
            order,
            after: query.get("after").cloned(),
            before: query.get("before").cloned(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn with_after(mut self, after: impl Into<String>) -> Self {
        self.after = Some(after.into());
        self
    }

    pub fn with_before(mut self, before: impl Into<String>) -> Self {
        self.before = Some(before.into());
        self
    }
}

/// Order and slice an already scoped list of records into a page.
///
/// The window runs from just after the `after` record to just before the
/// `before` record; an anchor that is not in `items` leaves its side of the
/// window open. `has_more` reports whether the window held more than `limit`.
pub fn paginate<T: Keyed>(mut items: Vec<T>, params: &ListParams) -> Page<T> {
    if params.order == Order::Desc {
        items.reverse();
    }

    let position = |anchor: &Option<String>| {
        anchor
            .as_deref()
            .and_then(|id| items.iter().position(|item| item.id() == id))
    };
    let start = position(&params.after).map(|ix| ix + 1).unwrap_or(0);
    let end = position(&params.before).unwrap_or(items.len());

    let window: Vec<T> = if start < end {
        items.drain(start..end).collect()
    } else {
        Vec::new()
    };
    let has_more = window.len() > params.limit;
    let data: Vec<T> = window.into_iter().take(params.limit).collect();

    Page {
        object: "list".to_string(),
        first_id: data.first().map(|item| item.id().to_string()),
        last_id: data.last().map(|item| item.id().to_string()),
        data,
        has_more,
    }
}

// ============================================================================
// Table
// ============================================================================

/// An insertion-ordered map of records.
///
/// Overwriting an existing key keeps its original position. Reads hand out
/// clones, so the only way to change a stored record is another `put`.
#[derive(Debug)]
pub struct Table<T> {
    inner: RwLock<TableInner<T>>,
}

#[derive(Debug)]
struct TableInner<T> {
    order: Vec<String>,
    rows: HashMap<String, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(TableInner {
                order: Vec::new(),
                rows: HashMap::new(),
            }),
        }
    }
}

impl<T: Keyed> Table<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, TableInner<T>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TableInner<T>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a record.
    pub fn put(&self, item: T) {
        let key = item.store_key();
        let mut inner = self.write();
        if inner.rows.insert(key.clone(), item).is_none() {
            inner.order.push(key);
        }
    }

    /// Look up a record by key.
    pub fn get(&self, key: &str) -> Option<T> {
        self.read().rows.get(key).cloned()
    }

    /// Whether a record exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.read().rows.contains_key(key)
    }

    /// Remove a record, returning whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.write();
        if inner.rows.remove(key).is_some() {
            inner.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every record matching `filter`, in insertion order.
    pub fn filtered(&self, filter: impl Fn(&T) -> bool) -> Vec<T> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|key| inner.rows.get(key))
            .filter(|item| filter(item))
            .cloned()
            .collect()
    }

    /// Every record in insertion order.
    pub fn all(&self) -> Vec<T> {
        self.filtered(|_| true)
    }

    /// A page of the records matching `filter`.
    pub fn page(&self, filter: impl Fn(&T) -> bool, params: &ListParams) -> Page<T> {
        paginate(self.filtered(filter), params)
    }

    /// The records of a page, without the envelope.
    pub fn list(&self, filter: impl Fn(&T) -> bool, params: &ListParams) -> Vec<T> {
        self.page(filter, params).data
    }
}
