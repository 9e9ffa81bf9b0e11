//! Fetch-flat, join-in-memory helpers
//!
//! Every loader resolves related rows the same way: collect the distinct keys
//! of the parent rows, issue one `IN (...)` query for all of them, then group
//! the result by key. [`attach`] is that pattern; [`Grouped`] is its result.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;

/// Distinct keys in first-seen order
pub fn distinct<T, K, F>(items: &[T], key: F) -> Vec<K>
where
    K: Eq + Hash + Copy,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::with_capacity(items.len());
    items
        .iter()
        .map(key)
        .filter(|k| seen.insert(*k))
        .collect()
}

/// Rows grouped by key, each group keeping fetch order
#[derive(Debug)]
pub struct Grouped<K, R> {
    groups: HashMap<K, Vec<R>>,
}

impl<K: Eq + Hash, R> Grouped<K, R> {
    pub fn from_rows<F>(rows: Vec<R>, key: F) -> Self
    where
        F: Fn(&R) -> K,
    {
        let mut groups: HashMap<K, Vec<R>> = HashMap::new();
        for row in rows {
            groups.entry(key(&row)).or_default().push(row);
        }
        Self { groups }
    }

    pub fn empty() -> Self {
        Self {
            groups: HashMap::new(),
        }
    }

    /// Rows for `key`, empty when none were fetched
    pub fn get(&self, key: &K) -> &[R] {
        self.groups.get(key).map_or(&[], Vec::as_slice)
    }

    /// First row for `key`; with newest-first fetches this is the newest
    pub fn first(&self, key: &K) -> Option<&R> {
        self.groups.get(key).and_then(|rows| rows.first())
    }

    pub fn take(&mut self, key: &K) -> Vec<R> {
        self.groups.remove(key).unwrap_or_default()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.groups.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Batch-fetch related rows for `keys` and group them by `group_key`
///
/// `fetch` runs once with the de-duplicated keys, and not at all when there
/// are none.
pub async fn attach<K, R, E, F, Fut, G>(keys: Vec<K>, fetch: F, group_key: G) -> Result<Grouped<K, R>, E>
where
    K: Eq + Hash + Copy,
    F: FnOnce(Vec<K>) -> Fut,
    Fut: Future<Output = Result<Vec<R>, E>>,
    G: Fn(&R) -> K,
{
    let keys = distinct(&keys, |k| *k);
    if keys.is_empty() {
        return Ok(Grouped::empty());
    }
    let rows = fetch(keys).await?;
    Ok(Grouped::from_rows(rows, group_key))
}
