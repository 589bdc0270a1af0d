//! Ordered, identity-unique resource collections

use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Ordered list of resource snapshots, never holding the same allocation twice
#[derive(Debug)]
pub struct ResourceList<T> {
    items: Vec<Arc<T>>,
}

impl<T> ResourceList<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Append a resource unless this exact allocation is already present
    pub fn push(&mut self, item: Arc<T>) -> bool {
        if self.contains(&item) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Identity membership, not id equality
    pub fn contains(&self, item: &Arc<T>) -> bool {
        self.items.iter().any(|existing| Arc::ptr_eq(existing, item))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<T>> {
        self.items.iter()
    }

    pub fn first(&self) -> Option<&Arc<T>> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&Arc<T>> {
        self.items.last()
    }

    /// Sub-list of the entries accepted by `predicate`, order preserved
    pub fn filter<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&T) -> bool,
    {
        self.items
            .iter()
            .filter(|item| predicate(&***item))
            .cloned()
            .collect()
    }
}

impl<T> Default for ResourceList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ResourceList<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T> FromIterator<Arc<T>> for ResourceList<T> {
    fn from_iter<I: IntoIterator<Item = Arc<T>>>(iter: I) -> Self {
        let mut list = Self::new();
        for item in iter {
            list.push(item);
        }
        list
    }
}

impl<T> From<Vec<T>> for ResourceList<T> {
    fn from(values: Vec<T>) -> Self {
        Self {
            items: values.into_iter().map(Arc::new).collect(),
        }
    }
}

impl<'a, T> IntoIterator for &'a ResourceList<T> {
    type Item = &'a Arc<T>;
    type IntoIter = std::slice::Iter<'a, Arc<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Serialize> Serialize for ResourceList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter().map(|item| item.as_ref()))
    }
}
