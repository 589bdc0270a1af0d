//! String maps for labels and environment variables

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label or environment mapping where lookups on a missing key yield `""`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, String>);

/// Environment variables share the label semantics
pub type Env = Labels;

impl Labels {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `KEY=VALUE` entries; entries without `=` map to an empty value
    pub fn from_env_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        entries
            .into_iter()
            .map(|entry| match entry.as_ref().split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (entry.as_ref().to_string(), String::new()),
            })
            .collect()
    }

    /// Value for `key`, or `""` when missing
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    /// Value for `key` only if it is present
    pub fn get_opt(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Labels {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<std::collections::HashMap<String, String>> for Labels {
    fn from(map: std::collections::HashMap<String, String>) -> Self {
        Self(map.into_iter().collect())
    }
}
