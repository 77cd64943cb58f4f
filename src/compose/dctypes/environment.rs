use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::compose::dctypes::SingleValue;

/// Service environment in either authored shape: a sequence of `K=V`
/// strings or a mapping. Reads normalise through [`Environment::entries`];
/// writes canonicalise the whole field to the sequence form so it
/// serialises stably.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Environment {
    List(Vec<String>),
    KvPair(IndexMap<String, Option<SingleValue>>),
}

impl Default for Environment {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl Environment {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::List(v) => v.is_empty(),
            Self::KvPair(m) => m.is_empty(),
        }
    }

    /// Canonical `(key, value)` view. A list entry without `=` yields an
    /// empty value.
    pub fn entries(&self) -> Vec<(String, String)> {
        match self {
            Self::List(items) => items
                .iter()
                .map(|item| match item.split_once('=') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (item.clone(), String::new()),
                })
                .collect(),
            Self::KvPair(map) => map
                .iter()
                .map(|(k, v)| {
                    (
                        k.clone(),
                        v.as_ref().map(|v| v.to_string()).unwrap_or_default(),
                    )
                })
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries().iter().any(|(k, _)| k == key)
    }

    /// Insert or replace an entry. A mapping-shaped environment is
    /// rewritten as a `K=V` sequence first, the canonical write-back
    /// form.
    pub fn set(&mut self, key: &str, value: &str) {
        if let Self::KvPair(map) = self {
            let items = map
                .iter()
                .map(|(k, v)| match v {
                    Some(v) => format!("{k}={v}"),
                    None => k.clone(),
                })
                .collect();
            *self = Self::List(items);
        }
        if let Self::List(items) = self {
            for item in items.iter_mut() {
                let matches = match item.split_once('=') {
                    Some((k, _)) => k == key,
                    None => item.as_str() == key,
                };
                if matches {
                    *item = format!("{key}={value}");
                    return;
                }
            }
            items.push(format!("{key}={value}"));
        }
    }
}
