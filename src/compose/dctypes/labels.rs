use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::compose::dctypes::SingleValue;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Labels {
    List(Vec<String>),
    Map(IndexMap<String, SingleValue>),
}

impl Default for Labels {
    fn default() -> Self {
        Self::Map(IndexMap::new())
    }
}

impl Labels {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::List(v) => v.is_empty(),
            Self::Map(m) => m.is_empty(),
        }
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        match self {
            Self::List(items) => items
                .iter()
                .map(|item| match item.split_once('=') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (item.clone(), String::new()),
                })
                .collect(),
            Self::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.to_string())).collect(),
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

    /// Insert a label unless the key is already present; authored labels
    /// always win over synthesised ones.
    pub fn insert_if_absent(&mut self, key: &str, value: &str) {
        if self.contains_key(key) {
            return;
        }
        match self {
            Self::List(items) => items.push(format!("{key}={value}")),
            Self::Map(map) => {
                map.insert(key.to_string(), SingleValue::from(value));
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        match self {
            Self::List(items) => {
                let pos = items.iter().position(|item| match item.split_once('=') {
                    Some((k, _)) => k == key,
                    None => item.as_str() == key,
                })?;
                let item = items.remove(pos);
                Some(
                    item.split_once('=')
                        .map(|(_, v)| v.to_string())
                        .unwrap_or_default(),
                )
            }
            Self::Map(map) => map.shift_remove(key).map(|v| v.to_string()),
        }
    }
}
