use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::compose::dctypes::SingleValue;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SysCtls {
    List(Vec<String>),
    Map(IndexMap<String, SingleValue>),
}

impl Default for SysCtls {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl SysCtls {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::List(v) => v.is_empty(),
            Self::Map(m) => m.is_empty(),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        match self {
            Self::List(items) => items.iter().any(|item| match item.split_once('=') {
                Some((k, _)) => k == key,
                None => item.as_str() == key,
            }),
            Self::Map(map) => map.contains_key(key),
        }
    }

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
}
