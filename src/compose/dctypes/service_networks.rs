use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Service network membership in every shape compose tolerates: a single
/// name, a sequence of names (or single-entry mappings), or a mapping of
/// name to per-network configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ServiceNetworks {
    Named(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Default for ServiceNetworks {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl ServiceNetworks {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Named(_) => false,
            Self::List(v) => v.is_empty(),
            Self::Map(m) => m.is_empty(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        match self {
            Self::Named(name) => vec![name.clone()],
            Self::List(items) => items
                .iter()
                .flat_map(|item| match item {
                    Value::String(s) => vec![s.clone()],
                    Value::Mapping(m) => m
                        .keys()
                        .filter_map(|k| k.as_str().map(str::to_string))
                        .collect(),
                    _ => Vec::new(),
                })
                .collect(),
            Self::Map(map) => map.keys().cloned().collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().iter().any(|n| n == name)
    }

    /// Add a membership, preserving the authored shape. A bare string
    /// becomes a two-element sequence.
    pub fn ensure(&mut self, name: &str) {
        if self.contains(name) {
            return;
        }
        match self {
            Self::Named(existing) => {
                *self = Self::List(vec![
                    Value::String(existing.clone()),
                    Value::String(name.to_string()),
                ]);
            }
            Self::List(items) => items.push(Value::String(name.to_string())),
            Self::Map(map) => {
                map.insert(name.to_string(), Value::Null);
            }
        }
    }

    /// Shape-preserving string replacement over every network name. For
    /// the mapping shape the names are the keys, so the map is rebuilt
    /// with each key run through the replacement.
    pub fn map_strings(&mut self, f: &mut dyn FnMut(&str) -> String) {
        match self {
            Self::Named(name) => *name = f(name),
            Self::List(items) => {
                for item in items.iter_mut() {
                    if let Value::String(s) = item {
                        *s = f(s);
                    }
                }
            }
            Self::Map(map) => {
                let entries = std::mem::take(map);
                for (name, value) in entries {
                    map.insert(f(&name), value);
                }
            }
        }
    }
}
