use serde::{Deserialize, Serialize};

use crate::compose::dctypes::SingleValue;

/// Top-level config declaration: exactly one of `content` and `file` is
/// populated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ConfigDecl {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// A service's reference to a top-level config, short or long form.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ConfigRef {
    Short(String),
    Long {
        source: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mode: Option<SingleValue>,
    },
}

impl ConfigRef {
    pub fn source(&self) -> &str {
        match self {
            Self::Short(s) => s,
            Self::Long { source, .. } => source,
        }
    }
}
