use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct SecretDecl {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
}

impl SecretDecl {
    /// The declaration the pipeline emits for a detected secret: compose
    /// reads the value from the named variable in its own environment.
    pub fn from_env(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            environment: Some(name.to_string()),
            file: None,
            external: false,
        }
    }
}
