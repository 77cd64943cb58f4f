use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::compose::dctypes;

/// A single compose service. Fields the pipeline interprets are typed;
/// everything else the author wrote (`depends_on`, `healthcheck`, …) is
/// carried through the flattened catch-all untouched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Service {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<dctypes::Command>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<dctypes::SingleValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "dctypes::Environment::is_empty")]
    pub environment: dctypes::Environment,
    #[serde(default, skip_serializing_if = "dctypes::ServiceNetworks::is_empty")]
    pub networks: dctypes::ServiceNetworks,
    #[serde(default, skip_serializing_if = "dctypes::Labels::is_empty")]
    pub labels: dctypes::Labels,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configs: Vec<dctypes::ConfigRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cap_add: Vec<String>,
    #[serde(default, skip_serializing_if = "dctypes::SysCtls::is_empty")]
    pub sysctls: dctypes::SysCtls,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_limit: Option<dctypes::SingleValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memswap_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<dctypes::SingleValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<dctypes::Logging>,
    #[serde(flatten, skip_serializing_if = "IndexMap::is_empty")]
    pub extensions: IndexMap<String, Value>,
}

impl Service {
    pub fn image(&self) -> &str {
        self.image.as_deref().unwrap_or_default()
    }

    /// Container-side port of every declared mapping. Handles
    /// `HOST:CONTAINER[/PROTO]`, `BIND:HOST:CONTAINER` and bare ports.
    pub fn container_ports(&self) -> Vec<u16> {
        self.ports
            .iter()
            .filter_map(|p| {
                let raw = p.to_string();
                let raw = raw.split('/').next().unwrap_or_default();
                raw.rsplit(':').next().and_then(|s| s.parse::<u16>().ok())
            })
            .collect()
    }
}
