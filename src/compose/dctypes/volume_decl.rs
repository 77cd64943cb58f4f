use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::compose::dctypes::{MapOrEmpty, SingleValue};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct VolumeDecl {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub driver_opts: IndexMap<String, SingleValue>,
}

#[derive(Clone, Default, Debug, Serialize, Deserialize, PartialEq)]
pub struct TopLevelVolumes(pub IndexMap<String, MapOrEmpty<VolumeDecl>>);

impl TopLevelVolumes {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
