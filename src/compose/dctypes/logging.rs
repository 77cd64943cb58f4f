use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::compose::dctypes::SingleValue;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Logging {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, SingleValue>,
}
