use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::compose::dctypes;

#[derive(Clone, Default, Debug, Serialize, Deserialize, PartialEq)]
pub struct Services(pub IndexMap<String, dctypes::Service>);

impl Services {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
