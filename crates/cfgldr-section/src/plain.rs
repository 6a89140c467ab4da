//! Plain nested mappings handed to callers once a document is resolved.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Key-ordered mapping of a resolved section.
pub type PlainMap = IndexMap<String, PlainValue>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlainValue {
    Text(String),
    Map(PlainMap),
}

impl PlainValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PlainValue::Text(s) => Some(s),
            PlainValue::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&PlainMap> {
        match self {
            PlainValue::Map(m) => Some(m),
            PlainValue::Text(_) => None,
        }
    }
}
