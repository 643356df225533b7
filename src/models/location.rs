use serde::{Deserialize, Serialize};
use validator::Validate;

use super::item::Item;

/// A named storage place that groups items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    /// Only filled in assembled views.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
}

impl Location {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            items: Vec::new(),
        }
    }
}

/// Body accepted when creating or renaming a location.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LocationWrite {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
}
