//! Item: the public sample resource.

use crate::db::{collections, Document};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    /// Always a string on the wire; a missing description is `""`
    #[serde(default)]
    pub description: String,
    pub price: f64,
}

impl Item {
    pub fn from_input(id: String, input: ItemInput) -> Self {
        Self {
            id,
            name: input.name,
            description: input.description.unwrap_or_default(),
            price: input.price,
        }
    }
}

impl Document for Item {
    const COLLECTION: &'static str = collections::ITEMS;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Body for both create and full replace.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ItemInput {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "price must not be negative"))]
    pub price: f64,
}
