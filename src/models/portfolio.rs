//! Portfolio documents, one public site per subdomain.

use crate::db::{collections, Document};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// Unique across all portfolios
    pub subdomain: String,
    pub custom_domain: Option<String>,
    #[serde(default)]
    pub content: Map<String, Value>,
    #[serde(default)]
    pub theme_config: Map<String, Value>,
    #[serde(default)]
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Portfolio {
    pub fn new(id: String, user_id: String, input: PortfolioCreate, now: String) -> Self {
        let mut content = Map::new();
        content.insert("projects".to_string(), json!([]));
        content.insert("about".to_string(), json!(""));
        content.insert("contact".to_string(), json!({}));

        Self {
            id,
            user_id,
            title: input.title,
            subdomain: input.subdomain,
            custom_domain: None,
            content,
            theme_config: Map::new(),
            is_published: false,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: PortfolioUpdate, now: String) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(subdomain) = update.subdomain {
            self.subdomain = subdomain;
        }
        if let Some(content) = update.content {
            self.content = content;
        }
        if let Some(theme_config) = update.theme_config {
            self.theme_config = theme_config;
        }
        if let Some(is_published) = update.is_published {
            self.is_published = is_published;
        }
        self.updated_at = now;
    }
}

impl Document for Portfolio {
    const COLLECTION: &'static str = collections::PORTFOLIOS;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PortfolioCreate {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 63))]
    pub subdomain: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PortfolioUpdate {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 63))]
    pub subdomain: Option<String>,
    pub content: Option<Map<String, Value>>,
    pub theme_config: Option<Map<String, Value>>,
    pub is_published: Option<bool>,
}
