// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Resume documents, owned by one user and soft-deleted.

use crate::db::{collections, Document};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Stored resume.
///
/// Deletion only sets `deleted`/`deleted_at`; deleted resumes are invisible to
/// every read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resume {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub content: Map<String, Value>,
    #[serde(default)]
    pub theme_config: Map<String, Value>,
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    /// Public URL slug, unique across all resumes when set
    pub slug: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Equality-filterable tombstone flag
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<String>,
}

impl Resume {
    pub fn new(id: String, user_id: String, input: ResumeCreate, now: String) -> Self {
        let mut theme_config = Map::new();
        if let Some(template_id) = input.template_id {
            theme_config.insert("template_id".to_string(), Value::String(template_id));
        }

        Self {
            id,
            user_id,
            title: input.title,
            content: Map::new(),
            theme_config,
            thumbnail_url: None,
            is_public: false,
            slug: None,
            created_at: now.clone(),
            updated_at: now,
            deleted: false,
            deleted_at: None,
        }
    }

    /// Private copy with the same content and theme; no slug, no thumbnail.
    pub fn duplicate(&self, id: String, now: String) -> Self {
        Self {
            id,
            user_id: self.user_id.clone(),
            title: format!("{} (copy)", self.title),
            content: self.content.clone(),
            theme_config: self.theme_config.clone(),
            thumbnail_url: None,
            is_public: false,
            slug: None,
            created_at: now.clone(),
            updated_at: now,
            deleted: false,
            deleted_at: None,
        }
    }

    pub fn apply(&mut self, update: ResumeUpdate, now: String) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(content) = update.content {
            self.content = content;
        }
        if let Some(theme_config) = update.theme_config {
            self.theme_config = theme_config;
        }
        if let Some(is_public) = update.is_public {
            self.is_public = is_public;
        }
        if let Some(slug) = update.slug {
            self.slug = Some(slug);
        }
        self.updated_at = now;
    }

    pub fn mark_deleted(&mut self, now: String) {
        self.deleted = true;
        self.deleted_at = Some(now);
    }
}

impl Document for Resume {
    const COLLECTION: &'static str = collections::RESUMES;

    fn id(&self) -> &str {
        &self.id
    }
}

/// API view of a resume.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ResumeView {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "Record<string, unknown>"))]
    pub content: Map<String, Value>,
    #[cfg_attr(feature = "binding-generation", ts(type = "Record<string, unknown>"))]
    pub theme_config: Map<String, Value>,
    pub thumbnail_url: Option<String>,
    pub is_public: bool,
    pub slug: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Resume> for ResumeView {
    fn from(resume: Resume) -> Self {
        Self {
            id: resume.id,
            user_id: resume.user_id,
            title: resume.title,
            content: resume.content,
            theme_config: resume.theme_config,
            thumbnail_url: resume.thumbnail_url,
            is_public: resume.is_public,
            slug: resume.slug,
            created_at: resume.created_at,
            updated_at: resume.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResumeCreate {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub template_id: Option<String>,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ResumeUpdate {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub content: Option<Map<String, Value>>,
    pub theme_config: Option<Map<String, Value>>,
    pub is_public: Option<bool>,
    #[validate(length(min = 1, max = 255))]
    pub slug: Option<String>,
}
