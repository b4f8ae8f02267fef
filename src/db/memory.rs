// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for local development and tests.
//!
//! Uniqueness indexes are `DashMap`s whose entry lock is held while the user
//! record is written, so concurrent registrations for one email serialize on
//! that entry and exactly one wins.

use super::{DocumentQuery, DocumentStore, SortDirection, UserDirectory, UserLookup};
use crate::error::AppError;
use crate::models::{User, UserPatch};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Memory-backed implementation of [`UserDirectory`] and [`DocumentStore`].
#[derive(Default)]
pub struct MemoryDb {
    users: DashMap<String, User>,
    /// email -> user id
    emails: DashMap<String, String>,
    /// GitHub id -> user id
    github_ids: DashMap<String, String>,
    /// collection -> (document id -> document)
    collections: DashMap<String, BTreeMap<String, Value>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of user records (test helper).
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl UserDirectory for MemoryDb {
    async fn find_user(&self, lookup: UserLookup<'_>) -> Result<Option<User>, AppError> {
        let id = match lookup {
            UserLookup::Id(id) => id.to_string(),
            UserLookup::Email(email) => match self.emails.get(email) {
                Some(owner) => owner.value().clone(),
                None => return Ok(None),
            },
            UserLookup::GithubId(github_id) => match self.github_ids.get(github_id) {
                Some(owner) => owner.value().clone(),
                None => return Ok(None),
            },
        };

        Ok(self.users.get(&id).map(|user| user.value().clone()))
    }

    async fn insert_user(&self, user: &User) -> Result<String, AppError> {
        // Lock order: emails -> github_ids -> users.
        let email_slot = match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => {
                return Err(AppError::Conflict("Email already registered".to_string()))
            }
            Entry::Vacant(slot) => slot,
        };

        if let Some(github_id) = &user.github_id {
            match self.github_ids.entry(github_id.clone()) {
                Entry::Occupied(_) => {
                    return Err(AppError::Conflict(
                        "GitHub account already linked".to_string(),
                    ))
                }
                Entry::Vacant(slot) => {
                    slot.insert(user.id.clone());
                }
            }
        }

        self.users.insert(user.id.clone(), user.clone());
        email_slot.insert(user.id.clone());

        Ok(user.id.clone())
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<(), AppError> {
        if !self.users.contains_key(id) {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }

        if let Some(github_id) = &patch.github_id {
            match self.github_ids.entry(github_id.clone()) {
                Entry::Occupied(owner) if owner.get() != id => {
                    return Err(AppError::Conflict(
                        "GitHub account already linked".to_string(),
                    ))
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(id.to_string());
                }
            }
        }

        let previous_github_id = {
            let mut user = self
                .users
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
            let previous = user.github_id.clone();
            user.apply(patch);
            previous
        };

        // Release the old provider id if the account was relinked.
        if let (Some(old), Some(new)) = (previous_github_id, &patch.github_id) {
            if &old != new {
                self.github_ids.remove_if(&old, |_, owner| owner == id);
            }
        }

        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDb {
    async fn insert_document(
        &self,
        collection: &str,
        id: &str,
        doc: Value,
    ) -> Result<(), AppError> {
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Err(AppError::Conflict(format!(
                "Document {} already exists in {}",
                id, collection
            )));
        }
        docs.insert(id.to_string(), doc);
        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, AppError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id).cloned()))
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Result<Vec<Value>, AppError> {
        let Some(docs) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<Value> = docs
            .values()
            .filter(|doc| {
                query
                    .filters
                    .iter()
                    .all(|(field, expected)| doc.get(field).unwrap_or(&Value::Null) == expected)
            })
            .cloned()
            .collect();
        drop(docs);

        if let Some((field, direction)) = &query.order_by {
            matched.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                match direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .skip(query.offset as usize)
            .take(limit)
            .collect())
    }

    async fn replace_document(
        &self,
        collection: &str,
        id: &str,
        doc: Value,
    ) -> Result<bool, AppError> {
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        match docs.get_mut(id) {
            Some(slot) => {
                *slot = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, AppError> {
        Ok(self
            .collections
            .get_mut(collection)
            .map(|mut docs| docs.remove(id).is_some())
            .unwrap_or(false))
    }
}

/// Order scalars of the same JSON type; anything else compares equal.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}
