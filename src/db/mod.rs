//! Database layer.
//!
//! Two seams sit here: [`UserDirectory`] for accounts (with atomic uniqueness
//! on email and provider id) and [`DocumentStore`] for the CRUD resources.
//! Both are implemented by Firestore and by an in-process store.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{User, UserPatch};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Uniqueness index: document id = encoded email, body = owning user id
    pub const USER_EMAILS: &str = "user_emails";
    /// Uniqueness index: document id = GitHub id, body = owning user id
    pub const USER_GITHUB_IDS: &str = "user_github_ids";
    pub const ITEMS: &str = "items";
    pub const RESUMES: &str = "resumes";
    pub const PORTFOLIOS: &str = "portfolios";
}

/// Unique keys a user can be found by.
#[derive(Debug, Clone, Copy)]
pub enum UserLookup<'a> {
    Id(&'a str),
    Email(&'a str),
    GithubId(&'a str),
}

/// Storage contract for user accounts.
///
/// `insert_user` must reject a duplicate email or GitHub id atomically with
/// [`AppError::Conflict`]; callers rely on that rather than on a prior lookup.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, lookup: UserLookup<'_>) -> Result<Option<User>, AppError>;

    /// Insert a new user, returning its id.
    async fn insert_user(&self, user: &User) -> Result<String, AppError>;

    /// Apply a partial update. Claiming a GitHub id owned by another user is a conflict.
    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<(), AppError>;

    /// Cheap connectivity check for health reporting.
    async fn ping(&self) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Equality filters, one sort key and a page window.
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, SortDirection)>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

/// Schemaless document storage for the CRUD resources.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document. An existing id is a conflict.
    async fn insert_document(&self, collection: &str, id: &str, doc: Value)
        -> Result<(), AppError>;

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, AppError>;

    async fn query_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Result<Vec<Value>, AppError>;

    /// Overwrite an existing document. Returns `false` if there was none.
    async fn replace_document(
        &self,
        collection: &str,
        id: &str,
        doc: Value,
    ) -> Result<bool, AppError>;

    /// Returns `false` if there was nothing to delete.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, AppError>;
}

/// A typed record living in one collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

/// Typed access to one collection of a [`DocumentStore`].
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub async fn insert(&self, doc: &T) -> Result<(), AppError> {
        self.store
            .insert_document(T::COLLECTION, doc.id(), to_value(doc)?)
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>, AppError> {
        self.store
            .get_document(T::COLLECTION, id)
            .await?
            .map(from_value)
            .transpose()
    }

    pub async fn find(&self, query: &DocumentQuery) -> Result<Vec<T>, AppError> {
        self.store
            .query_documents(T::COLLECTION, query)
            .await?
            .into_iter()
            .map(from_value)
            .collect()
    }

    pub async fn find_one(&self, query: DocumentQuery) -> Result<Option<T>, AppError> {
        Ok(self.find(&query.limit(1)).await?.into_iter().next())
    }

    pub async fn replace(&self, doc: &T) -> Result<bool, AppError> {
        self.store
            .replace_document(T::COLLECTION, doc.id(), to_value(doc)?)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        self.store.delete_document(T::COLLECTION, id).await
    }
}

fn to_value<T: Serialize>(doc: &T) -> Result<Value, AppError> {
    serde_json::to_value(doc)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize document: {}", e)))
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, AppError> {
    serde_json::from_value(value)
        .map_err(|e| AppError::Database(format!("Malformed document: {}", e)))
}

/// Normalize an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
