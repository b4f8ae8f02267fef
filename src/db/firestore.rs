// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides:
//! - Users, with email and GitHub id uniqueness enforced by create-only
//!   index documents (`user_emails/{email}`, `user_github_ids/{id}`)
//!   written in the same transaction as the user document
//! - Generic JSON documents for the CRUD resources

use super::{collections, DocumentQuery, DocumentStore, SortDirection, UserDirectory, UserLookup};
use crate::error::AppError;
use crate::models::{User, UserPatch};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::{FirestoreTransaction, FirestoreWritePrecondition};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a uniqueness index document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    user_id: String,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    // ─── Index Documents ─────────────────────────────────────────

    async fn read_index(&self, collection: &str, key: &str) -> Result<Option<String>, AppError> {
        let entry: Option<IndexEntry> = self
            .client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(key)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(entry.map(|e| e.user_id))
    }

    /// Queue a create-only index write. The commit fails with
    /// `DataConflictError` if the key already exists.
    fn claim_index_in(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        collection: &str,
        key: &str,
        entry: &IndexEntry,
    ) -> Result<(), AppError> {
        self.client
            .fluent()
            .update()
            .in_col(collection)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(key)
            .object(entry)
            .add_to_transaction(transaction)
            .map_err(|e| {
                AppError::Database(format!(
                    "Failed to add {} index to transaction: {}",
                    collection, e
                ))
            })?;
        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    fn put_user_in(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        user: &User,
    ) -> Result<(), AppError> {
        self.client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .add_to_transaction(transaction)
            .map_err(|e| AppError::Database(format!("Failed to add user to transaction: {}", e)))?;
        Ok(())
    }

    /// Which unique key made an insert commit fail.
    async fn insert_conflict(&self, user: &User) -> Result<AppError, AppError> {
        let email_owner = self
            .read_index(collections::USER_EMAILS, &email_key(&user.email))
            .await?;
        if email_owner.is_some_and(|owner| owner != user.id) {
            return Ok(AppError::Conflict("Email already registered".to_string()));
        }
        Ok(AppError::Conflict(
            "GitHub account already linked".to_string(),
        ))
    }
}

/// Firestore document ids may not contain `/`.
fn email_key(email: &str) -> String {
    urlencoding::encode(email).into_owned()
}

#[async_trait]
impl UserDirectory for FirestoreDb {
    async fn find_user(&self, lookup: UserLookup<'_>) -> Result<Option<User>, AppError> {
        let user_id = match lookup {
            UserLookup::Id(id) => return self.get_user(id).await,
            UserLookup::Email(email) => {
                self.read_index(collections::USER_EMAILS, &email_key(email))
                    .await?
            }
            UserLookup::GithubId(github_id) => {
                self.read_index(collections::USER_GITHUB_IDS, github_id)
                    .await?
            }
        };

        match user_id {
            Some(id) => self.get_user(&id).await,
            None => Ok(None),
        }
    }

    /// The user document and its index entries are written in one
    /// transaction, so a failed insert leaves nothing behind.
    async fn insert_user(&self, user: &User) -> Result<String, AppError> {
        let entry = IndexEntry {
            user_id: user.id.clone(),
        };

        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        self.claim_index_in(
            &mut transaction,
            collections::USER_EMAILS,
            &email_key(&user.email),
            &entry,
        )?;
        if let Some(github_id) = &user.github_id {
            self.claim_index_in(
                &mut transaction,
                collections::USER_GITHUB_IDS,
                github_id,
                &entry,
            )?;
        }
        self.put_user_in(&mut transaction, user)?;

        match transaction.commit().await {
            Ok(_) => {
                tracing::debug!(user_id = %user.id, "User inserted");
                Ok(user.id.clone())
            }
            Err(FirestoreError::DataConflictError(_)) => Err(self.insert_conflict(user).await?),
            Err(e) => Err(AppError::Database(format!("Transaction commit failed: {}", e))),
        }
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<(), AppError> {
        let mut user = self
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        let previous_github_id = user.github_id.clone();
        let new_github_id = patch
            .github_id
            .as_deref()
            .filter(|g| previous_github_id.as_deref() != Some(*g));

        // A leftover index entry for this same user is reused, not re-claimed.
        let mut claim_github = false;
        if let Some(github_id) = new_github_id {
            match self
                .read_index(collections::USER_GITHUB_IDS, github_id)
                .await?
            {
                Some(owner) if owner != id => {
                    return Err(AppError::Conflict(
                        "GitHub account already linked".to_string(),
                    ))
                }
                Some(_) => {}
                None => claim_github = true,
            }
        }

        user.apply(patch);

        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        if let (true, Some(github_id)) = (claim_github, new_github_id) {
            let entry = IndexEntry {
                user_id: id.to_string(),
            };
            self.claim_index_in(
                &mut transaction,
                collections::USER_GITHUB_IDS,
                github_id,
                &entry,
            )?;
        }
        self.put_user_in(&mut transaction, &user)?;
        if let (Some(old), Some(_)) = (&previous_github_id, new_github_id) {
            self.client
                .fluent()
                .delete()
                .from(collections::USER_GITHUB_IDS)
                .document_id(old)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!(
                        "Failed to add index release to transaction: {}",
                        e
                    ))
                })?;
        }

        match transaction.commit().await {
            Ok(_) => Ok(()),
            Err(FirestoreError::DataConflictError(_)) => Err(AppError::Conflict(
                "GitHub account already linked".to_string(),
            )),
            Err(e) => Err(AppError::Database(format!("Transaction commit failed: {}", e))),
        }
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.read_index(collections::USER_EMAILS, "healthcheck")
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl DocumentStore for FirestoreDb {
    async fn insert_document(
        &self,
        collection: &str,
        id: &str,
        doc: Value,
    ) -> Result<(), AppError> {
        let result: Result<(), FirestoreError> = self
            .client
            .fluent()
            .insert()
            .into(collection)
            .document_id(id)
            .object(&doc)
            .execute()
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(FirestoreError::DataConflictError(_)) => Err(AppError::Conflict(format!(
                "Document {} already exists in {}",
                id, collection
            ))),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Result<Vec<Value>, AppError> {
        let mut select = self.client.fluent().select().from(collection);

        if !query.filters.is_empty() {
            let filters = query.filters.clone();
            select = select.filter(move |q| {
                q.for_all(
                    filters
                        .iter()
                        .map(|(field, value)| q.field(field.as_str()).eq(value.clone())),
                )
            });
        }

        if let Some((field, direction)) = &query.order_by {
            let direction = match direction {
                SortDirection::Ascending => firestore::FirestoreQueryDirection::Ascending,
                SortDirection::Descending => firestore::FirestoreQueryDirection::Descending,
            };
            select = select.order_by([(field.as_str(), direction)]);
        }

        if let Some(limit) = query.limit {
            select = select.limit(limit);
        }

        select
            .offset(query.offset)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn replace_document(
        &self,
        collection: &str,
        id: &str,
        doc: Value,
    ) -> Result<bool, AppError> {
        if self.get_document(collection, id).await?.is_none() {
            return Ok(false);
        }

        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(&doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(true)
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, AppError> {
        if self.get_document(collection, id).await?.is_none() {
            return Ok(false);
        }

        self.client
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(true)
    }
}
