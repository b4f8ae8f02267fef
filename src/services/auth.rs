// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication flows: register, login, refresh, current-user resolution
//! and the GitHub OAuth callback.
//!
//! Each operation is independent; the only shared state is the user directory.

use super::oauth::{select_email, OAuthProfile, OAuthProvider};
use super::password::PasswordHasher;
use super::token::{TokenPair, TokenService};
use crate::db::{normalize_email, UserDirectory, UserLookup};
use crate::error::AppError;
use crate::models::{AuthProvider, SubscriptionTier, User, UserPatch};
use crate::time_utils::now_rfc3339;
use std::sync::Arc;

/// Outcome of a successful OAuth callback.
#[derive(Debug, Clone)]
pub struct OAuthLogin {
    pub user_id: String,
    /// `true` if a new account was created
    pub created: bool,
    pub tokens: TokenPair,
}

/// Orchestrates the password hasher, token service and user directory.
#[derive(Clone)]
pub struct AuthFlow {
    users: Arc<dyn UserDirectory>,
    tokens: TokenService,
    hasher: PasswordHasher,
    oauth: Option<Arc<dyn OAuthProvider>>,
    /// Verified against when there is no real hash, so every login failure
    /// costs one bcrypt verification.
    dummy_hash: String,
}

impl AuthFlow {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        tokens: TokenService,
        hasher: PasswordHasher,
        oauth: Option<Arc<dyn OAuthProvider>>,
    ) -> Result<Self, AppError> {
        let dummy_hash = hasher.hash("timing-equalization-placeholder")?;
        Ok(Self {
            users,
            tokens,
            hasher,
            oauth,
            dummy_hash,
        })
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn users(&self) -> &Arc<dyn UserDirectory> {
        &self.users
    }

    /// The configured OAuth provider, if any.
    pub fn oauth(&self) -> Result<&Arc<dyn OAuthProvider>, AppError> {
        self.oauth
            .as_ref()
            .ok_or(AppError::NotConfigured("GitHub OAuth"))
    }

    // ─── Email / Password ────────────────────────────────────────

    /// Create an email/password account and sign it in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: Option<String>,
    ) -> Result<TokenPair, AppError> {
        let email = normalize_email(email);

        // Fast path only; the directory's atomic insert is what enforces uniqueness.
        if self.users.find_user(UserLookup::Email(&email)).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = self.hash_password(password.to_string()).await?;
        let now = now_rfc3339();
        let user = User {
            id: new_user_id(),
            email,
            password_hash: Some(password_hash),
            full_name: full_name.filter(|n| !n.trim().is_empty()),
            avatar_url: None,
            provider: AuthProvider::Email,
            github_id: None,
            subscription_tier: SubscriptionTier::Free,
            created_at: now.clone(),
            updated_at: now.clone(),
            last_login: Some(now),
        };

        let user_id = self.users.insert_user(&user).await?;
        tracing::info!(user_id = %user_id, "User registered");

        self.tokens.issue_pair(&user_id)
    }

    /// Authenticate with email and password.
    ///
    /// Unknown email, OAuth-only account and wrong password all yield the same
    /// [`AppError::InvalidCredentials`].
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let email = normalize_email(email);
        let user = self.users.find_user(UserLookup::Email(&email)).await?;

        let stored_hash = user
            .as_ref()
            .and_then(|u| u.password_hash.clone())
            .unwrap_or_else(|| self.dummy_hash.clone());
        let matches = self
            .verify_password(password.to_string(), stored_hash)
            .await?;

        let user = match user {
            Some(user) if matches && user.password_hash.is_some() => user,
            _ => {
                tracing::warn!("Login rejected");
                return Err(AppError::InvalidCredentials);
            }
        };

        let now = now_rfc3339();
        self.users
            .update_user(
                &user.id,
                &UserPatch {
                    last_login: Some(now.clone()),
                    updated_at: now,
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(user_id = %user.id, "User logged in");
        self.tokens.issue_pair(&user.id)
    }

    // ─── Tokens ──────────────────────────────────────────────────

    /// Exchange a refresh token for a new pair.
    ///
    /// Rotation is stateless: the presented refresh token stays valid until it
    /// expires.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self
            .tokens
            .verify_refresh(refresh_token)
            .ok_or(AppError::InvalidToken)?;

        let user = self
            .users
            .find_user(UserLookup::Id(&claims.sub))
            .await?
            .ok_or(AppError::InvalidToken)?;

        tracing::debug!(user_id = %user.id, "Tokens refreshed");
        self.tokens.issue_pair(&user.id)
    }

    /// Resolve the user behind an access token. Gate for every protected route.
    pub async fn resolve_current_user(&self, access_token: &str) -> Result<User, AppError> {
        let claims = self
            .tokens
            .verify_access(access_token)
            .ok_or(AppError::InvalidToken)?;

        self.users
            .find_user(UserLookup::Id(&claims.sub))
            .await?
            .ok_or(AppError::InvalidToken)
    }

    // ─── OAuth ───────────────────────────────────────────────────

    /// Complete the OAuth flow for an authorization code.
    pub async fn oauth_callback(&self, code: &str) -> Result<OAuthLogin, AppError> {
        let provider = self.oauth()?;

        let provider_token = provider.exchange_code(code).await?;
        let profile = provider.fetch_profile(&provider_token).await?;
        let emails = provider.fetch_emails(&provider_token).await?;

        let email = select_email(&emails, profile.email.as_deref())
            .map(|e| normalize_email(&e))
            .ok_or(AppError::OAuthProfile)?;

        let (user_id, created) = match self.find_oauth_user(&profile.id, &email).await? {
            Some(user) => (self.link_oauth_user(&user, &profile).await?, false),
            None => match self.create_oauth_user(&profile, email.clone()).await {
                Ok(user_id) => (user_id, true),
                // Lost a race with a concurrent callback for the same identity.
                Err(AppError::Conflict(_)) => {
                    let user = self
                        .find_oauth_user(&profile.id, &email)
                        .await?
                        .ok_or_else(|| {
                            AppError::Conflict("Account could not be linked".to_string())
                        })?;
                    (self.link_oauth_user(&user, &profile).await?, false)
                }
                Err(e) => return Err(e),
            },
        };

        tracing::info!(user_id = %user_id, created, "OAuth login successful");

        Ok(OAuthLogin {
            tokens: self.tokens.issue_pair(&user_id)?,
            user_id,
            created,
        })
    }

    /// Provider id first, then email.
    async fn find_oauth_user(
        &self,
        provider_id: &str,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        if let Some(user) = self
            .users
            .find_user(UserLookup::GithubId(provider_id))
            .await?
        {
            return Ok(Some(user));
        }
        self.users.find_user(UserLookup::Email(email)).await
    }

    async fn link_oauth_user(&self, user: &User, profile: &OAuthProfile) -> Result<String, AppError> {
        let now = now_rfc3339();
        let patch = UserPatch {
            github_id: Some(profile.id.clone()),
            full_name: if user.full_name.is_none() {
                profile.name.clone()
            } else {
                None
            },
            avatar_url: profile.avatar_url.clone(),
            last_login: Some(now.clone()),
            updated_at: now,
        };
        self.users.update_user(&user.id, &patch).await?;
        Ok(user.id.clone())
    }

    async fn create_oauth_user(
        &self,
        profile: &OAuthProfile,
        email: String,
    ) -> Result<String, AppError> {
        let now = now_rfc3339();
        let user = User {
            id: new_user_id(),
            email,
            password_hash: None,
            full_name: profile.name.clone(),
            avatar_url: profile.avatar_url.clone(),
            provider: AuthProvider::Github,
            github_id: Some(profile.id.clone()),
            subscription_tier: SubscriptionTier::Free,
            created_at: now.clone(),
            updated_at: now.clone(),
            last_login: Some(now),
        };
        self.users.insert_user(&user).await
    }

    // ─── Hashing on the blocking pool ────────────────────────────

    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Hash task failed: {}", e)))?
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, AppError> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Verify task failed: {}", e)))
    }
}

fn new_user_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
