// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth provider boundary.

use crate::error::AppError;
use async_trait::async_trait;
use serde::Deserialize;

/// Profile returned by the provider for the authenticated account.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthProfile {
    /// Provider-side account id
    pub id: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    /// Public profile email, if the user exposes one
    pub email: Option<String>,
}

/// One entry of the provider's email list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OAuthEmail {
    pub email: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

/// Remote OAuth collaborator (authorization-code flow).
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Where to send the browser to start the flow.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange an authorization code for a provider access token.
    async fn exchange_code(&self, code: &str) -> Result<String, AppError>;

    async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile, AppError>;

    /// Email list; an unavailable list is reported as empty.
    async fn fetch_emails(&self, access_token: &str) -> Result<Vec<OAuthEmail>, AppError>;
}

/// Pick the account email: primary and verified first, then the first listed
/// address, then the profile email.
pub fn select_email(emails: &[OAuthEmail], profile_email: Option<&str>) -> Option<String> {
    let usable = |e: &&OAuthEmail| !e.email.trim().is_empty();

    emails
        .iter()
        .filter(usable)
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(usable))
        .map(|e| e.email.clone())
        .or_else(|| {
            profile_email
                .filter(|e| !e.trim().is_empty())
                .map(str::to_string)
        })
}
