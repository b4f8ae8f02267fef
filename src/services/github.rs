// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GitHub OAuth client.
//!
//! Handles:
//! - Authorization URL construction
//! - Code-for-token exchange
//! - Profile and email list retrieval

use super::oauth::{OAuthEmail, OAuthProfile, OAuthProvider};
use crate::error::AppError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("backend-boilerplate/", env!("CARGO_PKG_VERSION"));

/// GitHub OAuth app client.
#[derive(Clone)]
pub struct GitHubOAuth {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    /// `https://github.com` (authorize + token endpoints)
    web_base_url: String,
    /// `https://api.github.com`
    api_base_url: String,
}

impl GitHubOAuth {
    /// Create a client whose every request is bounded by `timeout`.
    pub fn new(client_id: String, client_secret: String, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            client_id,
            client_secret,
            web_base_url: "https://github.com".to_string(),
            api_base_url: "https://api.github.com".to_string(),
        })
    }

    /// Point the client at different hosts (GitHub Enterprise, test servers).
    pub fn with_base_urls(mut self, web_base_url: &str, api_base_url: &str) -> Self {
        self.web_base_url = web_base_url.trim_end_matches('/').to_string();
        self.api_base_url = api_base_url.trim_end_matches('/').to_string();
        self
    }

    /// Generic GET against the API with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let url = format!("{}{}", self.api_base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| AppError::OAuthExchange(format!("GitHub request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::OAuthExchange(format!(
                "GitHub HTTP {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::OAuthExchange(format!("GitHub JSON parse error: {}", e)))
    }
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct GitHubUser {
    id: u64,
    name: Option<String>,
    avatar_url: Option<String>,
    email: Option<String>,
}

#[async_trait]
impl OAuthProvider for GitHubOAuth {
    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/login/oauth/authorize?client_id={}&scope={}&state={}",
            self.web_base_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode("user:email"),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AppError> {
        let response = self
            .http
            .post(format!("{}/login/oauth/access_token", self.web_base_url))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| AppError::OAuthExchange(format!("Token request failed: {}", e)))?;

        let body: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::OAuthExchange(format!("Token response unreadable: {}", e)))?;

        match body.access_token.filter(|t| !t.is_empty()) {
            Some(token) => Ok(token),
            None => Err(AppError::OAuthExchange(format!(
                "No access token in response (error: {}, description: {})",
                body.error.as_deref().unwrap_or("none"),
                body.error_description.as_deref().unwrap_or("none")
            ))),
        }
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile, AppError> {
        let user: GitHubUser = self.get_json("/user", access_token).await?;
        Ok(OAuthProfile {
            id: user.id.to_string(),
            name: user.name,
            avatar_url: user.avatar_url,
            email: user.email,
        })
    }

    async fn fetch_emails(&self, access_token: &str) -> Result<Vec<OAuthEmail>, AppError> {
        match self
            .get_json::<Vec<OAuthEmail>>("/user/emails", access_token)
            .await
        {
            Ok(emails) => Ok(emails),
            Err(e) => {
                tracing::warn!(error = %e, "GitHub email list unavailable, using profile email");
                Ok(Vec::new())
            }
        }
    }
}
