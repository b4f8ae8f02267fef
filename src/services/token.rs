// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access and refresh token issuance and verification.
//!
//! The two token kinds are signed with distinct secrets and carry an explicit
//! `type` claim; verification requires both to match, so a token of one kind
//! is never accepted as the other even if the secrets were configured equal.
//! Tokens are stateless bearer credentials. There is no server-side revocation:
//! a refresh token stays valid until it expires, even after rotation.

use crate::config::Config;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (internal user id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Unique token id
    pub jti: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
}

/// Access + refresh token pair as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

/// Signs and verifies tokens. Cheap to clone; read-only after construction.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    algorithm: Algorithm,
    validation: Validation,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl TokenService {
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        algorithm: Algorithm,
        access_ttl: chrono::Duration,
        refresh_ttl: chrono::Duration,
    ) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            algorithm,
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            &config.jwt_refresh_secret,
            config.jwt_algorithm,
            config.access_token_ttl,
            config.refresh_token_ttl,
        )
    }

    pub fn issue_access(&self, subject: &str) -> Result<String, AppError> {
        self.issue_at(TokenKind::Access, subject, Utc::now())
    }

    pub fn issue_refresh(&self, subject: &str) -> Result<String, AppError> {
        self.issue_at(TokenKind::Refresh, subject, Utc::now())
    }

    /// Issue a fresh access + refresh pair.
    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.issue_access(subject)?,
            refresh_token: self.issue_refresh(subject)?,
            token_type: "bearer",
        })
    }

    /// Verify an access token. Every failure collapses to `None`.
    pub fn verify_access(&self, token: &str) -> Option<Claims> {
        self.verify(token, TokenKind::Access)
    }

    /// Verify a refresh token. Every failure collapses to `None`.
    pub fn verify_refresh(&self, token: &str) -> Option<Claims> {
        self.verify(token, TokenKind::Refresh)
    }

    fn issue_at(
        &self,
        kind: TokenKind,
        subject: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let (key, ttl) = match kind {
            TokenKind::Access => (&self.access_encoding, self.access_ttl),
            TokenKind::Refresh => (&self.refresh_encoding, self.refresh_ttl),
        };

        let claims = Claims {
            sub: subject.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: uuid::Uuid::new_v4().simple().to_string(),
            kind,
        };

        encode(&Header::new(self.algorithm), &claims, key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))
    }

    fn verify(&self, token: &str, expected: TokenKind) -> Option<Claims> {
        let key = match expected {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };

        match decode::<Claims>(token, key, &self.validation) {
            Ok(data) if data.claims.kind == expected && !data.claims.sub.is_empty() => {
                Some(data.claims)
            }
            Ok(data) => {
                tracing::debug!(kind = ?data.claims.kind, expected = ?expected, "Token kind mismatch");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, expected = ?expected, "Token rejected");
                None
            }
        }
    }
}
