// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Every failure is rendered as `{"success": false, "error": <code>, "message": <text>}`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A unique key (email, provider id, slug, subdomain) is already taken.
    #[error("{0}")]
    Conflict(String),

    /// Login failed. Deliberately says nothing about which check failed.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Bad, expired or wrong-kind token, or a subject that no longer resolves.
    #[error("Could not validate credentials")]
    InvalidToken,

    /// No bearer credential supplied.
    #[error("Authentication required")]
    Unauthorized,

    #[error("OAuth token exchange failed: {0}")]
    OAuthExchange(String),

    #[error("OAuth profile has no usable email")]
    OAuthProfile,

    #[error("Too many requests. Limit: {max_requests} per {window_secs}s.")]
    RateLimited {
        max_requests: u32,
        window_secs: u64,
        retry_after_secs: u64,
    },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0} not configured")]
    NotConfigured(&'static str),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code used in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Conflict(_) => "conflict",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::InvalidToken => "invalid_token",
            AppError::Unauthorized => "unauthorized",
            AppError::OAuthExchange(_) => "oauth_exchange_failed",
            AppError::OAuthProfile => "oauth_no_email",
            AppError::RateLimited { .. } => "rate_limit_exceeded",
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::NotConfigured(_) => "not_configured",
            AppError::Database(_) | AppError::Internal(_) => "internal_server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::InvalidToken | AppError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            AppError::OAuthExchange(_) => StatusCode::BAD_GATEWAY,
            AppError::OAuthProfile => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotConfigured(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                "An unexpected error occurred".to_string()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                "An unexpected error occurred".to_string()
            }
            AppError::OAuthExchange(reason) => {
                tracing::warn!(reason = %reason, "OAuth exchange failed");
                "OAuth token exchange failed".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            error: self.code().to_string(),
            message,
        };

        let mut response = (self.status(), Json(body)).into_response();

        match &self {
            AppError::InvalidCredentials | AppError::InvalidToken | AppError::Unauthorized => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            AppError::RateLimited {
                retry_after_secs, ..
            } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            }
            _ => {}
        }

        response
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
