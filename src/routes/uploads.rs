// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Presigned upload URLs for direct-to-bucket uploads.

use axum::{
    extract::{Extension, State},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::AppState;

/// How long an issued upload URL stays usable.
const UPLOAD_URL_TTL: Duration = Duration::from_secs(300);

const UPLOAD_TYPES: [&str; 3] = ["avatar", "screenshot", "pdf"];

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/uploads/presigned-url", post(presigned_url))
}

fn default_content_type() -> String {
    "image/png".to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct PresignedUrlRequest {
    #[validate(length(min = 1))]
    pub file_name: String,
    #[serde(default = "default_content_type")]
    #[validate(length(min = 1))]
    pub content_type: String,
    pub upload_type: String,
}

#[derive(Debug, Serialize)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    pub file_key: String,
}

async fn presigned_url(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(request): ValidatedJson<PresignedUrlRequest>,
) -> Result<ApiResponse<PresignedUrlResponse>> {
    let storage = state
        .storage
        .as_ref()
        .ok_or(AppError::NotConfigured("S3 storage"))?;

    if !UPLOAD_TYPES.contains(&request.upload_type.as_str()) {
        return Err(AppError::Validation(format!(
            "upload_type must be one of: {}",
            UPLOAD_TYPES.join(", ")
        )));
    }

    let file_key = format!(
        "uploads/{}/{}/{}.{}",
        request.upload_type,
        user.id,
        super::new_id(),
        file_extension(&request.file_name)
    );
    let upload_url = storage.presign_put(&file_key, &request.content_type, UPLOAD_URL_TTL)?;

    tracing::info!(user_id = %user.id, file_key = %file_key, "Issued presigned upload URL");

    Ok(ApiResponse::ok(PresignedUrlResponse {
        upload_url,
        file_key,
    }))
}

/// Text after the last `.`, or `bin` when there is none.
fn file_extension(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && !ext.contains('/') => ext,
        _ => "bin",
    }
}
