// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Resume CRUD. Every route is scoped to the calling user.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::db::{DocumentQuery, Repository, SortDirection};
use crate::error::{AppError, Result};
use crate::extract::{ValidatedJson, ValidatedQuery};
use crate::middleware::CurrentUser;
use crate::models::{Resume, ResumeCreate, ResumeUpdate, ResumeView};
use crate::response::ApiResponse;
use crate::time_utils::now_rfc3339;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/resumes", get(list_resumes).post(create_resume))
        .route(
            "/resumes/{id}",
            get(get_resume).put(update_resume).delete(delete_resume),
        )
        .route("/resumes/{id}/duplicate", post(duplicate_resume))
}

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn resumes(state: &AppState) -> Repository<Resume> {
    Repository::new(state.db.clone())
}

/// The caller's live resume, or `not_found` for anything else (including
/// another user's resume).
async fn own_resume(repo: &Repository<Resume>, id: &str, user_id: &str) -> Result<Resume> {
    repo.get(id)
        .await?
        .filter(|r| r.user_id == user_id && !r.deleted)
        .ok_or_else(|| AppError::NotFound("Resume not found".to_string()))
}

async fn list_resumes(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedQuery(params): ValidatedQuery<ListParams>,
) -> Result<ApiResponse<Vec<ResumeView>>> {
    let query = DocumentQuery::new()
        .filter("user_id", user.id.as_str())
        .filter("deleted", false)
        .order_by("created_at", SortDirection::Descending)
        .limit(params.limit)
        .offset(params.offset);

    let page = resumes(&state).find(&query).await?;
    Ok(ApiResponse::ok(page.into_iter().map(ResumeView::from).collect()))
}

async fn create_resume(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(input): ValidatedJson<ResumeCreate>,
) -> Result<(StatusCode, ApiResponse<ResumeView>)> {
    let resume = Resume::new(super::new_id(), user.id, input, now_rfc3339());
    resumes(&state).insert(&resume).await?;

    tracing::info!(resume_id = %resume.id, user_id = %resume.user_id, "Resume created");
    Ok(ApiResponse::created(resume.into()))
}

async fn get_resume(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<ApiResponse<ResumeView>> {
    let resume = own_resume(&resumes(&state), &id, &user.id).await?;
    Ok(ApiResponse::ok(resume.into()))
}

async fn update_resume(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidatedJson(update): ValidatedJson<ResumeUpdate>,
) -> Result<ApiResponse<ResumeView>> {
    let repo = resumes(&state);
    let mut resume = own_resume(&repo, &id, &user.id).await?;

    if let Some(slug) = update.slug.as_deref() {
        let taken = repo
            .find_one(DocumentQuery::new().filter("slug", slug))
            .await?
            .is_some_and(|other| other.id != resume.id);
        if taken {
            return Err(AppError::Conflict("Slug already taken".to_string()));
        }
    }

    resume.apply(update, now_rfc3339());
    if !repo.replace(&resume).await? {
        return Err(AppError::NotFound("Resume not found".to_string()));
    }

    Ok(ApiResponse::ok(resume.into()))
}

/// Soft delete: the document stays, flagged as deleted.
async fn delete_resume(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>> {
    let repo = resumes(&state);
    let mut resume = own_resume(&repo, &id, &user.id).await?;

    resume.mark_deleted(now_rfc3339());
    repo.replace(&resume).await?;

    tracing::info!(resume_id = %resume.id, "Resume deleted");
    Ok(ApiResponse::ok(()))
}

async fn duplicate_resume(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<(StatusCode, ApiResponse<ResumeView>)> {
    let repo = resumes(&state);
    let original = own_resume(&repo, &id, &user.id).await?;

    let copy = original.duplicate(super::new_id(), now_rfc3339());
    repo.insert(&copy).await?;

    tracing::info!(resume_id = %copy.id, source_id = %original.id, "Resume duplicated");
    Ok(ApiResponse::created(copy.into()))
}
