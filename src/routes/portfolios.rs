// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Portfolio CRUD. Every route is scoped to the calling user.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::db::{DocumentQuery, Repository, SortDirection};
use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::CurrentUser;
use crate::models::{Portfolio, PortfolioCreate, PortfolioUpdate};
use crate::response::ApiResponse;
use crate::time_utils::now_rfc3339;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/portfolios", get(list_portfolios).post(create_portfolio))
        .route(
            "/portfolios/{id}",
            get(get_portfolio)
                .put(update_portfolio)
                .delete(delete_portfolio),
        )
}

fn portfolios(state: &AppState) -> Repository<Portfolio> {
    Repository::new(state.db.clone())
}

async fn own_portfolio(
    repo: &Repository<Portfolio>,
    id: &str,
    user_id: &str,
) -> Result<Portfolio> {
    repo.get(id)
        .await?
        .filter(|p| p.user_id == user_id)
        .ok_or_else(|| AppError::NotFound("Portfolio not found".to_string()))
}

/// Whether a portfolio other than `except_id` already uses `subdomain`.
async fn subdomain_taken(
    repo: &Repository<Portfolio>,
    subdomain: &str,
    except_id: Option<&str>,
) -> Result<bool> {
    Ok(repo
        .find_one(DocumentQuery::new().filter("subdomain", subdomain))
        .await?
        .is_some_and(|other| Some(other.id.as_str()) != except_id))
}

async fn list_portfolios(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<ApiResponse<Vec<Portfolio>>> {
    let query = DocumentQuery::new()
        .filter("user_id", user.id.as_str())
        .order_by("created_at", SortDirection::Descending);
    Ok(ApiResponse::ok(portfolios(&state).find(&query).await?))
}

async fn create_portfolio(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(input): ValidatedJson<PortfolioCreate>,
) -> Result<(StatusCode, ApiResponse<Portfolio>)> {
    let repo = portfolios(&state);
    if subdomain_taken(&repo, &input.subdomain, None).await? {
        return Err(AppError::Conflict("Subdomain already taken".to_string()));
    }

    let portfolio = Portfolio::new(super::new_id(), user.id, input, now_rfc3339());
    repo.insert(&portfolio).await?;

    tracing::info!(
        portfolio_id = %portfolio.id,
        subdomain = %portfolio.subdomain,
        "Portfolio created"
    );
    Ok(ApiResponse::created(portfolio))
}

async fn get_portfolio(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Portfolio>> {
    Ok(ApiResponse::ok(
        own_portfolio(&portfolios(&state), &id, &user.id).await?,
    ))
}

async fn update_portfolio(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidatedJson(update): ValidatedJson<PortfolioUpdate>,
) -> Result<ApiResponse<Portfolio>> {
    let repo = portfolios(&state);
    let mut portfolio = own_portfolio(&repo, &id, &user.id).await?;

    if let Some(subdomain) = update.subdomain.as_deref() {
        if subdomain_taken(&repo, subdomain, Some(&portfolio.id)).await? {
            return Err(AppError::Conflict("Subdomain already taken".to_string()));
        }
    }

    portfolio.apply(update, now_rfc3339());
    if !repo.replace(&portfolio).await? {
        return Err(AppError::NotFound("Portfolio not found".to_string()));
    }

    Ok(ApiResponse::ok(portfolio))
}

async fn delete_portfolio(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>> {
    let repo = portfolios(&state);
    let portfolio = own_portfolio(&repo, &id, &user.id).await?;
    repo.delete(&portfolio.id).await?;

    tracing::info!(portfolio_id = %portfolio.id, "Portfolio deleted");
    Ok(ApiResponse::ok(()))
}
