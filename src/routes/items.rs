// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public CRUD for items.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::db::{DocumentQuery, Repository, SortDirection};
use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::models::{Item, ItemInput};
use crate::response::ApiResponse;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
}

fn items(state: &AppState) -> Repository<Item> {
    Repository::new(state.db.clone())
}

fn not_found() -> AppError {
    AppError::NotFound("Item not found".to_string())
}

async fn create_item(
    State(state): State<Arc<AppState>>,
    ValidatedJson(input): ValidatedJson<ItemInput>,
) -> Result<(StatusCode, ApiResponse<Item>)> {
    let item = Item::from_input(super::new_id(), input);
    items(&state).insert(&item).await?;

    tracing::debug!(item_id = %item.id, "Item created");
    Ok(ApiResponse::created(item))
}

async fn list_items(State(state): State<Arc<AppState>>) -> Result<ApiResponse<Vec<Item>>> {
    let query = DocumentQuery::new().order_by("name", SortDirection::Ascending);
    Ok(ApiResponse::ok(items(&state).find(&query).await?))
}

async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Item>> {
    let item = items(&state).get(&id).await?.ok_or_else(not_found)?;
    Ok(ApiResponse::ok(item))
}

/// Full replace of name, description and price.
async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<ItemInput>,
) -> Result<ApiResponse<Item>> {
    let item = Item::from_input(id, input);
    if !items(&state).replace(&item).await? {
        return Err(not_found());
    }
    Ok(ApiResponse::ok(item))
}

async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>> {
    if !items(&state).delete(&id).await? {
        return Err(not_found());
    }
    Ok(ApiResponse::ok(()))
}
