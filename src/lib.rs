// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Backend boilerplate: authentication, per-client rate limiting and CRUD
//! resources over a document store.
//!
//! This crate provides the HTTP API; collaborators (user directory, document
//! store, OAuth provider, object storage) are injected through [`AppState`].

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::DocumentStore;
use middleware::RateLimiter;
use services::{AuthFlow, ObjectStorage};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Storage for items, resumes and portfolios
    pub db: Arc<dyn DocumentStore>,
    pub auth: AuthFlow,
    /// `None` when no bucket is configured
    pub storage: Option<Arc<dyn ObjectStorage>>,
    pub rate_limiter: Arc<RateLimiter>,
}
