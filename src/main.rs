// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Backend Boilerplate API Server
//!
//! Email/password and GitHub sign-in, per-client rate limiting, and CRUD
//! resources backed by Firestore or an in-process store.

use backend_boilerplate::{
    config::{Config, StoreBackend},
    db::{DocumentStore, FirestoreDb, MemoryDb, UserDirectory},
    middleware::{spawn_sweeper, RateLimiter},
    services::{
        AuthFlow, GitHubOAuth, ObjectStorage, OAuthProvider, PasswordHasher, S3Presigner,
        TokenService,
    },
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Backend Boilerplate API");

    // Initialize document store
    let (users, db) = open_store(&config.store).await?;

    // Initialize GitHub OAuth (optional)
    let oauth = if config.github_enabled() {
        let github: Arc<dyn OAuthProvider> = Arc::new(GitHubOAuth::new(
            config.github_client_id.clone(),
            config.github_client_secret.clone(),
            config.oauth_timeout,
        )?);
        tracing::info!("GitHub OAuth enabled");
        Some(github)
    } else {
        tracing::info!("GitHub OAuth disabled (GITHUB_CLIENT_ID/SECRET not set)");
        None
    };

    // Initialize object storage (optional)
    let storage = match &config.s3 {
        Some(s3) => {
            let presigner: Arc<dyn ObjectStorage> = Arc::new(S3Presigner::new(s3)?);
            tracing::info!(bucket = %s3.bucket, endpoint = %s3.endpoint, "S3 uploads enabled");
            Some(presigner)
        }
        None => {
            tracing::info!("S3 uploads disabled (S3_ACCESS_KEY/S3_BUCKET not set)");
            None
        }
    };

    let auth = AuthFlow::new(
        users,
        TokenService::from_config(&config),
        PasswordHasher::new(config.bcrypt_cost),
        oauth,
    )?;

    // Rate limiter plus its background sweeper
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit,
        config.rate_limit_max_clients,
    ));
    spawn_sweeper(rate_limiter.clone());
    tracing::info!(
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window.as_secs(),
        "Rate limiter initialized"
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        auth,
        storage,
        rate_limiter,
    });

    // Build router
    let app = backend_boilerplate::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Open the configured store, returning it through both of its interfaces.
async fn open_store(
    backend: &StoreBackend,
) -> Result<(Arc<dyn UserDirectory>, Arc<dyn DocumentStore>), Box<dyn std::error::Error>> {
    match backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            let db = Arc::new(MemoryDb::new());
            let users: Arc<dyn UserDirectory> = db.clone();
            let docs: Arc<dyn DocumentStore> = db;
            Ok((users, docs))
        }
        StoreBackend::Firestore { project_id } => {
            let db = Arc::new(FirestoreDb::new(project_id).await?);
            let users: Arc<dyn UserDirectory> = db.clone();
            let docs: Arc<dyn DocumentStore> = db;
            Ok((users, docs))
        }
    }
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("backend_boilerplate=debug,info")
            }),
        )
        .with(format)
        .init();
}
