// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use backend_boilerplate::config::Config;
use backend_boilerplate::db::{FirestoreDb, MemoryDb};
use backend_boilerplate::error::AppError;
use backend_boilerplate::middleware::RateLimiter;
use backend_boilerplate::routes::create_router;
use backend_boilerplate::services::{
    AuthFlow, OAuthEmail, OAuthProfile, OAuthProvider, ObjectStorage, PasswordHasher,
    TokenService,
};
use backend_boilerplate::AppState;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Suffix that keeps emulator data from different runs apart.
#[allow(dead_code)]
pub fn unique_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// ─── Fakes ───────────────────────────────────────────────────────────────────

/// Scripted OAuth provider.
#[derive(Clone)]
#[allow(dead_code)]
pub struct FakeOAuth {
    pub profile: OAuthProfile,
    pub emails: Vec<OAuthEmail>,
    pub fail_exchange: bool,
}

#[allow(dead_code)]
impl FakeOAuth {
    pub fn new(provider_id: &str, email: &str) -> Self {
        Self {
            profile: OAuthProfile {
                id: provider_id.to_string(),
                name: Some("Octo Cat".to_string()),
                avatar_url: Some("https://avatars.test/octo.png".to_string()),
                email: None,
            },
            emails: vec![OAuthEmail {
                email: email.to_string(),
                primary: true,
                verified: true,
            }],
            fail_exchange: false,
        }
    }

    pub fn without_email(provider_id: &str) -> Self {
        let mut fake = Self::new(provider_id, "unused@example.com");
        fake.emails.clear();
        fake
    }

    pub fn failing_exchange() -> Self {
        let mut fake = Self::new("1", "unused@example.com");
        fake.fail_exchange = true;
        fake
    }
}

#[async_trait]
impl OAuthProvider for FakeOAuth {
    fn authorize_url(&self, state: &str) -> String {
        format!(
            "https://github.test/login/oauth/authorize?client_id=test_client_id&state={}",
            state
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AppError> {
        if self.fail_exchange {
            return Err(AppError::OAuthExchange(
                "bad_verification_code".to_string(),
            ));
        }
        Ok(format!("gho_{}", code))
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<OAuthProfile, AppError> {
        Ok(self.profile.clone())
    }

    async fn fetch_emails(&self, _access_token: &str) -> Result<Vec<OAuthEmail>, AppError> {
        Ok(self.emails.clone())
    }
}

/// Object storage that returns a predictable URL.
#[allow(dead_code)]
pub struct FakeStorage;

impl ObjectStorage for FakeStorage {
    fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String, AppError> {
        Ok(format!(
            "https://bucket.test/{}?content-type={}&expires={}",
            key,
            content_type,
            ttl.as_secs()
        ))
    }
}

// ─── App construction ────────────────────────────────────────────────────────

#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub db: Arc<MemoryDb>,
}

/// Auth flow over a fresh in-memory directory.
#[allow(dead_code)]
pub fn test_auth_flow(oauth: Option<Arc<dyn OAuthProvider>>) -> (AuthFlow, Arc<MemoryDb>) {
    let config = Config::test_default();
    let db = Arc::new(MemoryDb::new());
    let auth = AuthFlow::new(
        db.clone(),
        TokenService::from_config(&config),
        PasswordHasher::new(config.bcrypt_cost),
        oauth,
    )
    .expect("auth flow");
    (auth, db)
}

/// Create a test app with in-memory dependencies.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default(), None, None)
}

#[allow(dead_code)]
pub fn create_test_app_with(
    config: Config,
    oauth: Option<Arc<dyn OAuthProvider>>,
    storage: Option<Arc<dyn ObjectStorage>>,
) -> TestApp {
    let db = Arc::new(MemoryDb::new());
    let auth = AuthFlow::new(
        db.clone(),
        TokenService::from_config(&config),
        PasswordHasher::new(config.bcrypt_cost),
        oauth,
    )
    .expect("auth flow");
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit,
        config.rate_limit_max_clients,
    ));

    let state = Arc::new(AppState {
        config,
        db: db.clone(),
        auth,
        storage,
        rate_limiter,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
    }
}

// ─── Request helpers ─────────────────────────────────────────────────────────

/// Build a request with an optional JSON body and bearer token.
#[allow(dead_code)]
pub fn request(method: &str, uri: &str, body: Option<Value>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request, returning status, headers and raw body.
#[allow(dead_code)]
pub async fn send_raw(
    app: &axum::Router,
    request: Request<Body>,
) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, bytes.to_vec())
}

/// Send a request and parse the JSON body (`Value::Null` if empty).
#[allow(dead_code)]
pub async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send_raw(app, request).await;
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

/// Register a user over HTTP and return its access token.
#[allow(dead_code)]
pub async fn register(app: &axum::Router, email: &str) -> String {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/auth/register",
            Some(serde_json::json!({
                "email": email,
                "password": "correct horse battery",
                "full_name": "Test User",
            })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    body["data"]["access_token"].as_str().unwrap().to_string()
}
