// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication routes: email/password, token refresh and GitHub OAuth.

use axum::{
    extract::{Extension, Query, State},
    response::Redirect,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::CurrentUser;
use crate::models::UserView;
use crate::response::ApiResponse;
use crate::services::TokenPair;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Cookie holding the nonce an OAuth `state` is bound to.
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_COOKIE_PATH: &str = "/auth/github";

/// How long a signed OAuth `state` (and its cookie) stays valid.
const STATE_TTL: time::Duration = time::Duration::minutes(10);
const STATE_TTL_MS: u128 = STATE_TTL.whole_milliseconds() as u128;
/// Tolerated clock skew for states minted by another instance.
const STATE_SKEW_MS: u128 = 60 * 1000;

/// Routes that need no credentials.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/github", get(github_start))
        .route("/auth/github/callback", get(github_callback))
}

/// Routes behind `require_auth`.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/me", get(me))
}

// ─── Email / Password ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<(axum::http::StatusCode, ApiResponse<TokenPair>)> {
    let tokens = state
        .auth
        .register(&body.email, &body.password, body.full_name)
        .await?;
    Ok(ApiResponse::created(tokens))
}

async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<ApiResponse<TokenPair>> {
    let tokens = state.auth.login(&body.email, &body.password).await?;
    Ok(ApiResponse::ok(tokens))
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<RefreshRequest>,
) -> Result<ApiResponse<TokenPair>> {
    let tokens = state.auth.refresh(&body.refresh_token).await?;
    Ok(ApiResponse::ok(tokens))
}

async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> ApiResponse<UserView> {
    ApiResponse::ok(UserView::from(user))
}

// ─── GitHub OAuth ────────────────────────────────────────────────────────────

/// Start OAuth flow - redirect to GitHub authorization.
///
/// The signed `state` embeds a fresh nonce that is also set as an HttpOnly
/// cookie, so a callback only succeeds in the browser that started the flow.
async fn github_start(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let provider = state.auth.oauth()?;
    let nonce = Uuid::new_v4().simple().to_string();
    let oauth_state = sign_state(&state.config.oauth_state_key, now_millis()?, &nonce)?;

    // Lax, not Strict: the callback is a cross-site top-level redirect from GitHub.
    let cookie = Cookie::build((OAUTH_STATE_COOKIE, nonce))
        .path(OAUTH_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.frontend_url.starts_with("https://"))
        .max_age(STATE_TTL);

    tracing::info!("Starting OAuth flow, redirecting to GitHub");
    Ok((
        jar.add(cookie),
        Redirect::temporary(&provider.authorize_url(&oauth_state)),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - sign the user in and hand tokens to the frontend.
///
/// Every outcome is a redirect; failures land on `/auth/error?error=<code>`.
/// The state cookie is single use and cleared either way.
async fn github_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let nonce = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(OAUTH_STATE_COOKIE).path(OAUTH_COOKIE_PATH));

    (jar, finish_github_login(&state, params, nonce.as_deref()).await)
}

async fn finish_github_login(
    state: &AppState,
    params: CallbackParams,
    cookie_nonce: Option<&str>,
) -> Redirect {
    let frontend_url = state.config.frontend_url.trim_end_matches('/');
    let fail = |code: &str| {
        Redirect::temporary(&format!(
            "{}/auth/error?error={}",
            frontend_url,
            urlencoding::encode(code)
        ))
    };

    if let Some(error) = params.error.as_deref() {
        tracing::warn!(error = %error, "OAuth error from GitHub");
        return fail(error);
    }

    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        return fail("no_code");
    };

    let state_ok = match (params.state.as_deref(), cookie_nonce, now_millis()) {
        (Some(s), Some(nonce), Ok(now)) => {
            verify_state(s, &state.config.oauth_state_key, now, nonce)
        }
        _ => false,
    };
    if !state_ok {
        tracing::warn!(
            has_cookie = cookie_nonce.is_some(),
            "Invalid or expired OAuth state parameter"
        );
        return fail("invalid_state");
    }

    match state.auth.oauth_callback(code).await {
        Ok(login) => Redirect::temporary(&format!(
            "{}/auth/callback?token={}&refresh_token={}",
            frontend_url,
            urlencoding::encode(&login.tokens.access_token),
            urlencoding::encode(&login.tokens.refresh_token)
        )),
        Err(AppError::OAuthExchange(reason)) => {
            tracing::warn!(reason = %reason, "OAuth token exchange failed");
            fail("token_exchange_failed")
        }
        Err(AppError::OAuthProfile) => {
            tracing::warn!("GitHub account has no usable email");
            fail("no_email")
        }
        Err(e) => {
            tracing::error!(error = %e, "OAuth callback failed");
            fail("server_error")
        }
    }
}

// ─── OAuth state ─────────────────────────────────────────────────────────────

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// `base64url("timestamp_hex.nonce|signature_hex")`, signature =
/// HMAC-SHA256(key, "timestamp_hex.nonce").
fn sign_state(key: &[u8], now_ms: u128, nonce: &str) -> Result<String> {
    let payload = format!("{:x}.{}", now_ms, nonce);

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Check signature (constant time), age and browser binding of an OAuth `state`.
fn verify_state(state: &str, key: &[u8], now_ms: u128, nonce: &str) -> bool {
    let Some(signed) = URL_SAFE_NO_PAD
        .decode(state)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    else {
        return false;
    };

    let Some((payload, signature_hex)) = signed.split_once('|') else {
        return false;
    };
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(payload.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return false;
    }

    let Some((timestamp_hex, bound_nonce)) = payload.split_once('.') else {
        return false;
    };
    if bound_nonce != nonce {
        tracing::warn!("OAuth state was issued to a different browser");
        return false;
    }

    let Ok(issued_ms) = u128::from_str_radix(timestamp_hex, 16) else {
        return false;
    };

    issued_ms <= now_ms + STATE_SKEW_MS && now_ms.saturating_sub(issued_ms) <= STATE_TTL_MS
}
