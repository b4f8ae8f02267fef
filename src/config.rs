//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. For local development a `.env` file
//! is honored.

use jsonwebtoken::Algorithm;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Requests per window used when `RATE_LIMIT` cannot be parsed.
pub const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 100;
/// Window length used when `RATE_LIMIT` has no recognizable unit.
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Parsed `RATE_LIMIT` setting (e.g. `"100/minute"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_RATE_LIMIT_REQUESTS,
            window: DEFAULT_RATE_LIMIT_WINDOW,
        }
    }
}

impl RateLimitConfig {
    /// Parse `"<count>/<unit>"`.
    ///
    /// Units: `minute|min|m`, `hour|h`, `second|sec|s`. An unknown unit keeps
    /// the count with a 60 second window; a missing separator or a count that
    /// is not a positive integer yields the full default (100 per 60s).
    pub fn parse(raw: &str) -> Self {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        let Some((count, unit)) = normalized.split_once('/') else {
            return Self::default();
        };

        let max_requests = match count.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => return Self::default(),
        };

        let window = match unit {
            "minute" | "min" | "m" => Duration::from_secs(60),
            "hour" | "h" => Duration::from_secs(3600),
            "second" | "sec" | "s" => Duration::from_secs(1),
            _ => DEFAULT_RATE_LIMIT_WINDOW,
        };

        Self {
            max_requests,
            window,
        }
    }
}

/// Which document store backs the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process store (local development, tests).
    Memory,
    /// Firestore in the given GCP project.
    Firestore { project_id: String },
}

/// S3-compatible object storage settings (AWS, MinIO, R2, ...).
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Endpoint URL, e.g. `https://s3.us-east-1.amazonaws.com` or `http://localhost:9000`
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// Address objects as `{endpoint}/{bucket}/{key}` instead of `{bucket}.{host}/{key}`
    pub path_style: bool,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
    /// Per-IP request limit
    pub rate_limit: RateLimitConfig,
    /// Soft cap on the number of client windows kept in memory
    pub rate_limit_max_clients: usize,

    // --- Tokens ---
    /// Secret for access tokens (raw bytes)
    pub jwt_secret: Vec<u8>,
    /// Secret for refresh tokens (raw bytes)
    pub jwt_refresh_secret: Vec<u8>,
    pub jwt_algorithm: Algorithm,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    /// bcrypt cost factor
    pub bcrypt_cost: u32,

    // --- GitHub OAuth ---
    pub github_client_id: String,
    pub github_client_secret: String,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
    /// Upper bound for each call to the OAuth provider
    pub oauth_timeout: Duration,

    // --- External stores ---
    pub store: StoreBackend,
    pub s3: Option<S3Config>,
}

impl Config {
    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            frontend_url: "http://localhost:3000".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
            rate_limit: RateLimitConfig {
                max_requests: 1000,
                window: Duration::from_secs(60),
            },
            rate_limit_max_clients: 10_000,
            jwt_secret: b"test_access_secret_32_bytes_min!".to_vec(),
            jwt_refresh_secret: b"test_refresh_secret_32_bytes_mn!".to_vec(),
            jwt_algorithm: Algorithm::HS256,
            access_token_ttl: chrono::Duration::minutes(15),
            refresh_token_ttl: chrono::Duration::days(30),
            bcrypt_cost: 4,
            github_client_id: "test_client_id".to_string(),
            github_client_secret: "test_client_secret".to_string(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
            oauth_timeout: Duration::from_secs(5),
            store: StoreBackend::Memory,
            s3: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_secret = required("JWT_SECRET")?.into_bytes();
        let jwt_refresh_secret = required("JWT_REFRESH_SECRET")?.into_bytes();
        if jwt_secret == jwt_refresh_secret {
            tracing::warn!("JWT_SECRET and JWT_REFRESH_SECRET are identical; use distinct secrets");
        }

        let algorithm_name = env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".to_string());
        let jwt_algorithm = parse_hmac_algorithm(&algorithm_name)?;

        let oauth_state_key = env::var("OAUTH_STATE_KEY")
            .map(String::into_bytes)
            .unwrap_or_else(|_| jwt_secret.clone());

        let store = match env::var("GCP_PROJECT_ID") {
            Ok(project_id) if !project_id.trim().is_empty() => StoreBackend::Firestore {
                project_id: project_id.trim().to_string(),
            },
            _ => StoreBackend::Memory,
        };

        Ok(Self {
            port: parsed_or("PORT", 8080),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            cors_origins: parse_origins(
                &env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string()),
            ),
            rate_limit: RateLimitConfig::parse(
                &env::var("RATE_LIMIT").unwrap_or_else(|_| "100/minute".to_string()),
            ),
            rate_limit_max_clients: parsed_or("RATE_LIMIT_MAX_CLIENTS", 100_000),
            jwt_secret,
            jwt_refresh_secret,
            jwt_algorithm,
            access_token_ttl: chrono::Duration::minutes(parsed_or("JWT_EXPIRE_MINUTES", 15)),
            refresh_token_ttl: chrono::Duration::days(parsed_or("JWT_REFRESH_EXPIRE_DAYS", 30)),
            bcrypt_cost: parsed_or("BCRYPT_COST", bcrypt::DEFAULT_COST)
                .clamp(bcrypt_cost_bounds::MIN, bcrypt_cost_bounds::MAX),
            github_client_id: env::var("GITHUB_CLIENT_ID")
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
            github_client_secret: env::var("GITHUB_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
            oauth_state_key,
            oauth_timeout: Duration::from_secs(parsed_or("OAUTH_TIMEOUT_SECS", 10)),
            store,
            s3: s3_from_env(),
        })
    }

    /// GitHub login is only offered when a client id and secret are present.
    pub fn github_enabled(&self) -> bool {
        !self.github_client_id.is_empty() && !self.github_client_secret.is_empty()
    }
}

mod bcrypt_cost_bounds {
    pub const MIN: u32 = 4;
    pub const MAX: u32 = 31;
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Only the HMAC family makes sense with shared secrets.
fn parse_hmac_algorithm(name: &str) -> Result<Algorithm, ConfigError> {
    match Algorithm::from_str(name.trim()) {
        Ok(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => Ok(alg),
        _ => Err(ConfigError::Invalid {
            name: "JWT_ALGORITHM",
            reason: format!("unsupported algorithm {name:?}, expected HS256, HS384 or HS512"),
        }),
    }
}

fn s3_from_env() -> Option<S3Config> {
    let access_key = env::var("S3_ACCESS_KEY").ok().filter(|v| !v.is_empty())?;
    let bucket = env::var("S3_BUCKET").ok().filter(|v| !v.is_empty())?;
    let endpoint = env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty());
    let region = env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());

    // A custom endpoint (MinIO etc.) usually needs path-style addressing.
    let path_style = endpoint.is_some();
    let endpoint = endpoint.unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", region));

    Some(S3Config {
        endpoint,
        region,
        bucket,
        access_key,
        secret_key: env::var("S3_SECRET_KEY").unwrap_or_default(),
        path_style,
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
