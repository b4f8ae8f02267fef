// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Presigned upload URLs for S3-compatible object storage.
//!
//! Implements AWS Signature Version 4 query-string signing, so clients can
//! `PUT` directly to the bucket without the API proxying file bodies.

use crate::config::S3Config;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Object storage collaborator.
pub trait ObjectStorage: Send + Sync {
    /// URL that lets the holder `PUT` one object with the given content type.
    fn presign_put(&self, key: &str, content_type: &str, ttl: Duration) -> Result<String, AppError>;
}

/// SigV4 presigner for one bucket.
#[derive(Debug, Clone)]
pub struct S3Presigner {
    scheme: String,
    /// host[:port] of the endpoint
    endpoint_host: String,
    region: String,
    bucket: String,
    access_key: String,
    secret_key: String,
    path_style: bool,
}

impl S3Presigner {
    pub fn new(config: &S3Config) -> Result<Self, AppError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Invalid S3 endpoint {:?}: {}", config.endpoint, e))
        })?;
        let host = endpoint.host_str().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("S3 endpoint has no host: {}", config.endpoint))
        })?;
        let endpoint_host = match endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            scheme: endpoint.scheme().to_string(),
            endpoint_host,
            region: config.region.clone(),
            bucket: config.bucket.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            path_style: config.path_style,
        })
    }

    /// Presign `method` on `key` as of `now`.
    ///
    /// `content_type`, when given, is a signed header the uploader must send verbatim.
    pub fn presign(
        &self,
        method: &str,
        key: &str,
        content_type: Option<&str>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let (host, canonical_uri) = if self.path_style {
            (
                self.endpoint_host.clone(),
                format!("/{}/{}", uri_encode(&self.bucket), encode_key(key)),
            )
        } else {
            (
                format!("{}.{}", self.bucket, self.endpoint_host),
                format!("/{}", encode_key(key)),
            )
        };

        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/s3/aws4_request", date, self.region);
        let signed_headers = if content_type.is_some() {
            "content-type;host"
        } else {
            "host"
        };

        // Already in canonical (sorted) order.
        let query = [
            ("X-Amz-Algorithm", "AWS4-HMAC-SHA256".to_string()),
            ("X-Amz-Credential", format!("{}/{}", self.access_key, scope)),
            ("X-Amz-Date", amz_date.clone()),
            ("X-Amz-Expires", ttl.as_secs().to_string()),
            ("X-Amz-SignedHeaders", signed_headers.to_string()),
        ];
        let canonical_query = query
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let mut canonical_headers = String::new();
        if let Some(content_type) = content_type {
            canonical_headers.push_str(&format!("content-type:{}\n", content_type.trim()));
        }
        canonical_headers.push_str(&format!("host:{}\n", host));

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\nUNSIGNED-PAYLOAD",
            method, canonical_uri, canonical_query, canonical_headers, signed_headers
        );

        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = [
            date.as_bytes(),
            self.region.as_bytes(),
            b"s3",
            b"aws4_request",
        ]
        .iter()
        .try_fold(
            format!("AWS4{}", self.secret_key).into_bytes(),
            |key, data| hmac_sha256(&key, data),
        )?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        Ok(format!(
            "{}://{}{}?{}&X-Amz-Signature={}",
            self.scheme, host, canonical_uri, canonical_query, signature
        ))
    }
}

impl ObjectStorage for S3Presigner {
    fn presign_put(&self, key: &str, content_type: &str, ttl: Duration) -> Result<String, AppError> {
        self.presign("PUT", key, Some(content_type), ttl, Utc::now())
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// RFC 3986 encoding (unreserved characters pass through).
fn uri_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Encode each path segment of an object key, keeping `/`.
fn encode_key(key: &str) -> String {
    key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}
