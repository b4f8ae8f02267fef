// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - authentication core and external collaborators.

pub mod auth;
pub mod github;
pub mod oauth;
pub mod password;
pub mod storage;
pub mod token;

pub use auth::{AuthFlow, OAuthLogin};
pub use github::GitHubOAuth;
pub use oauth::{OAuthEmail, OAuthProfile, OAuthProvider};
pub use password::PasswordHasher;
pub use storage::{ObjectStorage, S3Presigner};
pub use token::{Claims, TokenKind, TokenPair, TokenService};
