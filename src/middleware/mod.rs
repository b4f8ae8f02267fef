// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, rate limiting).

pub mod auth;
pub mod rate_limit;

pub use auth::{require_auth, CurrentUser};
pub use rate_limit::{enforce_rate_limit, spawn_sweeper, RateDecision, RateLimiter};
