// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod item;
pub mod portfolio;
pub mod resume;
pub mod user;

pub use item::{Item, ItemInput};
pub use portfolio::{Portfolio, PortfolioCreate, PortfolioUpdate};
pub use resume::{Resume, ResumeCreate, ResumeUpdate, ResumeView};
pub use user::{AuthProvider, SubscriptionTier, User, UserPatch, UserView};
