//! Client for the CV builder API.
//!
//! Calls made through [`ApiClient`] carry the access token automatically and
//! survive its expiry: a 401 triggers one refresh shared by every request
//! that hit it.

pub mod client;
pub mod error;
pub mod interceptor;

pub use client::ApiClient;
pub use error::ApiError;
pub use interceptor::{RefreshOutcome, SessionInterceptor, SessionState, TokenRefresher, UnauthorizedAction};
