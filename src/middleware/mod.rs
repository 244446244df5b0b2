//! Middleware module - Session gate and rate limiting

pub mod auth;
pub mod rate_limit;

pub use auth::SessionGateLayer;
pub use rate_limit::RateLimitLayer;
