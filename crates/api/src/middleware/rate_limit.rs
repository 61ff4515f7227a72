//! Rate limiting using governor and `tower_governor`.
//!
//! Generation endpoints call paid vendors and get a strict per-IP budget.
//! Clients are keyed on proxy headers (`X-Forwarded-For`, `X-Real-IP`,
//! `Forwarded`) and fall back to the peer address, so the server must be run
//! with `into_make_service_with_connect_info`.

use std::sync::Arc;

use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<SmartIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Rate limiter for image generation: ~10 requests per minute per IP.
///
/// # Panics
///
/// Does not panic; `per_second(6)` and `burst_size(5)` are valid settings.
#[must_use]
pub fn generation_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .per_second(6) // one token every 6 seconds
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Rate limiter for vendor proxies: ~60 requests per minute per IP.
///
/// # Panics
///
/// Does not panic; `per_second(1)` and `burst_size(30)` are valid settings.
#[must_use]
pub fn proxy_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .per_second(1)
        .burst_size(30)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(30) is valid");
    GovernorLayer::new(Arc::new(config))
}
