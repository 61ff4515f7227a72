//! HTTP middleware.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry hub and HTTP transaction layers (binary only)
//! 2. CORS
//! 3. `TraceLayer` (`http_request` span)
//! 4. Request ID
//! 5. Body limit
//! 6. Rate limiting on generation and proxy routes (binary only)

pub mod rate_limit;
pub mod request_id;

pub use rate_limit::{generation_rate_limiter, proxy_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
