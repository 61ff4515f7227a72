//! Image provider errors.
//!
//! Vendor clients classify every failure into a [`ProviderErrorKind`] at the
//! point where the vendor's response is understood. Callers switch on the kind
//! and never inspect the message text.

use thiserror::Error;

/// What went wrong with a provider call, independent of vendor wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The vendor's content or safety policy rejected the prompt or image.
    ContentPolicy,
    /// The vendor rejected the input (unsupported image, bad parameter).
    InvalidInput,
    /// Credentials were rejected.
    Auth,
    /// The vendor throttled the request.
    RateLimited,
    /// Any other non-success answer from the vendor.
    Upstream,
    /// The request never completed (connect error, timeout, decode failure).
    Transport,
    /// The vendor answered successfully but returned no image or text.
    EmptyResponse,
}

impl ProviderErrorKind {
    /// Stable name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContentPolicy => "content_policy",
            Self::InvalidInput => "invalid_input",
            Self::Auth => "auth",
            Self::RateLimited => "rate_limited",
            Self::Upstream => "upstream",
            Self::Transport => "transport",
            Self::EmptyResponse => "empty_response",
        }
    }

    /// Classify an HTTP status when the body carries no better signal.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 | 415 | 422 => Self::InvalidInput,
            401 | 403 => Self::Auth,
            429 => Self::RateLimited,
            _ => Self::Upstream,
        }
    }
}

/// A failed call to an image or vision provider.
#[derive(Debug, Error)]
#[error("{provider} {}: {message}", kind.as_str())]
pub struct ProviderError {
    /// Failure classification.
    pub kind: ProviderErrorKind,
    /// Which provider failed (e.g. `openai`).
    pub provider: &'static str,
    /// HTTP status from the vendor, when there was one.
    pub status: Option<u16>,
    /// Vendor message for diagnostics.
    pub message: String,
}

impl ProviderError {
    /// Create an error without an HTTP status.
    #[must_use]
    pub fn new(provider: &'static str, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider,
            status: None,
            message: message.into(),
        }
    }

    /// Create an error from a vendor HTTP answer.
    #[must_use]
    pub fn http(
        provider: &'static str,
        kind: ProviderErrorKind,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            provider,
            status: Some(status),
            message: message.into(),
        }
    }

    /// Wrap a transport-level `reqwest` failure.
    #[must_use]
    pub fn transport(provider: &'static str, err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        Self {
            kind: ProviderErrorKind::Transport,
            provider,
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }

    /// Whether the vendor refused on content or safety grounds.
    #[must_use]
    pub fn is_content_policy(&self) -> bool {
        self.kind == ProviderErrorKind::ContentPolicy
    }
}
