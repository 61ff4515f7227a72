//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Responses are JSON objects with
//! `success: false` and a user-facing `error`, plus diagnostic fields where the
//! category carries them. Server-side failures are captured to Sentry before
//! responding.

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::printify::PrintifyError;
use crate::shopify::ShopifyError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request failed validation; the message is shown to the user.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Creator has used up their monthly allowance.
    #[error("Monthly token limit reached ({used}/{limit})")]
    QuotaExceeded { limit: i64, used: i64 },

    /// Signature or credential check failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A vendor this endpoint needs has no credentials.
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// A vendor answered with an error status, which is passed through.
    #[error("{error}: upstream {status} - {details}")]
    Upstream {
        status: StatusCode,
        error: String,
        details: String,
    },

    /// An operation failed; `message` carries the underlying cause.
    #[error("{error}: {message}")]
    Failed { error: String, message: String },
}

impl AppError {
    /// A failed operation with a user-facing summary and a diagnostic message.
    pub fn failed(error: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Failed {
            error: error.into(),
            message: message.to_string(),
        }
    }

    /// Translate a Printify failure, reporting `error` as the summary.
    pub fn printify(error: &str, err: PrintifyError) -> Self {
        match err {
            PrintifyError::Api { status, message } => Self::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                error: error.to_string(),
                details: message,
            },
            other => Self::failed(error, other),
        }
    }

    /// Translate a Shopify failure, reporting `error` as the summary.
    pub fn shopify(error: &str, err: ShopifyError) -> Self {
        match err {
            ShopifyError::Api { status, message } => Self::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                error: error.to_string(),
                details: message,
            },
            ShopifyError::MissingAdminToken => {
                Self::NotConfigured("Admin API token not configured".to_string())
            }
            other => Self::failed(error, other),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotConfigured(_) | Self::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { status, .. } => *status,
        }
    }

    fn body(self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(false));
        match self {
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::NotFound(msg)
            | Self::NotConfigured(msg) => {
                body.insert("error".to_string(), msg.into());
            }
            Self::QuotaExceeded { limit, used } => {
                body.insert(
                    "error".to_string(),
                    "Monthly token limit reached. Please contact support.".into(),
                );
                body.insert("limit".to_string(), limit.into());
                body.insert("used".to_string(), used.into());
            }
            Self::Upstream {
                status,
                error,
                details,
            } => {
                body.insert("error".to_string(), error.into());
                body.insert("status".to_string(), status.as_u16().into());
                body.insert("details".to_string(), details.into());
            }
            Self::Failed { error, message } => {
                body.insert("error".to_string(), error.into());
                body.insert("message".to_string(), message.into());
            }
        }
        body
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(Value::Object(self.body()))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// JSON body extractor whose rejections use the API error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// A `{ success: true, ...fields }` body.
#[must_use]
pub fn success(fields: Value) -> Json<Value> {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    if let Value::Object(fields) = fields {
        body.extend(fields);
    }
    Json(Value::Object(body))
}

/// Add a breadcrumb for a request milestone.
///
/// Breadcrumbs appear in Sentry error reports to show the steps that led up
/// to an error.
pub fn add_breadcrumb(category: &str, message: &str) {
    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_bad_request_envelope() {
        let response = AppError::BadRequest("Missing imageData".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "error": "Missing imageData"})
        );
    }

    #[tokio::test]
    async fn test_quota_envelope() {
        let response = AppError::QuotaExceeded {
            limit: 1000,
            used: 1200,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["limit"], 1000);
        assert_eq!(body["used"], 1200);
        assert_eq!(
            body["error"],
            "Monthly token limit reached. Please contact support."
        );
    }

    #[tokio::test]
    async fn test_upstream_status_passes_through() {
        let err = AppError::printify(
            "Failed to fetch Printify product",
            PrintifyError::Api {
                status: 404,
                message: "Not found".into(),
            },
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["status"], 404);
        assert_eq!(body["details"], "Not found");
        assert_eq!(body["error"], "Failed to fetch Printify product");
    }

    #[tokio::test]
    async fn test_missing_admin_token_is_config_error() {
        let response = AppError::shopify("Failed to fetch collection", ShopifyError::MissingAdminToken)
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"],
            "Admin API token not configured"
        );
    }

    #[test]
    fn test_success_merges_fields() {
        let Json(body) = success(json!({"imageUrl": "data:image/png;base64,AA"}));
        assert_eq!(body, json!({"success": true, "imageUrl": "data:image/png;base64,AA"}));
    }
}
