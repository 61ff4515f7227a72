//! Finished design storage.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};
use tshirt_studio_core::{DataUri, DesignId};

use crate::error::{ApiJson, AppError, Result, success};
use crate::state::AppState;

/// Browser storage key the editor keeps designs under.
pub const LOCAL_STORAGE_KEY: &str = "tshirt_designs_backup";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDesignRequest {
    #[serde(default)]
    design_data: Option<String>,
    #[serde(default)]
    design_id: Option<String>,
    #[serde(default)]
    size: Option<String>,
}

/// Size of decoded design bytes in whole kilobytes, rounding halves up.
const fn size_kb(byte_len: usize) -> usize {
    (byte_len + 512) / 1024
}

#[allow(clippy::cast_precision_loss)]
fn size_mb(byte_len: usize) -> String {
    format!("{:.2}", byte_len as f64 / 1024.0 / 1024.0)
}

/// `POST /api/upload-design`: store a finished design in blob storage.
#[instrument(skip(state, body))]
pub async fn upload_design(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UploadDesignRequest>,
) -> Result<Json<Value>> {
    let (Some(data), Some(id)) = (
        body.design_data.filter(|d| !d.is_empty()),
        body.design_id.filter(|d| !d.is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "Missing designData or designId".to_string(),
        ));
    };

    let design_id =
        DesignId::parse(&id).map_err(|e| AppError::BadRequest(format!("Invalid designId: {e}")))?;

    let invalid = || AppError::BadRequest("Invalid design data format".to_string());
    let uri = DataUri::parse(&data).map_err(|_| invalid())?;
    if !uri.is_image() {
        return Err(invalid());
    }
    let bytes = uri.decode().map_err(|_| invalid())?;

    let store = state
        .blob()
        .ok_or_else(|| AppError::NotConfigured("Design storage not configured".to_string()))?;

    let format = uri.format().unwrap_or("jpeg");
    let pathname = format!("designs/{design_id}.{format}");
    let byte_len = bytes.len();

    let stored = store
        .put(&pathname, uri.mime(), bytes)
        .await
        .map_err(|e| AppError::failed("Failed to process design upload", e))?;

    info!(
        design_id = %design_id,
        pathname = %stored.pathname,
        size_kb = size_kb(byte_len),
        "Stored design"
    );

    Ok(success(json!({
        "designId": design_id,
        "designUrl": stored.url,
        "sizeKB": size_kb(byte_len),
        "sizeMB": size_mb(byte_len),
        "format": format,
        "size": body.size.unwrap_or_else(|| "M".to_string()),
        "message": "Design stored successfully",
    })))
}

#[derive(Debug, Deserialize)]
pub struct GetDesignQuery {
    id: Option<String>,
}

/// `GET /api/get-design?id=`: designs are never looked up server-side, so
/// this always points the caller at the browser copy.
pub async fn get_design(Query(query): Query<GetDesignQuery>) -> Response {
    let Some(id) = query.id.filter(|id| !id.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "Missing design ID parameter",
                "usage": "/api/get-design?id=YOUR_DESIGN_ID",
            })),
        )
            .into_response();
    };

    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "designId": id,
            "message": "Design may be in browser localStorage",
            "fallback": {
                "key": LOCAL_STORAGE_KEY,
                "instructions": [
                    "Designs are kept in the customer's browser localStorage",
                    format!("Read the \"{LOCAL_STORAGE_KEY}\" key in the browser that created the design"),
                    "Uploaded designs are available at the designUrl returned by /api/upload-design",
                ],
            },
        })),
    )
        .into_response()
}
