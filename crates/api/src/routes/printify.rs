//! Printify proxy routes.
//!
//! Products are created in Printify, published to the connected Shopify
//! store, then decorated on the Shopify side. Decoration steps never fail
//! a publish that already reached the store.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use crate::error::{ApiJson, AppError, Result, add_breadcrumb, success};
use crate::printify::{
    NewProduct, PrintArea, PrintifyClient, PrintifyError, ProductUpdate, ProductVariant,
    PublishFields, dashboard_url, placeholders_for,
};
use crate::shopify::{NewMetafield, ShopifyClient};
use crate::state::AppState;

const DEFAULT_FILE_NAME: &str = "design.png";
const DEFAULT_DESCRIPTION: &str = "Custom designed t-shirt";
const PUBLISH_TAGS: [&str; 2] = ["custom-design", "creator-original"];

fn printify_client(state: &AppState) -> Result<&PrintifyClient> {
    state
        .printify()
        .ok_or_else(|| AppError::NotConfigured("Printify credentials not configured".to_string()))
}

/// Printify ids are opaque hex strings; anything else never reaches a URL.
fn product_id(raw: Option<&str>, field: &str) -> Result<String> {
    match raw.filter(|id| !id.is_empty()) {
        None => Err(AppError::BadRequest(format!("Missing {field}"))),
        Some(id) if id.chars().all(|c| c.is_ascii_alphanumeric()) => Ok(id.to_string()),
        Some(_) => Err(AppError::BadRequest(format!("Invalid {field}"))),
    }
}

/// Base64 payload of an image that may or may not carry a data URI prefix.
fn base64_payload(data: &str) -> &str {
    data.split_once(',').map_or(data, |(_, payload)| payload)
}

// =============================================================================
// Uploads
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageRequest {
    #[serde(default)]
    image_data: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    creator_id: Option<String>,
}

fn upload_file_name(file_name: Option<&str>, creator_id: Option<&str>) -> String {
    let file_name = file_name
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_FILE_NAME);
    match creator_id.filter(|c| !c.is_empty()) {
        Some(creator) => format!("creator-{creator}-{file_name}"),
        None => file_name.to_string(),
    }
}

/// `POST /api/printify/upload-image`
#[instrument(skip_all)]
pub async fn upload_image(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UploadImageRequest>,
) -> Result<Json<Value>> {
    let image_data = body
        .image_data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing imageData".to_string()))?;
    let printify = printify_client(&state)?;

    let contents = base64_payload(&image_data);
    if contents.is_empty() {
        return Err(AppError::BadRequest("Invalid imageData".to_string()));
    }
    let file_name = upload_file_name(body.file_name.as_deref(), body.creator_id.as_deref());

    let image = printify
        .upload_image(&file_name, contents)
        .await
        .map_err(|e| AppError::printify("Failed to upload image to Printify", e))?;

    Ok(success(json!({
        "imageId": image.id,
        "fileName": image.file_name,
        "width": image.width,
        "height": image.height,
        "size": image.size,
        "mimeType": image.mime_type,
        "previewUrl": image.preview_url,
    })))
}

// =============================================================================
// Products
// =============================================================================

/// Uploaded library image ids keyed by editor view.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImageIds {
    front: Option<String>,
    back: Option<String>,
    left_sleeve: Option<String>,
    right_sleeve: Option<String>,
    neck_label: Option<String>,
}

impl UploadedImageIds {
    fn views(&self) -> impl Iterator<Item = (&str, &str)> {
        [
            ("front", &self.front),
            ("back", &self.back),
            ("leftSleeve", &self.left_sleeve),
            ("rightSleeve", &self.right_sleeve),
            ("neckLabel", &self.neck_label),
        ]
        .into_iter()
        .filter_map(|(view, id)| id.as_deref().map(|id| (view, id)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    uploaded_image_ids: Option<UploadedImageIds>,
    #[serde(default)]
    variants: Vec<ProductVariant>,
    #[serde(default)]
    blueprint_id: Option<u32>,
    #[serde(default)]
    print_provider_id: Option<u32>,
}

/// `POST /api/printify/create-product`
#[instrument(skip_all)]
pub async fn create_product(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateProductRequest>,
) -> Result<Json<Value>> {
    let (Some(title), Some(uploads)) = (
        body.title.filter(|t| !t.is_empty()),
        body.uploaded_image_ids,
    ) else {
        return Err(AppError::BadRequest(
            "Missing required fields: title, uploadedImageIds, or variants".to_string(),
        ));
    };
    if body.variants.is_empty() {
        return Err(AppError::BadRequest(
            "Missing required fields: title, uploadedImageIds, or variants".to_string(),
        ));
    }
    let printify = printify_client(&state)?;

    let placeholders = placeholders_for(uploads.views());
    if placeholders.is_empty() {
        return Err(AppError::BadRequest(
            "No valid designs to apply. Please upload at least one design.".to_string(),
        ));
    }

    let product = NewProduct {
        title,
        description: body
            .description
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        blueprint_id: body.blueprint_id.unwrap_or_else(|| printify.blueprint_id()),
        print_provider_id: body
            .print_provider_id
            .unwrap_or_else(|| printify.print_provider_id()),
        print_areas: vec![PrintArea {
            variant_ids: body.variants.iter().map(|v| v.id).collect(),
            placeholders,
        }],
        variants: body.variants,
    };

    let created = printify
        .create_product(&product)
        .await
        .map_err(|e| AppError::printify("Failed to create Printify product", e))?;

    Ok(success(json!({
        "productId": created.id,
        "title": created.title,
        "description": created.description,
        "createdAt": created.created_at,
        "blueprintId": created.blueprint_id,
        "printProviderId": created.print_provider_id,
        "variantsCount": created.variants.len(),
    })))
}

/// `GET /api/printify/product/{id}`
#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = product_id(Some(id.as_str()), "product ID")?;
    let product = printify_client(&state)?
        .get_product(&id)
        .await
        .map_err(|e| AppError::printify("Failed to fetch Printify product", e))?;

    Ok(success(json!({
        "product": {
            "id": product.id,
            "title": product.title,
            "description": product.description,
            "tags": product.tags,
            "variants": product.variants,
            "images": product.images,
            "mockups": product.images,
            "createdAt": product.created_at,
            "updatedAt": product.updated_at,
            "visible": product.visible,
            "isLocked": product.is_locked,
            "blueprintId": product.blueprint_id,
            "printProviderId": product.print_provider_id,
            "printAreas": product.print_areas,
        }
    })))
}

// =============================================================================
// Publishing
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct EditorImage {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    view: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    #[serde(default)]
    printify_product_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    creator_id: Option<String>,
    #[serde(default)]
    editor_images: Vec<EditorImage>,
}

/// Storefront URL for a product handle. The store URL may be configured
/// with a trailing `/admin`.
fn storefront_product_url(store_url: &str, handle: &str) -> String {
    format!("{}/products/{handle}", store_url.replace("/admin", ""))
}

/// Shopify-side decoration for a freshly published creator product.
///
/// Every step logs and continues on failure.
async fn decorate_creator_product(
    shopify: &ShopifyClient,
    shopify_product_id: &str,
    printify_product_id: &str,
    creator_id: &str,
    title: &str,
    editor_images: &[EditorImage],
) {
    match shopify.creator_collections(creator_id).await {
        Ok(found) => match found.creator {
            Some(collection) => {
                if let Err(e) = shopify
                    .add_to_collection(shopify_product_id, collection.id)
                    .await
                {
                    warn!(error = %e, collection_id = collection.id, "Failed to add product to creator collection");
                }
            }
            None => debug!(creator_id, "No creator collection found"),
        },
        Err(e) => warn!(error = %e, "Failed to look up creator collections"),
    }

    for image in editor_images {
        let Some(data) = image.data.as_deref().filter(|d| !d.is_empty()) else {
            continue;
        };
        let view = image.view.as_deref().unwrap_or("design view");
        let alt = format!("{title} - {view}");
        if let Err(e) = shopify
            .add_product_image(shopify_product_id, base64_payload(data), &alt)
            .await
        {
            warn!(error = %e, view, "Failed to add editor image");
        }
    }

    let metafields = [
        NewMetafield::text("printify", "product_id", printify_product_id),
        NewMetafield::text("custom", "creator_id", creator_id),
    ];
    for metafield in &metafields {
        if let Err(e) = shopify
            .add_product_metafield(shopify_product_id, metafield)
            .await
        {
            warn!(error = %e, key = %metafield.key, "Failed to add product metafield");
        }
    }
}

/// `POST /api/printify/publish-to-shopify`
#[instrument(skip_all)]
pub async fn publish_to_shopify(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PublishRequest>,
) -> Result<Json<Value>> {
    let printify_product_id = product_id(body.printify_product_id.as_deref(), "printifyProductId")?;
    let printify = printify_client(&state)?;
    let shopify = state
        .shopify()
        .filter(|s| s.has_admin_token())
        .ok_or_else(|| AppError::NotConfigured("Shopify credentials not configured".to_string()))?;
    let publish_failed = |e: PrintifyError| AppError::failed("Failed to publish to Shopify", e);

    let mut tags = body.tags;
    tags.extend(PUBLISH_TAGS.iter().map(ToString::to_string));
    printify
        .update_product(
            &printify_product_id,
            &ProductUpdate {
                title: body.title.clone(),
                description: body.description,
                tags: Some(tags),
                visible: Some(true),
            },
        )
        .await
        .map_err(publish_failed)?;

    match printify.get_product(&printify_product_id).await {
        Ok(product) if product.is_locked => {
            warn!("Product is locked, mockups may still be generating");
        }
        Ok(_) => {}
        Err(e) => debug!(error = %e, "Could not check product lock state"),
    }

    let published = printify
        .publish_product(&printify_product_id, PublishFields::LISTING)
        .await
        .map_err(publish_failed)?;
    add_breadcrumb("printify", "Published product to Shopify");

    let Some(shopify_product_id) = published.external_id() else {
        warn!(response = ?published.rest, "Publish returned no external_id");
        return Ok(Json(json!({
            "success": false,
            "error": "Product created in Printify but failed to publish to Shopify",
            "message": "Please check your Printify-Shopify connection and try publishing manually from Printify dashboard",
            "printifyProductId": printify_product_id,
            "printifyDashboardUrl": dashboard_url(&printify_product_id),
            "details": Value::Object(published.rest),
        })));
    };

    if let Some(creator_id) = body.creator_id.as_deref().filter(|c| !c.is_empty()) {
        decorate_creator_product(
            shopify,
            &shopify_product_id,
            &printify_product_id,
            creator_id,
            body.title.as_deref().unwrap_or_default(),
            &body.editor_images,
        )
        .await;
    }

    let product_url = match shopify.product_handle(&shopify_product_id).await {
        Ok(handle) => Some(storefront_product_url(shopify.store_url(), &handle)),
        Err(e) => {
            warn!(error = %e, "Failed to fetch product handle");
            None
        }
    };

    info!(shopify_product_id = %shopify_product_id, "Published product to Shopify");
    Ok(success(json!({
        "message": "Product published to Shopify successfully",
        "printifyProductId": printify_product_id,
        "shopifyProductId": shopify_product_id,
        "productUrl": product_url,
        "adminUrl": format!("{}/admin/products/{shopify_product_id}", shopify.store_url()),
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest {
    #[serde(default)]
    printify_product_id: Option<String>,
    #[serde(default)]
    shopify_product_id: Option<Value>,
}

/// `POST /api/printify/link-to-shopify`: connect a Printify product to an
/// existing Shopify product for fulfillment, syncing variants only.
#[instrument(skip_all)]
pub async fn link_to_shopify(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LinkRequest>,
) -> Result<Response> {
    let printify_product_id = product_id(body.printify_product_id.as_deref(), "printifyProductId")?;
    let printify = printify_client(&state)?;
    let link_failed = "Failed to link Printify product to Shopify";
    debug!(
        printify_product_id = %printify_product_id,
        shopify_product_id = ?body.shopify_product_id,
        "Linking product for fulfillment"
    );

    printify
        .update_product(
            &printify_product_id,
            &ProductUpdate {
                visible: Some(true),
                ..ProductUpdate::default()
            },
        )
        .await
        .map_err(|e| AppError::failed(link_failed, e))?;

    let published = match printify
        .publish_product(&printify_product_id, PublishFields::VARIANTS_ONLY)
        .await
    {
        Ok(published) => published,
        Err(PrintifyError::Api { status, message }) => {
            warn!(status, "Printify rejected the link");
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            return Ok((
                status,
                Json(json!({
                    "success": false,
                    "error": link_failed,
                    "details": message,
                    "message": "Product was created in Shopify but Printify linking failed. You may need to manually connect them in Printify dashboard.",
                    "printifyDashboardUrl": dashboard_url(&printify_product_id),
                })),
            )
                .into_response());
        }
        Err(e) => return Err(AppError::failed(link_failed, e)),
    };

    let Some(linked_id) = published.external_id() else {
        warn!("Link returned no external_id");
        return Ok(Json(json!({
            "success": false,
            "warning": "Link completed but no Shopify ID returned",
            "message": "Please verify the connection in Printify dashboard",
            "printifyDashboardUrl": dashboard_url(&printify_product_id),
        }))
        .into_response());
    };

    info!(shopify_product_id = %linked_id, "Linked Printify product");
    Ok(success(json!({
        "message": "Printify product successfully linked to Shopify for auto-fulfillment",
        "printifyProductId": printify_product_id,
        "shopifyProductId": linked_id,
        "note": "Orders on this Shopify product will now auto-route to Printify for fulfillment",
    }))
    .into_response())
}

// =============================================================================
// Catalog
// =============================================================================

/// `GET /api/printify/variants`
#[instrument(skip(state))]
pub async fn variants(State(state): State<AppState>) -> Result<Json<Value>> {
    let catalog = printify_client(&state)?
        .blueprint_variants()
        .await
        .map_err(|e| AppError::printify("Failed to fetch Printify variants", e))?;

    let mut body = match catalog.data.as_ref() {
        Value::Object(fields) => fields.clone(),
        other => {
            let mut wrapped = Map::new();
            wrapped.insert("data".to_string(), other.clone());
            wrapped
        }
    };
    body.insert("cached".to_string(), catalog.cached.into());
    if catalog.cached {
        body.insert("cachedAt".to_string(), catalog.fetched_at.to_rfc3339().into());
    }
    Ok(Json(Value::Object(body)))
}

/// `POST /api/printify/variants/clear-cache`
#[instrument(skip(state))]
pub async fn clear_variant_cache(State(state): State<AppState>) -> Result<Json<Value>> {
    printify_client(&state)?.clear_variant_cache().await;
    Ok(Json(json!({ "message": "Cache cleared successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_file_name() {
        assert_eq!(upload_file_name(None, None), "design.png");
        assert_eq!(upload_file_name(Some("front.png"), None), "front.png");
        assert_eq!(
            upload_file_name(None, Some("u_42")),
            "creator-u_42-design.png"
        );
        assert_eq!(
            upload_file_name(Some("back.png"), Some("u_42")),
            "creator-u_42-back.png"
        );
    }

    #[test]
    fn test_base64_payload_strips_prefix() {
        assert_eq!(base64_payload("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(base64_payload("AAAA"), "AAAA");
    }

    #[test]
    fn test_product_id_validation() {
        assert_eq!(
            product_id(Some("65f1a2b3c4"), "printifyProductId").ok(),
            Some("65f1a2b3c4".to_string())
        );
        assert!(matches!(
            product_id(None, "printifyProductId"),
            Err(AppError::BadRequest(msg)) if msg == "Missing printifyProductId"
        ));
        assert!(product_id(Some("../shops"), "printifyProductId").is_err());
    }

    #[test]
    fn test_uploaded_views_keep_editor_order() {
        let ids: UploadedImageIds = serde_json::from_value(json!({
            "neckLabel": "n1",
            "front": "f1",
            "leftSleeve": "l1",
        }))
        .unwrap();
        let views: Vec<_> = ids.views().collect();
        assert_eq!(
            views,
            vec![("front", "f1"), ("leftSleeve", "l1"), ("neckLabel", "n1")]
        );
    }

    #[test]
    fn test_storefront_product_url_drops_admin() {
        assert_eq!(
            storefront_product_url("https://shop.myshopify.com/admin", "cool-tee"),
            "https://shop.myshopify.com/products/cool-tee"
        );
        assert_eq!(
            storefront_product_url("https://shop.myshopify.com", "cool-tee"),
            "https://shop.myshopify.com/products/cool-tee"
        );
    }
}
