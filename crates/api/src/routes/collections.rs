//! Creator collection management on the Shopify Admin API.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{error, info, instrument, warn};

use crate::error::{ApiJson, AppError, Result, success};
use crate::shopify::{
    CollectionKind, CreatorProfile, CustomCollection, NewCollection, ProductSummary, ShopifyClient,
    ShopifyError,
};
use crate::state::AppState;

const ADMIN_TOKEN_MISSING: &str = "Admin API token not configured";

/// The Shopify client, if it can make Admin API calls.
fn admin_client(state: &AppState) -> Result<&ShopifyClient> {
    state
        .shopify()
        .filter(|s| s.has_admin_token())
        .ok_or_else(|| AppError::NotConfigured(ADMIN_TOKEN_MISSING.to_string()))
}

fn collection_id(raw: &str) -> Result<&str> {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        Ok(raw)
    } else {
        Err(AppError::BadRequest("Invalid collection ID".to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestTokenRequest {
    #[serde(default)]
    access_token: Option<String>,
}

/// `POST /api/shopify/test-token`: check a token against the Admin API.
#[instrument(skip_all)]
pub async fn test_token(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TestTokenRequest>,
) -> Result<Response> {
    let token = body
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("No access token provided".to_string()))?;
    let shopify = state
        .shopify()
        .ok_or_else(|| AppError::NotConfigured("Shopify configuration missing".to_string()))?;

    let valid = shopify
        .verify_token(&token)
        .await
        .map_err(|e| AppError::failed("Failed to verify token", e))?;

    let response = if valid {
        Json(json!({ "valid": true })).into_response()
    } else {
        (
            StatusCode::FORBIDDEN,
            Json(json!({
                "valid": false,
                "error": "Token invalid or insufficient permissions",
            })),
        )
            .into_response()
    };
    Ok(response)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionsRequest {
    creator_data: Option<CreatorProfile>,
}

fn collection_result(result: std::result::Result<CustomCollection, ShopifyError>) -> Value {
    match result {
        Ok(collection) => json!({
            "success": true,
            "collectionId": collection.id,
            "collectionTitle": collection.title,
            "collectionHandle": collection.handle,
        }),
        Err(e) => json!({
            "success": false,
            "error": e.to_string(),
        }),
    }
}

/// `POST /api/shopify/collections`: create a creator's two collections.
///
/// Each collection is attempted independently and reported on its own.
#[instrument(skip_all)]
pub async fn create_collections(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateCollectionsRequest>,
) -> Result<Response> {
    let profile = body
        .creator_data
        .ok_or_else(|| AppError::BadRequest("Missing creatorData".to_string()))?;

    let Some(shopify) = state.shopify().filter(|s| s.has_admin_token()) else {
        let failed = json!({ "success": false, "error": ADMIN_TOKEN_MISSING });
        return Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "creatorCollection": failed,
                "communityCollection": failed,
                "allSuccessful": false,
            })),
        )
            .into_response());
    };

    let creator = shopify
        .create_collection(&NewCollection::for_creator(&profile, CollectionKind::Creator))
        .await;
    let community = shopify
        .create_collection(&NewCollection::for_creator(
            &profile,
            CollectionKind::Community,
        ))
        .await;

    let all_successful = creator.is_ok() && community.is_ok();
    if all_successful {
        info!(creator = %profile.uid, "Created creator collections");
    } else {
        error!(
            creator = %profile.uid,
            creator_error = ?creator.as_ref().err(),
            community_error = ?community.as_ref().err(),
            "Failed to create some collections"
        );
    }

    Ok(Json(json!({
        "creatorCollection": collection_result(creator),
        "communityCollection": collection_result(community),
        "allSuccessful": all_successful,
    }))
    .into_response())
}

async fn summaries(
    shopify: &ShopifyClient,
    collection: Option<u64>,
    kind: CollectionKind,
) -> std::result::Result<Vec<ProductSummary>, ShopifyError> {
    let Some(id) = collection else {
        return Ok(Vec::new());
    };
    Ok(shopify
        .collection_products(id)
        .await?
        .into_iter()
        .map(|p| ProductSummary::from_admin(p, kind))
        .collect())
}

/// `GET /api/shopify/creator-products/{creator_id}`
#[instrument(skip(state))]
pub async fn creator_products(
    State(state): State<AppState>,
    Path(creator_id): Path<String>,
) -> Result<Json<Value>> {
    let shopify = admin_client(&state)?;
    let fetch_failed = |e| AppError::shopify("Failed to fetch products", e);

    let collections = shopify
        .creator_collections(&creator_id)
        .await
        .map_err(fetch_failed)?;

    if collections.creator.is_none() && collections.community.is_none() {
        return Ok(Json(json!({
            "creatorProducts": [],
            "communityProducts": [],
            "message": "No collections found for this creator",
        })));
    }

    let (creator, community) = tokio::try_join!(
        summaries(
            shopify,
            collections.creator.map(|c| c.id),
            CollectionKind::Creator
        ),
        summaries(
            shopify,
            collections.community.map(|c| c.id),
            CollectionKind::Community
        ),
    )
    .map_err(fetch_failed)?;

    info!(
        creator_products = creator.len(),
        community_products = community.len(),
        "Fetched creator products"
    );
    Ok(Json(json!({
        "creatorProducts": creator,
        "communityProducts": community,
    })))
}

/// `GET /api/shopify/collection/{id}`
#[instrument(skip(state))]
pub async fn get_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = collection_id(&id)?;
    let collection = admin_client(&state)?
        .get_collection(id)
        .await
        .map_err(|e| AppError::shopify("Failed to fetch collection", e))?;
    Ok(Json(json!({ "collection": collection })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCollectionRequest {
    #[serde(default)]
    updates: Map<String, Value>,
}

/// `PUT /api/shopify/collection/{id}`
#[instrument(skip(state, body))]
pub async fn update_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateCollectionRequest>,
) -> Result<Json<Value>> {
    let id = collection_id(&id)?;
    if body.updates.is_empty() {
        warn!(collection_id = id, "Collection update with no fields");
    }
    let collection = admin_client(&state)?
        .update_collection(id, body.updates)
        .await
        .map_err(|e| AppError::shopify("Failed to update collection", e))?;
    Ok(Json(json!({ "collection": collection })))
}

/// `DELETE /api/shopify/collection/{id}`
#[instrument(skip(state))]
pub async fn delete_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = collection_id(&id)?;
    admin_client(&state)?
        .delete_collection(id)
        .await
        .map_err(|e| AppError::shopify("Failed to delete collection", e))?;
    info!(collection_id = id, "Deleted collection");
    Ok(success(json!({ "message": "Collection deleted successfully" })))
}
