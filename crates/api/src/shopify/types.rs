//! Shopify Admin REST and webhook payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Image shown for products that have none.
pub const PLACEHOLDER_PRODUCT_IMAGE: &str = "/placeholder-tshirt.jpg";

/// Metafield namespace for creator collection tags.
pub const CREATOR_NAMESPACE: &str = "creator";

// =============================================================================
// OAuth
// =============================================================================

/// Result of an authorization code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub scope: String,
}

// =============================================================================
// Collections
// =============================================================================

/// Which of a creator's two collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// Designs made by the creator.
    Creator,
    /// Designs made by fans with the creator's tool.
    Community,
}

impl CollectionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Community => "community",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "creator" => Some(Self::Creator),
            "community" => Some(Self::Community),
            _ => None,
        }
    }
}

/// Creator profile sent when provisioning collections.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorProfile {
    pub uid: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub business_name: String,
}

/// A custom collection as returned by the Admin API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomCollection {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub handle: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMetafield {
    pub namespace: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl NewMetafield {
    /// A single-line text metafield.
    #[must_use]
    pub fn text(namespace: &str, key: &str, value: impl Into<String>) -> Self {
        Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
            value: value.into(),
            kind: "single_line_text_field",
        }
    }
}

/// Body of a custom collection create call.
#[derive(Debug, Clone, Serialize)]
pub struct NewCollection {
    pub title: String,
    pub body_html: String,
    pub published: bool,
    pub sort_order: &'static str,
    pub metafields: Vec<NewMetafield>,
}

impl NewCollection {
    /// The collection of `kind` for a creator, tagged with creator metafields.
    #[must_use]
    pub fn for_creator(profile: &CreatorProfile, kind: CollectionKind) -> Self {
        let business = &profile.business_name;
        let (title, description) = match kind {
            CollectionKind::Creator => (
                format!("{business} - Original Designs"),
                format!(
                    "Original designs created by {} {} from {business}",
                    profile.first_name, profile.last_name
                ),
            ),
            CollectionKind::Community => (
                format!("{business} - Community Designs"),
                format!("Community designs created by fans using {business}'s AI design tool"),
            ),
        };

        Self {
            title,
            body_html: format!("<p>{description}</p>"),
            published: true,
            sort_order: "manual",
            metafields: vec![
                NewMetafield::text(CREATOR_NAMESPACE, "creator_id", &profile.uid),
                NewMetafield::text(CREATOR_NAMESPACE, "creator_email", &profile.email),
                NewMetafield::text(CREATOR_NAMESPACE, "collection_type", kind.as_str()),
            ],
        }
    }
}

/// A stored metafield.
#[derive(Debug, Clone, Deserialize)]
pub struct Metafield {
    pub namespace: String,
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl Metafield {
    /// Whether this is `namespace.key` holding the string `value`.
    #[must_use]
    pub fn is(&self, namespace: &str, key: &str, value: &str) -> bool {
        self.namespace == namespace && self.key == key && self.value.as_str() == Some(value)
    }
}

/// Which creator collection, if any, a metafield set marks.
#[must_use]
pub fn creator_collection_kind(metafields: &[Metafield], creator_id: &str) -> Option<CollectionKind> {
    let owned = metafields
        .iter()
        .any(|m| m.is(CREATOR_NAMESPACE, "creator_id", creator_id));
    if !owned {
        return None;
    }
    metafields
        .iter()
        .find(|m| m.namespace == CREATOR_NAMESPACE && m.key == "collection_type")
        .and_then(|m| m.value.as_str())
        .and_then(CollectionKind::parse)
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AdminVariant {
    #[serde(default)]
    pub price: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminImage {
    pub src: String,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

/// A product from the Admin API.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminProduct {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub variants: Vec<AdminVariant>,
    #[serde(default)]
    pub images: Vec<AdminImage>,
}

/// Product card data returned to the creator dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: u64,
    pub title: String,
    pub handle: String,
    pub price: String,
    pub image: String,
    pub images: Vec<AdminImage>,
    pub status: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub tags: Option<String>,
    /// Set for community products.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_name: Option<String>,
}

impl ProductSummary {
    #[must_use]
    pub fn from_admin(product: AdminProduct, kind: CollectionKind) -> Self {
        let price = product
            .variants
            .first()
            .and_then(|v| v.price.clone())
            .unwrap_or_else(|| "0.00".to_string());
        let image = product
            .images
            .first()
            .map_or_else(|| PLACEHOLDER_PRODUCT_IMAGE.to_string(), |i| i.src.clone());
        let fan_name = (kind == CollectionKind::Community).then(|| {
            product
                .vendor
                .clone()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "Unknown Fan".to_string())
        });

        Self {
            id: product.id,
            title: product.title,
            handle: product.handle,
            price,
            image,
            images: product.images,
            status: product.status,
            created_at: product.created_at,
            updated_at: product.updated_at,
            vendor: product.vendor,
            product_type: product.product_type,
            tags: product.tags,
            fan_name,
        }
    }
}

// =============================================================================
// Webhook orders
// =============================================================================

/// Subset of an `orders/create` webhook body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookOrder {
    pub id: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub line_items: Vec<WebhookLineItem>,
    #[serde(default)]
    pub shipping_address: Option<WebhookAddress>,
    #[serde(default)]
    pub billing_address: Option<WebhookAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookLineItem {
    #[serde(default)]
    pub variant_id: Option<Value>,
    #[serde(default)]
    pub quantity: Option<u32>,
    /// Either `{name, value}` objects or `[name, value]` pairs.
    #[serde(default)]
    pub properties: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookAddress {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub country_code: Option<String>,
    pub province: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

/// JSON scalar rendered the way it appears in a lookup key.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> CreatorProfile {
        CreatorProfile {
            uid: "uid-1".into(),
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            business_name: "Engines".into(),
        }
    }

    #[test]
    fn test_creator_collection_payload() {
        let collection = NewCollection::for_creator(&profile(), CollectionKind::Creator);
        assert_eq!(collection.title, "Engines - Original Designs");
        assert_eq!(
            collection.body_html,
            "<p>Original designs created by Ada Lovelace from Engines</p>"
        );

        let json = serde_json::to_value(&collection).unwrap();
        assert_eq!(json["sort_order"], "manual");
        assert_eq!(json["metafields"][0]["key"], "creator_id");
        assert_eq!(json["metafields"][0]["value"], "uid-1");
        assert_eq!(json["metafields"][2]["value"], "creator");
        assert_eq!(json["metafields"][2]["type"], "single_line_text_field");
    }

    #[test]
    fn test_community_collection_payload() {
        let collection = NewCollection::for_creator(&profile(), CollectionKind::Community);
        assert_eq!(collection.title, "Engines - Community Designs");
        assert_eq!(
            collection.body_html,
            "<p>Community designs created by fans using Engines's AI design tool</p>"
        );
    }

    #[test]
    fn test_collection_kind_from_metafields() {
        let metafields: Vec<Metafield> = serde_json::from_value(json!([
            {"namespace": "creator", "key": "creator_id", "value": "uid-1"},
            {"namespace": "creator", "key": "collection_type", "value": "community"},
        ]))
        .unwrap();

        assert_eq!(
            creator_collection_kind(&metafields, "uid-1"),
            Some(CollectionKind::Community)
        );
        assert_eq!(creator_collection_kind(&metafields, "uid-2"), None);
    }

    #[test]
    fn test_product_summary_defaults() {
        let product: AdminProduct = serde_json::from_value(json!({
            "id": 7,
            "title": "Tee",
            "handle": "tee",
            "vendor": "",
        }))
        .unwrap();

        let summary = ProductSummary::from_admin(product, CollectionKind::Community);
        assert_eq!(summary.price, "0.00");
        assert_eq!(summary.image, PLACEHOLDER_PRODUCT_IMAGE);
        assert_eq!(summary.fan_name.as_deref(), Some("Unknown Fan"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["fanName"], "Unknown Fan");
    }

    #[test]
    fn test_creator_product_has_no_fan_name() {
        let product: AdminProduct = serde_json::from_value(json!({
            "id": 7,
            "title": "Tee",
            "variants": [{"price": "24.99"}],
            "images": [{"src": "https://cdn/x.png", "position": 1}],
        }))
        .unwrap();

        let summary = ProductSummary::from_admin(product, CollectionKind::Creator);
        assert_eq!(summary.price, "24.99");
        assert_eq!(summary.image, "https://cdn/x.png");
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("fanName").is_none());
        assert_eq!(json["images"][0]["position"], 1);
    }
}
