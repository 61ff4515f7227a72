//! Printify REST payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Dashboard link for manually fixing a product in Printify.
#[must_use]
pub fn dashboard_url(product_id: &str) -> String {
    format!("https://printify.com/app/products/{product_id}")
}

// =============================================================================
// Uploads
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ImageUpload<'a> {
    pub file_name: &'a str,
    /// Base64 without the data URI prefix.
    pub contents: &'a str,
}

/// An image stored in the Printify media library.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedImage {
    pub id: String,
    pub file_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size: Option<u64>,
    pub mime_type: Option<String>,
    pub preview_url: Option<String>,
}

// =============================================================================
// Products
// =============================================================================

/// Print area on a t-shirt blueprint, keyed by the editor view name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Front,
    Back,
    LeftSleeve,
    RightSleeve,
    NeckLabel,
}

impl Placement {
    /// Map an editor view name (`front`, `leftSleeve`, ...) to a placement.
    #[must_use]
    pub fn from_view(view: &str) -> Option<Self> {
        match view {
            "front" => Some(Self::Front),
            "back" => Some(Self::Back),
            "leftSleeve" => Some(Self::LeftSleeve),
            "rightSleeve" => Some(Self::RightSleeve),
            "neckLabel" => Some(Self::NeckLabel),
            _ => None,
        }
    }

    /// Printify position name.
    #[must_use]
    pub const fn position(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Back => "back",
            Self::LeftSleeve => "left_sleeve",
            Self::RightSleeve => "right_sleeve",
            Self::NeckLabel => "label_inside",
        }
    }

    /// Sleeves are printed slightly smaller.
    #[must_use]
    pub const fn scale(self) -> f64 {
        match self {
            Self::LeftSleeve | Self::RightSleeve => 0.8,
            _ => 1.0,
        }
    }
}

/// An image placed on a print area, by library id or by URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedImage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub angle: f64,
}

impl PlacedImage {
    /// Centered image from the media library.
    #[must_use]
    pub const fn library(id: String, scale: f64) -> Self {
        Self {
            id: Some(id),
            url: None,
            x: 0.5,
            y: 0.5,
            scale,
            angle: 0.0,
        }
    }

    /// Centered full-size image fetched by Printify from a URL.
    #[must_use]
    pub const fn remote(url: String) -> Self {
        Self {
            id: None,
            url: Some(url),
            x: 0.5,
            y: 0.5,
            scale: 1.0,
            angle: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placeholder {
    pub position: String,
    pub images: Vec<PlacedImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrintArea {
    pub variant_ids: Vec<u64>,
    pub placeholders: Vec<Placeholder>,
}

/// A variant offered on a new product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: u64,
    /// Price in cents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
}

/// Body for creating a product.
#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub blueprint_id: u32,
    pub print_provider_id: u32,
    pub variants: Vec<ProductVariant>,
    pub print_areas: Vec<PrintArea>,
}

/// Build placeholders from uploaded image ids keyed by editor view.
///
/// Unknown views and empty ids are skipped. Placeholders follow the order of
/// `uploads`.
pub fn placeholders_for<'a, I>(uploads: I) -> Vec<Placeholder>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    uploads
        .into_iter()
        .filter(|(_, id)| !id.is_empty())
        .filter_map(|(view, id)| {
            let placement = Placement::from_view(view)?;
            Some(Placeholder {
                position: placement.position().to_string(),
                images: vec![PlacedImage::library(id.to_string(), placement.scale())],
            })
        })
        .collect()
}

/// A product as returned after creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedProduct {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub blueprint_id: Option<u32>,
    pub print_provider_id: Option<u32>,
    #[serde(default)]
    pub variants: Vec<Value>,
}

/// Partial product update.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

/// Which product fields a publish pushes to the connected store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishFields {
    pub title: bool,
    pub description: bool,
    pub images: bool,
    pub variants: bool,
    pub tags: bool,
    pub key_features: bool,
    pub shipping_template: bool,
}

impl PublishFields {
    /// Push the full listing.
    pub const LISTING: Self = Self {
        title: true,
        description: true,
        images: true,
        variants: true,
        tags: true,
        key_features: false,
        shipping_template: false,
    };

    /// Sync variants only, leaving an existing store listing untouched.
    pub const VARIANTS_ONLY: Self = Self {
        title: false,
        description: false,
        images: false,
        variants: true,
        tags: false,
        key_features: false,
        shipping_template: false,
    };
}

/// Response from a publish call.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishResult {
    #[serde(default)]
    pub external_id: Option<Value>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

impl PublishResult {
    /// Id of the linked store product, when the publish reached the store.
    #[must_use]
    pub fn external_id(&self) -> Option<String> {
        match self.external_id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A product mockup image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mockup {
    pub src: String,
    #[serde(default)]
    pub variant_ids: Vec<u64>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// A stored product.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub variants: Value,
    #[serde(default)]
    pub images: Vec<Mockup>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub is_locked: bool,
    pub blueprint_id: Option<u32>,
    pub print_provider_id: Option<u32>,
    #[serde(default)]
    pub print_areas: Value,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLineItem {
    pub variant_id: u64,
    pub quantity: u32,
    pub print_areas: Vec<PrintArea>,
}

impl OrderLineItem {
    /// A line item printing `design_url` on the front.
    #[must_use]
    pub fn front_print(variant_id: u64, quantity: u32, design_url: String) -> Self {
        Self {
            variant_id,
            quantity,
            print_areas: vec![PrintArea {
                variant_ids: vec![variant_id],
                placeholders: vec![Placeholder {
                    position: Placement::Front.position().to_string(),
                    images: vec![PlacedImage::remote(design_url)],
                }],
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    pub region: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub zip: String,
}

/// Body for creating an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrder {
    pub external_id: String,
    pub label: String,
    pub line_items: Vec<OrderLineItem>,
    /// Orders wait for manual approval.
    pub send_to_production: bool,
    pub shipping_method: u32,
    pub address_to: ShippingAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_map_views_and_scale_sleeves() {
        let placeholders = placeholders_for([
            ("front", "img-1"),
            ("leftSleeve", "img-2"),
            ("neckLabel", ""),
            ("pocket", "img-3"),
        ]);

        assert_eq!(placeholders.len(), 2);
        assert_eq!(placeholders[0].position, "front");
        assert!((placeholders[0].images[0].scale - 1.0).abs() < f64::EPSILON);
        assert_eq!(placeholders[1].position, "left_sleeve");
        assert!((placeholders[1].images[0].scale - 0.8).abs() < f64::EPSILON);
        assert_eq!(placeholders[1].images[0].id.as_deref(), Some("img-2"));
    }

    #[test]
    fn test_publish_fields_serialize_camel_case() {
        let json = serde_json::to_value(PublishFields::VARIANTS_ONLY).unwrap();
        assert_eq!(json["variants"], true);
        assert_eq!(json["title"], false);
        assert_eq!(json["keyFeatures"], false);
        assert_eq!(json["shippingTemplate"], false);
    }

    #[test]
    fn test_external_id_accepts_string_or_number() {
        let result: PublishResult =
            serde_json::from_value(serde_json::json!({"external_id": 8_123_456_789_u64}))
                .unwrap();
        assert_eq!(result.external_id().as_deref(), Some("8123456789"));

        let result: PublishResult =
            serde_json::from_value(serde_json::json!({"external_id": ""})).unwrap();
        assert_eq!(result.external_id(), None);

        let result: PublishResult = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(result.external_id(), None);
    }

    #[test]
    fn test_remote_image_omits_id() {
        let json = serde_json::to_value(PlacedImage::remote("https://x/y.png".into())).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["url"], "https://x/y.png");
        assert_eq!(json["x"], 0.5);
    }
}
