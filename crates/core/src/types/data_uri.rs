//! Base64 data URI type.

use core::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors that can occur when parsing a [`DataUri`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DataUriError {
    /// The input does not start with `data:`.
    #[error("data URI must start with \"data:\"")]
    MissingScheme,
    /// The input has no `;base64,` marker.
    #[error("data URI must be base64 encoded")]
    NotBase64,
    /// The MIME type is empty.
    #[error("data URI MIME type cannot be empty")]
    EmptyMime,
    /// Nothing follows the comma.
    #[error("data URI payload cannot be empty")]
    EmptyPayload,
    /// The payload is not valid base64.
    #[error("data URI payload is not valid base64: {0}")]
    InvalidPayload(String),
}

/// A base64 `data:` URI, e.g. `data:image/png;base64,iVBORw0KGgo=`.
///
/// The payload is kept in its encoded form; [`DataUri::decode`] produces the
/// raw bytes on demand. Parsing checks structure only, so a payload that is
/// never decoded is never validated as base64.
///
/// ## Examples
///
/// ```
/// use tshirt_studio_core::DataUri;
///
/// let uri = DataUri::parse("data:image/png;base64,aGVsbG8=").unwrap();
/// assert_eq!(uri.mime(), "image/png");
/// assert_eq!(uri.format(), Some("png"));
/// assert_eq!(uri.decode().unwrap(), b"hello");
///
/// assert!(DataUri::parse("https://example.com/a.png").is_err());
/// assert!(DataUri::parse("data:image/png;base64,").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataUri {
    mime: String,
    payload: String,
}

impl DataUri {
    /// Parse a data URI from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not `data:<mime>;base64,<payload>`
    /// with a non-empty MIME type and payload.
    pub fn parse(s: &str) -> Result<Self, DataUriError> {
        let rest = s.strip_prefix("data:").ok_or(DataUriError::MissingScheme)?;
        let (mime, payload) = rest
            .split_once(";base64,")
            .ok_or(DataUriError::NotBase64)?;

        if mime.trim().is_empty() {
            return Err(DataUriError::EmptyMime);
        }
        if payload.trim().is_empty() {
            return Err(DataUriError::EmptyPayload);
        }

        Ok(Self {
            mime: mime.trim().to_ascii_lowercase(),
            payload: payload.trim().to_owned(),
        })
    }

    /// Build a data URI by encoding raw bytes.
    #[must_use]
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        Self {
            mime: mime.to_ascii_lowercase(),
            payload: STANDARD.encode(bytes),
        }
    }

    /// Build a data URI from an already base64-encoded payload.
    ///
    /// # Errors
    ///
    /// Returns an error if either part is empty.
    pub fn from_base64(mime: &str, payload: &str) -> Result<Self, DataUriError> {
        if mime.trim().is_empty() {
            return Err(DataUriError::EmptyMime);
        }
        if payload.trim().is_empty() {
            return Err(DataUriError::EmptyPayload);
        }
        Ok(Self {
            mime: mime.trim().to_ascii_lowercase(),
            payload: payload.trim().to_owned(),
        })
    }

    /// The MIME type, lowercased (e.g. `image/png`).
    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// The base64 payload without the `data:...;base64,` prefix.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Whether the MIME type is an `image/*` type.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    /// The image format taken from the MIME subtype (`image/png` -> `png`).
    ///
    /// Returns `None` for non-image MIME types and for subtypes that are not
    /// a plain word, such as `svg+xml`.
    #[must_use]
    pub fn format(&self) -> Option<&str> {
        let subtype = self.mime.strip_prefix("image/")?;
        let plain = !subtype.is_empty()
            && subtype
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        plain.then_some(subtype)
    }

    /// Decode the payload into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, DataUriError> {
        STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|e| DataUriError::InvalidPayload(e.to_string()))
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime, self.payload)
    }
}

impl std::str::FromStr for DataUri {
    type Err = DataUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DataUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DataUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
