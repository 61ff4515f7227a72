//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.
//!
//! IDs in this system are opaque strings handed to us by clients (creator
//! account IDs, client-generated design IDs). Because they end up in storage
//! paths and database keys, parsing restricts them to a conservative charset.

/// Errors that can occur when parsing an ID.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[A-Za-z0-9_-]`.
    #[error("id contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Maximum length of any string ID.
pub const MAX_ID_LENGTH: usize = 128;

/// Validate a raw ID string.
///
/// # Errors
///
/// Returns an error if the input is empty, longer than [`MAX_ID_LENGTH`], or
/// contains anything other than ASCII letters, digits, `-` and `_`.
pub fn validate_id(s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }
    if s.len() > MAX_ID_LENGTH {
        return Err(IdError::TooLong {
            max: MAX_ID_LENGTH,
        });
    }
    if let Some(c) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(IdError::InvalidCharacter(c));
    }
    Ok(())
}

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - `parse()` (validated), `as_str()`, `into_inner()`
/// - `Display` and `FromStr` implementations
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use tshirt_studio_core::define_id;
/// define_id!(CreatorId);
/// define_id!(DesignId);
///
/// let creator = CreatorId::parse("u_123").unwrap();
/// let design = DesignId::parse("u_123").unwrap();
///
/// // These are different types, so this won't compile:
/// // let _: CreatorId = design;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Parse an ID, validating length and charset.
            ///
            /// # Errors
            ///
            /// Returns an error if the value is not a valid ID.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::types::id::IdError> {
                $crate::types::id::validate_id(s)?;
                Ok(Self(s.to_owned()))
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <String as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <String as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

// Creator account that designs are generated for and metered against
define_id!(CreatorId);
// Client-generated identifier of a saved design
define_id!(DesignId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_ids() {
        assert_eq!(CreatorId::parse("abc123").unwrap().as_str(), "abc123");
        assert_eq!(
            DesignId::parse("design_1-final").unwrap().to_string(),
            "design_1-final"
        );
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(CreatorId::parse(""), Err(IdError::Empty));
    }

    #[test]
    fn test_parse_rejects_path_characters() {
        assert_eq!(
            DesignId::parse("../etc/passwd"),
            Err(IdError::InvalidCharacter('.'))
        );
        assert_eq!(DesignId::parse("a/b"), Err(IdError::InvalidCharacter('/')));
    }

    #[test]
    fn test_parse_rejects_too_long() {
        let long = "a".repeat(MAX_ID_LENGTH + 1);
        assert!(matches!(
            CreatorId::parse(&long),
            Err(IdError::TooLong { .. })
        ));
    }

    #[test]
    fn test_serde_transparent() {
        let id: DesignId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
