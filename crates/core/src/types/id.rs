//! Prefixed string IDs for type-safe entity references.
//!
//! Every record in the store is keyed by an opaque string such as
//! `cus_4F1C...` or `wli_09AB...`. The `define_id!` macro creates newtype
//! wrappers so IDs from different entity types cannot be mixed up.

use uuid::Uuid;

/// Build a new identifier for the given prefix: `{prefix}_{UUID}` where the
/// UUID is rendered as 32 upper-case hex characters.
#[must_use]
pub fn generate_prefixed(prefix: &str) -> String {
    let mut buf = Uuid::encode_buffer();
    let body = Uuid::new_v4().simple().encode_upper(&mut buf);
    format!("{prefix}_{body}")
}

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - `new()` for IDs received from clients or the database
/// - `generate()` for freshly minted IDs carrying the entity prefix
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use nextgen_core::define_id;
/// define_id!(ThingId, "thg");
///
/// let id = ThingId::generate();
/// assert!(id.as_str().starts_with("thg_"));
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix used by `generate()`.
            pub const PREFIX: &'static str = $prefix;

            /// Wrap an existing identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Mint a new identifier with this entity's prefix.
            #[must_use]
            pub fn generate() -> Self {
                Self($crate::types::id::generate_prefixed(Self::PREFIX))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the ID and returns its inner string.
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

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
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

// Commerce platform records (read and updated, not owned)
define_id!(CustomerId, "cus");
define_id!(ProductId, "prod");
define_id!(VariantId, "variant");
define_id!(RegionId, "reg");
define_id!(PriceListId, "plist");
define_id!(CartId, "cart");
define_id!(OrderId, "order");
define_id!(PaymentId, "pay");
define_id!(PaymentSessionId, "payses");

// Custom modules
define_id!(WishlistId, "wls");
define_id!(WishlistItemId, "wli");
define_id!(ReviewId, "prv");
define_id!(CategoryBannerId, "cbn");
define_id!(ProductBannerId, "pbn");
define_id!(SpecialOfferBannerId, "sob");

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uses_prefix() {
        let id = WishlistId::generate();
        assert!(id.as_str().starts_with("wls_"));
        assert_eq!(id.as_str().len(), "wls_".len() + 32);
    }

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(ReviewId::generate(), ReviewId::generate());
    }

    #[test]
    fn test_generated_body_is_upper_hex() {
        let id = CustomerId::generate();
        let body = id.as_str().strip_prefix("cus_").unwrap();
        assert!(
            body.chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = OrderId::new("order_123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"order_123\"");
        let parsed: OrderId = serde_json::from_str("\"order_123\"").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_display() {
        let id = ProductId::new("prod_abc");
        assert_eq!(id.to_string(), "prod_abc");
    }
}
