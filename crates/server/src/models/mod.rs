//! Domain models for the commerce API.
//!
//! Row types derive `sqlx::FromRow` and `Serialize`, so repositories return
//! them directly and routes render them as JSON without a separate DTO layer.

pub mod banner;
pub mod catalog;
pub mod customer;
pub mod order;
pub mod review;
pub mod wishlist;

pub use banner::{
    CategoryBanner, NewCategoryBanner, NewProductBanner, NewSpecialOfferBanner, ProductBanner,
    SpecialOfferBanner,
};
pub use catalog::{
    CalculatedPrice, PriceList, PriceRow, Product, ProductVariant, ProductWithVariants, Region,
    VariantWithPrice,
};
pub use customer::{Customer, NewCustomer};
pub use order::{Cart, Order, Payment};
pub use review::{NewReview, ProductReview};
pub use wishlist::{Wishlist, WishlistItem};
