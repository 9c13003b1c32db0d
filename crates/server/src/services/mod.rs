//! Business logic and provider clients.
//!
//! # Providers
//!
//! - `stripe` - Payment intents, refunds, customers and saved cards
//! - `storage` - S3-compatible image storage with `SigV4` signing
//! - `sms` - Twilio text messages for mobile OTP
//! - `email` - `SendGrid` mail for password-reset OTP
//! - `google` - Google ID token verification
//!
//! # Flows
//!
//! - `checkout` - Order completion and cancellation with refunds
//! - `otp` - Short-lived one-time codes keyed by phone or email
//! - `token` - Customer and password-reset JWTs
//! - `reviews` - Review summaries and statistics
//! - `wishlists` - Wishlist pages, creation, add and delete
//! - `offers` - Calculated prices and price-list products

pub mod checkout;
pub mod email;
pub mod google;
pub mod offers;
pub mod otp;
pub mod reviews;
pub mod sms;
pub mod storage;
pub mod stripe;
pub mod token;
pub mod wishlists;

pub use checkout::{CheckoutError, PgOrderLedger};
pub use email::{EmailClient, EmailError};
pub use google::{GoogleAuthError, GoogleVerifier};
pub use offers::{OfferError, PriceListCache};
pub use otp::{OtpError, OtpLength, OtpStore};
pub use sms::{SmsClient, SmsError};
pub use storage::{ObjectStorage, StorageError};
pub use stripe::{StripeClient, StripeError};
pub use token::{TokenError, TokenIssuer};
pub use wishlists::WishlistError;
