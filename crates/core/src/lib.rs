//! NextGen Core - Shared domain types.
//!
//! This crate provides the types shared by every NextGen component:
//! - `server` - Store, admin and auth HTTP API
//! - `cli` - Command-line tools for migrations and local tokens
//! - `integration-tests` - Tests against a running server
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Prefixed IDs, emails, mobile numbers, money, ratings,
//!   pagination and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
