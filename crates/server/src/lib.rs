//! NextGen commerce server library.
//!
//! Store, admin and auth HTTP API: banners, reviews, wishlists, payment
//! cards and intents, order completion and cancellation, one-time password
//! sign-in and object storage uploads. Exposed as a library so the binary
//! and tests share one router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
