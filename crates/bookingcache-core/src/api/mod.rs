//! API-facing types shared by every fetcher.
//!
//! This module provides the `ApiResponse` envelope that the cache stores and
//! hands back to consumers, the `ApiError` taxonomy recorded on failures, and
//! (with the `http` feature) an `ApiClient` that turns JSON GET endpoints into
//! cache fetchers.

#[cfg(feature = "http")]
pub mod client;
pub mod error;
pub mod messages;
pub mod response;

#[cfg(feature = "http")]
pub use client::ApiClient;
pub use error::{ApiError, FieldError};
pub use response::ApiResponse;
