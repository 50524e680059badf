//! REST API client module for the Star Wars API.
//!
//! This module provides the `ApiClient` for fetching paginated character
//! records and the planets they reference. The API is public, so requests
//! carry no session token.

pub mod client;
pub mod error;

pub use client::{ApiClient, DEFAULT_API_BASE_URL};
pub use error::ApiError;
