//! Holocron core library.
//!
//! Session lifecycle for the mock client-side login, plus the Star Wars API
//! client, models and filters used by the catalogue browser.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{SessionConfig, SessionManager, SessionPhase, SessionSnapshot};
pub use config::Config;
