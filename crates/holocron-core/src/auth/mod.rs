//! Authentication module for the mock client-side session.
//!
//! This module provides:
//! - `SessionManager`: login/refresh/logout state machine with a silent
//!   refresh timer
//! - `TokenIssuer` / `MockTokenIssuer`: mints 15-minute token records
//! - `ExpiryPolicy`: refresh window opening 2 minutes before expiry
//! - `TokenStore`: single-slot persistence (file, keyring, memory, no-op)
//! - `CredentialValidator`: checks the fixed demo account

pub mod clock;
pub mod credentials;
pub mod error;
pub mod session;
pub mod store;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{CredentialValidator, StaticCredentials, DEMO_PASSWORD, DEMO_USERNAME};
pub use error::{AuthError, AuthResult};
pub use session::{
    RefreshOutcome, SessionConfig, SessionManager, SessionPhase, SessionSnapshot, SessionState,
};
pub use store::{
    open_token_store, FileTokenStore, KeyringTokenStore, MemoryTokenStore, NullTokenStore,
    TokenBackend, TokenStore,
};
pub use token::{ExpiryPolicy, MockTokenIssuer, TokenIssuer, TokenRecord};
