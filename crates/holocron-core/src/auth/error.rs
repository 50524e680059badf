use thiserror::Error;

/// Failures inside the session subsystem.
///
/// None of these escape to the UI as errors. `InvalidCredentials` becomes
/// the session's `error` message, `RefreshFailure` becomes a forced logout,
/// and the two store variants are logged and treated as an empty store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token refresh failed: {0}")]
    RefreshFailure(String),

    #[error("stored token is unreadable: {0}")]
    StoreCorrupt(String),

    #[error("token storage unavailable: {0}")]
    StoreUnavailable(String),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;
