use std::time::Duration;

use async_trait::async_trait;

/// Demo account accepted by the mock validator
pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "password123";

/// Checks a username/password pair.
///
/// A mismatch is a normal `false`, never an error.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, username: &str, password: &str) -> bool;
}

/// Validates against one fixed, out-of-band credential pair.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    username: String,
    password: String,
    latency: Duration,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            latency: Duration::ZERO,
        }
    }

    /// The `demo` / `password123` account
    pub fn demo() -> Self {
        Self::new(DEMO_USERNAME, DEMO_PASSWORD)
    }

    /// Simulate a round trip to an auth service before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn matches(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }
}

impl Default for StaticCredentials {
    fn default() -> Self {
        Self::demo()
    }
}

#[async_trait]
impl CredentialValidator for StaticCredentials {
    async fn validate(&self, username: &str, password: &str) -> bool {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.matches(username, password)
    }
}
