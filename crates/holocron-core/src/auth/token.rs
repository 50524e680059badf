use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::clock::Clock;
use super::error::AuthResult;

/// How long an issued token stays valid.
pub const SESSION_LIFETIME_MINUTES: i64 = 15;

/// How long before expiry the silent refresh window opens.
pub const REFRESH_LEAD_MINUTES: i64 = 2;

/// Length of the random part of refresh handles
const REFRESH_SUFFIX_LEN: usize = 9;

/// Length of the random part of opaque tokens
const TOKEN_SUFFIX_LEN: usize = 32;

/// One issued session token.
///
/// Records are never edited in place; a refresh replaces the whole record.
/// Serialized with camelCase keys to match the persisted slot layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub token: String,
    /// Milliseconds since the Unix epoch
    pub expires_at: i64,
    pub refresh_token: String,
}

impl TokenRecord {
    pub fn millis_until_expiry(&self, now_millis: i64) -> i64 {
        self.expires_at - now_millis
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, now_millis: i64) -> i64 {
        Duration::milliseconds(self.millis_until_expiry(now_millis))
            .num_minutes()
            .max(0)
    }
}

/// Decides when a token is expired or due for refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    refresh_lead: Duration,
}

impl ExpiryPolicy {
    pub fn new(refresh_lead: Duration) -> Self {
        Self { refresh_lead }
    }

    /// True once `now` has entered the refresh window before `expires_at`.
    pub fn is_due(&self, expires_at: i64, now: i64) -> bool {
        now >= expires_at - self.refresh_lead.num_milliseconds()
    }

    /// True once `now` has reached `expires_at` itself.
    pub fn is_expired(&self, expires_at: i64, now: i64) -> bool {
        now >= expires_at
    }

    pub fn refresh_lead(&self) -> Duration {
        self.refresh_lead
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::new(Duration::minutes(REFRESH_LEAD_MINUTES))
    }
}

/// Mints token records.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Issue a record for a freshly validated login. Cannot fail.
    async fn issue(&self) -> TokenRecord;

    /// Trade a refresh handle for a successor record.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenRecord>;
}

/// Local issuer for the demo session.
///
/// `refresh` accepts any handle, including ones it never issued, so it
/// never returns `RefreshFailure`. A real auth service behind the same
/// trait would reject unknown or revoked handles.
pub struct MockTokenIssuer {
    clock: Arc<dyn Clock>,
    lifetime: Duration,
    refresh_latency: StdDuration,
}

impl MockTokenIssuer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            lifetime: Duration::minutes(SESSION_LIFETIME_MINUTES),
            refresh_latency: StdDuration::ZERO,
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Simulate a round trip to an auth service on refresh
    pub fn with_refresh_latency(mut self, latency: StdDuration) -> Self {
        self.refresh_latency = latency;
        self
    }

    fn mint(&self) -> TokenRecord {
        let now = self.clock.now_millis();
        let record = TokenRecord {
            token: format!("tok-{}-{}", now, random_suffix(TOKEN_SUFFIX_LEN)),
            expires_at: now + self.lifetime.num_milliseconds(),
            refresh_token: format!("refresh-{}-{}", now, random_suffix(REFRESH_SUFFIX_LEN)),
        };
        debug!(expires_at = record.expires_at, "Minted token record");
        record
    }
}

#[async_trait]
impl TokenIssuer for MockTokenIssuer {
    async fn issue(&self) -> TokenRecord {
        self.mint()
    }

    async fn refresh(&self, _refresh_token: &str) -> AuthResult<TokenRecord> {
        if !self.refresh_latency.is_zero() {
            tokio::time::sleep(self.refresh_latency).await;
        }
        Ok(self.mint())
    }
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
