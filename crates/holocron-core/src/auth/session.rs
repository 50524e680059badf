//! Session lifecycle: startup resolution, login, silent refresh, logout.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::credentials::{CredentialValidator, StaticCredentials};
use super::error::AuthError;
use super::store::TokenStore;
use super::token::{
    ExpiryPolicy, MockTokenIssuer, TokenIssuer, TokenRecord, SESSION_LIFETIME_MINUTES,
};

/// How often the refresh timer checks the current token.
/// Coarser than the refresh lead time, so the window is never missed.
pub const REFRESH_CHECK_INTERVAL_SECS: u64 = 60;

/// Simulated validation round trip for the demo account
const LOGIN_LATENCY_MS: u64 = 500;

/// Simulated refresh round trip for the demo issuer
const REFRESH_LATENCY_MS: u64 = 300;

/// Shown to the user after a rejected login
pub const INVALID_CREDENTIALS_MESSAGE: &str =
    "Invalid credentials. Use username: \"demo\", password: \"password123\"";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime of tokens minted by the demo issuer
    pub session_lifetime: chrono::Duration,
    pub check_interval: Duration,
    /// Carries the refresh lead time
    pub expiry: ExpiryPolicy,
    pub login_latency: Duration,
    pub refresh_latency: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_lifetime: chrono::Duration::minutes(SESSION_LIFETIME_MINUTES),
            check_interval: Duration::from_secs(REFRESH_CHECK_INTERVAL_SECS),
            expiry: ExpiryPolicy::default(),
            login_latency: Duration::from_millis(LOGIN_LATENCY_MS),
            refresh_latency: Duration::from_millis(REFRESH_LATENCY_MS),
        }
    }
}

impl SessionConfig {
    /// Default timings with no simulated network latency
    pub fn immediate() -> Self {
        Self {
            login_latency: Duration::ZERO,
            refresh_latency: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// The token store has not been consulted yet
    Unknown,
    Unauthenticated,
    /// A login is in flight
    Authenticating,
    Authenticated(TokenRecord),
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Unknown => SessionPhase::Unknown,
            SessionState::Unauthenticated => SessionPhase::Unauthenticated,
            SessionState::Authenticating => SessionPhase::Authenticating,
            SessionState::Authenticated(_) => SessionPhase::Authenticated,
        }
    }
}

/// `SessionState` without the token, for consumers outside the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unknown,
    Unauthenticated,
    Authenticating,
    Authenticated,
}

impl SessionPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Unknown => "unknown",
            SessionPhase::Unauthenticated => "signed out",
            SessionPhase::Authenticating => "signing in",
            SessionPhase::Authenticated => "signed in",
        }
    }
}

/// What the UI observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Result of one periodic refresh check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    NotAuthenticated,
    NotDue,
    Refreshed,
    /// The issuer could not refresh and the session was ended
    LoggedOut,
    /// The session changed while the refresh was in flight; result dropped
    Superseded,
    /// The manager has been disposed
    Disposed,
}

struct Inner {
    state: SessionState,
    error: Option<String>,
    /// Bumped whenever a session starts or ends, so stale async work can tell
    epoch: u64,
    refresh_task: Option<JoinHandle<()>>,
    disposed: bool,
}

impl Inner {
    fn snapshot(&self) -> SessionSnapshot {
        let phase = self.state.phase();
        SessionSnapshot {
            phase,
            is_authenticated: phase == SessionPhase::Authenticated,
            is_loading: matches!(phase, SessionPhase::Unknown | SessionPhase::Authenticating),
            error: self.error.clone(),
        }
    }

    fn cancel_refresh_timer(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
    }
}

struct Shared {
    validator: Arc<dyn CredentialValidator>,
    issuer: Arc<dyn TokenIssuer>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    inner: Mutex<Inner>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.snapshot_tx.send_replace(inner.snapshot());
    }

    /// Drop the current session everywhere: memory, store and timer.
    fn end_session(&self, inner: &mut Inner) {
        inner.cancel_refresh_timer();
        inner.state = SessionState::Unauthenticated;
        inner.epoch += 1;
        self.store.clear();
        self.publish(inner);
    }

    async fn check_and_refresh(&self) -> RefreshOutcome {
        let (epoch, refresh_token) = {
            let inner = self.lock();
            if inner.disposed {
                return RefreshOutcome::Disposed;
            }
            let SessionState::Authenticated(record) = &inner.state else {
                return RefreshOutcome::NotAuthenticated;
            };
            if !self
                .config
                .expiry
                .is_due(record.expires_at, self.clock.now_millis())
            {
                return RefreshOutcome::NotDue;
            }
            (inner.epoch, record.refresh_token.clone())
        };

        debug!("Token inside refresh window, refreshing");
        let result = self.issuer.refresh(&refresh_token).await;

        let mut inner = self.lock();
        let still_current = !inner.disposed
            && inner.epoch == epoch
            && matches!(&inner.state, SessionState::Authenticated(r) if r.refresh_token == refresh_token);
        if !still_current {
            debug!("Session changed during refresh, discarding result");
            return RefreshOutcome::Superseded;
        }

        match result {
            Ok(record) => {
                self.store.save(&record);
                inner.state = SessionState::Authenticated(record);
                self.publish(&inner);
                info!("Session token refreshed");
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                warn!(error = %e, "Silent refresh failed, logging out");
                self.end_session(&mut inner);
                RefreshOutcome::LoggedOut
            }
        }
    }
}

/// Owns the session and is the only writer to the token store.
///
/// Share it behind an `Arc`. Dropping the last handle stops the refresh
/// timer without touching the stored token.
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl SessionManager {
    pub fn new(
        validator: Arc<dyn CredentialValidator>,
        issuer: Arc<dyn TokenIssuer>,
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        let inner = Inner {
            state: SessionState::Unknown,
            error: None,
            epoch: 0,
            refresh_task: None,
            disposed: false,
        };
        let (snapshot_tx, _) = watch::channel(inner.snapshot());

        Self {
            shared: Arc::new(Shared {
                validator,
                issuer,
                store,
                clock,
                config,
                inner: Mutex::new(inner),
                snapshot_tx,
            }),
        }
    }

    /// Manager for the demo account with the mock issuer and system clock.
    pub fn demo(store: Arc<dyn TokenStore>, config: SessionConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let validator = StaticCredentials::demo().with_latency(config.login_latency);
        let issuer = MockTokenIssuer::new(Arc::clone(&clock))
            .with_lifetime(config.session_lifetime)
            .with_refresh_latency(config.refresh_latency);
        Self::new(Arc::new(validator), Arc::new(issuer), store, clock, config)
    }

    /// Resolve the startup state from the token store. Runs once; later
    /// calls, and calls after `dispose`, do nothing.
    pub fn initialize(&self) {
        let shared = &self.shared;
        let mut inner = shared.lock();
        if inner.disposed || inner.state != SessionState::Unknown {
            return;
        }

        match shared.store.load() {
            None => {
                debug!("No stored token");
                inner.state = SessionState::Unauthenticated;
            }
            Some(record)
                if shared
                    .config
                    .expiry
                    .is_expired(record.expires_at, shared.clock.now_millis()) =>
            {
                info!("Stored token expired, clearing");
                shared.store.clear();
                inner.state = SessionState::Unauthenticated;
            }
            Some(record) => {
                info!("Restored session from stored token");
                inner.state = SessionState::Authenticated(record);
                inner.epoch += 1;
                Self::arm_refresh_timer(shared, &mut inner);
            }
        }
        shared.publish(&inner);
    }

    /// Sign in. Returns whether the session is now authenticated.
    ///
    /// Rejected credentials are an expected outcome: they set `error` and
    /// return `false`.
    pub async fn login(&self, username: &str, password: &str) -> bool {
        self.initialize();
        let shared = &self.shared;

        let epoch = {
            let mut inner = shared.lock();
            if inner.disposed {
                return false;
            }
            match inner.state {
                SessionState::Authenticated(_) => {
                    debug!("Login requested while already authenticated");
                    return true;
                }
                SessionState::Authenticating => {
                    warn!("Login already in progress");
                    return false;
                }
                SessionState::Unknown | SessionState::Unauthenticated => {}
            }
            inner.state = SessionState::Authenticating;
            inner.error = None;
            inner.epoch += 1;
            shared.publish(&inner);
            inner.epoch
        };

        info!(username, "Login attempt");
        let record = if shared.validator.validate(username, password).await {
            Some(shared.issuer.issue().await)
        } else {
            None
        };

        let mut inner = shared.lock();
        if inner.disposed || inner.epoch != epoch {
            debug!("Login superseded before it completed");
            return false;
        }

        let Some(record) = record else {
            info!(error = %AuthError::InvalidCredentials, "Login failed");
            inner.error = Some(INVALID_CREDENTIALS_MESSAGE.to_string());
            inner.state = SessionState::Unauthenticated;
            shared.publish(&inner);
            return false;
        };

        shared.store.save(&record);
        inner.state = SessionState::Authenticated(record);
        Self::arm_refresh_timer(shared, &mut inner);
        shared.publish(&inner);
        info!("Login successful");
        true
    }

    /// Sign out from any state. Always succeeds.
    pub fn logout(&self) {
        info!("Logout triggered");
        let mut inner = self.shared.lock();
        self.shared.end_session(&mut inner);
    }

    /// Run one periodic check now. The refresh timer calls this on every
    /// tick; it does nothing unless the token is inside its refresh window.
    pub async fn check_and_refresh(&self) -> RefreshOutcome {
        self.shared.check_and_refresh().await
    }

    /// Stop the refresh timer for good. The stored token is kept.
    pub fn dispose(&self) {
        let mut inner = self.shared.lock();
        if inner.disposed {
            return;
        }
        debug!("Disposing session manager");
        inner.disposed = true;
        inner.epoch += 1;
        inner.cancel_refresh_timer();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock().snapshot()
    }

    /// Watch the session snapshot for changes
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.lock().state.phase()
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == SessionPhase::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.phase(),
            SessionPhase::Unknown | SessionPhase::Authenticating
        )
    }

    pub fn error(&self) -> Option<String> {
        self.shared.lock().error.clone()
    }

    /// Minutes left on the current token, if signed in
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        let now = self.shared.clock.now_millis();
        match &self.shared.lock().state {
            SessionState::Authenticated(record) => Some(record.minutes_until_expiry(now)),
            _ => None,
        }
    }

    #[cfg(test)]
    fn state(&self) -> SessionState {
        self.shared.lock().state.clone()
    }

    #[cfg(test)]
    fn has_refresh_timer(&self) -> bool {
        self.shared.lock().refresh_task.is_some()
    }

    fn arm_refresh_timer(shared: &Arc<Shared>, inner: &mut Inner) {
        inner.cancel_refresh_timer();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, silent refresh disabled");
            return;
        };
        let weak = Arc::downgrade(shared);
        let period = shared.config.check_interval;
        inner.refresh_task = Some(runtime.spawn(run_refresh_timer(weak, period)));
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn run_refresh_timer(shared: Weak<Shared>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        match shared.check_and_refresh().await {
            // A manual check may have refreshed first; the session lives on
            RefreshOutcome::NotDue | RefreshOutcome::Refreshed | RefreshOutcome::Superseded => {}
            RefreshOutcome::NotAuthenticated
            | RefreshOutcome::LoggedOut
            | RefreshOutcome::Disposed => break,
        }
    }
    debug!("Refresh timer stopped");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::auth::error::AuthResult;
    use crate::auth::store::{FileTokenStore, MemoryTokenStore};

    const NOW: i64 = 1_700_000_000_000;
    const LIFETIME_MS: i64 = 15 * 60 * 1000;
    const LEAD_MS: i64 = 2 * 60 * 1000;

    /// Wraps the mock issuer, counting refreshes and optionally failing them
    struct TestIssuer {
        inner: MockTokenIssuer,
        fail_refresh: bool,
        refreshes: AtomicUsize,
    }

    impl TestIssuer {
        fn new(clock: &ManualClock, fail_refresh: bool, latency: Duration) -> Self {
            Self {
                inner: MockTokenIssuer::new(Arc::new(clock.clone())).with_refresh_latency(latency),
                fail_refresh,
                refreshes: AtomicUsize::new(0),
            }
        }

        fn refresh_count(&self) -> usize {
            self.refreshes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenIssuer for TestIssuer {
        async fn issue(&self) -> TokenRecord {
            self.inner.issue().await
        }

        async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenRecord> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.fail_refresh {
                return Err(AuthError::RefreshFailure("backend rejected handle".to_string()));
            }
            self.inner.refresh(refresh_token).await
        }
    }

    struct Harness {
        clock: ManualClock,
        issuer: Arc<TestIssuer>,
        store: Arc<MemoryTokenStore>,
        manager: SessionManager,
    }

    fn harness_with(store: MemoryTokenStore, fail_refresh: bool, config: SessionConfig) -> Harness {
        let clock = ManualClock::new(NOW);
        let issuer = Arc::new(TestIssuer::new(&clock, fail_refresh, config.refresh_latency));
        let store = Arc::new(store);
        let validator = StaticCredentials::demo().with_latency(config.login_latency);
        let manager = SessionManager::new(
            Arc::new(validator),
            issuer.clone(),
            store.clone(),
            Arc::new(clock.clone()),
            config,
        );
        Harness {
            clock,
            issuer,
            store,
            manager,
        }
    }

    fn harness() -> Harness {
        harness_with(MemoryTokenStore::new(), false, SessionConfig::immediate())
    }

    fn record_expiring_at(expires_at: i64) -> TokenRecord {
        TokenRecord {
            token: "tok-stored".to_string(),
            expires_at,
            refresh_token: "refresh-stored".to_string(),
        }
    }

    // -------------------------------------------------------------------------
    // Startup Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_starts_unknown_and_loading() {
        let h = harness();
        assert_eq!(h.manager.phase(), SessionPhase::Unknown);
        assert!(h.manager.is_loading());
        assert!(!h.manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_initialize_with_empty_store() {
        let h = harness();
        h.manager.initialize();
        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert!(!h.manager.is_loading());
        assert!(!h.manager.has_refresh_timer());
    }

    #[tokio::test]
    async fn test_initialize_clears_expired_token() {
        let stored = record_expiring_at(NOW - 1);
        let h = harness_with(MemoryTokenStore::with_record(stored), false, SessionConfig::immediate());

        h.manager.initialize();
        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.store.load(), None);
    }

    #[tokio::test]
    async fn test_initialize_keeps_token_inside_refresh_window() {
        // Past the refresh lead but not yet expired: still usable
        let stored = record_expiring_at(NOW + 60_000);
        let h = harness_with(
            MemoryTokenStore::with_record(stored.clone()),
            false,
            SessionConfig::immediate(),
        );

        h.manager.initialize();
        assert_eq!(h.manager.state(), SessionState::Authenticated(stored.clone()));
        assert!(h.manager.has_refresh_timer());
        assert_eq!(h.store.load(), Some(stored));
    }

    #[tokio::test]
    async fn test_initialize_runs_once() {
        let h = harness();
        h.manager.initialize();

        h.store.save(&record_expiring_at(NOW + LIFETIME_MS));
        h.manager.initialize();
        assert_eq!(h.manager.phase(), SessionPhase::Unauthenticated);
    }

    // -------------------------------------------------------------------------
    // Login / Logout Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_login_rejects_wrong_credentials() {
        let h = harness();
        let attempts = [
            ("demo", "wrong"),
            ("DEMO", "password123"),
            ("", ""),
            ("admin", "password123"),
            ("demo", "password1234"),
        ];

        for (username, password) in attempts {
            assert!(!h.manager.login(username, password).await);
            assert_eq!(h.manager.phase(), SessionPhase::Unauthenticated);
            assert_eq!(h.manager.error().as_deref(), Some(INVALID_CREDENTIALS_MESSAGE));
        }
        assert_eq!(h.store.load(), None);
        assert!(!h.manager.has_refresh_timer());
    }

    #[tokio::test]
    async fn test_login_with_demo_account() {
        let h = harness();

        assert!(h.manager.login("demo", "password123").await);
        assert!(h.manager.is_authenticated());
        assert_eq!(h.manager.error(), None);
        assert!(h.manager.has_refresh_timer());

        let stored = h.store.load().expect("token persisted");
        assert!((stored.expires_at - (NOW + LIFETIME_MS)).abs() <= 1_000);
        assert_eq!(h.manager.state(), SessionState::Authenticated(stored));
        assert_eq!(h.manager.minutes_until_expiry(), Some(15));
    }

    #[tokio::test]
    async fn test_successful_login_clears_previous_error() {
        let h = harness();
        assert!(!h.manager.login("demo", "nope").await);
        assert!(h.manager.error().is_some());

        assert!(h.manager.login("demo", "password123").await);
        assert_eq!(h.manager.error(), None);
    }

    #[tokio::test]
    async fn test_login_when_already_authenticated_keeps_token() {
        let h = harness();
        assert!(h.manager.login("demo", "password123").await);
        let first = h.store.load();

        assert!(h.manager.login("demo", "password123").await);
        assert_eq!(h.store.load(), first);
    }

    #[tokio::test]
    async fn test_logout_twice_matches_once() {
        let h = harness();
        assert!(h.manager.login("demo", "password123").await);

        h.manager.logout();
        let after_one = (h.manager.state(), h.store.load());
        h.manager.logout();
        let after_two = (h.manager.state(), h.store.load());

        assert_eq!(after_one, (SessionState::Unauthenticated, None));
        assert_eq!(after_one, after_two);
        assert!(!h.manager.has_refresh_timer());
    }

    #[tokio::test]
    async fn test_logout_before_initialize() {
        let h = harness_with(
            MemoryTokenStore::with_record(record_expiring_at(NOW + LIFETIME_MS)),
            false,
            SessionConfig::immediate(),
        );
        h.manager.logout();
        assert_eq!(h.manager.phase(), SessionPhase::Unauthenticated);
        assert_eq!(h.store.load(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_during_login_wins() {
        let config = SessionConfig {
            login_latency: Duration::from_millis(500),
            ..SessionConfig::immediate()
        };
        let h = harness_with(MemoryTokenStore::new(), false, config);
        let manager = Arc::new(h.manager);

        let pending = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.login("demo", "password123").await })
        };
        tokio::task::yield_now().await;
        assert_eq!(manager.phase(), SessionPhase::Authenticating);
        assert!(manager.is_loading());

        manager.logout();
        assert!(!pending.await.unwrap());
        assert_eq!(manager.phase(), SessionPhase::Unauthenticated);
        assert_eq!(h.store.load(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_login_is_rejected() {
        let config = SessionConfig {
            login_latency: Duration::from_millis(500),
            ..SessionConfig::immediate()
        };
        let h = harness_with(MemoryTokenStore::new(), false, config);
        let manager = Arc::new(h.manager);

        let first = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.login("demo", "password123").await })
        };
        tokio::task::yield_now().await;

        assert!(!manager.login("demo", "password123").await);
        assert!(first.await.unwrap());
        assert!(manager.is_authenticated());
    }

    // -------------------------------------------------------------------------
    // Refresh Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_check_is_noop_outside_window() {
        let h = harness();
        assert_eq!(h.manager.check_and_refresh().await, RefreshOutcome::NotAuthenticated);

        assert!(h.manager.login("demo", "password123").await);
        let before = h.store.load();

        h.clock.set(NOW + LIFETIME_MS - LEAD_MS - 1);
        assert_eq!(h.manager.check_and_refresh().await, RefreshOutcome::NotDue);
        assert_eq!(h.manager.check_and_refresh().await, RefreshOutcome::NotDue);
        assert_eq!(h.store.load(), before);
        assert_eq!(h.issuer.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_at_lead_boundary() {
        let h = harness();
        assert!(h.manager.login("demo", "password123").await);
        let old = h.store.load().expect("token persisted");

        h.clock.set(old.expires_at - LEAD_MS);
        assert_eq!(h.manager.check_and_refresh().await, RefreshOutcome::Refreshed);

        let new = h.store.load().expect("refreshed token persisted");
        assert_ne!(old.refresh_token, new.refresh_token);
        assert_eq!(new.expires_at, old.expires_at - LEAD_MS + LIFETIME_MS);
        assert_eq!(h.manager.state(), SessionState::Authenticated(new));
        assert!(h.manager.has_refresh_timer());
    }

    #[tokio::test]
    async fn test_refresh_failure_forces_logout() {
        let h = harness_with(MemoryTokenStore::new(), true, SessionConfig::immediate());
        assert!(h.manager.login("demo", "password123").await);

        h.clock.advance(ChronoDuration::minutes(14));
        assert_eq!(h.manager.check_and_refresh().await, RefreshOutcome::LoggedOut);

        assert_eq!(h.manager.phase(), SessionPhase::Unauthenticated);
        assert_eq!(h.store.load(), None);
        assert!(!h.manager.has_refresh_timer());
        // Forced logout is not reported through the error field
        assert_eq!(h.manager.error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_refreshes_silently() {
        let h = harness();
        assert!(h.manager.login("demo", "password123").await);
        let old = h.store.load().expect("token persisted");

        h.clock.set(old.expires_at - LEAD_MS);
        tokio::time::sleep(Duration::from_secs(REFRESH_CHECK_INTERVAL_SECS + 1)).await;

        assert_eq!(h.issuer.refresh_count(), 1);
        let new = h.store.load().expect("refreshed token persisted");
        assert_ne!(old.refresh_token, new.refresh_token);
        assert!(h.manager.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_failure_logs_out() {
        let h = harness_with(MemoryTokenStore::new(), true, SessionConfig::immediate());
        assert!(h.manager.login("demo", "password123").await);
        let mut changes = h.manager.subscribe();
        let _ = changes.borrow_and_update();

        h.clock.advance(ChronoDuration::minutes(14));
        tokio::time::sleep(Duration::from_secs(REFRESH_CHECK_INTERVAL_SECS + 1)).await;

        assert!(changes.has_changed().unwrap());
        assert!(!changes.borrow_and_update().is_authenticated);
        assert_eq!(h.store.load(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_tick_after_logout() {
        let h = harness();
        assert!(h.manager.login("demo", "password123").await);
        h.manager.logout();

        h.clock.advance(ChronoDuration::minutes(30));
        tokio::time::sleep(Duration::from_secs(5 * 60)).await;

        assert_eq!(h.issuer.refresh_count(), 0);
        assert_eq!(h.store.load(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_tick_after_drop() {
        let h = harness();
        assert!(h.manager.login("demo", "password123").await);
        let stored = h.store.load();
        let issuer = Arc::clone(&h.issuer);
        let store = Arc::clone(&h.store);
        let clock = h.clock.clone();
        drop(h.manager);

        clock.advance(ChronoDuration::minutes(14));
        tokio::time::sleep(Duration::from_secs(5 * 60)).await;

        assert_eq!(issuer.refresh_count(), 0);
        // Disposal is not a logout
        assert_eq!(store.load(), stored);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_survives_overlapping_manual_check() {
        let config = SessionConfig {
            refresh_latency: Duration::from_millis(300),
            ..SessionConfig::immediate()
        };
        let h = harness_with(MemoryTokenStore::new(), false, config);
        let manager = Arc::new(h.manager);
        assert!(manager.login("demo", "password123").await);
        let old = h.store.load().expect("token persisted");
        h.clock.set(old.expires_at - LEAD_MS);

        // Manual check in flight when the first tick fires
        tokio::time::sleep(Duration::from_millis(59_900)).await;
        let manual = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.check_and_refresh().await })
        };
        assert_eq!(manual.await.unwrap(), RefreshOutcome::Refreshed);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.issuer.refresh_count(), 2);
        let current = h.store.load().expect("refreshed token persisted");
        assert_ne!(current.refresh_token, old.refresh_token);

        // The tick that lost the race keeps the timer alive
        h.clock.set(current.expires_at - LEAD_MS);
        tokio::time::sleep(Duration::from_secs(REFRESH_CHECK_INTERVAL_SECS)).await;

        assert_eq!(h.issuer.refresh_count(), 3);
        let latest = h.store.load().expect("refreshed token persisted");
        assert_ne!(latest.refresh_token, current.refresh_token);
        assert_eq!(manager.state(), SessionState::Authenticated(latest));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_after_dispose_does_nothing() {
        let stored = record_expiring_at(NOW + LIFETIME_MS);
        let h = harness_with(
            MemoryTokenStore::with_record(stored.clone()),
            false,
            SessionConfig::immediate(),
        );

        h.manager.dispose();
        h.manager.initialize();
        assert_eq!(h.manager.phase(), SessionPhase::Unknown);
        assert!(!h.manager.has_refresh_timer());

        h.clock.advance(ChronoDuration::minutes(14));
        assert_eq!(h.manager.check_and_refresh().await, RefreshOutcome::Disposed);
        tokio::time::sleep(Duration::from_secs(REFRESH_CHECK_INTERVAL_SECS + 1)).await;

        assert_eq!(h.issuer.refresh_count(), 0);
        assert_eq!(h.store.load(), Some(stored));
    }

    #[tokio::test]
    async fn test_check_after_dispose_skips_issuer() {
        let h = harness();
        assert!(h.manager.login("demo", "password123").await);
        h.manager.dispose();

        h.clock.advance(ChronoDuration::minutes(14));
        assert_eq!(h.manager.check_and_refresh().await, RefreshOutcome::Disposed);
        assert_eq!(h.issuer.refresh_count(), 0);
        assert!(h.manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_demo_uses_configured_lifetime() {
        let store = Arc::new(MemoryTokenStore::new());
        let config = SessionConfig {
            session_lifetime: ChronoDuration::minutes(5),
            ..SessionConfig::immediate()
        };
        let manager = SessionManager::demo(store.clone(), config);

        let before = chrono::Utc::now().timestamp_millis();
        assert!(manager.login("demo", "password123").await);
        let after = chrono::Utc::now().timestamp_millis();

        let stored = store.load().expect("token persisted");
        let five_minutes = 5 * 60 * 1000;
        assert!(stored.expires_at >= before + five_minutes);
        assert!(stored.expires_at <= after + five_minutes);
    }

    #[tokio::test]
    async fn test_dispose_blocks_later_login() {
        let h = harness();
        h.manager.dispose();
        assert!(!h.manager.login("demo", "password123").await);
        assert_eq!(h.store.load(), None);
    }

    // -------------------------------------------------------------------------
    // Persistence Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_session_survives_restart_with_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(NOW);

        let build = || {
            SessionManager::new(
                Arc::new(StaticCredentials::demo()),
                Arc::new(MockTokenIssuer::new(Arc::new(clock.clone()))),
                Arc::new(FileTokenStore::new(dir.path().to_path_buf())),
                Arc::new(clock.clone()),
                SessionConfig::immediate(),
            )
        };

        let first = build();
        assert!(first.login("demo", "password123").await);
        drop(first);

        clock.advance(ChronoDuration::minutes(5));
        let second = build();
        second.initialize();
        assert!(second.is_authenticated());
        assert_eq!(second.minutes_until_expiry(), Some(10));

        second.logout();
        drop(second);

        let third = build();
        third.initialize();
        assert_eq!(third.phase(), SessionPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn test_snapshot_tracks_state() {
        let h = harness();
        let changes = h.manager.subscribe();
        assert_eq!(changes.borrow().phase, SessionPhase::Unknown);

        assert!(!h.manager.login("demo", "bad").await);
        let snapshot = h.manager.snapshot();
        assert!(!snapshot.is_authenticated);
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.error.as_deref(), Some(INVALID_CREDENTIALS_MESSAGE));
        assert_eq!(*changes.borrow(), snapshot);
    }
}
