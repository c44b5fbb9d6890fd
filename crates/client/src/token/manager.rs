use super::claims;
use super::refresher::TokenRefresher;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storegate_cache::{CacheStore, KeyValueStore};
use storegate_core::{
    Error, LogoutReason, Result, SessionEvent, SessionEvents, DEFAULT_REFRESH_THRESHOLD_MS,
    TOKEN_STORAGE_KEY,
};
use storegate_utils::RateLimiter;
use tracing::{debug, error, info, warn};

type SharedRefresh = Shared<BoxFuture<'static, Result<String>>>;

/// Observable lifecycle phase of the session credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPhase {
    Unset,
    Valid,
    NearExpiry,
    Refreshing,
    Expired,
}

#[derive(Debug, Clone)]
pub struct TokenManagerConfig {
    /// Key of the token in the durable store
    pub storage_key: String,
    /// Remaining lifetime below which a refresh is started
    pub refresh_threshold: Duration,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            storage_key: TOKEN_STORAGE_KEY.to_string(),
            refresh_threshold: Duration::from_millis(DEFAULT_REFRESH_THRESHOLD_MS),
        }
    }
}

#[derive(Default)]
struct TokenState {
    raw: Option<String>,
    expiry: Option<i64>,
    refreshing: Option<SharedRefresh>,
    /// Bumped whenever the credential changes hands
    generation: u64,
}

impl TokenState {
    fn clear(&mut self) {
        self.raw = None;
        self.expiry = None;
        self.refreshing = None;
        self.generation += 1;
    }
}

/// Owns the session token and its single-flight refresh
pub struct TokenManager {
    config: TokenManagerConfig,
    state: Mutex<TokenState>,
    store: Arc<dyn KeyValueStore>,
    refresher: Arc<dyn TokenRefresher>,
    cache: Arc<CacheStore<Value>>,
    limiter: Arc<RateLimiter>,
    events: SessionEvents,
    refreshes: AtomicU64,
}

enum Next {
    Ready(Option<String>),
    Wait(SharedRefresh),
    Expired,
}

/// What became of a successful refresh
enum Applied {
    Yes,
    /// The credential changed hands while the refresh was out
    Superseded(Option<String>),
}

impl TokenManager {
    /// Create a manager, restoring a persisted token when it is still usable
    pub fn new(
        config: TokenManagerConfig,
        store: Arc<dyn KeyValueStore>,
        refresher: Arc<dyn TokenRefresher>,
        cache: Arc<CacheStore<Value>>,
        limiter: Arc<RateLimiter>,
        events: SessionEvents,
    ) -> Arc<Self> {
        let manager = Self {
            config,
            state: Mutex::new(TokenState::default()),
            store,
            refresher,
            cache,
            limiter,
            events,
            refreshes: AtomicU64::new(0),
        };
        manager.restore();
        Arc::new(manager)
    }

    fn restore(&self) {
        let raw = match self.store.get(&self.config.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "stored_token_unreadable");
                return;
            }
        };

        match claims::expiry(&raw) {
            Ok(expiry) if expiry.map_or(true, |exp| exp > now_epoch()) => {
                let mut state = self.state.lock();
                state.raw = Some(raw);
                state.expiry = expiry;
                debug!(?expiry, "stored_token_restored");
            }
            Ok(_) => {
                info!("stored_token_expired");
                self.forget_persisted();
            }
            Err(e) => {
                warn!(error = %e, "stored_token_malformed");
                self.forget_persisted();
            }
        }
    }

    /// The current token without any validity check
    pub fn current(&self) -> Option<String> {
        self.state.lock().raw.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.lock().raw.is_some()
    }

    pub fn phase(&self) -> TokenPhase {
        self.phase_of(&self.state.lock(), now_epoch())
    }

    /// Number of refresh attempts started so far
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    fn phase_of(&self, state: &TokenState, now: i64) -> TokenPhase {
        if state.refreshing.is_some() {
            return TokenPhase::Refreshing;
        }
        if state.raw.is_none() {
            return TokenPhase::Unset;
        }
        match state.expiry {
            None => TokenPhase::Valid,
            Some(exp) if exp <= now => TokenPhase::Expired,
            Some(exp) if (exp - now) as u64 <= self.config.refresh_threshold.as_secs() => {
                TokenPhase::NearExpiry
            }
            Some(_) => TokenPhase::Valid,
        }
    }

    /// A usable token, refreshing first when it is close to expiry
    ///
    /// Concurrent callers share one refresh. `Ok(None)` means there is no
    /// session.
    pub async fn refresh_if_needed(self: &Arc<Self>) -> Result<Option<String>> {
        let next = {
            let mut state = self.state.lock();
            match self.phase_of(&state, now_epoch()) {
                TokenPhase::Unset => Next::Ready(None),
                TokenPhase::Valid => Next::Ready(state.raw.clone()),
                TokenPhase::Expired => {
                    state.clear();
                    Next::Expired
                }
                TokenPhase::NearExpiry | TokenPhase::Refreshing => {
                    match state.raw.clone() {
                        Some(sent) => Next::Wait(self.join_or_start(&mut state, sent)),
                        // Only reachable while a refresh is already running
                        None => match state.refreshing.clone() {
                            Some(pending) => Next::Wait(pending),
                            None => Next::Ready(None),
                        },
                    }
                }
            }
        };

        match next {
            Next::Ready(token) => Ok(token),
            Next::Wait(pending) => pending.await.map(Some),
            Next::Expired => {
                self.forget_persisted();
                self.cascade(LogoutReason::TokenExpired);
                Ok(None)
            }
        }
    }

    /// React to a 401 received for a request sent with `sent`
    ///
    /// If the credential already changed since, the current one is returned.
    /// Otherwise a refresh is forced (or joined) whatever the phase.
    pub async fn handle_unauthorized(self: &Arc<Self>, sent: &str) -> Result<Option<String>> {
        let pending = {
            let mut state = self.state.lock();
            if state.raw.as_deref() != Some(sent) {
                debug!("credential_changed_since_request");
                return Ok(state.raw.clone());
            }
            self.join_or_start(&mut state, sent.to_string())
        };
        pending.await.map(Some)
    }

    fn join_or_start(self: &Arc<Self>, state: &mut TokenState, sent: String) -> SharedRefresh {
        if let Some(pending) = &state.refreshing {
            debug!("token_refresh_joined");
            return pending.clone();
        }

        state.generation += 1;
        let generation = state.generation;
        let this = Arc::clone(self);
        let pending = async move { this.run_refresh(sent, generation).await }
            .boxed()
            .shared();
        state.refreshing = Some(pending.clone());
        pending
    }

    async fn run_refresh(&self, sent: String, generation: u64) -> Result<String> {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        info!("token_refresh_started");

        let outcome = match self.refresher.refresh(&sent).await {
            Ok(token) => match claims::expiry(&token) {
                Ok(Some(exp)) if exp <= now_epoch() => Err(Error::auth_expired(
                    "refresh returned an already expired token",
                )),
                Ok(expiry) => Ok((token, expiry)),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match outcome {
            Ok((token, expiry)) => {
                let applied = {
                    let mut state = self.state.lock();
                    if state.generation != generation {
                        Applied::Superseded(state.raw.clone())
                    } else {
                        state.raw = Some(token.clone());
                        state.expiry = expiry;
                        state.refreshing = None;
                        Applied::Yes
                    }
                };

                match applied {
                    Applied::Yes => {
                        if let Err(e) = self.store.set(&self.config.storage_key, &token) {
                            warn!(error = %e, "refreshed_token_not_persisted");
                        }
                        info!(?expiry, "token_refreshed");
                        self.events.publish(SessionEvent::Refreshed);
                        Ok(token)
                    }
                    // A login happened meanwhile; its token wins
                    Applied::Superseded(Some(current)) => Ok(current),
                    Applied::Superseded(None) => {
                        debug!("refreshed_token_discarded_after_logout");
                        Err(Error::auth_expired("the session ended during refresh"))
                    }
                }
            }
            Err(e) => {
                let owned = {
                    let mut state = self.state.lock();
                    if state.generation == generation {
                        state.clear();
                        true
                    } else {
                        false
                    }
                };
                if owned {
                    warn!(error = %e, "token_refresh_failed");
                    self.forget_persisted();
                    self.cascade(LogoutReason::RefreshFailed);
                }
                Err(Error::auth_expired(format!("token refresh failed: {e}")))
            }
        }
    }

    /// Install a token obtained from login or registration
    pub fn set_token(&self, raw: &str) -> Result<()> {
        let expiry = claims::expiry(raw)?;
        if expiry.is_some_and(|exp| exp <= now_epoch()) {
            return Err(Error::auth_expired("received an already expired token"));
        }

        self.store.set(&self.config.storage_key, raw)?;
        {
            let mut state = self.state.lock();
            state.clear();
            state.raw = Some(raw.to_string());
            state.expiry = expiry;
        }

        info!(?expiry, "session_started");
        self.events.publish(SessionEvent::LoggedIn);
        Ok(())
    }

    /// End the session and drop every piece of session-scoped state
    pub fn logout(&self, reason: LogoutReason) {
        self.state.lock().clear();
        self.forget_persisted();
        self.cascade(reason);
    }

    fn forget_persisted(&self) {
        if let Err(e) = self.store.remove(&self.config.storage_key) {
            warn!(error = %e, "stored_token_not_removed");
        }
    }

    fn cascade(&self, reason: LogoutReason) {
        self.cache.clear();
        self.limiter.reset();
        if reason.is_forced() {
            error!(?reason, "session_ended");
        } else {
            info!(?reason, "session_ended");
        }
        self.events.publish(SessionEvent::LoggedOut { reason });
    }
}

fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}
