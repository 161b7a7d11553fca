//! Session lifecycle manager.
//!
//! Owns the in-memory [`Session`], drives sign-in through a
//! [`SignInStrategy`], persists tokens through the [`TokenStore`] and recovers
//! from rejected access tokens with a single refresh-and-retry.

use serde::de::{DeserializeOwned, IgnoredAny};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, instrument, warn};

use super::alert::{AlertSink, TracingAlertSink};
use super::query::{QueryCache, QueryClient};
use super::state::{LifecyclePhase, Session};
use crate::auth::{SignInOutcome, SignInStrategy, TokenPair, UserProfile, exchange_refresh_token};
use crate::error::{Error, Result};
use crate::net::{ApiClient, ApiRequest};
use crate::store::TokenStore;

/// Backend endpoint returning the signed-in user.
pub const ME_PATH: &str = "/auth/me";

/// Backend endpoint revoking the current session.
pub const LOGOUT_PATH: &str = "/auth/logout";

/// How a call to [`SessionManager::sign_in`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInStatus {
    SignedIn,
    /// The user backed out; the session is unchanged.
    Cancelled,
    /// The provider refused because another sign-in is running; the user was alerted.
    Locked,
    /// A sign-in was already running in this manager; nothing was done.
    Ignored,
    /// The attempt failed; the user was alerted with this message.
    Failed(String),
}

/// Manages the one session of this app instance.
///
/// Share it behind an `Arc`. All state changes go through a `watch` channel,
/// so UI code can [`subscribe`](Self::subscribe) and re-render on change.
pub struct SessionManager {
    api: ApiClient,
    store: TokenStore,
    strategy: Arc<dyn SignInStrategy>,
    alerts: Arc<dyn AlertSink>,
    state: watch::Sender<Session>,
    /// Serializes refreshes so concurrent 401s share one exchange.
    refresh_gate: Mutex<()>,
    /// Held only around storage writes that install or drop a session.
    persist_gate: Mutex<()>,
    /// Bumped whenever a session ends or a new one is installed. A refresh
    /// started under an older generation must not write its result.
    generation: AtomicU64,
    queries: QueryCache,
}

impl SessionManager {
    /// Create a manager in the `Loading` phase. Call [`start`](Self::start) next.
    pub fn new(api: ApiClient, store: TokenStore, strategy: Arc<dyn SignInStrategy>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            api,
            store,
            strategy,
            alerts: Arc::new(TracingAlertSink),
            state,
            refresh_gate: Mutex::new(()),
            persist_gate: Mutex::new(()),
            generation: AtomicU64::new(0),
            queries: QueryCache::new(),
        }
    }

    /// Set where user-visible alerts go.
    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    /// Receiver notified on every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Copy of the current session.
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.state.borrow().phase()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token().map(String::from)
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn query_cache(&self) -> &QueryCache {
        &self.queries
    }

    /// Query helper bound to this session.
    pub fn queries(self: &Arc<Self>) -> QueryClient {
        QueryClient::new(Arc::clone(self))
    }

    /// Restore the stored session, then load the user profile.
    ///
    /// With nothing stored this makes no network call.
    #[instrument(skip(self), fields(storage = self.store.backend_name()))]
    pub async fn start(&self) {
        self.state.send_modify(|s| s.set_phase(LifecyclePhase::Loading));
        match self.store.load().await {
            Some(pair) => {
                info!("Restored stored session");
                self.state.send_modify(|s| s.sign_in(pair));
                self.load_user().await;
            }
            None => {
                info!("No stored session");
                self.state.send_modify(Session::clear);
            }
        }
    }

    /// Run the configured sign-in strategy.
    ///
    /// Never returns an error: cancellations are silent, every other failure
    /// raises exactly one alert. Calls made while a sign-in is running are
    /// ignored. An attempt that does not complete leaves the tokens untouched
    /// and the phase they imply.
    #[instrument(skip(self), fields(strategy = self.strategy.name()))]
    pub async fn sign_in(&self) -> SignInStatus {
        let started = self.state.send_if_modified(|s| {
            if s.phase() == LifecyclePhase::Authenticating {
                return false;
            }
            s.set_phase(LifecyclePhase::Authenticating);
            true
        });
        if !started {
            debug!("Sign-in already in progress, ignoring");
            return SignInStatus::Ignored;
        }

        match self.strategy.initiate().await {
            Ok(SignInOutcome::Completed(pair)) => {
                self.install(pair).await;
                info!("Signed in");
                self.load_user().await;
                SignInStatus::SignedIn
            }
            Ok(SignInOutcome::Cancelled) | Err(Error::Cancelled) => {
                debug!("Sign-in cancelled by user");
                self.settle_phase();
                SignInStatus::Cancelled
            }
            Err(Error::SignInInProgress) => {
                self.settle_phase();
                self.alerts
                    .alert("Error", &Error::SignInInProgress.to_string());
                SignInStatus::Locked
            }
            Err(e) => {
                error!(error = %e, "Sign-in failed");
                self.settle_phase();
                let (title, message) = sign_in_alert(&e);
                self.alerts.alert(title, &message);
                SignInStatus::Failed(message)
            }
        }
    }

    /// Persist and activate a freshly issued pair, superseding any refresh
    /// still running for the previous session.
    async fn install(&self, pair: TokenPair) {
        let _persist = self.persist_gate.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.store.save(&pair).await;
        self.queries.clear();
        self.state.send_modify(|s| s.sign_in(pair));
    }

    fn settle_phase(&self) {
        self.state.send_if_modified(|s| {
            if s.phase() != LifecyclePhase::Authenticating {
                return false;
            }
            s.settle_phase();
            true
        });
    }

    /// Sign out locally and, best-effort, at the backend and provider.
    ///
    /// Always ends with no stored tokens, an empty session and an empty
    /// query cache, whatever the network does.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(token) = self.access_token() {
            let request = ApiRequest::post(LOGOUT_PATH).bearer(token);
            if let Err(e) = self.api.send::<IgnoredAny>(&request).await {
                debug!(error = %e, "Backend logout failed, continuing");
            }
        }
        if let Err(e) = self.strategy.sign_out().await {
            debug!(error = %e, "Provider sign-out failed, continuing");
        }

        let _persist = self.persist_gate.lock().await;
        self.store.clear().await;
        self.state.send_modify(Session::clear);
        self.queries.clear();
        info!("Signed out");
    }

    /// Fetch the profile for the current access token.
    ///
    /// A 401 triggers one refresh and one retry; a failed refresh signs the
    /// session out. Other failures are logged and leave the session as is.
    #[instrument(skip(self))]
    pub async fn load_user(&self) {
        let Some(token) = self.access_token() else {
            self.state.send_modify(|s| s.set_user(None));
            return;
        };

        match self.fetch_user(&token).await {
            Ok(user) => self.apply_user(&token, user),
            Err(e) if e.is_unauthorized() => {
                debug!("Profile request rejected, refreshing");
                if let Ok(pair) = self.recover_from_rejection(&token).await {
                    match self.fetch_user(&pair.access_token).await {
                        Ok(user) => self.apply_user(&pair.access_token, user),
                        Err(e) => warn!(error = %e, "Failed to fetch user after refresh"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to fetch user"),
        }
    }

    async fn fetch_user(&self, token: &str) -> Result<UserProfile> {
        self.api.send(&ApiRequest::get(ME_PATH).bearer(token)).await
    }

    /// Install `user` unless the session moved on from `token` meanwhile.
    fn apply_user(&self, token: &str, user: UserProfile) {
        let applied = self.state.send_if_modified(|s| {
            if s.access_token() != Some(token) {
                return false;
            }
            s.set_user(Some(user));
            true
        });
        if !applied {
            debug!("Session changed while loading the profile, discarding it");
        }
    }

    /// Perform `request` with the current access token.
    ///
    /// On a 401 the token pair is refreshed once and the request retried once
    /// with the new token; the retry's result is returned as is. If the
    /// refresh fails the session is signed out and
    /// [`Error::RefreshExhausted`] returned. If the session was signed out
    /// while the refresh ran, [`Error::NotAuthenticated`] is returned.
    #[instrument(skip(self, request), fields(method = %request.verb(), path = request.path()))]
    pub async fn authenticated_request<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let token = self.access_token().ok_or(Error::NotAuthenticated)?;

        match self.api.send(&request.with_bearer(&token)).await {
            Err(e) if e.is_unauthorized() => {
                debug!("Access token rejected, refreshing once");
                let pair = self.recover_from_rejection(&token).await?;
                self.api.send(&request.with_bearer(&pair.access_token)).await
            }
            result => result,
        }
    }

    async fn recover_from_rejection(&self, rejected: &str) -> Result<TokenPair> {
        match self.refresh_after_rejection(rejected).await {
            Err(Error::RefreshExhausted) => {
                warn!("Token refresh failed, signing out");
                self.sign_out().await;
                Err(Error::RefreshExhausted)
            }
            other => other,
        }
    }

    /// Replace `rejected` with a fresh pair.
    ///
    /// If another caller already replaced it while this one waited on the
    /// gate, the current pair is returned without a second exchange. If the
    /// session ended or was replaced during the exchange, the result is
    /// dropped unsaved and [`Error::NotAuthenticated`] returned.
    async fn refresh_after_rejection(&self, rejected: &str) -> Result<TokenPair> {
        let _gate = self.refresh_gate.lock().await;
        let generation = self.generation.load(Ordering::SeqCst);

        let current = self.state.borrow().tokens().cloned();
        match current {
            None => return Err(Error::NotAuthenticated),
            Some(pair) if pair.access_token != rejected => {
                debug!("Token already refreshed by a concurrent request");
                return Ok(pair);
            }
            Some(_) => {}
        }

        self.state.send_if_modified(|s| {
            if s.phase() != LifecyclePhase::Authenticated {
                return false;
            }
            s.set_phase(LifecyclePhase::Refreshing);
            true
        });

        let refreshed = match self.store.refresh_token().await {
            Some(refresh_token) => exchange_refresh_token(&self.api, &refresh_token).await,
            None => {
                debug!("No refresh token stored, refresh not possible");
                None
            }
        };

        let _persist = self.persist_gate.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Session ended during refresh, discarding its result");
            return Err(Error::NotAuthenticated);
        }
        let pair = refreshed.ok_or(Error::RefreshExhausted)?;
        self.store.save(&pair).await;
        let replaced = pair.clone();
        self.state.send_modify(|s| {
            s.replace_tokens(replaced);
        });
        Ok(pair)
    }
}

/// Title and message shown for a failed sign-in.
fn sign_in_alert(error: &Error) -> (&'static str, String) {
    match error {
        Error::Provider(description) => ("Authentication Error", description.clone()),
        Error::InvalidCallback(_) => ("Error", "Invalid authentication response".to_string()),
        Error::Prompt(_) => ("Error", "Failed to sign in. Please try again.".to_string()),
        _ => ("Error", "Failed to complete authentication".to_string()),
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("api", &self.api.base_url())
            .field("store", &self.store)
            .field("strategy", &self.strategy.name())
            .field("phase", &self.phase())
            .finish()
    }
}
