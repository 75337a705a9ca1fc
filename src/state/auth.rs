//! Auth session manager: login, logout, hydration and role checks.
//!
//! SYSTEM CONTEXT
//! ==============
//! One [`AuthManager`] is built at startup and handed to the route guard and
//! to every page. It owns the only write path into [`SessionState`] and the
//! only read/write path into the credential [`TokenStore`].
//!
//! DESIGN
//! ======
//! Every operation that may write the session user takes an attempt number
//! from a shared counter. A fetch result is committed only while its attempt
//! is still the newest one, so a slow profile fetch can never overwrite the
//! outcome of a later login, logout or fetch. The check and the write happen
//! under the counter lock; subscribers are notified after it is released, so
//! a subscriber may call back into the manager.
//!
//! `initialize` is single-flight: the first caller wins a compare-and-swap
//! and spawns the hydration; every caller then waits on a watch channel for
//! it to settle, bounded by the init timeout. A hydration that outlives the
//! timeout keeps running and may still commit, subject to the attempt check.
//!
//! ERROR HANDLING
//! ==============
//! A 401 on the profile fetch means the credential is dead: it is cleared,
//! without navigating. Expired or undecodable tokens get a full logout. Any
//! other failure keeps the credential so a later navigation can retry.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use super::claims;
use super::session::{Delivery, SessionState};
use super::token_store::{StorageError, TokenStore};
use crate::config::AuthTimeouts;
use crate::net::api::{ApiError, AuthBackend};
use crate::net::types::{ProfileUpdate, TokenResponse, User};
use crate::routes::{LOGIN_PATH, Navigator};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    CredentialInvalid,

    #[error("backend did not respond within {millis} ms")]
    RequestTimeout { millis: u64 },

    #[error("session expired")]
    TokenExpired,

    #[error("stored credential is malformed: {0}")]
    MalformedToken(String),

    /// The backend refused the stored credential.
    #[error("session is no longer valid")]
    Unauthorized,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No credential stored.
    NoSession,
    /// A login request is in flight.
    Authenticating,
    /// Credential stored, profile not (yet) confirmed.
    Unverified,
    /// Credential stored and profile loaded.
    Authenticated,
}

// =============================================================================
// MANAGER
// =============================================================================

/// Shared handle; clones drive the same session.
#[derive(Clone)]
pub struct AuthManager {
    inner: Arc<Inner>,
}

struct Inner {
    tokens: TokenStore,
    session: SessionState,
    backend: Arc<dyn AuthBackend>,
    navigator: Arc<dyn Navigator>,
    timeouts: AuthTimeouts,
    init_started: AtomicBool,
    init_settled: watch::Sender<bool>,
    attempt: Mutex<u64>,
    logins_in_flight: AtomicUsize,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl AuthManager {
    pub fn new(
        tokens: TokenStore,
        backend: Arc<dyn AuthBackend>,
        navigator: Arc<dyn Navigator>,
        timeouts: AuthTimeouts,
    ) -> Self {
        let (init_settled, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                tokens,
                session: SessionState::new(),
                backend,
                navigator,
                timeouts,
                init_started: AtomicBool::new(false),
                init_settled,
                attempt: Mutex::new(0),
                logins_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Read-only handle to the session cell, for subscribers.
    #[must_use]
    pub fn session(&self) -> SessionState {
        self.inner.session.clone()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.inner.session.get()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.inner.tokens.read()
    }

    /// Credential present. Expiry is checked when the token is used.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Whether the session user's category is in `allowed`. `ADMIN` and
    /// `ADMINISTRADOR` are interchangeable.
    #[must_use]
    pub fn has_role(&self, allowed: &[&str]) -> bool {
        self.inner
            .session
            .get()
            .is_some_and(|user| user.rol.is_any_of(allowed))
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.inner.logins_in_flight.load(Ordering::Acquire) > 0 {
            SessionPhase::Authenticating
        } else if !self.is_authenticated() {
            SessionPhase::NoSession
        } else if self.inner.session.is_present() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unverified
        }
    }

    /// Whether the startup hydration has finished, successfully or not.
    #[must_use]
    pub fn hydration_settled(&self) -> bool {
        *self.inner.init_settled.borrow()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Hydrate the session from a stored credential, once per manager.
    ///
    /// Never fails and never waits longer than the init timeout. Concurrent
    /// and repeated calls share the first call's hydration.
    pub async fn initialize(&self) {
        if self
            .inner
            .init_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let manager = self.clone();
            tokio::spawn(async move {
                if let Err(error) = manager.load_user_from_token().await {
                    tracing::warn!(%error, "session hydration failed");
                }
                manager.inner.init_settled.send_replace(true);
            });
        }

        let mut settled = self.inner.init_settled.subscribe();
        let wait = async move { settled.wait_for(|done| *done).await.map(|_| ()) };
        if tokio::time::timeout(self.inner.timeouts.init, wait).await.is_err() {
            tracing::warn!(
                timeout_ms = millis(self.inner.timeouts.init),
                "session hydration still pending; continuing startup"
            );
        }
    }

    /// Exchange credentials for a token, persist it, then try to load the
    /// profile. A failed profile load does not fail the login.
    ///
    /// # Errors
    ///
    /// [`AuthError::CredentialInvalid`] when the backend refuses the
    /// credentials, [`AuthError::RequestTimeout`] when it does not answer in
    /// time, [`AuthError::Api`] for any other backend failure and
    /// [`AuthError::Storage`] when the token cannot be persisted. The
    /// credential is not stored on failure.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, AuthError> {
        let _in_flight = InFlight::enter(&self.inner.logins_in_flight);

        let limit = self.inner.timeouts.login;
        let exchange = self.inner.backend.request_token(username, password);
        let response = match tokio::time::timeout(limit, exchange).await {
            Err(_) => {
                tracing::warn!(username, timeout_ms = millis(limit), "login timed out");
                return Err(AuthError::RequestTimeout { millis: millis(limit) });
            }
            Ok(Err(error)) if error.is_credential_rejection() => {
                tracing::info!(username, %error, "login rejected");
                return Err(AuthError::CredentialInvalid);
            }
            Ok(Err(error)) => return Err(AuthError::Api(error)),
            Ok(Ok(response)) => response,
        };

        // Only an accepted login outdates a pending hydration.
        self.supersede(Delivery::none);
        self.inner.tokens.save(&response.access_token)?;
        tracing::info!(username, "signed in");

        if let Err(error) = self.fetch_user(&response.access_token).await {
            tracing::warn!(username, %error, "profile load after login failed; will retry on navigation");
        }
        Ok(response)
    }

    /// Forget the credential and the session user, then go to the login page.
    pub fn logout(&self) {
        self.supersede(|| {
            if let Err(error) = self.inner.tokens.clear() {
                tracing::warn!(%error, "failed to clear stored credential");
            }
            self.inner.session.set(None)
        });
        tracing::info!("signed out");
        self.inner.navigator.navigate(LOGIN_PATH);
    }

    /// Populate the session user from the stored credential.
    ///
    /// Without a credential the session is cleared and this succeeds.
    ///
    /// # Errors
    ///
    /// [`AuthError::MalformedToken`] and [`AuthError::TokenExpired`] after a
    /// full logout, with no backend call. [`AuthError::Unauthorized`] when
    /// the backend refuses the token, which is then cleared.
    /// [`AuthError::Api`] for other fetch failures; the token is kept.
    pub async fn load_user_from_token(&self) -> Result<(), AuthError> {
        let Some(token) = self.inner.tokens.read() else {
            self.supersede(|| self.inner.session.set(None));
            return Ok(());
        };
        self.check_credential(&token)?;
        self.fetch_user(&token).await
    }

    /// Whether the stored credential has stopped being usable. An expired or
    /// undecodable token is logged out first. No credential is not "expired".
    pub fn session_expired(&self) -> bool {
        self.inner
            .tokens
            .read()
            .is_some_and(|token| self.check_credential(&token).is_err())
    }

    /// Merge edited profile fields into the session user. Returns `false`
    /// when nobody is signed in.
    pub fn update_current_user(&self, update: &ProfileUpdate) -> bool {
        self.inner.session.update(|user| update.apply_to(user))
    }

    fn check_credential(&self, token: &str) -> Result<(), AuthError> {
        let claims = match claims::decode_unverified(token) {
            Ok(claims) => claims,
            Err(error) => {
                tracing::warn!(%error, "stored credential is malformed; signing out");
                self.logout();
                return Err(AuthError::MalformedToken(error.to_string()));
            }
        };
        if claims.is_expired() {
            tracing::info!(sub = claims.sub.as_deref(), "stored credential expired; signing out");
            self.logout();
            return Err(AuthError::TokenExpired);
        }
        Ok(())
    }

    // =========================================================================
    // ATTEMPTS
    // =========================================================================

    fn lock_attempt(&self) -> MutexGuard<'_, u64> {
        self.inner.attempt.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new attempt, invalidating every older one, and run `write`
    /// as part of it. Its notifications go out once the lock is released.
    fn supersede<'a>(&'a self, write: impl FnOnce() -> Delivery<'a>) -> u64 {
        let (attempt, delivery) = {
            let mut attempt = self.lock_attempt();
            *attempt += 1;
            (*attempt, write())
        };
        drop(delivery);
        attempt
    }

    /// Run `write` only if `attempt` is still the newest.
    fn commit<'a>(&'a self, attempt: u64, write: impl FnOnce() -> Delivery<'a>) -> bool {
        let delivery = {
            let current = self.lock_attempt();
            if *current != attempt {
                return false;
            }
            write()
        };
        drop(delivery);
        true
    }

    async fn fetch_user(&self, token: &str) -> Result<(), AuthError> {
        let attempt = self.supersede(Delivery::none);
        match self.inner.backend.fetch_current_user(token).await {
            Ok(user) => {
                let username = user.username.clone();
                if self.commit(attempt, || self.inner.session.set(Some(user))) {
                    tracing::debug!(%username, "session user loaded");
                } else {
                    tracing::debug!(%username, "discarding superseded profile fetch");
                }
                Ok(())
            }
            Err(error) if error.is_unauthorized() => {
                tracing::info!("backend rejected stored credential; clearing it");
                self.commit(attempt, || {
                    if let Err(error) = self.inner.tokens.clear() {
                        tracing::warn!(%error, "failed to clear rejected credential");
                    }
                    self.inner.session.set(None)
                });
                Err(AuthError::Unauthorized)
            }
            Err(error) => {
                tracing::warn!(%error, "profile fetch failed; keeping credential");
                self.commit(attempt, || {
                    if self.inner.session.is_present() {
                        self.inner.session.set(None)
                    } else {
                        Delivery::none()
                    }
                });
                Err(AuthError::Api(error))
            }
        }
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("phase", &self.phase())
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

/// Counts a login as in flight until dropped, including when the login
/// future is cancelled.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;
