//! Navigation guard.
//!
//! Runs on every navigation to a guarded route, with no caching, so an
//! expired token or a role change is caught at the next page. It never fails:
//! every problem resolves to a redirect.

use super::auth::AuthManager;
use crate::routes::{self, Access, HOME_PATH, LOGIN_PATH, Route};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

impl GuardDecision {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    auth: AuthManager,
}

impl RouteGuard {
    #[must_use]
    pub fn new(auth: AuthManager) -> Self {
        Self { auth }
    }

    pub async fn check(&self, route: &Route) -> GuardDecision {
        let decision = self.decide(route.access).await;
        tracing::debug!(path = route.path, ?decision, "route guard");
        decision
    }

    /// Guard a raw path. Unknown paths behave like a catch-all that sends
    /// signed-in users to the landing page.
    pub async fn check_path(&self, path: &str) -> GuardDecision {
        if let Some(route) = routes::find(path) {
            return self.check(route).await;
        }
        let decision = match self.decide(Access::Authenticated).await {
            GuardDecision::Allow => GuardDecision::Redirect(HOME_PATH),
            redirect @ GuardDecision::Redirect(_) => redirect,
        };
        tracing::debug!(path, ?decision, "route guard (unknown path)");
        decision
    }

    async fn decide(&self, access: Access) -> GuardDecision {
        if access == Access::Public {
            return GuardDecision::Allow;
        }
        if !self.auth.is_authenticated() {
            return GuardDecision::Redirect(LOGIN_PATH);
        }
        // A cached user proves nothing once the credential has lapsed.
        if self.auth.session_expired() {
            return GuardDecision::Redirect(LOGIN_PATH);
        }
        if self.auth.current_user().is_none() {
            if let Err(error) = self.auth.load_user_from_token().await {
                tracing::debug!(%error, "could not establish session user");
                return GuardDecision::Redirect(LOGIN_PATH);
            }
            if self.auth.current_user().is_none() {
                return GuardDecision::Redirect(LOGIN_PATH);
            }
        }
        let required = access.roles();
        if !required.is_empty() && !self.auth.has_role(required) {
            return GuardDecision::Redirect(HOME_PATH);
        }
        GuardDecision::Allow
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;
