//! Route table and navigation seam.
//!
//! Every page of the log is a [`Route`] with declared access. The table is
//! static: form and report routes are derived from [`FormKind`] so the two
//! can never disagree.

use std::sync::Mutex;
use std::sync::PoisonError;

use crate::net::types::{ADMINISTRADOR, OPERADOR};
use crate::records::FormKind;

pub const LOGIN_PATH: &str = "/login";
/// Landing page for authenticated users, and the redirect target when a
/// route's role requirement is not met.
pub const HOME_PATH: &str = "/home";

const ADMIN_ONLY: &[&str] = &[ADMINISTRADOR];
const OPERATOR_ONLY: &[&str] = &[OPERADOR];

// =============================================================================
// NAVIGATION
// =============================================================================

/// Side effect of a logout or redirect: move the shell to `path`.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Navigator for shells without a location bar; it only records the move.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, path: &str) {
        tracing::info!(path, "navigate");
    }
}

/// Remembers every navigation, most recent last.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.visited.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_owned());
    }
}

// =============================================================================
// ROUTES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Reachable without a session.
    Public,
    /// Any signed-in user.
    Authenticated,
    /// Signed-in users whose role category is listed.
    Roles(&'static [&'static str]),
}

impl Access {
    /// Role categories the route requires, empty when any session will do.
    #[must_use]
    pub fn roles(self) -> &'static [&'static str] {
        match self {
            Self::Roles(roles) => roles,
            Self::Public | Self::Authenticated => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path: &'static str,
    pub title: &'static str,
    pub access: Access,
}

impl Route {
    #[must_use]
    pub fn is_guarded(&self) -> bool {
        self.access != Access::Public
    }
}

const fn form(kind: FormKind) -> Route {
    Route { path: kind.form_route(), title: kind.title(), access: Access::Roles(OPERATOR_ONLY) }
}

const fn report(kind: FormKind) -> Route {
    Route { path: kind.report_route(), title: kind.title(), access: Access::Roles(OPERATOR_ONLY) }
}

pub static ROUTES: [Route; 17] = [
    Route { path: LOGIN_PATH, title: "Iniciar sesión", access: Access::Public },
    Route { path: HOME_PATH, title: "Inicio", access: Access::Authenticated },
    Route { path: "/profile", title: "Mi perfil", access: Access::Authenticated },
    Route { path: "/admin", title: "Gestión de Usuarios", access: Access::Roles(ADMIN_ONLY) },
    Route { path: "/logs", title: "Logs de Auditoría", access: Access::Roles(ADMIN_ONLY) },
    form(FormKind::ControlOperacion),
    form(FormKind::ControlCloro),
    form(FormKind::MonitoreoFisicoquimico),
    form(FormKind::ProduccionFiltros),
    form(FormKind::ConsumoDiario),
    form(FormKind::ConsumoMensual),
    report(FormKind::ControlOperacion),
    report(FormKind::ControlCloro),
    report(FormKind::MonitoreoFisicoquimico),
    report(FormKind::ProduccionFiltros),
    report(FormKind::ConsumoDiario),
    report(FormKind::ConsumoMensual),
];

/// Exact-path lookup; a trailing slash is ignored.
#[must_use]
pub fn find(path: &str) -> Option<&'static Route> {
    let path = match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    };
    ROUTES.iter().find(|route| route.path == path)
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod routes_test;
