//! Role-gated navigation: sidebar tree and home-page quick actions.
//!
//! Visibility here is a display convenience computed from the session user.
//! [`RouteGuard`](crate::state::guard::RouteGuard) is what actually keeps a
//! user out of a page.

use crate::net::types::{ADMINISTRADOR, OPERADOR, User, category_allowed};
use crate::records::FormKind;

const EVERYONE: &[&str] = &[ADMINISTRADOR, OPERADOR];
const ADMIN_ONLY: &[&str] = &[ADMINISTRADOR];
const OPERATOR_ONLY: &[&str] = &[OPERADOR];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    pub label: &'static str,
    pub icon: &'static str,
    /// `None` for section headers that only group children.
    pub route: Option<&'static str>,
    /// Empty means any signed-in user.
    pub roles: &'static [&'static str],
    pub children: &'static [MenuItem],
}

const fn link(label: &'static str, icon: &'static str, route: &'static str) -> MenuItem {
    MenuItem { label, icon, route: Some(route), roles: &[], children: &[] }
}

const fn form_link(kind: FormKind, icon: &'static str) -> MenuItem {
    link(kind.title(), icon, kind.form_route())
}

const fn report_link(kind: FormKind) -> MenuItem {
    link(kind.title(), "pi-eye", kind.report_route())
}

pub static SIDEBAR: [MenuItem; 6] = [
    MenuItem { roles: EVERYONE, ..link("Inicio", "pi-home", "/home") },
    MenuItem { roles: ADMIN_ONLY, ..link("Gestión de Usuarios", "pi-users", "/admin") },
    MenuItem { roles: ADMIN_ONLY, ..link("Logs de Auditoría", "pi-history", "/logs") },
    MenuItem {
        label: "Matrices",
        icon: "pi-table",
        route: None,
        roles: OPERATOR_ONLY,
        children: &[
            form_link(FormKind::ControlOperacion, "pi-cog"),
            form_link(FormKind::ControlCloro, "pi-circle"),
            form_link(FormKind::MonitoreoFisicoquimico, "pi-chart-bar"),
        ],
    },
    MenuItem {
        label: "Producción",
        icon: "pi-chart-line",
        route: None,
        roles: OPERATOR_ONLY,
        children: &[
            form_link(FormKind::ProduccionFiltros, "pi-filter"),
            form_link(FormKind::ConsumoDiario, "pi-shopping-cart"),
            form_link(FormKind::ConsumoMensual, "pi-calendar"),
        ],
    },
    MenuItem {
        label: "Reportes",
        icon: "pi-file-excel",
        route: None,
        roles: OPERATOR_ONLY,
        children: &[
            report_link(FormKind::ControlOperacion),
            report_link(FormKind::ControlCloro),
            report_link(FormKind::MonitoreoFisicoquimico),
            report_link(FormKind::ProduccionFiltros),
            report_link(FormKind::ConsumoDiario),
            report_link(FormKind::ConsumoMensual),
        ],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickAction {
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub route: &'static str,
    pub color: &'static str,
    pub roles: &'static [&'static str],
}

const fn form_action(
    kind: FormKind,
    description: &'static str,
    icon: &'static str,
    color: &'static str,
) -> QuickAction {
    QuickAction { title: kind.title(), description, icon, route: kind.form_route(), color, roles: OPERATOR_ONLY }
}

pub static QUICK_ACTIONS: [QuickAction; 7] = [
    form_action(FormKind::ControlOperacion, "Registrar parámetros operacionales", "pi-cog", "blue"),
    form_action(FormKind::ProduccionFiltros, "Registro de producción diaria", "pi-filter", "green"),
    form_action(FormKind::ControlCloro, "Ingresos y egresos de reactivos", "pi-circle", "purple"),
    form_action(FormKind::MonitoreoFisicoquimico, "Análisis de parámetros", "pi-chart-bar", "orange"),
    form_action(FormKind::ConsumoDiario, "Registro de químicos", "pi-shopping-cart", "indigo"),
    form_action(FormKind::ConsumoMensual, "Consolidado mensual", "pi-calendar", "pink"),
    QuickAction {
        title: "Gestión de Usuarios",
        description: "Administrar usuarios del sistema",
        icon: "pi-users",
        route: "/admin",
        color: "red",
        roles: ADMIN_ONLY,
    },
];

/// Nothing is visible without a user. An empty `roles` list admits any
/// user; otherwise the user's category must be listed (`ADMIN` counts as
/// `ADMINISTRADOR`).
#[must_use]
pub fn has_access(user: Option<&User>, roles: &[&str]) -> bool {
    user.is_some_and(|user| roles.is_empty() || category_allowed(user.category(), roles))
}

/// A visible sidebar entry with its visible children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleItem {
    pub item: &'static MenuItem,
    pub children: Vec<&'static MenuItem>,
}

#[must_use]
pub fn visible_sidebar(user: Option<&User>) -> Vec<VisibleItem> {
    SIDEBAR
        .iter()
        .filter(|item| has_access(user, item.roles))
        .map(|item| VisibleItem {
            item,
            children: item.children.iter().filter(|child| has_access(user, child.roles)).collect(),
        })
        .collect()
}

/// Home-page shortcuts.
#[must_use]
pub fn visible_quick_actions(user: Option<&User>) -> Vec<&'static QuickAction> {
    QUICK_ACTIONS
        .iter()
        .filter(|action| has_access(user, action.roles))
        .collect()
}

/// `current_url` is `route` or one of its sub-paths.
#[must_use]
pub fn is_active(route: Option<&str>, current_url: &str) -> bool {
    let Some(route) = route else {
        return false;
    };
    current_url == route
        || current_url
            .strip_prefix(route)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[must_use]
pub fn has_active_child(item: &MenuItem, current_url: &str) -> bool {
    item.children.iter().any(|child| is_active(child.route, current_url))
}

#[cfg(test)]
#[path = "menu_test.rs"]
mod menu_test;
