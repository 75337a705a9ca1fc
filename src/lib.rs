//! Client core of the water-treatment-plant operations log.
//!
//! SYSTEM CONTEXT
//! ==============
//! Operators fill role-gated plant forms and administrators manage users,
//! all against a REST backend. This crate holds what every front end needs:
//! the session manager and route guard (`state`), the typed REST client
//! (`net`), the route table, role-gated menus and form metadata.

pub mod config;
pub mod menu;
pub mod net;
pub mod records;
pub mod routes;
pub mod state;

pub use config::ClientConfig;
pub use net::api::{ApiClient, ApiError, AuthBackend};
pub use state::auth::{AuthError, AuthManager, SessionPhase};
pub use state::guard::{GuardDecision, RouteGuard};
pub use state::token_store::TokenStore;
