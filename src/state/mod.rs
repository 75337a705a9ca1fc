//! Session core: credential storage, the session-user cell, the manager
//! that drives both, and the navigation guard built on top.

pub mod auth;
pub mod claims;
pub mod guard;
pub mod session;
pub mod token_store;

#[cfg(test)]
mod mock_backend;
