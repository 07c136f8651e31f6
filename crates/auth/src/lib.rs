//! `stockroom-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage. The session
//! provider is an external collaborator; only the `(user, role, department)`
//! triple it supplies is modeled here, plus the pure policy checks applied
//! at the engine and API boundaries.

pub mod authorize;
pub mod principal;
pub mod roles;

pub use authorize::{can_read_audit, require_role};
pub use principal::Principal;
pub use roles::Role;
