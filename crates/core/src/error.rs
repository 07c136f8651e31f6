//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// The four workflow-facing kinds are `Validation`, `Authorization`,
/// `InvalidState` and `InsufficientStock`. Every variant carries enough
/// context for a presentation layer to render an actionable message; nothing
/// here is fatal to the process and nothing is retried internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed request input (missing line items, blank reason, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The actor lacks the role or per-request relationship the attempted
    /// transition requires.
    #[error("not authorized: requires {required}")]
    Authorization {
        /// The role/relationship that would have been accepted.
        required: String,
    },

    /// A transition was attempted from a state that does not permit it
    /// (including double issuance). The subject is left unchanged.
    #[error("invalid state: {operation} is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// The ledger cannot satisfy a debit. The ledger is left unchanged; the
    /// caller may retry after restock.
    #[error(
        "insufficient stock for {item} at {location}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        item: String,
        location: String,
        requested: u32,
        available: u32,
    },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn authorization(required: impl Into<String>) -> Self {
        Self::Authorization {
            required: required.into(),
        }
    }

    pub fn invalid_state(operation: &'static str, state: &'static str) -> Self {
        Self::InvalidState { operation, state }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
