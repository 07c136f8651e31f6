//! `stockroom-workflow` — the approval workflow engine.
//!
//! Coordinates the request aggregate, the stock ledger and the audit trail:
//! submission, one- or two-step approval, rejection and issuance.

pub mod engine;

pub use engine::WorkflowEngine;
