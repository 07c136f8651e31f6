//! `stockroom-audit` — append-only audit trail of request transitions and
//! ledger mutations.

pub mod entry;
pub mod trail;

pub use entry::{AuditAction, AuditEntry};
pub use trail::{AuditTrail, InMemoryAuditTrail};
