//! `stockroom-events` — domain event contracts.
//!
//! Transition events emitted by aggregates implement [`Event`]; the audit
//! trail wraps them in [`EventEnvelope`]s for append-only storage.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
