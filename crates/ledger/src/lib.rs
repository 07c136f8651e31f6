//! `stockroom-ledger` — per-(item, location) stock balance store.
//!
//! The check-then-debit pattern is intentionally non-reserving: the advisory
//! `reserve_check` warns at request-creation and approval time, and `debit`
//! decides at issuance time.

pub mod ledger;

pub use ledger::{InMemoryStockLedger, StockDebit, StockKey, StockLedger};
