use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, ItemId, LocationId};

/// Balance key: one bucket per (item, location).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub item_id: ItemId,
    pub location_id: LocationId,
}

impl StockKey {
    pub fn new(item_id: ItemId, location_id: LocationId) -> Self {
        Self {
            item_id,
            location_id,
        }
    }
}

/// One line of a multi-line debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDebit {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub quantity: u32,
}

/// Per-(item, location) balance store.
///
/// `debit` is the sole authority on availability: `reserve_check` is an
/// advisory read that holds no reservation between check and issuance, so
/// concurrent requests may both pass the check and still race at debit time.
/// Implementations must make `debit`/`debit_all` atomic check-and-decrement
/// operations; a failed debit leaves balances unchanged.
pub trait StockLedger: Send + Sync {
    /// Current available quantity; 0 if no entry exists. Never fails.
    fn balance(&self, item_id: ItemId, location_id: LocationId) -> u32;

    /// Pure advisory read: true iff `balance >= quantity`. Side-effect free.
    fn reserve_check(&self, item_id: ItemId, location_id: LocationId, quantity: u32) -> bool {
        self.balance(item_id, location_id) >= quantity
    }

    /// Atomically increment a balance (procurement path).
    fn credit(&self, item_id: ItemId, location_id: LocationId, quantity: u32) -> DomainResult<()>;

    /// Atomically decrement a balance; `InsufficientStock` if the post-debit
    /// balance would be negative.
    fn debit(&self, item_id: ItemId, location_id: LocationId, quantity: u32) -> DomainResult<()>;

    /// All-or-nothing multi-line debit: every line is validated against
    /// committed balances (cumulatively, so repeated keys are accounted for)
    /// before any line is applied. On failure nothing is decremented and the
    /// error names the first offending line.
    fn debit_all(&self, lines: &[StockDebit]) -> DomainResult<()>;

    /// Point-in-time snapshot of every tracked balance, for reporting reads
    /// (low-stock summaries). Order is unspecified.
    fn entries(&self) -> Vec<(StockKey, u32)>;
}

/// In-memory stock ledger.
///
/// All mutation happens inside a single write guard, which serializes
/// concurrent debits per the concurrency contract. Intended for tests/dev;
/// a durable backend would implement [`StockLedger`] with a conditional
/// UPDATE instead.
#[derive(Debug, Default)]
pub struct InMemoryStockLedger {
    balances: RwLock<HashMap<StockKey, u32>>,
}

impl InMemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn insufficient(key: StockKey, requested: u32, available: u32) -> DomainError {
        DomainError::InsufficientStock {
            item: key.item_id.to_string(),
            location: key.location_id.to_string(),
            requested,
            available,
        }
    }
}

impl StockLedger for InMemoryStockLedger {
    fn balance(&self, item_id: ItemId, location_id: LocationId) -> u32 {
        let balances = match self.balances.read() {
            Ok(guard) => guard,
            // Poisoned lock: balances are plain integers, reads stay safe.
            Err(poisoned) => poisoned.into_inner(),
        };
        *balances
            .get(&StockKey::new(item_id, location_id))
            .unwrap_or(&0)
    }

    fn credit(&self, item_id: ItemId, location_id: LocationId, quantity: u32) -> DomainResult<()> {
        let mut balances = self
            .balances
            .write()
            .map_err(|_| DomainError::conflict("ledger lock poisoned"))?;
        let entry = balances.entry(StockKey::new(item_id, location_id)).or_insert(0);
        *entry = entry.saturating_add(quantity);
        Ok(())
    }

    fn debit(&self, item_id: ItemId, location_id: LocationId, quantity: u32) -> DomainResult<()> {
        self.debit_all(&[StockDebit {
            item_id,
            location_id,
            quantity,
        }])
    }

    fn debit_all(&self, lines: &[StockDebit]) -> DomainResult<()> {
        let mut balances = self
            .balances
            .write()
            .map_err(|_| DomainError::conflict("ledger lock poisoned"))?;

        // First pass: validate cumulatively against committed balances.
        let mut projected: HashMap<StockKey, u32> = HashMap::new();
        for line in lines {
            let key = StockKey::new(line.item_id, line.location_id);
            let remaining = *projected
                .entry(key)
                .or_insert_with(|| *balances.get(&key).unwrap_or(&0));
            if remaining < line.quantity {
                return Err(Self::insufficient(key, line.quantity, remaining));
            }
            projected.insert(key, remaining - line.quantity);
        }

        // Second pass: commit. Still under the same write guard, so no other
        // debit can interleave between validation and commit.
        for (key, new_balance) in projected {
            balances.insert(key, new_balance);
        }

        Ok(())
    }

    fn entries(&self) -> Vec<(StockKey, u32)> {
        let balances = match self.balances.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        balances.iter().map(|(key, qty)| (*key, *qty)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn key() -> (ItemId, LocationId) {
        (ItemId::new(), LocationId::new())
    }

    #[test]
    fn missing_entry_reads_as_zero() {
        let ledger = InMemoryStockLedger::new();
        let (item, location) = key();
        assert_eq!(ledger.balance(item, location), 0);
        assert!(!ledger.reserve_check(item, location, 1));
        assert!(ledger.reserve_check(item, location, 0));
    }

    #[test]
    fn credit_then_debit_round_trips() {
        let ledger = InMemoryStockLedger::new();
        let (item, location) = key();

        ledger.credit(item, location, 15).unwrap();
        assert_eq!(ledger.balance(item, location), 15);

        ledger.debit(item, location, 1).unwrap();
        assert_eq!(ledger.balance(item, location), 14);
    }

    #[test]
    fn debit_beyond_balance_fails_and_leaves_ledger_unchanged() {
        let ledger = InMemoryStockLedger::new();
        let (item, location) = key();
        ledger.credit(item, location, 5).unwrap();

        let err = ledger.debit(item, location, 6).unwrap_err();
        match err {
            DomainError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 6);
                assert_eq!(available, 5);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(ledger.balance(item, location), 5);
    }

    #[test]
    fn debit_all_is_all_or_nothing() {
        let ledger = InMemoryStockLedger::new();
        let (item_a, location) = key();
        let item_b = ItemId::new();
        ledger.credit(item_a, location, 10).unwrap();
        ledger.credit(item_b, location, 2).unwrap();

        let lines = vec![
            StockDebit {
                item_id: item_a,
                location_id: location,
                quantity: 4,
            },
            StockDebit {
                item_id: item_b,
                location_id: location,
                quantity: 3,
            },
        ];

        assert!(ledger.debit_all(&lines).is_err());
        // No partial decrement.
        assert_eq!(ledger.balance(item_a, location), 10);
        assert_eq!(ledger.balance(item_b, location), 2);
    }

    #[test]
    fn debit_all_accounts_for_repeated_keys() {
        let ledger = InMemoryStockLedger::new();
        let (item, location) = key();
        ledger.credit(item, location, 5).unwrap();

        let lines = vec![
            StockDebit {
                item_id: item,
                location_id: location,
                quantity: 3,
            },
            StockDebit {
                item_id: item,
                location_id: location,
                quantity: 3,
            },
        ];

        // Each line alone would pass; cumulatively they must not.
        assert!(ledger.debit_all(&lines).is_err());
        assert_eq!(ledger.balance(item, location), 5);
    }

    #[test]
    fn entries_snapshot_tracked_balances() {
        let ledger = InMemoryStockLedger::new();
        assert!(ledger.entries().is_empty());

        let (item_a, location) = key();
        let item_b = ItemId::new();
        ledger.credit(item_a, location, 3).unwrap();
        ledger.credit(item_b, location, 8).unwrap();
        ledger.debit(item_b, location, 8).unwrap();

        let mut entries = ledger.entries();
        entries.sort_by_key(|(_, qty)| *qty);
        assert_eq!(
            entries,
            vec![
                (StockKey::new(item_b, location), 0),
                (StockKey::new(item_a, location), 3),
            ]
        );
    }

    #[test]
    fn concurrent_debits_never_drive_balance_negative() {
        let ledger = Arc::new(InMemoryStockLedger::new());
        let (item, location) = key();
        ledger.credit(item, location, 7).unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                ledger.debit(item, location, 1).is_ok()
            }));
        }

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 7);
        assert_eq!(ledger.balance(item, location), 0);
    }

    proptest! {
        #[test]
        fn balance_equals_sum_of_successful_operations(ops in proptest::collection::vec((any::<bool>(), 1u32..50), 1..40)) {
            let ledger = InMemoryStockLedger::new();
            let (item, location) = key();

            let mut expected: u64 = 0;
            for (is_credit, qty) in ops {
                if is_credit {
                    ledger.credit(item, location, qty).unwrap();
                    expected += qty as u64;
                } else if ledger.debit(item, location, qty).is_ok() {
                    expected -= qty as u64;
                }
            }

            prop_assert_eq!(ledger.balance(item, location) as u64, expected);
        }
    }
}
