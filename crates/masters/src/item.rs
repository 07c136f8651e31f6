use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, ItemId};

/// Catalog item (master data).
///
/// Immutable once referenced by a ledger entry, except for the descriptive
/// fields (`make`, `variant`, `description`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    /// Unique business code, e.g. "LAPTOP001".
    code: String,
    name: String,
    /// Unit of measure, e.g. "pcs", "box".
    unit: String,
    pub make: Option<String>,
    pub variant: Option<String>,
    pub description: Option<String>,
    /// A balance at or below this level flags the item as low on stock.
    pub low_stock_threshold: u32,
    created_at: DateTime<Utc>,
}

impl Item {
    pub fn new(
        id: ItemId,
        code: impl Into<String>,
        name: impl Into<String>,
        unit: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let code = code.into();
        let name = name.into();
        let unit = unit.into();

        if code.trim().is_empty() {
            return Err(DomainError::validation("item code cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        if unit.trim().is_empty() {
            return Err(DomainError::validation("unit of measure cannot be empty"));
        }

        Ok(Self {
            id,
            code,
            name,
            unit,
            make: None,
            variant: None,
            description: None,
            low_stock_threshold: 0,
            created_at,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
