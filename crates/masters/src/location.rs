use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, LocationId};

/// Stock location (master data). Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    id: LocationId,
    office: String,
    room_store: String,
    created_at: DateTime<Utc>,
}

impl Location {
    pub fn new(
        id: LocationId,
        office: impl Into<String>,
        room_store: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let office = office.into();
        let room_store = room_store.into();

        if office.trim().is_empty() {
            return Err(DomainError::validation("office cannot be empty"));
        }
        if room_store.trim().is_empty() {
            return Err(DomainError::validation("room/store cannot be empty"));
        }

        Ok(Self {
            id,
            office,
            room_store,
            created_at,
        })
    }

    pub fn office(&self) -> &str {
        &self.office
    }

    pub fn room_store(&self) -> &str {
        &self.room_store
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Location {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl core::fmt::Display for Location {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} - {}", self.office, self.room_store)
    }
}
