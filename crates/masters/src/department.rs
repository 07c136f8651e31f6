use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DepartmentId, DomainError, DomainResult, Entity, UserId};

/// Department (master data): one designated head-of-department and,
/// optionally, one designated conditional approver for alternate-flow
/// requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    id: DepartmentId,
    /// Unique business code, e.g. "IT".
    code: String,
    name: String,
    hod: UserId,
    conditional_approver: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl Department {
    pub fn new(
        id: DepartmentId,
        code: impl Into<String>,
        name: impl Into<String>,
        hod: UserId,
        conditional_approver: Option<UserId>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let code = code.into();
        let name = name.into();

        if code.trim().is_empty() {
            return Err(DomainError::validation("department code cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(DomainError::validation("department name cannot be empty"));
        }

        Ok(Self {
            id,
            code,
            name,
            hod,
            conditional_approver,
            created_at,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hod(&self) -> UserId {
        self.hod
    }

    pub fn conditional_approver(&self) -> Option<UserId> {
        self.conditional_approver
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Department {
    type Id = DepartmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
