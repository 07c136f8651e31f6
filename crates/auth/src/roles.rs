use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockroom_core::DomainError;

/// Role of an acting principal.
///
/// The surrounding identity provider supplies exactly one role per session.
/// Workflow approvals are NOT granted by role alone: the required approver is
/// a per-request relationship (department HOD, designated conditional
/// approver). Roles gate the outer operations (issuing stock, reading the
/// full audit trail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrator,
    HeadOfDepartment,
    Approver,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::HeadOfDepartment => "head_of_department",
            Role::Approver => "approver",
            Role::Employee => "employee",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "administrator" | "admin" => Ok(Role::Administrator),
            "head_of_department" | "hod" => Ok(Role::HeadOfDepartment),
            "approver" => Ok(Role::Approver),
            "employee" => Ok(Role::Employee),
            other => Err(DomainError::invalid_id(format!("unknown role: {other}"))),
        }
    }
}
