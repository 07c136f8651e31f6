use serde::{Deserialize, Serialize};

use stockroom_core::{DepartmentId, UserId};

use crate::Role;

/// The acting principal, as supplied by the session provider on every call.
///
/// The engine treats this as an opaque input: it never manages login state.
/// `department_id` is the department the principal belongs to (or manages,
/// for a head of department); administrators typically have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    pub department_id: Option<DepartmentId>,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role, department_id: Option<DepartmentId>) -> Self {
        Self {
            user_id,
            role,
            department_id,
        }
    }
}
