use stockroom_core::{DepartmentId, DomainError, DomainResult};

use crate::{Principal, Role};

/// Require an exact role on the principal.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn require_role(principal: &Principal, required: Role) -> DomainResult<()> {
    if principal.role == required {
        Ok(())
    } else {
        Err(DomainError::authorization(required.as_str()))
    }
}

/// Audit-trail read scope: administrators read everything; everyone else is
/// restricted to requests of their own department.
///
/// Enforcement lives in the surrounding system (API layer); this is the pure
/// policy it applies.
pub fn can_read_audit(principal: &Principal, request_department: DepartmentId) -> bool {
    match principal.role {
        Role::Administrator => true,
        _ => principal.department_id == Some(request_department),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::UserId;

    fn principal(role: Role, department_id: Option<DepartmentId>) -> Principal {
        Principal::new(UserId::new(), role, department_id)
    }

    #[test]
    fn require_role_accepts_matching_role() {
        let p = principal(Role::Administrator, None);
        assert!(require_role(&p, Role::Administrator).is_ok());
    }

    #[test]
    fn require_role_rejects_other_roles() {
        let p = principal(Role::Employee, Some(DepartmentId::new()));
        let err = require_role(&p, Role::Administrator).unwrap_err();
        match err {
            DomainError::Authorization { required } => {
                assert_eq!(required, "administrator");
            }
            other => panic!("expected Authorization, got {other:?}"),
        }
    }

    #[test]
    fn audit_scope_is_unrestricted_for_administrators() {
        let p = principal(Role::Administrator, None);
        assert!(can_read_audit(&p, DepartmentId::new()));
    }

    #[test]
    fn audit_scope_is_own_department_for_others() {
        let dept = DepartmentId::new();
        let hod = principal(Role::HeadOfDepartment, Some(dept));
        assert!(can_read_audit(&hod, dept));
        assert!(!can_read_audit(&hod, DepartmentId::new()));

        let employee = principal(Role::Employee, None);
        assert!(!can_read_audit(&employee, dept));
    }
}
