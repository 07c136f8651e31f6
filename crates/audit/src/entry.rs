use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockroom_core::UserId;
use stockroom_requests::{RequestId, RequestState};

/// What happened to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    LineItemAdded,
    LineItemRemoved,
    Submitted,
    ConditionallyApproved,
    Approved,
    Rejected,
    Issued,
    /// An issuance attempt that failed on stock availability. The request
    /// stays `Approved`; `before == after`.
    IssuanceFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::LineItemAdded => "line_item_added",
            AuditAction::LineItemRemoved => "line_item_removed",
            AuditAction::Submitted => "submitted",
            AuditAction::ConditionallyApproved => "conditionally_approved",
            AuditAction::Approved => "approved",
            AuditAction::Rejected => "rejected",
            AuditAction::Issued => "issued",
            AuditAction::IssuanceFailed => "issuance_failed",
        }
    }
}

/// One record in the append-only audit trail.
///
/// Entries are facts: never mutated, never deleted. Rejection reasons and
/// approval remarks are carried verbatim in `remark`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: Uuid,
    pub actor: UserId,
    pub action: AuditAction,
    pub request_id: RequestId,
    pub before: RequestState,
    pub after: RequestState,
    pub occurred_at: DateTime<Utc>,
    pub remark: Option<String>,
}

impl AuditEntry {
    pub fn new(
        actor: UserId,
        action: AuditAction,
        request_id: RequestId,
        before: RequestState,
        after: RequestState,
        occurred_at: DateTime<Utc>,
        remark: Option<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::now_v7(),
            actor,
            action,
            request_id,
            before,
            after,
            occurred_at,
            remark,
        }
    }
}
