use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use stockroom_audit::{AuditAction, AuditEntry, AuditTrail};
use stockroom_auth::{Principal, Role, require_role};
use stockroom_core::{
    Aggregate, AggregateId, DomainError, DomainResult, Entity, ItemId, LocationId, UserId,
};
use stockroom_events::EventEnvelope;
use stockroom_ledger::{StockDebit, StockLedger};
use stockroom_masters::Department;
use stockroom_requests::{
    AddLineItem, ApproveRequest, CreateRequest, MarkIssued, RejectRequest, RemoveLineItem,
    RequestCommand, RequestEvent, RequestId, RequestKind, RequestState, StockIssueRequest,
    SubmitRequest,
};

/// Approval workflow engine.
///
/// Drives stock issue requests through their lifecycle, debits the ledger at
/// issuance time and appends every transition to the audit trail. Requests
/// are mutated only through the aggregate's transition functions, never by
/// direct field assignment.
///
/// Concurrency: all transitions run under the request-map write guard, so
/// concurrent transition attempts on the same request are linearizable. The
/// loser of a race observes the committed state and fails its guard. Audit
/// entries are appended before the guard is released, so trail order always
/// matches commit order. The ledger and the trail take their own locks
/// inside this guard and never reach back into the request map, so the lock
/// order is fixed.
pub struct WorkflowEngine<L, A>
where
    L: StockLedger,
    A: AuditTrail,
{
    requests: RwLock<HashMap<RequestId, StockIssueRequest>>,
    ledger: L,
    audit: A,
}

impl<L, A> WorkflowEngine<L, A>
where
    L: StockLedger,
    A: AuditTrail,
{
    pub fn new(ledger: L, audit: A) -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
            ledger,
            audit,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Create a request for the acting principal, snapshotting the required
    /// approvers from the department master at this moment.
    ///
    /// Never touches the ledger: no stock is reserved at creation.
    pub fn create_request(
        &self,
        principal: &Principal,
        department: &Department,
        kind: RequestKind,
        request_no: impl Into<String>,
        purpose: impl Into<String>,
    ) -> DomainResult<RequestId> {
        if principal.department_id != Some(*department.id()) {
            return Err(DomainError::authorization(
                "member of the requesting department",
            ));
        }

        let conditional_approver = match kind {
            RequestKind::Regular => None,
            RequestKind::Alternate => Some(department.conditional_approver().ok_or_else(|| {
                DomainError::validation(
                    "department has no designated conditional approver for alternate requests",
                )
            })?),
        };

        let request_id = RequestId::new(AggregateId::new());
        let cmd = RequestCommand::CreateRequest(CreateRequest {
            request_id,
            request_no: request_no.into(),
            department_id: *department.id(),
            requester: principal.user_id,
            kind,
            purpose: purpose.into(),
            hod: department.hod(),
            conditional_approver,
            occurred_at: Utc::now(),
        });

        let mut requests = self.write_requests()?;
        let request = StockIssueRequest::empty(request_id);
        let events = request.handle(&cmd)?;
        let committed = Self::commit(requests.entry(request_id).or_insert(request), &events);
        self.append_audit(committed);
        drop(requests);

        tracing::info!(%request_id, kind = ?kind, "stock issue request created");
        Ok(request_id)
    }

    /// Add a line item (Draft only, requester only).
    ///
    /// Runs the advisory availability check and logs a warning on shortfall;
    /// the check holds no reservation and never blocks the request.
    pub fn add_line_item(
        &self,
        principal: &Principal,
        request_id: RequestId,
        item_id: ItemId,
        location_id: LocationId,
        quantity: u32,
        description: Option<String>,
    ) -> DomainResult<()> {
        if !self.ledger.reserve_check(item_id, location_id, quantity) {
            tracing::warn!(
                %request_id,
                %item_id,
                %location_id,
                quantity,
                available = self.ledger.balance(item_id, location_id),
                "requested quantity exceeds current stock"
            );
        }

        self.transition(
            request_id,
            RequestCommand::AddLineItem(AddLineItem {
                request_id,
                actor: principal.user_id,
                item_id,
                location_id,
                quantity,
                description,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Remove a line item (Draft only, requester only).
    pub fn remove_line_item(
        &self,
        principal: &Principal,
        request_id: RequestId,
        line_no: u32,
    ) -> DomainResult<()> {
        self.transition(
            request_id,
            RequestCommand::RemoveLineItem(RemoveLineItem {
                request_id,
                actor: principal.user_id,
                line_no,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Submit a draft for approval (Draft -> Pending).
    pub fn submit(&self, principal: &Principal, request_id: RequestId) -> DomainResult<()> {
        self.transition(
            request_id,
            RequestCommand::SubmitRequest(SubmitRequest {
                request_id,
                actor: principal.user_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Approve the current step. Who may approve is a per-request check
    /// derived from the snapshot taken at creation, not a blanket role.
    pub fn approve(
        &self,
        principal: &Principal,
        request_id: RequestId,
        remark: Option<String>,
    ) -> DomainResult<()> {
        self.transition(
            request_id,
            RequestCommand::ApproveRequest(ApproveRequest {
                request_id,
                actor: principal.user_id,
                remark,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Reject with a mandatory reason (recorded verbatim). Terminal.
    pub fn reject(
        &self,
        principal: &Principal,
        request_id: RequestId,
        reason: impl Into<String>,
    ) -> DomainResult<()> {
        self.transition(
            request_id,
            RequestCommand::RejectRequest(RejectRequest {
                request_id,
                actor: principal.user_id,
                reason: reason.into(),
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Issue stock against an approved request (administrators only).
    ///
    /// Debits every line as one all-or-nothing ledger operation. On
    /// shortfall the request stays `Approved` for retry after restock, and
    /// the failure itself is recorded in the audit trail.
    pub fn issue(&self, principal: &Principal, request_id: RequestId) -> DomainResult<()> {
        require_role(principal, Role::Administrator)?;

        let mut requests = self.write_requests()?;
        let request = requests.get_mut(&request_id).ok_or(DomainError::NotFound)?;

        let cmd = RequestCommand::MarkIssued(MarkIssued {
            request_id,
            actor: principal.user_id,
            occurred_at: Utc::now(),
        });
        // State guard first: a second issuance fails here with no ledger
        // effect.
        let events = request.handle(&cmd)?;

        let debits: Vec<StockDebit> = request
            .lines()
            .iter()
            .map(|line| StockDebit {
                item_id: line.item_id,
                location_id: line.location_id,
                quantity: line.quantity,
            })
            .collect();

        if let Err(err) = self.ledger.debit_all(&debits) {
            let failure = AuditEntry::new(
                principal.user_id,
                AuditAction::IssuanceFailed,
                request_id,
                request.state(),
                request.state(),
                Utc::now(),
                Some(format!("issuance failed: {err}")),
            );
            self.audit.append(failure);
            drop(requests);
            tracing::warn!(%request_id, error = %err, "issuance failed on stock availability");
            return Err(err);
        }

        let committed = Self::commit(request, &events);
        self.append_audit(committed);
        drop(requests);

        tracing::info!(%request_id, "stock issued");
        Ok(())
    }

    /// Current state of a request.
    pub fn request(&self, request_id: RequestId) -> DomainResult<StockIssueRequest> {
        let requests = self.read_requests()?;
        requests.get(&request_id).cloned().ok_or(DomainError::NotFound)
    }

    /// Chronological audit trail for a request.
    pub fn audit_trail(
        &self,
        request_id: RequestId,
    ) -> DomainResult<Vec<EventEnvelope<AuditEntry>>> {
        // Existence check so unknown ids surface as NotFound, not an empty
        // trail.
        let _ = self.request(request_id)?;
        Ok(self.audit.entries_for(request_id))
    }

    /// Live balance lookup for the presentation layer.
    pub fn stock_balance(&self, item_id: ItemId, location_id: LocationId) -> u32 {
        self.ledger.balance(item_id, location_id)
    }

    /// Procurement entry: credit stock into a location (administrators only).
    pub fn credit_stock(
        &self,
        principal: &Principal,
        item_id: ItemId,
        location_id: LocationId,
        quantity: u32,
    ) -> DomainResult<()> {
        require_role(principal, Role::Administrator)?;
        self.ledger.credit(item_id, location_id, quantity)
    }

    fn transition(&self, request_id: RequestId, cmd: RequestCommand) -> DomainResult<()> {
        let mut requests = self.write_requests()?;
        let request = requests.get_mut(&request_id).ok_or(DomainError::NotFound)?;
        let events = request.handle(&cmd)?;
        let committed = Self::commit(request, &events);
        // Append before releasing the guard: a transition that commits later
        // must also appear later on the trail.
        self.append_audit(committed);
        Ok(())
    }

    /// Apply events to the aggregate and derive the audit entries, capturing
    /// the before/after state around each application.
    fn commit(request: &mut StockIssueRequest, events: &[RequestEvent]) -> Vec<AuditEntry> {
        let mut entries = Vec::with_capacity(events.len());
        for event in events {
            let before = request.state();
            request.apply(event);
            let after = request.state();
            entries.push(Self::audit_entry(event, before, after));
        }
        entries
    }

    fn append_audit(&self, entries: Vec<AuditEntry>) {
        for entry in entries {
            self.audit.append(entry);
        }
    }

    fn audit_entry(event: &RequestEvent, before: RequestState, after: RequestState) -> AuditEntry {
        let (actor, action, request_id, occurred_at, remark): (
            UserId,
            AuditAction,
            RequestId,
            _,
            Option<String>,
        ) = match event {
            RequestEvent::RequestCreated(e) => {
                (e.requester, AuditAction::Created, e.request_id, e.occurred_at, None)
            }
            RequestEvent::LineItemAdded(e) => (
                e.actor,
                AuditAction::LineItemAdded,
                e.request_id,
                e.occurred_at,
                e.description.clone(),
            ),
            RequestEvent::LineItemRemoved(e) => (
                e.actor,
                AuditAction::LineItemRemoved,
                e.request_id,
                e.occurred_at,
                None,
            ),
            RequestEvent::RequestSubmitted(e) => {
                (e.actor, AuditAction::Submitted, e.request_id, e.occurred_at, None)
            }
            RequestEvent::RequestConditionallyApproved(e) => (
                e.approver,
                AuditAction::ConditionallyApproved,
                e.request_id,
                e.occurred_at,
                e.remark.clone(),
            ),
            RequestEvent::RequestApproved(e) => (
                e.approver,
                AuditAction::Approved,
                e.request_id,
                e.occurred_at,
                e.remark.clone(),
            ),
            RequestEvent::RequestRejected(e) => (
                e.approver,
                AuditAction::Rejected,
                e.request_id,
                e.occurred_at,
                Some(e.reason.clone()),
            ),
            RequestEvent::RequestIssued(e) => (
                e.issued_by,
                AuditAction::Issued,
                e.request_id,
                e.occurred_at,
                None,
            ),
        };

        AuditEntry::new(actor, action, request_id, before, after, occurred_at, remark)
    }

    fn read_requests(
        &self,
    ) -> DomainResult<std::sync::RwLockReadGuard<'_, HashMap<RequestId, StockIssueRequest>>> {
        self.requests
            .read()
            .map_err(|_| DomainError::conflict("request store lock poisoned"))
    }

    fn write_requests(
        &self,
    ) -> DomainResult<std::sync::RwLockWriteGuard<'_, HashMap<RequestId, StockIssueRequest>>> {
        self.requests
            .write()
            .map_err(|_| DomainError::conflict("request store lock poisoned"))
    }
}
