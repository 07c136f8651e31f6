use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{
    Aggregate, AggregateId, AggregateRoot, DepartmentId, DomainError, ItemId, LocationId, UserId,
};
use stockroom_events::Event;

/// Stock issue request identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub AggregateId);

impl RequestId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for RequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Which approval sequence is legal for a request.
///
/// Regular: one HOD approval. Alternate: the designated conditional approver
/// first, then the HOD. There are no other flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Regular,
    Alternate,
}

/// Request lifecycle states. `Rejected` and `Issued` are terminal; rejected
/// and issued requests are retained for audit, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Draft,
    Pending,
    ConditionallyApproved,
    Approved,
    Rejected,
    Issued,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Draft => "draft",
            RequestState::Pending => "pending",
            RequestState::ConditionallyApproved => "conditionally_approved",
            RequestState::Approved => "approved",
            RequestState::Rejected => "rejected",
            RequestState::Issued => "issued",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Rejected | RequestState::Issued)
    }
}

impl core::fmt::Display for RequestState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request line: item, source location, requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub line_no: u32,
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub quantity: u32,
    pub description: Option<String>,
}

/// Aggregate root: StockIssueRequest.
///
/// The required approvers (`hod`, `conditional_approver`) are snapshotted at
/// creation time, so a later department reassignment cannot change who may
/// act on an in-flight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockIssueRequest {
    id: RequestId,
    request_no: String,
    department_id: Option<DepartmentId>,
    requester: Option<UserId>,
    kind: RequestKind,
    purpose: String,
    hod: Option<UserId>,
    conditional_approver: Option<UserId>,
    state: RequestState,
    lines: Vec<LineItem>,
    /// Highest line number ever assigned; removed numbers are not reused, so
    /// audit remarks referencing a line stay unambiguous.
    highest_line_no: u32,
    /// Approval remarks trail, in transition order.
    remarks: Vec<String>,
    rejection_reason: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
    conditionally_approved_by: Option<UserId>,
    conditionally_approved_at: Option<DateTime<Utc>>,
    approved_by: Option<UserId>,
    approved_at: Option<DateTime<Utc>>,
    issued_by: Option<UserId>,
    issued_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl StockIssueRequest {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: RequestId) -> Self {
        Self {
            id,
            request_no: String::new(),
            department_id: None,
            requester: None,
            kind: RequestKind::Regular,
            purpose: String::new(),
            hod: None,
            conditional_approver: None,
            state: RequestState::Draft,
            lines: Vec::new(),
            highest_line_no: 0,
            remarks: Vec::new(),
            rejection_reason: None,
            submitted_at: None,
            conditionally_approved_by: None,
            conditionally_approved_at: None,
            approved_by: None,
            approved_at: None,
            issued_by: None,
            issued_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RequestId {
        self.id
    }

    pub fn request_no(&self) -> &str {
        &self.request_no
    }

    pub fn department_id(&self) -> Option<DepartmentId> {
        self.department_id
    }

    pub fn requester(&self) -> Option<UserId> {
        self.requester
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    pub fn hod(&self) -> Option<UserId> {
        self.hod
    }

    pub fn conditional_approver(&self) -> Option<UserId> {
        self.conditional_approver
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn remarks(&self) -> &[String] {
        &self.remarks
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn issued_by(&self) -> Option<UserId> {
        self.issued_by
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.state, RequestState::Draft)
    }

    /// The approver whose decision is required at the current step, if the
    /// request is awaiting one.
    pub fn required_approver(&self) -> Option<UserId> {
        match (self.state, self.kind) {
            (RequestState::Pending, RequestKind::Regular) => self.hod,
            (RequestState::Pending, RequestKind::Alternate) => self.conditional_approver,
            (RequestState::ConditionallyApproved, _) => self.hod,
            _ => None,
        }
    }
}

impl AggregateRoot for StockIssueRequest {
    type Id = RequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateRequest.
///
/// Creation never touches the ledger; no stock is reserved at this point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub request_id: RequestId,
    /// Human-facing number, e.g. "REQ20250828001". Supplied by the caller.
    pub request_no: String,
    pub department_id: DepartmentId,
    pub requester: UserId,
    pub kind: RequestKind,
    pub purpose: String,
    /// HOD snapshot taken from the department at creation time.
    pub hod: UserId,
    /// Required iff `kind` is Alternate.
    pub conditional_approver: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLineItem (Draft only, requester only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLineItem {
    pub request_id: RequestId,
    pub actor: UserId,
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub quantity: u32,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLineItem (Draft only, requester only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLineItem {
    pub request_id: RequestId,
    pub actor: UserId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitRequest (Draft -> Pending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub request_id: RequestId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub request_id: RequestId,
    pub actor: UserId,
    pub remark: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectRequest. A non-empty reason is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectRequest {
    pub request_id: RequestId,
    pub actor: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkIssued (Approved -> Issued).
///
/// The ledger debit itself is coordinated by the workflow engine; this
/// command only closes the request once the debit has committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkIssued {
    pub request_id: RequestId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestCommand {
    CreateRequest(CreateRequest),
    AddLineItem(AddLineItem),
    RemoveLineItem(RemoveLineItem),
    SubmitRequest(SubmitRequest),
    ApproveRequest(ApproveRequest),
    RejectRequest(RejectRequest),
    MarkIssued(MarkIssued),
}

/// Event: RequestCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCreated {
    pub request_id: RequestId,
    pub request_no: String,
    pub department_id: DepartmentId,
    pub requester: UserId,
    pub kind: RequestKind,
    pub purpose: String,
    pub hod: UserId,
    pub conditional_approver: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemAdded {
    pub request_id: RequestId,
    pub actor: UserId,
    pub line_no: u32,
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub quantity: u32,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineItemRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRemoved {
    pub request_id: RequestId,
    pub actor: UserId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSubmitted {
    pub request_id: RequestId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestConditionallyApproved (Alternate flow, first step).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestConditionallyApproved {
    pub request_id: RequestId,
    pub approver: UserId,
    pub remark: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestApproved (final HOD sign-off).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestApproved {
    pub request_id: RequestId,
    pub approver: UserId,
    pub remark: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestRejected. The reason is recorded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRejected {
    pub request_id: RequestId,
    pub approver: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestIssued {
    pub request_id: RequestId,
    pub issued_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestEvent {
    RequestCreated(RequestCreated),
    LineItemAdded(LineItemAdded),
    LineItemRemoved(LineItemRemoved),
    RequestSubmitted(RequestSubmitted),
    RequestConditionallyApproved(RequestConditionallyApproved),
    RequestApproved(RequestApproved),
    RequestRejected(RequestRejected),
    RequestIssued(RequestIssued),
}

impl Event for RequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequestEvent::RequestCreated(_) => "stock.request.created",
            RequestEvent::LineItemAdded(_) => "stock.request.line_added",
            RequestEvent::LineItemRemoved(_) => "stock.request.line_removed",
            RequestEvent::RequestSubmitted(_) => "stock.request.submitted",
            RequestEvent::RequestConditionallyApproved(_) => "stock.request.conditionally_approved",
            RequestEvent::RequestApproved(_) => "stock.request.approved",
            RequestEvent::RequestRejected(_) => "stock.request.rejected",
            RequestEvent::RequestIssued(_) => "stock.request.issued",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RequestEvent::RequestCreated(e) => e.occurred_at,
            RequestEvent::LineItemAdded(e) => e.occurred_at,
            RequestEvent::LineItemRemoved(e) => e.occurred_at,
            RequestEvent::RequestSubmitted(e) => e.occurred_at,
            RequestEvent::RequestConditionallyApproved(e) => e.occurred_at,
            RequestEvent::RequestApproved(e) => e.occurred_at,
            RequestEvent::RequestRejected(e) => e.occurred_at,
            RequestEvent::RequestIssued(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockIssueRequest {
    type Command = RequestCommand;
    type Event = RequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RequestEvent::RequestCreated(e) => {
                self.id = e.request_id;
                self.request_no = e.request_no.clone();
                self.department_id = Some(e.department_id);
                self.requester = Some(e.requester);
                self.kind = e.kind;
                self.purpose = e.purpose.clone();
                self.hod = Some(e.hod);
                self.conditional_approver = e.conditional_approver;
                self.state = RequestState::Draft;
                self.lines.clear();
                self.highest_line_no = 0;
                self.created = true;
            }
            RequestEvent::LineItemAdded(e) => {
                self.lines.push(LineItem {
                    line_no: e.line_no,
                    item_id: e.item_id,
                    location_id: e.location_id,
                    quantity: e.quantity,
                    description: e.description.clone(),
                });
                self.highest_line_no = self.highest_line_no.max(e.line_no);
            }
            RequestEvent::LineItemRemoved(e) => {
                self.lines.retain(|line| line.line_no != e.line_no);
            }
            RequestEvent::RequestSubmitted(e) => {
                self.state = RequestState::Pending;
                self.submitted_at = Some(e.occurred_at);
            }
            RequestEvent::RequestConditionallyApproved(e) => {
                self.state = RequestState::ConditionallyApproved;
                self.conditionally_approved_by = Some(e.approver);
                self.conditionally_approved_at = Some(e.occurred_at);
                if let Some(remark) = &e.remark {
                    self.remarks.push(remark.clone());
                }
            }
            RequestEvent::RequestApproved(e) => {
                self.state = RequestState::Approved;
                self.approved_by = Some(e.approver);
                self.approved_at = Some(e.occurred_at);
                if let Some(remark) = &e.remark {
                    self.remarks.push(remark.clone());
                }
            }
            RequestEvent::RequestRejected(e) => {
                self.state = RequestState::Rejected;
                self.rejection_reason = Some(e.reason.clone());
            }
            RequestEvent::RequestIssued(e) => {
                self.state = RequestState::Issued;
                self.issued_by = Some(e.issued_by);
                self.issued_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RequestCommand::CreateRequest(cmd) => self.handle_create(cmd),
            RequestCommand::AddLineItem(cmd) => self.handle_add_line(cmd),
            RequestCommand::RemoveLineItem(cmd) => self.handle_remove_line(cmd),
            RequestCommand::SubmitRequest(cmd) => self.handle_submit(cmd),
            RequestCommand::ApproveRequest(cmd) => self.handle_approve(cmd),
            RequestCommand::RejectRequest(cmd) => self.handle_reject(cmd),
            RequestCommand::MarkIssued(cmd) => self.handle_mark_issued(cmd),
        }
    }
}

impl StockIssueRequest {
    fn ensure_request_id(&self, request_id: RequestId) -> Result<(), DomainError> {
        if self.id != request_id {
            return Err(DomainError::conflict("request_id mismatch"));
        }
        Ok(())
    }

    fn ensure_requester(&self, actor: UserId) -> Result<(), DomainError> {
        if self.requester != Some(actor) {
            return Err(DomainError::authorization("requester"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateRequest) -> Result<Vec<RequestEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("request already exists"));
        }
        if cmd.request_no.trim().is_empty() {
            return Err(DomainError::validation("request number cannot be empty"));
        }
        if cmd.purpose.trim().is_empty() {
            return Err(DomainError::validation("purpose cannot be empty"));
        }
        match (cmd.kind, cmd.conditional_approver) {
            (RequestKind::Alternate, None) => {
                return Err(DomainError::validation(
                    "alternate requests require a conditional approver",
                ));
            }
            (RequestKind::Regular, Some(_)) => {
                return Err(DomainError::validation(
                    "regular requests must not name a conditional approver",
                ));
            }
            _ => {}
        }
        if cmd.conditional_approver == Some(cmd.requester) {
            return Err(DomainError::validation(
                "requester cannot be their own conditional approver",
            ));
        }

        Ok(vec![RequestEvent::RequestCreated(RequestCreated {
            request_id: cmd.request_id,
            request_no: cmd.request_no.clone(),
            department_id: cmd.department_id,
            requester: cmd.requester,
            kind: cmd.kind,
            purpose: cmd.purpose.clone(),
            hod: cmd.hod,
            conditional_approver: cmd.conditional_approver,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLineItem) -> Result<Vec<RequestEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_request_id(cmd.request_id)?;
        self.ensure_requester(cmd.actor)?;

        if !self.is_modifiable() {
            return Err(DomainError::invalid_state(
                "add_line_item",
                self.state.as_str(),
            ));
        }
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let next_line_no = self.highest_line_no + 1;

        Ok(vec![RequestEvent::LineItemAdded(LineItemAdded {
            request_id: cmd.request_id,
            actor: cmd.actor,
            line_no: next_line_no,
            item_id: cmd.item_id,
            location_id: cmd.location_id,
            quantity: cmd.quantity,
            description: cmd.description.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(&self, cmd: &RemoveLineItem) -> Result<Vec<RequestEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_request_id(cmd.request_id)?;
        self.ensure_requester(cmd.actor)?;

        if !self.is_modifiable() {
            return Err(DomainError::invalid_state(
                "remove_line_item",
                self.state.as_str(),
            ));
        }
        if !self.lines.iter().any(|l| l.line_no == cmd.line_no) {
            return Err(DomainError::validation(format!(
                "no line item {} on this request",
                cmd.line_no
            )));
        }

        Ok(vec![RequestEvent::LineItemRemoved(LineItemRemoved {
            request_id: cmd.request_id,
            actor: cmd.actor,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitRequest) -> Result<Vec<RequestEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_request_id(cmd.request_id)?;
        self.ensure_requester(cmd.actor)?;

        if self.state != RequestState::Draft {
            return Err(DomainError::invalid_state("submit", self.state.as_str()));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot submit a request without line items",
            ));
        }

        Ok(vec![RequestEvent::RequestSubmitted(RequestSubmitted {
            request_id: cmd.request_id,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveRequest) -> Result<Vec<RequestEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_request_id(cmd.request_id)?;

        match (self.state, self.kind) {
            (RequestState::Pending, RequestKind::Regular) => {
                if Some(cmd.actor) != self.hod {
                    return Err(DomainError::authorization("head of department"));
                }
                Ok(vec![RequestEvent::RequestApproved(RequestApproved {
                    request_id: cmd.request_id,
                    approver: cmd.actor,
                    remark: cmd.remark.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            (RequestState::Pending, RequestKind::Alternate) => {
                if Some(cmd.actor) == self.conditional_approver {
                    Ok(vec![RequestEvent::RequestConditionallyApproved(
                        RequestConditionallyApproved {
                            request_id: cmd.request_id,
                            approver: cmd.actor,
                            remark: cmd.remark.clone(),
                            occurred_at: cmd.occurred_at,
                        },
                    )])
                } else if Some(cmd.actor) == self.hod {
                    // Conditional approval must precede the HOD sign-off.
                    Err(DomainError::invalid_state(
                        "approve",
                        "awaiting conditional approval",
                    ))
                } else {
                    Err(DomainError::authorization("conditional approver"))
                }
            }
            (RequestState::ConditionallyApproved, _) => {
                if Some(cmd.actor) != self.hod {
                    return Err(DomainError::authorization("head of department"));
                }
                Ok(vec![RequestEvent::RequestApproved(RequestApproved {
                    request_id: cmd.request_id,
                    approver: cmd.actor,
                    remark: cmd.remark.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            (state, _) => Err(DomainError::invalid_state("approve", state.as_str())),
        }
    }

    fn handle_reject(&self, cmd: &RejectRequest) -> Result<Vec<RequestEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_request_id(cmd.request_id)?;

        if !matches!(
            self.state,
            RequestState::Pending | RequestState::ConditionallyApproved
        ) {
            return Err(DomainError::invalid_state("reject", self.state.as_str()));
        }

        let required = self
            .required_approver()
            .ok_or_else(|| DomainError::invalid_state("reject", self.state.as_str()))?;
        if cmd.actor != required {
            let role = match (self.state, self.kind) {
                (RequestState::Pending, RequestKind::Alternate) => "conditional approver",
                _ => "head of department",
            };
            return Err(DomainError::authorization(role));
        }

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("rejection reason is required"));
        }

        Ok(vec![RequestEvent::RequestRejected(RequestRejected {
            request_id: cmd.request_id,
            approver: cmd.actor,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_issued(&self, cmd: &MarkIssued) -> Result<Vec<RequestEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_request_id(cmd.request_id)?;

        if self.state != RequestState::Approved {
            return Err(DomainError::invalid_state("issue", self.state.as_str()));
        }

        Ok(vec![RequestEvent::RequestIssued(RequestIssued {
            request_id: cmd.request_id,
            issued_by: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::AggregateId;

    fn test_request_id() -> RequestId {
        RequestId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    struct Fixture {
        request: StockIssueRequest,
        request_id: RequestId,
        requester: UserId,
        hod: UserId,
        conditional: UserId,
    }

    fn run(request: &mut StockIssueRequest, cmd: RequestCommand) -> RequestEvent {
        let events = request.handle(&cmd).unwrap();
        assert_eq!(events.len(), 1);
        request.apply(&events[0]);
        events.into_iter().next().unwrap()
    }

    /// Build a request in Draft with one line item.
    fn draft_fixture(kind: RequestKind) -> Fixture {
        let request_id = test_request_id();
        let requester = UserId::new();
        let hod = UserId::new();
        let conditional = UserId::new();
        let mut request = StockIssueRequest::empty(request_id);

        let conditional_approver = match kind {
            RequestKind::Regular => None,
            RequestKind::Alternate => Some(conditional),
        };

        run(
            &mut request,
            RequestCommand::CreateRequest(CreateRequest {
                request_id,
                request_no: "REQ20250828001".to_string(),
                department_id: DepartmentId::new(),
                requester,
                kind,
                purpose: "Replacement hardware".to_string(),
                hod,
                conditional_approver,
                occurred_at: test_time(),
            }),
        );
        run(
            &mut request,
            RequestCommand::AddLineItem(AddLineItem {
                request_id,
                actor: requester,
                item_id: ItemId::new(),
                location_id: LocationId::new(),
                quantity: 1,
                description: Some("Laptop".to_string()),
                occurred_at: test_time(),
            }),
        );

        Fixture {
            request,
            request_id,
            requester,
            hod,
            conditional,
        }
    }

    /// Fixture advanced to Pending.
    fn pending_fixture(kind: RequestKind) -> Fixture {
        let mut fx = draft_fixture(kind);
        run(
            &mut fx.request,
            RequestCommand::SubmitRequest(SubmitRequest {
                request_id: fx.request_id,
                actor: fx.requester,
                occurred_at: test_time(),
            }),
        );
        fx
    }

    /// Fixture advanced to Approved.
    fn approved_fixture(kind: RequestKind) -> Fixture {
        let mut fx = pending_fixture(kind);
        if kind == RequestKind::Alternate {
            run(
                &mut fx.request,
                RequestCommand::ApproveRequest(ApproveRequest {
                    request_id: fx.request_id,
                    actor: fx.conditional,
                    remark: None,
                    occurred_at: test_time(),
                }),
            );
        }
        run(
            &mut fx.request,
            RequestCommand::ApproveRequest(ApproveRequest {
                request_id: fx.request_id,
                actor: fx.hod,
                remark: None,
                occurred_at: test_time(),
            }),
        );
        fx
    }

    #[test]
    fn create_validates_kind_and_conditional_approver() {
        let request = StockIssueRequest::empty(test_request_id());
        let base = CreateRequest {
            request_id: *request.id(),
            request_no: "REQ20250828001".to_string(),
            department_id: DepartmentId::new(),
            requester: UserId::new(),
            kind: RequestKind::Alternate,
            purpose: "Spares".to_string(),
            hod: UserId::new(),
            conditional_approver: None,
            occurred_at: test_time(),
        };

        // Alternate without a conditional approver.
        let err = request
            .handle(&RequestCommand::CreateRequest(base.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        // Regular naming one.
        let err = request
            .handle(&RequestCommand::CreateRequest(CreateRequest {
                kind: RequestKind::Regular,
                conditional_approver: Some(UserId::new()),
                ..base.clone()
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        // Requester approving their own request.
        let err = request
            .handle(&RequestCommand::CreateRequest(CreateRequest {
                conditional_approver: Some(base.requester),
                ..base
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn line_items_are_editable_only_in_draft() {
        let fx = pending_fixture(RequestKind::Regular);
        let err = fx
            .request
            .handle(&RequestCommand::AddLineItem(AddLineItem {
                request_id: fx.request_id,
                actor: fx.requester,
                item_id: ItemId::new(),
                location_id: LocationId::new(),
                quantity: 2,
                description: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvalidState { operation, state } => {
                assert_eq!(operation, "add_line_item");
                assert_eq!(state, "pending");
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[test]
    fn zero_quantity_line_is_rejected() {
        let fx = draft_fixture(RequestKind::Regular);
        let err = fx
            .request
            .handle(&RequestCommand::AddLineItem(AddLineItem {
                request_id: fx.request_id,
                actor: fx.requester,
                item_id: ItemId::new(),
                location_id: LocationId::new(),
                quantity: 0,
                description: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn removed_lines_do_not_reuse_line_numbers() {
        let mut fx = draft_fixture(RequestKind::Regular);
        run(
            &mut fx.request,
            RequestCommand::RemoveLineItem(RemoveLineItem {
                request_id: fx.request_id,
                actor: fx.requester,
                line_no: 1,
                occurred_at: test_time(),
            }),
        );
        assert!(fx.request.lines().is_empty());

        let event = run(
            &mut fx.request,
            RequestCommand::AddLineItem(AddLineItem {
                request_id: fx.request_id,
                actor: fx.requester,
                item_id: ItemId::new(),
                location_id: LocationId::new(),
                quantity: 2,
                description: None,
                occurred_at: test_time(),
            }),
        );
        match event {
            RequestEvent::LineItemAdded(e) => assert_eq!(e.line_no, 2),
            other => panic!("expected LineItemAdded, got {other:?}"),
        }
    }

    #[test]
    fn submit_requires_at_least_one_line_item() {
        let mut fx = draft_fixture(RequestKind::Regular);
        run(
            &mut fx.request,
            RequestCommand::RemoveLineItem(RemoveLineItem {
                request_id: fx.request_id,
                actor: fx.requester,
                line_no: 1,
                occurred_at: test_time(),
            }),
        );

        let err = fx
            .request
            .handle(&RequestCommand::SubmitRequest(SubmitRequest {
                request_id: fx.request_id,
                actor: fx.requester,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn only_the_requester_can_submit() {
        let fx = draft_fixture(RequestKind::Regular);
        let err = fx
            .request
            .handle(&RequestCommand::SubmitRequest(SubmitRequest {
                request_id: fx.request_id,
                actor: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Authorization { .. }));
    }

    #[test]
    fn regular_request_is_approved_by_one_hod_decision() {
        let mut fx = pending_fixture(RequestKind::Regular);
        run(
            &mut fx.request,
            RequestCommand::ApproveRequest(ApproveRequest {
                request_id: fx.request_id,
                actor: fx.hod,
                remark: Some("ok".to_string()),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(fx.request.state(), RequestState::Approved);
        assert_eq!(fx.request.approved_by(), Some(fx.hod));
        assert_eq!(fx.request.remarks(), ["ok".to_string()]);
    }

    #[test]
    fn regular_approval_by_non_hod_is_unauthorized() {
        let fx = pending_fixture(RequestKind::Regular);
        let err = fx
            .request
            .handle(&RequestCommand::ApproveRequest(ApproveRequest {
                request_id: fx.request_id,
                actor: UserId::new(),
                remark: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Authorization { required } => {
                assert_eq!(required, "head of department");
            }
            other => panic!("expected Authorization, got {other:?}"),
        }
    }

    #[test]
    fn alternate_request_needs_conditional_then_hod() {
        let mut fx = pending_fixture(RequestKind::Alternate);

        run(
            &mut fx.request,
            RequestCommand::ApproveRequest(ApproveRequest {
                request_id: fx.request_id,
                actor: fx.conditional,
                remark: None,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(fx.request.state(), RequestState::ConditionallyApproved);

        run(
            &mut fx.request,
            RequestCommand::ApproveRequest(ApproveRequest {
                request_id: fx.request_id,
                actor: fx.hod,
                remark: None,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(fx.request.state(), RequestState::Approved);
    }

    #[test]
    fn hod_cannot_approve_alternate_before_conditional_approver() {
        let fx = pending_fixture(RequestKind::Alternate);
        let err = fx
            .request
            .handle(&RequestCommand::ApproveRequest(ApproveRequest {
                request_id: fx.request_id,
                actor: fx.hod,
                remark: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
    }

    #[test]
    fn rejection_requires_a_reason() {
        let fx = pending_fixture(RequestKind::Regular);
        let err = fx
            .request
            .handle(&RequestCommand::RejectRequest(RejectRequest {
                request_id: fx.request_id,
                actor: fx.hod,
                reason: "   ".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejection_reason_is_recorded_verbatim_and_terminal() {
        let mut fx = pending_fixture(RequestKind::Regular);
        run(
            &mut fx.request,
            RequestCommand::RejectRequest(RejectRequest {
                request_id: fx.request_id,
                actor: fx.hod,
                reason: "Excessive quantity".to_string(),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(fx.request.state(), RequestState::Rejected);
        assert_eq!(fx.request.rejection_reason(), Some("Excessive quantity"));

        // No approval or issuance after rejection.
        let err = fx
            .request
            .handle(&RequestCommand::ApproveRequest(ApproveRequest {
                request_id: fx.request_id,
                actor: fx.hod,
                remark: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));

        let err = fx
            .request
            .handle(&RequestCommand::MarkIssued(MarkIssued {
                request_id: fx.request_id,
                actor: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
    }

    #[test]
    fn only_the_required_approver_may_reject() {
        let fx = pending_fixture(RequestKind::Alternate);
        // HOD is not the required approver while the conditional step is open.
        let err = fx
            .request
            .handle(&RequestCommand::RejectRequest(RejectRequest {
                request_id: fx.request_id,
                actor: fx.hod,
                reason: "No budget".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Authorization { .. }));
    }

    #[test]
    fn issue_before_final_approval_is_invalid_state() {
        let mut fx = pending_fixture(RequestKind::Alternate);
        run(
            &mut fx.request,
            RequestCommand::ApproveRequest(ApproveRequest {
                request_id: fx.request_id,
                actor: fx.conditional,
                remark: None,
                occurred_at: test_time(),
            }),
        );

        let err = fx
            .request
            .handle(&RequestCommand::MarkIssued(MarkIssued {
                request_id: fx.request_id,
                actor: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvalidState { operation, state } => {
                assert_eq!(operation, "issue");
                assert_eq!(state, "conditionally_approved");
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[test]
    fn second_issuance_is_guarded() {
        let mut fx = approved_fixture(RequestKind::Regular);
        let admin = UserId::new();

        run(
            &mut fx.request,
            RequestCommand::MarkIssued(MarkIssued {
                request_id: fx.request_id,
                actor: admin,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(fx.request.state(), RequestState::Issued);
        assert_eq!(fx.request.issued_by(), Some(admin));

        let err = fx
            .request
            .handle(&RequestCommand::MarkIssued(MarkIssued {
                request_id: fx.request_id,
                actor: admin,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvalidState { operation, state } => {
                assert_eq!(operation, "issue");
                assert_eq!(state, "issued");
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let fx = pending_fixture(RequestKind::Regular);
        let before = fx.request.clone();

        let _ = fx.request.handle(&RequestCommand::ApproveRequest(ApproveRequest {
            request_id: fx.request_id,
            actor: fx.hod,
            remark: None,
            occurred_at: test_time(),
        }));

        assert_eq!(fx.request, before);
    }

    #[test]
    fn version_increments_per_applied_event() {
        let fx = approved_fixture(RequestKind::Alternate);
        // created + line + submitted + conditional + final = 5
        assert_eq!(fx.request.version(), 5);
    }

    proptest::proptest! {
        /// Whatever sequence of adds and removes is applied in Draft, line
        /// numbers stay unique and strictly increasing and are never reused.
        #[test]
        fn line_numbers_are_unique_and_never_reused(ops in proptest::collection::vec(proptest::bool::ANY, 1..30)) {
            let mut fx = draft_fixture(RequestKind::Regular);
            let mut seen = std::collections::HashSet::new();
            seen.insert(1u32);

            for add in ops {
                if add {
                    let event = run(
                        &mut fx.request,
                        RequestCommand::AddLineItem(AddLineItem {
                            request_id: fx.request_id,
                            actor: fx.requester,
                            item_id: ItemId::new(),
                            location_id: LocationId::new(),
                            quantity: 1,
                            description: None,
                            occurred_at: test_time(),
                        }),
                    );
                    if let RequestEvent::LineItemAdded(e) = event {
                        // A removed number must never come back.
                        proptest::prop_assert!(seen.insert(e.line_no));
                    }
                } else if let Some(line) = fx.request.lines().first() {
                    let line_no = line.line_no;
                    run(
                        &mut fx.request,
                        RequestCommand::RemoveLineItem(RemoveLineItem {
                            request_id: fx.request_id,
                            actor: fx.requester,
                            line_no,
                            occurred_at: test_time(),
                        }),
                    );
                }
            }

            let numbers: Vec<u32> = fx.request.lines().iter().map(|l| l.line_no).collect();
            proptest::prop_assert!(numbers.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn required_approver_tracks_the_current_step() {
        let fx = pending_fixture(RequestKind::Alternate);
        assert_eq!(fx.request.required_approver(), Some(fx.conditional));

        let mut fx = fx;
        run(
            &mut fx.request,
            RequestCommand::ApproveRequest(ApproveRequest {
                request_id: fx.request_id,
                actor: fx.conditional,
                remark: None,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(fx.request.required_approver(), Some(fx.hod));

        let fx = approved_fixture(RequestKind::Regular);
        assert_eq!(fx.request.required_approver(), None);
    }
}
