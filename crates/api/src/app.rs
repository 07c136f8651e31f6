use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use stockroom_audit::{AuditEntry, InMemoryAuditTrail};
use stockroom_auth::{Principal, Role, can_read_audit, require_role};
use stockroom_core::{DepartmentId, DomainError, ItemId, LocationId, UserId};
use stockroom_events::EventEnvelope;
use stockroom_ledger::{InMemoryStockLedger, StockLedger};
use stockroom_masters::{Department, Item, Location};
use stockroom_requests::{RequestId, RequestKind, StockIssueRequest};
use stockroom_workflow::WorkflowEngine;

type Engine = WorkflowEngine<InMemoryStockLedger, InMemoryAuditTrail>;

/// Shared application state: the engine plus the master-data registries.
///
/// The registries are consulted for referential checks only; the engine and
/// the ledger key on plain ids.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    departments: Arc<RwLock<HashMap<DepartmentId, Department>>>,
    items: Arc<RwLock<HashMap<ItemId, Item>>>,
    locations: Arc<RwLock<HashMap<LocationId, Location>>>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            departments: Arc::new(RwLock::new(HashMap::new())),
            items: Arc::new(RwLock::new(HashMap::new())),
            locations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn known_item(&self, item_id: ItemId) -> Result<(), DomainError> {
        let items = self
            .items
            .read()
            .map_err(|_| DomainError::conflict("item registry lock poisoned"))?;
        if items.contains_key(&item_id) {
            Ok(())
        } else {
            Err(DomainError::NotFound)
        }
    }

    fn known_location(&self, location_id: LocationId) -> Result<(), DomainError> {
        let locations = self
            .locations
            .read()
            .map_err(|_| DomainError::conflict("location registry lock poisoned"))?;
        if locations.contains_key(&location_id) {
            Ok(())
        } else {
            Err(DomainError::NotFound)
        }
    }
}

/// Build the HTTP application with in-memory infrastructure.
pub fn build_app() -> Router {
    let engine = Arc::new(WorkflowEngine::new(
        InMemoryStockLedger::new(),
        InMemoryAuditTrail::new(),
    ));
    build_app_with(AppState::new(engine))
}

pub fn build_app_with(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/stock/balance", get(stock_balance))
        .route("/stock/low", get(low_stock))
        .route("/stock/credit", post(credit_stock))
        .route("/departments", post(register_department))
        .route("/items", post(register_item))
        .route("/locations", post(register_location))
        .route("/requests", post(create_request))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/lines", post(add_line_item))
        .route("/requests/:id/lines/:line_no/remove", post(remove_line_item))
        .route("/requests/:id/submit", post(submit_request))
        .route("/requests/:id/approve", post(approve_request))
        .route("/requests/:id/reject", post(reject_request))
        .route("/requests/:id/issue", post(issue_request))
        .route("/requests/:id/audit", get(get_audit_trail))
        .with_state(state)
}

/// Resolve the acting principal from the `x-user-id` / `x-role` /
/// `x-department-id` headers supplied by the identity collaborator (e.g. an
/// authenticating reverse proxy). The engine never manages login state.
pub(crate) fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, Response> {
    let header = |name: &str| -> Result<Option<&str>, Response> {
        match headers.get(name) {
            None => Ok(None),
            Some(v) => v.to_str().map(Some).map_err(|_| {
                json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_header",
                    format!("{name} is not valid UTF-8"),
                )
            }),
        }
    };

    let user_id = header("x-user-id")?.ok_or_else(|| {
        json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "x-user-id header is required")
    })?;
    let role = header("x-role")?.ok_or_else(|| {
        json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "x-role header is required")
    })?;
    let department = header("x-department-id")?;

    let user_id = UserId::from_str(user_id).map_err(bad_request)?;
    let role = Role::from_str(role).map_err(bad_request)?;
    let department_id = department
        .map(DepartmentId::from_str)
        .transpose()
        .map_err(bad_request)?;

    Ok(Principal::new(user_id, role, department_id))
}

// Request/response DTOs.

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub item_id: ItemId,
    pub location_id: LocationId,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: u32,
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub location_id: Option<LocationId>,
}

#[derive(Debug, Serialize)]
pub struct LowStockEntry {
    pub item_id: ItemId,
    pub item_code: String,
    pub location_id: LocationId,
    pub quantity: u32,
    pub low_stock_threshold: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreditBody {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct RegisterItemBody {
    pub code: String,
    pub name: String,
    pub unit: String,
    pub make: Option<String>,
    pub variant: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub low_stock_threshold: u32,
}

#[derive(Debug, Deserialize)]
pub struct RegisterLocationBody {
    pub office: String,
    pub room_store: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterDepartmentBody {
    pub code: String,
    pub name: String,
    pub hod: UserId,
    pub conditional_approver: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequestBody {
    pub department_id: DepartmentId,
    pub kind: RequestKind,
    pub request_no: String,
    pub purpose: String,
}

#[derive(Debug, Deserialize)]
pub struct AddLineBody {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub quantity: u32,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveBody {
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct LineItemView {
    pub line_no: u32,
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub quantity: u32,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RequestView {
    pub request_id: RequestId,
    pub request_no: String,
    pub department_id: Option<DepartmentId>,
    pub requester: Option<UserId>,
    pub kind: RequestKind,
    pub purpose: String,
    pub state: String,
    pub lines: Vec<LineItemView>,
    pub remarks: Vec<String>,
    pub rejection_reason: Option<String>,
}

impl RequestView {
    fn from_request(request: &StockIssueRequest) -> Self {
        Self {
            request_id: request.id_typed(),
            request_no: request.request_no().to_string(),
            department_id: request.department_id(),
            requester: request.requester(),
            kind: request.kind(),
            purpose: request.purpose().to_string(),
            state: request.state().to_string(),
            lines: request
                .lines()
                .iter()
                .map(|l| LineItemView {
                    line_no: l.line_no,
                    item_id: l.item_id,
                    location_id: l.location_id,
                    quantity: l.quantity,
                    description: l.description.clone(),
                })
                .collect(),
            remarks: request.remarks().to_vec(),
            rejection_reason: request.rejection_reason().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditEntryView {
    pub sequence_number: u64,
    pub actor: UserId,
    pub action: String,
    pub before: String,
    pub after: String,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
    pub remark: Option<String>,
}

impl AuditEntryView {
    fn from_envelope(envelope: &EventEnvelope<AuditEntry>) -> Self {
        let entry = envelope.payload();
        Self {
            sequence_number: envelope.sequence_number(),
            actor: entry.actor,
            action: entry.action.as_str().to_string(),
            before: entry.before.to_string(),
            after: entry.after.to_string(),
            occurred_at: entry.occurred_at,
            remark: entry.remark.clone(),
        }
    }
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn stock_balance(
    State(state): State<AppState>,
    Query(query): Query<BalanceQuery>,
) -> Response {
    let balance = state.engine.stock_balance(query.item_id, query.location_id);
    Json(BalanceResponse { balance }).into_response()
}

/// Tracked balances at or below their item's low-stock threshold, optionally
/// filtered to one location. A location with no ledger entry for an item has
/// never held it and is not reported.
async fn low_stock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LowStockQuery>,
) -> Response {
    if let Err(resp) = principal_from_headers(&headers) {
        return resp;
    }

    let items = match state.items.read() {
        Ok(items) => items,
        Err(_) => return registry_unavailable(),
    };

    let mut entries: Vec<LowStockEntry> = state
        .engine
        .ledger()
        .entries()
        .into_iter()
        .filter(|(key, _)| {
            query
                .location_id
                .map_or(true, |location| key.location_id == location)
        })
        .filter_map(|(key, quantity)| {
            let item = items.get(&key.item_id)?;
            (quantity <= item.low_stock_threshold).then(|| LowStockEntry {
                item_id: key.item_id,
                item_code: item.code().to_string(),
                location_id: key.location_id,
                quantity,
                low_stock_threshold: item.low_stock_threshold,
            })
        })
        .collect();
    entries.sort_by(|a, b| a.item_code.cmp(&b.item_code));

    Json(entries).into_response()
}

async fn credit_stock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreditBody>,
) -> Response {
    let principal = match principal_from_headers(&headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let result = require_role(&principal, Role::Administrator)
        .and_then(|()| state.known_item(body.item_id))
        .and_then(|()| state.known_location(body.location_id))
        .and_then(|()| {
            state
                .engine
                .credit_stock(&principal, body.item_id, body.location_id, body.quantity)
        });
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => domain_error_to_response(err),
    }
}

async fn register_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterItemBody>,
) -> Response {
    let principal = match principal_from_headers(&headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if let Err(err) = require_role(&principal, Role::Administrator) {
        return domain_error_to_response(err);
    }

    let item_id = ItemId::new();
    let mut item = match Item::new(item_id, body.code, body.name, body.unit, chrono::Utc::now()) {
        Ok(item) => item,
        Err(err) => return domain_error_to_response(err),
    };
    item.make = body.make;
    item.variant = body.variant;
    item.description = body.description;
    item.low_stock_threshold = body.low_stock_threshold;

    match state.items.write() {
        Ok(mut items) => {
            items.insert(item_id, item);
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "item_id": item_id })),
            )
                .into_response()
        }
        Err(_) => registry_unavailable(),
    }
}

async fn register_location(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterLocationBody>,
) -> Response {
    let principal = match principal_from_headers(&headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if let Err(err) = require_role(&principal, Role::Administrator) {
        return domain_error_to_response(err);
    }

    let location_id = LocationId::new();
    let location = match Location::new(location_id, body.office, body.room_store, chrono::Utc::now())
    {
        Ok(location) => location,
        Err(err) => return domain_error_to_response(err),
    };

    match state.locations.write() {
        Ok(mut locations) => {
            locations.insert(location_id, location);
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "location_id": location_id })),
            )
                .into_response()
        }
        Err(_) => registry_unavailable(),
    }
}

async fn register_department(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterDepartmentBody>,
) -> Response {
    let principal = match principal_from_headers(&headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if let Err(err) = require_role(&principal, Role::Administrator) {
        return domain_error_to_response(err);
    }

    let department_id = DepartmentId::new();
    let department = match Department::new(
        department_id,
        body.code,
        body.name,
        body.hod,
        body.conditional_approver,
        chrono::Utc::now(),
    ) {
        Ok(d) => d,
        Err(err) => return domain_error_to_response(err),
    };

    match state.departments.write() {
        Ok(mut departments) => {
            departments.insert(department_id, department);
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "department_id": department_id })),
            )
                .into_response()
        }
        Err(_) => registry_unavailable(),
    }
}

async fn create_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateRequestBody>,
) -> Response {
    let principal = match principal_from_headers(&headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    let department = match state.departments.read() {
        Ok(departments) => match departments.get(&body.department_id) {
            Some(d) => d.clone(),
            None => return domain_error_to_response(DomainError::NotFound),
        },
        Err(_) => return registry_unavailable(),
    };

    match state.engine.create_request(
        &principal,
        &department,
        body.kind,
        body.request_no,
        body.purpose,
    ) {
        Ok(request_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "request_id": request_id })),
        )
            .into_response(),
        Err(err) => domain_error_to_response(err),
    }
}

async fn get_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let principal = match principal_from_headers(&headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let request_id = match parse_request_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.engine.request(request_id) {
        Ok(request) => {
            if !may_view(&principal, &request) {
                return domain_error_to_response(DomainError::authorization(
                    "administrator or member of the request's department",
                ));
            }
            Json(RequestView::from_request(&request)).into_response()
        }
        Err(err) => domain_error_to_response(err),
    }
}

async fn add_line_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AddLineBody>,
) -> Response {
    with_request(&headers, &id, |principal, request_id| {
        state.known_item(body.item_id)?;
        state.known_location(body.location_id)?;
        state.engine.add_line_item(
            &principal,
            request_id,
            body.item_id,
            body.location_id,
            body.quantity,
            body.description.clone(),
        )
    })
}

async fn remove_line_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, line_no)): Path<(String, u32)>,
) -> Response {
    with_request(&headers, &id, |principal, request_id| {
        state.engine.remove_line_item(&principal, request_id, line_no)
    })
}

async fn submit_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    with_request(&headers, &id, |principal, request_id| {
        state.engine.submit(&principal, request_id)
    })
}

async fn approve_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ApproveBody>,
) -> Response {
    with_request(&headers, &id, |principal, request_id| {
        state.engine.approve(&principal, request_id, body.remark.clone())
    })
}

async fn reject_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RejectBody>,
) -> Response {
    with_request(&headers, &id, |principal, request_id| {
        state.engine.reject(&principal, request_id, body.reason.clone())
    })
}

async fn issue_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    with_request(&headers, &id, |principal, request_id| {
        state.engine.issue(&principal, request_id)
    })
}

async fn get_audit_trail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let principal = match principal_from_headers(&headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let request_id = match parse_request_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let request = match state.engine.request(request_id) {
        Ok(request) => request,
        Err(err) => return domain_error_to_response(err),
    };
    let scoped = request
        .department_id()
        .is_some_and(|dept| can_read_audit(&principal, dept));
    if !scoped {
        return domain_error_to_response(DomainError::authorization(
            "administrator or member of the request's department",
        ));
    }

    match state.engine.audit_trail(request_id) {
        Ok(trail) => {
            let views: Vec<AuditEntryView> =
                trail.iter().map(AuditEntryView::from_envelope).collect();
            Json(views).into_response()
        }
        Err(err) => domain_error_to_response(err),
    }
}

fn with_request<F>(headers: &HeaderMap, id: &str, f: F) -> Response
where
    F: FnOnce(Principal, RequestId) -> Result<(), DomainError>,
{
    let principal = match principal_from_headers(headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let request_id = match parse_request_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match f(principal, request_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => domain_error_to_response(err),
    }
}

fn may_view(principal: &Principal, request: &StockIssueRequest) -> bool {
    if request.requester() == Some(principal.user_id) {
        return true;
    }
    request
        .department_id()
        .is_some_and(|dept| can_read_audit(principal, dept))
}

fn parse_request_id(raw: &str) -> Result<RequestId, Response> {
    stockroom_core::AggregateId::from_str(raw)
        .map(RequestId::new)
        .map_err(bad_request)
}

fn bad_request(err: DomainError) -> Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_request", err.to_string())
}

pub(crate) fn domain_error_to_response(err: DomainError) -> Response {
    match &err {
        DomainError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg.clone())
        }
        DomainError::Authorization { .. } => {
            json_error(StatusCode::FORBIDDEN, "authorization_error", err.to_string())
        }
        DomainError::InvalidState { .. } => {
            json_error(StatusCode::CONFLICT, "invalid_state", err.to_string())
        }
        DomainError::InsufficientStock { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_stock", err.to_string())
        }
        DomainError::InvalidId(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_id", msg.clone())
        }
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg.clone()),
    }
}

fn registry_unavailable() -> Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        "master data registry unavailable",
    )
}

fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
