//! Stock issue request domain module.
//!
//! This crate contains the approval state machine for stock issue requests,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage). Ledger debits and audit appends are coordinated by the
//! workflow engine.

pub mod request;

pub use request::{
    AddLineItem, ApproveRequest, CreateRequest, LineItem, LineItemAdded, LineItemRemoved,
    MarkIssued, RejectRequest, RemoveLineItem, RequestApproved, RequestCommand,
    RequestConditionallyApproved, RequestCreated, RequestEvent, RequestId, RequestIssued,
    RequestKind, RequestRejected, RequestState, RequestSubmitted, StockIssueRequest,
    SubmitRequest,
};
