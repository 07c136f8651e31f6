use std::collections::HashMap;
use std::sync::RwLock;

use stockroom_events::EventEnvelope;
use stockroom_requests::RequestId;

use crate::entry::AuditEntry;

/// Append-only audit trail, one stream per request.
///
/// `append` never fails under normal operation; durable backends surface
/// persistence failures on their own channel, not through this contract.
/// Read-scope enforcement (administrators unrestricted, others limited to
/// their own department) is applied by the surrounding system.
pub trait AuditTrail: Send + Sync {
    /// Append an entry to the request's stream; returns the assigned
    /// sequence number (monotonically increasing per stream, starting at 1).
    fn append(&self, entry: AuditEntry) -> u64;

    /// All entries for a request, in chronological (append) order.
    fn entries_for(&self, request_id: RequestId) -> Vec<EventEnvelope<AuditEntry>>;
}

/// In-memory audit trail. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditTrail {
    streams: RwLock<HashMap<RequestId, Vec<EventEnvelope<AuditEntry>>>>,
}

impl InMemoryAuditTrail {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditTrail for InMemoryAuditTrail {
    fn append(&self, entry: AuditEntry) -> u64 {
        let mut streams = match self.streams.write() {
            Ok(guard) => guard,
            // The trail is append-only; a poisoned lock cannot leave a
            // stream half-written, so recover and keep appending.
            Err(poisoned) => poisoned.into_inner(),
        };

        let stream = streams.entry(entry.request_id).or_default();
        let sequence_number = stream.len() as u64 + 1;
        let envelope = EventEnvelope::new(
            entry.entry_id,
            entry.request_id.0,
            "stock_issue_request",
            sequence_number,
            entry,
        );
        stream.push(envelope);
        sequence_number
    }

    fn entries_for(&self, request_id: RequestId) -> Vec<EventEnvelope<AuditEntry>> {
        let streams = match self.streams.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        streams.get(&request_id).cloned().unwrap_or_default()
    }
}
