//! Denial reporting
//!
//! Every denied decision becomes a [`DenialEvent`] handed to a
//! [`DenialSink`]. Sinks must not fail the request: reporting is best-effort
//! and infallible from the evaluator's point of view.

mod response;

use parking_lot::Mutex;
use serde::Serialize;
use time::OffsetDateTime;

pub use response::ResponseKind;

use crate::authz::DenialReason;
use crate::types::{Collection, Operation, Record, RecordId, UserId};

/// Structured record of one denial
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenialEvent {
    pub requester: UserId,
    pub operation: Operation,
    pub collection: Collection,
    pub record_id: RecordId,
    pub reason: DenialReason,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl DenialEvent {
    #[must_use]
    pub fn new(
        requester: &UserId,
        operation: Operation,
        record: &Record,
        reason: DenialReason,
    ) -> Self {
        Self {
            requester: requester.clone(),
            operation,
            collection: record.collection,
            record_id: record.id.clone(),
            reason,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Destination for denial events
pub trait DenialSink: Send + Sync {
    fn record(&self, event: &DenialEvent);
}

/// Emits denials as structured log events
///
/// Expected denials log at `warn`; integrity faults at `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DenialSink for TracingSink {
    fn record(&self, event: &DenialEvent) {
        if event.reason.is_integrity_fault() {
            tracing::error!(
                requester = %event.requester,
                operation = %event.operation,
                collection = %event.collection,
                record_id = %event.record_id,
                reason = event.reason.code(),
                "Access denied: ownership chain broken"
            );
        } else {
            tracing::warn!(
                requester = %event.requester,
                operation = %event.operation,
                collection = %event.collection,
                record_id = %event.record_id,
                reason = event.reason.code(),
                detail = %event.reason,
                "Access denied"
            );
        }
    }
}

/// Keeps events in memory, for tests and diagnostics
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DenialEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<DenialEvent> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl DenialSink for MemorySink {
    fn record(&self, event: &DenialEvent) {
        self.events.lock().push(event.clone());
    }
}
