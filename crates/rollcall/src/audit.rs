//! Best-effort, non-blocking audit recording.
//!
//! [`AuditTracker::record`] never fails and never waits on storage. Each
//! event is logged under the `rollcall::audit` target and written to the
//! [`AuditSink`] from its own task; a write failure is logged as a warning
//! and dropped.

use std::sync::{Arc, Mutex};

use rollcall_core::AuditEvent;
use rollcall_store::AuditSink;
use tokio::task::JoinHandle;

use crate::error::AuditWriteError;

/// Records audit events without affecting the operation that produced them.
pub struct AuditTracker {
    sink: Arc<dyn AuditSink>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl AuditTracker {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Record an event. Must be called from within a tokio runtime.
    pub fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "rollcall::audit",
            kind = %event.kind,
            actor = ?event.actor_principal_id,
            target_principal = ?event.target_principal_id,
            timestamp = event.timestamp,
            "audit event"
        );

        let sink = self.sink.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = sink.append_audit(&event).await.map_err(AuditWriteError::from) {
                tracing::warn!(error = %e, kind = %event.kind, "dropping audit event");
            }
        });

        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }

    /// Wait for every write started so far.
    pub async fn flush(&self) {
        let handles = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *in_flight)
        };

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "audit task failed");
            }
        }
    }

    /// Number of writes not yet known to have finished.
    pub fn pending(&self) -> usize {
        let in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.iter().filter(|h| !h.is_finished()).count()
    }
}
