// ── Observability sink ──
//
// Faults that do not abort an operation (a node that failed enrichment,
// a missing sort field, a cut cycle) and faults that end one (config load,
// fetch) are both reported here. The sink never influences control flow.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::{error, warn};

use crate::error::{CoreError, FaultKind};

/// Receives every fault the core reports.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, fault: &CoreError);
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Arc<T> {
    fn report(&self, fault: &CoreError) {
        (**self).report(fault);
    }
}

/// Logs each fault through `tracing`.
///
/// Operation-ending faults log at `error`, node-local ones at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, fault: &CoreError) {
        let kind = fault.kind();
        match kind {
            FaultKind::EnrichmentFailed
            | FaultKind::SortFieldMissing
            | FaultKind::MalformedHierarchy => {
                warn!(kind = kind.as_ref(), "{fault}");
            }
            _ => error!(kind = kind.as_ref(), "{fault}"),
        }
    }
}

/// Records faults in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    faults: Mutex<Vec<CoreError>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> Vec<CoreError> {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, kind: FaultKind) -> usize {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|f| f.kind() == kind)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn clear(&self) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, fault: &CoreError) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(fault.clone());
    }
}

/// Logs through `tracing` and forwards each fault to broadcast subscribers.
///
/// Sends never block; with no subscribers the fault is only logged.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<CoreError>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreError> {
        self.tx.subscribe()
    }
}

impl DiagnosticSink for BroadcastSink {
    fn report(&self, fault: &CoreError) {
        TracingSink.report(fault);
        let _ = self.tx.send(fault.clone());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::NodeId;

    #[test]
    fn collecting_sink_counts_by_kind() {
        let sink = CollectingSink::new();
        sink.report(&CoreError::EnrichmentFailed {
            node_id: NodeId::from("A"),
            reason: "boom".into(),
        });
        sink.report(&CoreError::SortFieldMissing {
            field: "Name".into(),
            node_id: NodeId::from("B"),
        });

        assert_eq!(sink.count(FaultKind::EnrichmentFailed), 1);
        assert_eq!(sink.count(FaultKind::SortFieldMissing), 1);
        assert_eq!(sink.count(FaultKind::FetchFailed), 0);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn broadcast_sink_forwards_to_subscribers() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();

        sink.report(&CoreError::Internal("oops".into()));

        let got = rx.recv().await.expect("recv failed");
        assert_eq!(got, CoreError::Internal("oops".into()));
    }
}
