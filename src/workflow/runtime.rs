use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::signals::Signal;

/// A running workflow's handle: the task driving it, a mailbox for
/// signals, and a watch channel so queries can read the latest in-memory
/// snapshot without touching the task itself (spec §4.8 — queries never
/// cause activity execution).
pub struct WorkflowHandle<Q> {
    pub join: JoinHandle<()>,
    pub signals: mpsc::Sender<Signal>,
    pub snapshot: watch::Receiver<Q>,
}

/// In-process registry of running workflows, keyed by their deterministic
/// workflow id. Mirrors the teacher's `job_queue`'s in-memory tracking
/// style but generalized to arbitrary workflow kinds via `DashMap`
/// (spec.md calls for a workflow runtime but no such crate exists in the
/// retrieval pack — SPEC_FULL §3 resolves this by hand-rolling the
/// minimal primitives needed to satisfy the durability invariants).
pub struct Runtime<Q> {
    handles: DashMap<String, WorkflowHandle<Q>>,
}

impl<Q: Clone + Send + Sync + 'static> Default for Runtime<Q> {
    fn default() -> Self {
        Self { handles: DashMap::new() }
    }
}

impl<Q: Clone + Send + Sync + 'static> Runtime<Q> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly spawned workflow. Idempotent at the call site:
    /// callers check [`Runtime::is_running`] first so a second "start"
    /// with the same deterministic workflow id is a no-op (spec §4.5).
    pub fn register(&self, workflow_id: String, handle: WorkflowHandle<Q>) {
        self.handles.insert(workflow_id, handle);
    }

    #[must_use]
    pub fn is_running(&self, workflow_id: &str) -> bool {
        self.handles
            .get(workflow_id)
            .map(|h| !h.join.is_finished())
            .unwrap_or(false)
    }

    /// Delivers a signal to a running workflow. Returns `false` if no
    /// workflow with that id is registered — callers use this to drive the
    /// start-then-signal path for unknown-workflow signals (spec §4.5).
    pub async fn signal(&self, workflow_id: &str, signal: Signal) -> bool {
        let Some(handle) = self.handles.get(workflow_id) else {
            return false;
        };
        handle.signals.send(signal).await.is_ok()
    }

    #[must_use]
    pub fn query(&self, workflow_id: &str) -> Option<Q> {
        self.handles.get(workflow_id).map(|h| h.snapshot.borrow().clone())
    }

    pub fn remove(&self, workflow_id: &str) {
        self.handles.remove(workflow_id);
    }
}

pub type SharedRuntime<Q> = Arc<Runtime<Q>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unregistered_workflow_signal_returns_false() {
        let runtime: Runtime<bool> = Runtime::new();
        assert!(!runtime.signal("campaign-missing", Signal::PauseCampaign).await);
    }

    #[tokio::test]
    async fn registered_workflow_receives_signal() {
        let runtime: Runtime<bool> = Runtime::new();
        let (tx, mut rx) = mpsc::channel(4);
        let (_snap_tx, snap_rx) = watch::channel(false);
        let join = tokio::spawn(async {});
        runtime.register(
            "campaign-1".into(),
            WorkflowHandle { join, signals: tx, snapshot: snap_rx },
        );
        assert!(runtime.signal("campaign-1", Signal::PauseCampaign).await);
        assert_eq!(rx.recv().await, Some(Signal::PauseCampaign));
    }

    #[tokio::test]
    async fn query_reads_latest_snapshot() {
        let runtime: Runtime<u32> = Runtime::new();
        let (tx, _rx) = mpsc::channel(4);
        let (snap_tx, snap_rx) = watch::channel(0u32);
        let join = tokio::spawn(async {});
        runtime.register("campaign-1".into(), WorkflowHandle { join, signals: tx, snapshot: snap_rx });
        snap_tx.send(42).unwrap();
        assert_eq!(runtime.query("campaign-1"), Some(42));
    }
}
