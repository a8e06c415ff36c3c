//! Per-topic reconciliation state machine.
//!
//! Holds the authoritative mirrored document for one topic. Snapshots replace
//! it, patch batches are applied copy-on-write, and batches that arrive before
//! the first snapshot wait in a FIFO queue until one is installed.

use crate::classify::Frame;
use crate::error::SyncError;
use crate::patch::{apply_batch, PatchBatch};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle phase of a reconciler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcilerPhase {
    /// No snapshot has been seen yet.
    Uninitialized,
    /// A document is installed.
    Ready,
}

/// Result of feeding one frame to the reconciler.
#[derive(Debug)]
pub enum Reconciled {
    /// The document changed; publish this state.
    Updated(Arc<Value>),
    /// Patch batch held until the first snapshot arrives.
    Queued { pending: usize },
    /// Patch batch could not be applied; the document is unchanged.
    Rejected(SyncError),
}

/// Counters for one reconciler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcilerStats {
    pub snapshots: u64,
    pub batches_applied: u64,
    pub batches_rejected: u64,
    /// Queued batches evicted by the pending-queue cap.
    pub batches_evicted: u64,
}

/// Single-writer state machine for one topic.
pub struct StateReconciler {
    state: Option<Arc<Value>>,
    pending: VecDeque<PatchBatch>,
    max_pending: Option<usize>,
    stats: ReconcilerStats,
}

impl StateReconciler {
    /// Create a reconciler with an unbounded pending queue.
    pub fn new() -> Self {
        Self::with_max_pending(None)
    }

    /// Create a reconciler whose pending queue keeps at most `max_pending`
    /// batches, evicting the oldest on overflow. `Some(0)` keeps none.
    pub fn with_max_pending(max_pending: Option<usize>) -> Self {
        Self {
            state: None,
            pending: VecDeque::new(),
            max_pending,
            stats: ReconcilerStats::default(),
        }
    }

    pub fn phase(&self) -> ReconcilerPhase {
        if self.state.is_some() {
            ReconcilerPhase::Ready
        } else {
            ReconcilerPhase::Uninitialized
        }
    }

    /// Current document, if a snapshot has been installed.
    pub fn state(&self) -> Option<&Arc<Value>> {
        self.state.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> ReconcilerStats {
        self.stats
    }

    /// Feed one classified frame.
    pub fn reconcile(&mut self, frame: Frame) -> Reconciled {
        match frame {
            Frame::Snapshot(value) => Reconciled::Updated(self.install_snapshot(value)),
            Frame::Patch(batch) => self.apply_patch(batch),
        }
    }

    fn install_snapshot(&mut self, value: Value) -> Arc<Value> {
        self.stats.snapshots += 1;

        if self.state.is_some() || self.pending.is_empty() {
            let state = Arc::new(value);
            self.state = Some(state.clone());
            return state;
        }

        // First snapshot: replay queued batches in arrival order, skipping failures.
        let mut current = value;
        let queued = self.pending.len();
        while let Some(batch) = self.pending.pop_front() {
            match apply_batch(&current, &batch) {
                Ok(next) => {
                    current = next;
                    self.stats.batches_applied += 1;
                }
                Err(e) => {
                    self.stats.batches_rejected += 1;
                    warn!(error = %e, "Skipping queued patch batch");
                }
            }
        }
        debug!(replayed = queued, "Drained pending patch batches");

        let state = Arc::new(current);
        self.state = Some(state.clone());
        state
    }

    fn apply_patch(&mut self, batch: PatchBatch) -> Reconciled {
        let Some(current) = self.state.as_ref() else {
            self.pending.push_back(batch);
            if let Some(max) = self.max_pending {
                // A cap of 0 drops the incoming batch itself.
                while self.pending.len() > max && self.pending.pop_front().is_some() {
                    self.stats.batches_evicted += 1;
                    warn!(max_pending = max, "Pending queue full, evicted oldest batch");
                }
            }
            return Reconciled::Queued {
                pending: self.pending.len(),
            };
        };

        match apply_batch(current, &batch) {
            Ok(next) => {
                self.stats.batches_applied += 1;
                let state = Arc::new(next);
                self.state = Some(state.clone());
                Reconciled::Updated(state)
            }
            Err(e) => {
                self.stats.batches_rejected += 1;
                Reconciled::Rejected(e)
            }
        }
    }
}

impl Default for StateReconciler {
    fn default() -> Self {
        Self::new()
    }
}
