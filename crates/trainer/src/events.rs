//! Lifecycle events and the state snapshot handed to hooks.

use crate::train::Workload;

/// Points in the training loop where hooks are invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TrainingStarted,
    TrainingIterationCompleted,
    ValidationCompleted,
    TrainingCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Running,
    Validating,
    Completed,
}

/// Counters owned by the trainer. Hooks only ever see this by shared reference.
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    pub phase: Phase,
    /// Current epoch, 1-based; 0 before the first epoch starts.
    pub epoch: usize,
    /// Training batches processed so far, across all epochs.
    pub iteration: u64,
    /// Validation batches processed so far, across all passes.
    pub validation_batches: u64,
    /// Learning rate after the most recent update.
    pub learning_rate: f64,
}

impl RunState {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            phase: Phase::NotStarted,
            epoch: 0,
            iteration: 0,
            validation_batches: 0,
            learning_rate,
        }
    }
}

/// Everything a hook gets to look at for one event.
pub struct EventContext<'a, W: Workload> {
    pub kind: EventKind,
    pub state: &'a RunState,
    /// The batch that produced this event, if any.
    pub batch: Option<&'a W::Batch>,
    /// Model output of the update function (training iterations only).
    pub output: Option<&'a W::Output>,
    pub loss: Option<f64>,
}

impl<'a, W: Workload> EventContext<'a, W> {
    /// An event with no payload (`TrainingStarted`, `TrainingCompleted`).
    pub fn lifecycle(kind: EventKind, state: &'a RunState) -> Self {
        Self {
            kind,
            state,
            batch: None,
            output: None,
            loss: None,
        }
    }

    pub fn iteration(state: &'a RunState, batch: &'a W::Batch, output: &'a W::Output, loss: f64) -> Self {
        Self {
            kind: EventKind::TrainingIterationCompleted,
            state,
            batch: Some(batch),
            output: Some(output),
            loss: Some(loss),
        }
    }

    pub fn validation(state: &'a RunState, batch: Option<&'a W::Batch>, loss: f64) -> Self {
        Self {
            kind: EventKind::ValidationCompleted,
            state,
            batch,
            output: None,
            loss: Some(loss),
        }
    }
}

/// Totals reported by a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub epochs: usize,
    pub iterations: u64,
    pub validation_batches: u64,
    pub learning_rate: f64,
}
