use log::{info, warn};

use crate::config::{NonFinitePolicy, TrainerConfig, ValidationEvents};
use crate::error::{Result, TrainerError};
use crate::events::{EventContext, EventKind, Phase, RunState, RunSummary};
use crate::hooks::{Hook, HookRegistry, SetupHook};

/// Loss of one update together with the model output that produced it.
#[derive(Debug)]
pub struct StepOutput<O> {
    pub output: O,
    pub loss: f64,
}

/// The update/validation function pair and the state it owns (model,
/// optimizer, learning rate policy).
///
/// The trainer calls `update` exactly once per training batch, in batch
/// order, and `validate` once per validation batch. `validate` must not
/// change parameters or optimizer state.
pub trait Workload {
    type Batch;
    type Output;

    fn update(&mut self, batch: &Self::Batch) -> anyhow::Result<StepOutput<Self::Output>>;
    fn validate(&mut self, batch: &Self::Batch) -> anyhow::Result<f64>;
    fn learning_rate(&self) -> f64;
}

/// A finite, restartable sequence of batches; a fresh pass per epoch.
pub trait BatchSource {
    type Batch;

    fn epoch_batches(&mut self, epoch: usize) -> Box<dyn Iterator<Item = Self::Batch> + '_>;
}

impl<B: Clone> BatchSource for Vec<B> {
    type Batch = B;

    fn epoch_batches(&mut self, _epoch: usize) -> Box<dyn Iterator<Item = B> + '_> {
        Box::new(self.iter().cloned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub validate_every_epoch: bool,
    pub validation_events: ValidationEvents,
    pub non_finite_loss: NonFinitePolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            validate_every_epoch: true,
            validation_events: ValidationEvents::PerBatch,
            non_finite_loss: NonFinitePolicy::Abort,
        }
    }
}

impl From<&TrainerConfig> for RunOptions {
    fn from(config: &TrainerConfig) -> Self {
        Self {
            validate_every_epoch: config.validate_every_epoch,
            validation_events: config.validation_events,
            non_finite_loss: config.non_finite_loss,
        }
    }
}

fn check_finite(policy: NonFinitePolicy, iteration: u64, loss: f64) -> Result<()> {
    if loss.is_finite() {
        return Ok(());
    }
    match policy {
        NonFinitePolicy::Abort => Err(TrainerError::NonFiniteLoss { iteration, loss }),
        NonFinitePolicy::Warn => {
            warn!("Non-finite loss {} at iteration {}", loss, iteration);
            Ok(())
        }
    }
}

/// Drives training epochs and validation passes and dispatches lifecycle
/// events to registered hooks.
pub struct Trainer<W: Workload, T, V> {
    workload: W,
    train_source: T,
    valid_source: Option<V>,
    hooks: HookRegistry<W>,
    options: RunOptions,
    state: RunState,
}

impl<W, T, V> Trainer<W, T, V>
where
    W: Workload,
    T: BatchSource<Batch = W::Batch>,
    V: BatchSource<Batch = W::Batch>,
{
    pub fn new(workload: W, train_source: T, valid_source: Option<V>) -> Self {
        let state = RunState::new(workload.learning_rate());
        Self {
            workload,
            train_source,
            valid_source,
            hooks: HookRegistry::new(),
            options: RunOptions::default(),
            state,
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Registers `hook` for `kind`. Hooks for the same kind run in
    /// registration order.
    pub fn add_event_handler<H: Hook<W> + 'static>(&mut self, kind: EventKind, hook: H) -> &mut Self {
        self.hooks.add(kind, hook);
        self
    }

    /// Registers a hook that may modify the workload. It runs on
    /// `TrainingStarted`, in registration order with the other hooks there.
    pub fn add_setup_handler<H: SetupHook<W> + 'static>(&mut self, hook: H) -> &mut Self {
        self.hooks.add_setup(hook);
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn workload(&self) -> &W {
        &self.workload
    }

    pub fn into_workload(self) -> W {
        self.workload
    }

    /// Runs `max_epochs` epochs. `TrainingStarted` and `TrainingCompleted`
    /// fire exactly once each, even for zero epochs.
    pub fn run(&mut self, max_epochs: usize) -> Result<RunSummary> {
        if self.state.phase != Phase::NotStarted {
            return Err(TrainerError::AlreadyRun);
        }

        self.state.phase = Phase::Running;
        info!("Training started for {} epochs", max_epochs);
        self.hooks.dispatch(
            &EventContext::lifecycle(EventKind::TrainingStarted, &self.state),
            &mut self.workload,
        )?;

        for epoch in 1..=max_epochs {
            self.state.epoch = epoch;
            self.train_epoch(epoch)?;

            if self.options.validate_every_epoch && self.valid_source.is_some() {
                self.validate_epoch(epoch)?;
            }
        }

        self.hooks.dispatch(
            &EventContext::lifecycle(EventKind::TrainingCompleted, &self.state),
            &mut self.workload,
        )?;
        self.state.phase = Phase::Completed;
        info!(
            "Training completed after {} iterations over {} epochs",
            self.state.iteration, self.state.epoch
        );

        Ok(RunSummary {
            epochs: self.state.epoch,
            iterations: self.state.iteration,
            validation_batches: self.state.validation_batches,
            learning_rate: self.state.learning_rate,
        })
    }

    fn train_epoch(&mut self, epoch: usize) -> Result<()> {
        self.state.phase = Phase::Running;

        for batch in self.train_source.epoch_batches(epoch) {
            let iteration = self.state.iteration + 1;
            let step = self
                .workload
                .update(&batch)
                .map_err(|source| TrainerError::Update { iteration, source })?;

            self.state.iteration = iteration;
            self.state.learning_rate = self.workload.learning_rate();
            check_finite(self.options.non_finite_loss, iteration, step.loss)?;

            let ctx = EventContext::iteration(&self.state, &batch, &step.output, step.loss);
            self.hooks.dispatch(&ctx, &mut self.workload)?;
        }
        Ok(())
    }

    fn validate_epoch(&mut self, epoch: usize) -> Result<()> {
        let Some(valid) = self.valid_source.as_mut() else {
            return Ok(());
        };
        self.state.phase = Phase::Validating;

        let mut total = 0.0;
        let mut count = 0u64;
        for batch in valid.epoch_batches(epoch) {
            let loss = self
                .workload
                .validate(&batch)
                .map_err(|source| TrainerError::Validation { epoch, source })?;
            check_finite(self.options.non_finite_loss, self.state.iteration, loss)?;

            self.state.validation_batches += 1;
            total += loss;
            count += 1;

            if self.options.validation_events == ValidationEvents::PerBatch {
                let ctx = EventContext::validation(&self.state, Some(&batch), loss);
                self.hooks.dispatch(&ctx, &mut self.workload)?;
            }
        }

        if self.options.validation_events == ValidationEvents::PerPass && count > 0 {
            let mean = total / count as f64;
            let ctx = EventContext::validation(&self.state, None, mean);
            self.hooks.dispatch(&ctx, &mut self.workload)?;
        }

        self.state.phase = Phase::Running;
        Ok(())
    }
}
