//! Observers attached to lifecycle events.
//!
//! A hook is registered for one [`EventKind`] and invoked synchronously, in
//! registration order, every time that event fires. Any error a hook returns
//! aborts the run.
//!
//! Hooks only read the workload. Changing it (restoring parameters) is left
//! to [`SetupHook`]s, which run when training starts.

pub mod checkpoint;
pub mod metrics;
pub mod sample;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};
use crate::events::{EventContext, EventKind};
use crate::train::Workload;

pub use checkpoint::{CheckpointMeta, Checkpointable, RestoreCheckpoint, SaveCheckpoint};
pub use metrics::{MetricHistory, MovingAverageLogger};
pub use sample::{Comparison, SamplePrinter, SampleSource};

/// Decides on which iterations a hook acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Always,
    /// Fires when `iteration % n == 0`. `Every(0)` never fires.
    Every(u64),
}

impl Cadence {
    pub fn fires(&self, iteration: u64) -> bool {
        match *self {
            Cadence::Always => true,
            Cadence::Every(0) => false,
            Cadence::Every(n) => iteration % n == 0,
        }
    }
}

/// Observes the run. Hooks see the workload by shared reference only; model
/// parameters and optimizer state belong to the update function.
pub trait Hook<W: Workload> {
    fn on_event(&mut self, ctx: &EventContext<'_, W>, workload: &W) -> anyhow::Result<()>;

    /// Name used in error messages.
    fn name(&self) -> &'static str {
        "hook"
    }
}

/// Prepares the workload before the first update, e.g. by loading saved
/// parameters. Setup hooks only ever run on `TrainingStarted`.
pub trait SetupHook<W: Workload> {
    fn on_event(&mut self, ctx: &EventContext<'_, W>, workload: &mut W) -> anyhow::Result<()>;

    fn name(&self) -> &'static str {
        "setup_hook"
    }
}

/// Lets the caller keep a handle on a hook after registering it.
impl<W: Workload, H: Hook<W>> Hook<W> for Rc<RefCell<H>> {
    fn on_event(&mut self, ctx: &EventContext<'_, W>, workload: &W) -> anyhow::Result<()> {
        self.borrow_mut().on_event(ctx, workload)
    }

    fn name(&self) -> &'static str {
        self.borrow().name()
    }
}

impl<W: Workload, H: SetupHook<W>> SetupHook<W> for Rc<RefCell<H>> {
    fn on_event(&mut self, ctx: &EventContext<'_, W>, workload: &mut W) -> anyhow::Result<()> {
        self.borrow_mut().on_event(ctx, workload)
    }

    fn name(&self) -> &'static str {
        self.borrow().name()
    }
}

enum Registered<W: Workload> {
    Observer(Box<dyn Hook<W>>),
    Setup(Box<dyn SetupHook<W>>),
}

/// Ordered hooks per event kind.
pub struct HookRegistry<W: Workload> {
    hooks: HashMap<EventKind, Vec<Registered<W>>>,
}

impl<W: Workload> HookRegistry<W> {
    pub fn new() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }

    pub fn add<H: Hook<W> + 'static>(&mut self, kind: EventKind, hook: H) {
        self.hooks
            .entry(kind)
            .or_default()
            .push(Registered::Observer(Box::new(hook)));
    }

    /// Appends `hook` to the `TrainingStarted` hooks.
    pub fn add_setup<H: SetupHook<W> + 'static>(&mut self, hook: H) {
        self.hooks
            .entry(EventKind::TrainingStarted)
            .or_default()
            .push(Registered::Setup(Box::new(hook)));
    }

    /// Invokes every hook registered for `ctx.kind`, stopping at the first failure.
    pub fn dispatch(&mut self, ctx: &EventContext<'_, W>, workload: &mut W) -> Result<()> {
        let Some(hooks) = self.hooks.get_mut(&ctx.kind) else {
            return Ok(());
        };
        for hook in hooks.iter_mut() {
            let (result, name) = match hook {
                Registered::Observer(h) => (h.on_event(ctx, workload), h.name()),
                Registered::Setup(h) => (h.on_event(ctx, workload), h.name()),
            };
            result.map_err(|source| TrainerError::Hook {
                hook: name,
                event: ctx.kind,
                source,
            })?;
        }
        Ok(())
    }
}

impl<W: Workload> Default for HookRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fires_on_multiples_only() {
        let cadence = Cadence::Every(3);
        let fired: Vec<u64> = (1..=10).filter(|&i| cadence.fires(i)).collect();
        assert_eq!(fired, vec![3, 6, 9]);
    }

    #[test]
    fn always_fires_and_every_zero_never_does() {
        assert!((0..5).all(|i| Cadence::Always.fires(i)));
        assert!((0..5).all(|i| !Cadence::Every(0).fires(i)));
    }

    use crate::events::RunState;
    use crate::train::StepOutput;

    struct Counter {
        value: i32,
    }

    impl Workload for Counter {
        type Batch = ();
        type Output = ();

        fn update(&mut self, _batch: &()) -> anyhow::Result<StepOutput<()>> {
            Ok(StepOutput { output: (), loss: 0.0 })
        }

        fn validate(&mut self, _batch: &()) -> anyhow::Result<f64> {
            Ok(0.0)
        }

        fn learning_rate(&self) -> f64 {
            1.0
        }
    }

    struct Bump;

    impl SetupHook<Counter> for Bump {
        fn on_event(&mut self, _ctx: &EventContext<'_, Counter>, workload: &mut Counter) -> anyhow::Result<()> {
            workload.value += 1;
            Ok(())
        }
    }

    struct Watch(Rc<RefCell<Vec<i32>>>);

    impl Hook<Counter> for Watch {
        fn on_event(&mut self, _ctx: &EventContext<'_, Counter>, workload: &Counter) -> anyhow::Result<()> {
            self.0.borrow_mut().push(workload.value);
            Ok(())
        }
    }

    #[test]
    fn setup_hooks_only_run_when_training_starts() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut registry: HookRegistry<Counter> = HookRegistry::new();
        registry.add(EventKind::TrainingStarted, Watch(Rc::clone(&seen)));
        registry.add_setup(Bump);
        registry.add(EventKind::TrainingStarted, Watch(Rc::clone(&seen)));
        registry.add(EventKind::TrainingCompleted, Watch(Rc::clone(&seen)));

        let state = RunState::new(1.0);
        let mut counter = Counter { value: 0 };
        for kind in [EventKind::TrainingStarted, EventKind::TrainingCompleted] {
            registry
                .dispatch(&EventContext::lifecycle(kind, &state), &mut counter)
                .unwrap();
        }

        assert_eq!(counter.value, 1);
        assert_eq!(*seen.borrow(), vec![0, 1, 1]);
    }
}
