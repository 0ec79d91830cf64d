#![allow(dead_code)]

use anyhow::{bail, Result};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use trainer::hooks::{Checkpointable, SampleSource};
use trainer::schedule::StepDecay;
use trainer::{EventContext, EventKind, Hook, StepOutput, Workload};

#[derive(Debug, Clone)]
pub struct StubBatch {
    pub id: u32,
    pub loss: f64,
    pub predicted: Vec<Vec<u32>>,
    pub reference: Vec<Vec<u32>>,
}

pub fn batch(id: u32, loss: f64) -> StubBatch {
    StubBatch {
        id,
        loss,
        predicted: vec![vec![4, 5, 3]],
        reference: vec![vec![4, 6, 3]],
    }
}

pub fn batches(losses: &[f64]) -> Vec<StubBatch> {
    losses
        .iter()
        .enumerate()
        .map(|(i, &loss)| batch(i as u32, loss))
        .collect()
}

/// A model with a handful of scalar "parameters" that every update nudges.
pub struct StubWorkload {
    pub params: Vec<f64>,
    pub schedule: StepDecay,
    pub updates: Vec<u32>,
    pub validations: usize,
    pub fail_update_at: Option<usize>,
    /// Number of updates applied at the time of every checkpoint save.
    pub save_log: RefCell<Vec<usize>>,
}

impl StubWorkload {
    pub fn new() -> Self {
        Self::with_schedule(StepDecay::new(1.0, 1000, 0.1))
    }

    pub fn with_schedule(schedule: StepDecay) -> Self {
        Self {
            params: vec![0.5, -1.25, 3.0],
            schedule,
            updates: Vec::new(),
            validations: 0,
            fail_update_at: None,
            save_log: RefCell::new(Vec::new()),
        }
    }
}

impl Workload for StubWorkload {
    type Batch = StubBatch;
    type Output = Vec<Vec<u32>>;

    fn update(&mut self, batch: &StubBatch) -> Result<StepOutput<Self::Output>> {
        if self.fail_update_at == Some(self.updates.len() + 1) {
            bail!("out of memory");
        }
        let lr = self.schedule.step();
        for p in &mut self.params {
            *p -= lr * 0.01;
        }
        self.updates.push(batch.id);
        Ok(StepOutput {
            output: batch.predicted.clone(),
            loss: batch.loss,
        })
    }

    fn validate(&mut self, batch: &StubBatch) -> Result<f64> {
        self.validations += 1;
        Ok(batch.loss + self.params.iter().sum::<f64>() * 0.0)
    }

    fn learning_rate(&self) -> f64 {
        self.schedule.lr()
    }
}

impl Checkpointable for StubWorkload {
    fn save_checkpoint(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_vec(&self.params)?)?;
        self.save_log.borrow_mut().push(self.updates.len());
        Ok(())
    }

    fn load_checkpoint(&mut self, path: &Path) -> Result<()> {
        self.params = serde_json::from_slice(&fs::read(path)?)?;
        Ok(())
    }
}

impl SampleSource for StubWorkload {
    fn predicted_ids(&self, output: &Self::Output) -> Result<Vec<Vec<u32>>> {
        Ok(output.clone())
    }

    fn reference_ids(&self, batch: &StubBatch) -> Result<Vec<Vec<u32>>> {
        Ok(batch.reference.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Seen {
    pub label: &'static str,
    pub kind: EventKind,
    pub epoch: usize,
    pub iteration: u64,
    pub loss: Option<f64>,
    pub has_batch: bool,
}

pub type Log = Rc<RefCell<Vec<Seen>>>;

/// Appends every event it sees to a shared log.
pub struct Recorder {
    pub label: &'static str,
    pub log: Log,
}

impl Recorder {
    pub fn new(label: &'static str, log: &Log) -> Self {
        Self {
            label,
            log: Rc::clone(log),
        }
    }
}

impl<W: Workload> Hook<W> for Recorder {
    fn on_event(&mut self, ctx: &EventContext<'_, W>, _workload: &W) -> Result<()> {
        self.log.borrow_mut().push(Seen {
            label: self.label,
            kind: ctx.kind,
            epoch: ctx.state.epoch,
            iteration: ctx.state.iteration,
            loss: ctx.loss,
            has_batch: ctx.batch.is_some(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Fails once the iteration counter reaches `at`.
pub struct FailingHook {
    pub at: u64,
}

impl<W: Workload> Hook<W> for FailingHook {
    fn on_event(&mut self, ctx: &EventContext<'_, W>, _workload: &W) -> Result<()> {
        if ctx.state.iteration >= self.at {
            bail!("disk full");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Records the first parameter of the stub every time it fires.
pub struct ParamProbe {
    pub seen: Rc<RefCell<Vec<f64>>>,
}

impl Hook<StubWorkload> for ParamProbe {
    fn on_event(&mut self, _ctx: &EventContext<'_, StubWorkload>, workload: &StubWorkload) -> Result<()> {
        self.seen.borrow_mut().push(workload.params[0]);
        Ok(())
    }
}

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn kinds(log: &Log) -> Vec<EventKind> {
    log.borrow().iter().map(|s| s.kind).collect()
}
