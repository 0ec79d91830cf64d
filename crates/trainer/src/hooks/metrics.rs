use anyhow::Result;
use log::info;
use std::collections::{HashMap, VecDeque};

use super::{Cadence, Hook};
use crate::events::EventContext;
use crate::train::Workload;

/// Bounded per-metric window of recent values.
#[derive(Debug, Clone)]
pub struct MetricHistory {
    capacity: usize,
    values: HashMap<String, VecDeque<f64>>,
}

impl MetricHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            values: HashMap::new(),
        }
    }

    /// Appends `value`, evicting the oldest entry once the window is full.
    pub fn record(&mut self, name: &str, value: f64) {
        let window = self.values.entry(name.to_string()).or_default();
        window.push_back(value);
        while window.len() > self.capacity {
            window.pop_front();
        }
    }

    /// Arithmetic mean of the current window.
    pub fn moving_average(&self, name: &str) -> Option<f64> {
        let window = self.values.get(name).filter(|w| !w.is_empty())?;
        Some(window.iter().sum::<f64>() / window.len() as f64)
    }

    pub fn len(&self, name: &str) -> usize {
        self.values.get(name).map_or(0, VecDeque::len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Split {
    Training,
    Validation,
}

/// Logs the moving average of the event loss.
///
/// Every event it receives is recorded; the average is only computed and
/// logged when the cadence fires.
#[derive(Debug, Clone)]
pub struct MovingAverageLogger {
    split: Split,
    metric_name: String,
    history: MetricHistory,
    cadence: Cadence,
    reports: Vec<(u64, f64)>,
}

impl MovingAverageLogger {
    pub fn training(metric_name: impl Into<String>, window_size: usize, log_interval: u64) -> Self {
        Self::new(Split::Training, metric_name.into(), window_size, Cadence::Every(log_interval))
    }

    pub fn validation(metric_name: impl Into<String>, window_size: usize) -> Self {
        Self::new(Split::Validation, metric_name.into(), window_size, Cadence::Always)
    }

    fn new(split: Split, metric_name: String, window_size: usize, cadence: Cadence) -> Self {
        Self {
            split,
            metric_name,
            history: MetricHistory::new(window_size),
            cadence,
            reports: Vec::new(),
        }
    }

    /// `(iteration, average)` for every emitted report, oldest first.
    pub fn reports(&self) -> &[(u64, f64)] {
        &self.reports
    }

    pub fn history(&self) -> &MetricHistory {
        &self.history
    }
}

impl<W: Workload> Hook<W> for MovingAverageLogger {
    fn on_event(&mut self, ctx: &EventContext<'_, W>, _workload: &W) -> Result<()> {
        let Some(loss) = ctx.loss else {
            return Ok(());
        };
        self.history.record(&self.metric_name, loss);

        let iteration = ctx.state.iteration;
        if !self.cadence.fires(iteration) {
            return Ok(());
        }
        let Some(average) = self.history.moving_average(&self.metric_name) else {
            return Ok(());
        };

        match self.split {
            Split::Training => info!(
                "Training Iteration: {}, {}: {:.6}",
                iteration, self.metric_name, average
            ),
            Split::Validation => info!(
                "Validation Epoch: {}, Batch: {}, {}: {:.6}",
                ctx.state.epoch, ctx.state.validation_batches, self.metric_name, average
            ),
        }
        self.reports.push((iteration, average));
        Ok(())
    }

    fn name(&self) -> &'static str {
        match self.split {
            Split::Training => "training_moving_average",
            Split::Validation => "validation_moving_average",
        }
    }
}
