use anyhow::Result;
use log::info;
use std::sync::Arc;

use vocab::Vocab;

use super::{Cadence, Hook};
use crate::events::EventContext;
use crate::train::Workload;

/// Token ids a workload can expose for qualitative inspection.
pub trait SampleSource: Workload {
    /// Most likely token id at every target position, one row per example.
    fn predicted_ids(&self, output: &Self::Output) -> Result<Vec<Vec<u32>>>;
    /// The ids the predictions are scored against, aligned with `predicted_ids`.
    fn reference_ids(&self, batch: &Self::Batch) -> Result<Vec<Vec<u32>>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub predicted: String,
    pub expected: String,
}

/// Logs the current batch's predictions next to the ground truth.
pub struct SamplePrinter {
    vocab: Arc<Vocab>,
    cadence: Cadence,
    max_rows: usize,
    last: Vec<Comparison>,
}

impl SamplePrinter {
    pub fn new(vocab: Arc<Vocab>, compare_interval: u64) -> Self {
        Self {
            vocab,
            cadence: Cadence::Every(compare_interval),
            max_rows: usize::MAX,
            last: Vec::new(),
        }
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Comparisons produced the last time the hook fired.
    pub fn last(&self) -> &[Comparison] {
        &self.last
    }

    /// Text up to the first `<eos>`, without padding or `<sos>`.
    pub fn render(&self, ids: &[u32]) -> String {
        let eos = self.vocab.eos_id();
        let skip = [self.vocab.pad_id(), self.vocab.sos_id()];
        let kept: Vec<u32> = ids
            .iter()
            .copied()
            .take_while(|&id| id != eos)
            .filter(|id| !skip.contains(id))
            .collect();
        self.vocab.decode(&kept)
    }
}

impl<W: SampleSource> Hook<W> for SamplePrinter {
    fn on_event(&mut self, ctx: &EventContext<'_, W>, workload: &W) -> Result<()> {
        if !self.cadence.fires(ctx.state.iteration) {
            return Ok(());
        }
        let (Some(batch), Some(output)) = (ctx.batch, ctx.output) else {
            return Ok(());
        };

        let predicted = workload.predicted_ids(output)?;
        let expected = workload.reference_ids(batch)?;

        self.last = predicted
            .iter()
            .zip(expected.iter())
            .take(self.max_rows)
            .map(|(p, e)| Comparison {
                predicted: self.render(p),
                expected: self.render(e),
            })
            .collect();

        for (row, cmp) in self.last.iter().enumerate() {
            info!("Iteration {} sample {}", ctx.state.iteration, row);
            info!("  predicted: {}", cmp.predicted);
            info!("  expected:  {}", cmp.expected);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sample_printer"
    }
}
