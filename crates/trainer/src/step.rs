use anyhow::Result;
use std::path::Path;
use tch::{nn, nn::OptimizerConfig, Device, Reduction, Tensor};

use nmt_core::safetensors_util::{load_safetensors, save_safetensors};
use nmt_core::Seq2Seq;

use crate::dataset::TranslationBatch;
use crate::hooks::{Checkpointable, SampleSource};
use crate::schedule::StepDecay;
use crate::train::{StepOutput, Workload};

/// Splits `<sos> w1 .. wn <eos>` rows into decoder input (without the last
/// column) and loss target (without the first column).
pub fn shift_target(trg: &Tensor) -> (Tensor, Tensor) {
    let t = trg.size()[1];
    (trg.narrow(1, 0, t - 1), trg.narrow(1, 1, t - 1))
}

fn to_rows(ids: &Tensor) -> Result<Vec<Vec<u32>>> {
    let cols = ids.size()[1] as usize;
    let flat = Vec::<i64>::try_from(&ids.to_device(Device::Cpu).flatten(0, -1))?;
    if cols == 0 {
        return Ok(Vec::new());
    }
    Ok(flat
        .chunks(cols)
        .map(|row| row.iter().map(|&id| id as u32).collect())
        .collect())
}

/// Adam training of a sequence-to-sequence model with step-decayed learning rate.
pub struct TranslationStep<M: Seq2Seq> {
    vs: nn::VarStore,
    model: M,
    optimizer: nn::Optimizer,
    schedule: StepDecay,
    pad_index: i64,
}

impl<M: Seq2Seq> TranslationStep<M> {
    /// `model` must have been built on `vs.root()`.
    pub fn new(vs: nn::VarStore, model: M, schedule: StepDecay, pad_index: i64) -> Result<Self> {
        let optimizer = nn::Adam::default().build(&vs, schedule.lr())?;

        Ok(Self {
            vs,
            model,
            optimizer,
            schedule,
            pad_index,
        })
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn schedule(&self) -> &StepDecay {
        &self.schedule
    }

    /// Mean cross-entropy over all non-padding target positions.
    fn loss(&self, logits: &Tensor, target: &Tensor) -> Tensor {
        let vocab = logits.size()[2];
        logits.reshape([-1, vocab]).cross_entropy_loss::<Tensor>(
            &target.reshape([-1]),
            None,
            Reduction::Mean,
            self.pad_index,
            0.0,
        )
    }
}

impl<M: Seq2Seq> Workload for TranslationStep<M> {
    type Batch = TranslationBatch;
    type Output = Tensor;

    fn update(&mut self, batch: &TranslationBatch) -> Result<StepOutput<Tensor>> {
        let lr = self.schedule.step();
        self.optimizer.set_lr(lr);
        self.optimizer.zero_grad();

        let (decoder_input, target) = shift_target(&batch.trg);
        let out = self.model.forward_t(&batch.src, &decoder_input, true);
        let loss = self.loss(&out.logits, &target);

        loss.backward();
        self.optimizer.step();

        Ok(StepOutput {
            output: out.probs.detach(),
            loss: loss.double_value(&[]),
        })
    }

    fn validate(&mut self, batch: &TranslationBatch) -> Result<f64> {
        let loss = tch::no_grad(|| {
            let (decoder_input, target) = shift_target(&batch.trg);
            let out = self.model.forward_t(&batch.src, &decoder_input, false);
            self.loss(&out.logits, &target)
        });
        Ok(loss.double_value(&[]))
    }

    fn learning_rate(&self) -> f64 {
        self.schedule.lr()
    }
}

fn is_safetensors(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "safetensors")
}

impl<M: Seq2Seq> Checkpointable for TranslationStep<M> {
    fn save_checkpoint(&self, path: &Path) -> Result<()> {
        if is_safetensors(path) {
            save_safetensors(&self.vs, path)
        } else {
            self.vs.save(path)?;
            Ok(())
        }
    }

    fn load_checkpoint(&mut self, path: &Path) -> Result<()> {
        if is_safetensors(path) {
            load_safetensors(&mut self.vs, path)?;
        } else {
            self.vs.load(path)?;
        }
        Ok(())
    }
}

impl<M: Seq2Seq> SampleSource for TranslationStep<M> {
    fn predicted_ids(&self, output: &Tensor) -> Result<Vec<Vec<u32>>> {
        to_rows(&output.argmax(-1, false))
    }

    fn reference_ids(&self, batch: &TranslationBatch) -> Result<Vec<Vec<u32>>> {
        let (_, target) = shift_target(&batch.trg);
        to_rows(&target)
    }
}
