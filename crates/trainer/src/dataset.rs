use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tch::{Device, Tensor};

use vocab::{tokenize, Vocab};

use crate::bucket::BucketSampler;
use crate::train::BatchSource;

/// Line-aligned source/target sentences of one split.
#[derive(Debug, Clone, Default)]
pub struct ParallelText {
    pub src: Vec<String>,
    pub trg: Vec<String>,
}

impl ParallelText {
    pub fn load<P: AsRef<Path>>(src_path: P, trg_path: P) -> Result<Self> {
        let read = |path: &Path| -> Result<Vec<String>> {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read corpus file {:?}", path))?;
            Ok(content.lines().map(str::to_string).collect())
        };
        let src = read(src_path.as_ref())?;
        let trg = read(trg_path.as_ref())?;

        if src.len() != trg.len() {
            bail!(
                "{:?} has {} lines but {:?} has {}",
                src_path.as_ref(),
                src.len(),
                trg_path.as_ref(),
                trg.len()
            );
        }
        Ok(Self { src, trg })
    }

    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }
}

/// One sentence pair as token ids.
///
/// `src` ends with `<eos>`; `trg` is wrapped in `<sos> ... <eos>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub src: Vec<u32>,
    pub trg: Vec<u32>,
}

impl Example {
    pub fn encode(src: &str, trg: &str, src_vocab: &Vocab, trg_vocab: &Vocab, max_length: usize) -> Self {
        let mut src_ids = src_vocab.encode(tokenize(src));
        src_ids.truncate(max_length.saturating_sub(1));
        src_ids.push(src_vocab.eos_id());

        let mut trg_ids = vec![trg_vocab.sos_id()];
        trg_ids.extend(trg_vocab.encode(tokenize(trg)));
        trg_ids.truncate(max_length.saturating_sub(1).max(1));
        trg_ids.push(trg_vocab.eos_id());

        Self {
            src: src_ids,
            trg: trg_ids,
        }
    }

    pub fn lengths(&self) -> (usize, usize) {
        (self.src.len(), self.trg.len())
    }
}

pub fn encode_split(text: &ParallelText, src_vocab: &Vocab, trg_vocab: &Vocab, max_length: usize) -> Vec<Example> {
    text.src
        .iter()
        .zip(text.trg.iter())
        .map(|(s, t)| Example::encode(s, t, src_vocab, trg_vocab, max_length))
        .collect()
}

/// Padded id rows for one batch.
#[derive(Debug)]
pub struct TranslationBatch {
    /// [batch, src_len]
    pub src: Tensor,
    /// [batch, trg_len], including `<sos>` and `<eos>`
    pub trg: Tensor,
}

/// Right-pads `rows` with `pad` into a row-major buffer, returning (buffer, width).
pub fn pad_rows(rows: &[&[u32]], pad: u32) -> (Vec<i64>, usize) {
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut data = Vec::with_capacity(rows.len() * width);
    for row in rows {
        data.extend(row.iter().map(|&id| id as i64));
        data.extend(std::iter::repeat(pad as i64).take(width - row.len()));
    }
    (data, width)
}

pub fn collate(examples: &[&Example], pad: u32, device: Device) -> TranslationBatch {
    let to_tensor = |rows: Vec<&[u32]>| {
        let n = rows.len() as i64;
        let (data, width) = pad_rows(&rows, pad);
        Tensor::from_slice(&data).view([n, width as i64]).to(device)
    };

    TranslationBatch {
        src: to_tensor(examples.iter().map(|e| e.src.as_slice()).collect()),
        trg: to_tensor(examples.iter().map(|e| e.trg.as_slice()).collect()),
    }
}

/// Bucketed batches of translation examples on a fixed device.
pub struct BucketIterator {
    examples: Arc<Vec<Example>>,
    lengths: Vec<(usize, usize)>,
    sampler: BucketSampler,
    pad: u32,
    device: Device,
}

impl BucketIterator {
    pub fn new(examples: Arc<Vec<Example>>, sampler: BucketSampler, pad: u32, device: Device) -> Self {
        let lengths = examples.iter().map(Example::lengths).collect();
        Self {
            examples,
            lengths,
            sampler,
            pad,
            device,
        }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}

impl BatchSource for BucketIterator {
    type Batch = TranslationBatch;

    fn epoch_batches(&mut self, epoch: usize) -> Box<dyn Iterator<Item = TranslationBatch> + '_> {
        let plan = self.sampler.batches(&self.lengths, epoch);
        let examples = &self.examples;
        let (pad, device) = (self.pad, self.device);
        Box::new(plan.into_iter().map(move |indices| {
            let rows: Vec<&Example> = indices.iter().map(|&i| &examples[i]).collect();
            collate(&rows, pad, device)
        }))
    }
}
