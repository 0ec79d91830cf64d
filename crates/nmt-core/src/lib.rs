pub mod transformer;
pub mod layer_norm;
pub mod attention;
pub mod config;
pub mod safetensors_util;

pub use transformer::Seq2SeqTransformer;
pub use config::Seq2SeqConfig;

use tch::Tensor;

/// Result of one forward pass over a batch.
#[derive(Debug)]
pub struct ModelOutput {
    /// Softmax over the target vocabulary: [batch, trg_len, dec_vocab]
    pub probs: Tensor,
    /// Unnormalized scores, same shape as `probs`.
    pub logits: Tensor,
}

/// The capability the training loop needs from a translation model.
///
/// `train` selects training-mode behaviour (dropout). Gradient tracking is
/// controlled by the caller, e.g. with `tch::no_grad`.
pub trait Seq2Seq {
    fn forward_t(&self, src: &Tensor, trg: &Tensor, train: bool) -> ModelOutput;
}
