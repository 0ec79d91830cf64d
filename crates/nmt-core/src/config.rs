use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seq2SeqConfig {
    /// Maximum sequence length on either side (size of the position tables).
    pub max_length: i64,
    /// Size of the source vocabulary.
    pub enc_vocab_size: i64,
    /// Size of the target vocabulary.
    pub dec_vocab_size: i64,
    /// Width of the encoder's embeddings and hidden states.
    pub enc_emb_size: i64,
    /// Width of the decoder's embeddings and hidden states.
    pub dec_emb_size: i64,
    /// Feed-forward width of every encoder layer; one entry per layer.
    pub enc_units: Vec<i64>,
    /// Feed-forward width of every decoder layer; one entry per layer.
    pub dec_units: Vec<i64>,
    /// Number of attention heads (must divide both embedding sizes).
    pub n_head: i64,
    /// Dropout probability on embeddings, attention and residual branches.
    pub dropout: f64,
    /// RMSNorm epsilon value.
    pub layer_norm_epsilon: f64,
    /// Index of the padding token in both vocabularies.
    pub pad_index: i64,
}

impl Default for Seq2SeqConfig {
    fn default() -> Self {
        Self {
            max_length: 100,
            enc_vocab_size: 80000,
            dec_vocab_size: 80000,
            enc_emb_size: 512,
            dec_emb_size: 512,
            enc_units: vec![512; 6],
            dec_units: vec![512; 6],
            n_head: 8,
            dropout: 0.1,
            layer_norm_epsilon: 1e-5,
            pad_index: 1,
        }
    }
}

impl Seq2SeqConfig {
    pub fn enc_head_size(&self) -> i64 {
        self.enc_emb_size / self.n_head
    }

    pub fn dec_head_size(&self) -> i64 {
        self.dec_emb_size / self.n_head
    }
}
