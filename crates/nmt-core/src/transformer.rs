use tch::{nn, Kind, Tensor};
use crate::attention::MultiHeadAttention;
use crate::config::Seq2SeqConfig;
use crate::layer_norm::LayerNorm;
use crate::{ModelOutput, Seq2Seq};

/// FeedForward block (MLP)
pub struct FeedForward {
    c_fc: nn::Linear,
    c_proj: nn::Linear,
    dropout: f64,
}

impl FeedForward {
    pub fn new(vs: &nn::Path, dim: i64, units: i64, dropout: f64) -> Self {
        let c_fc = nn::linear(vs / "c_fc", dim, units, Default::default());
        let c_proj = nn::linear(vs / "c_proj", units, dim, Default::default());

        Self {
            c_fc,
            c_proj,
            dropout,
        }
    }

    pub fn forward_t(&self, x: &Tensor, train: bool) -> Tensor {
        x.apply(&self.c_fc).gelu("none").apply(&self.c_proj).dropout(self.dropout, train)
    }
}

unsafe impl Send for FeedForward {}
unsafe impl Sync for FeedForward {}


pub struct EncoderLayer {
    ln_1: LayerNorm,
    attn: MultiHeadAttention,
    ln_2: LayerNorm,
    mlp: FeedForward,
}

impl EncoderLayer {
    pub fn new(vs: &nn::Path, config: &Seq2SeqConfig, units: i64) -> Self {
        let dim = config.enc_emb_size;
        Self {
            ln_1: LayerNorm::new(&(vs / "ln_1"), dim, config.layer_norm_epsilon),
            attn: MultiHeadAttention::new(&(vs / "attn"), dim, dim, config.n_head, config.dropout, false),
            ln_2: LayerNorm::new(&(vs / "ln_2"), dim, config.layer_norm_epsilon),
            mlp: FeedForward::new(&(vs / "mlp"), dim, units, config.dropout),
        }
    }

    pub fn forward_t(&self, x: &Tensor, src_padding: &Tensor, train: bool) -> Tensor {
        let x_ln = self.ln_1.forward(x);
        let x = x + self.attn.forward_t(&x_ln, &x_ln, Some(src_padding), train);

        let x_ln = self.ln_2.forward(&x);
        &x + self.mlp.forward_t(&x_ln, train)
    }
}


/// Decoder layer: causal self-attention, cross-attention to the encoder, MLP.
pub struct DecoderLayer {
    ln_1: LayerNorm,
    self_attn: MultiHeadAttention,
    ln_2: LayerNorm,
    cross_attn: MultiHeadAttention,
    ln_3: LayerNorm,
    mlp: FeedForward,
}

impl DecoderLayer {
    pub fn new(vs: &nn::Path, config: &Seq2SeqConfig, units: i64) -> Self {
        let dim = config.dec_emb_size;
        let eps = config.layer_norm_epsilon;
        Self {
            ln_1: LayerNorm::new(&(vs / "ln_1"), dim, eps),
            self_attn: MultiHeadAttention::new(&(vs / "self_attn"), dim, dim, config.n_head, config.dropout, true),
            ln_2: LayerNorm::new(&(vs / "ln_2"), dim, eps),
            cross_attn: MultiHeadAttention::new(
                &(vs / "cross_attn"),
                dim,
                config.enc_emb_size,
                config.n_head,
                config.dropout,
                false,
            ),
            ln_3: LayerNorm::new(&(vs / "ln_3"), dim, eps),
            mlp: FeedForward::new(&(vs / "mlp"), dim, units, config.dropout),
        }
    }

    pub fn forward_t(&self, x: &Tensor, memory: &Tensor, src_padding: &Tensor, train: bool) -> Tensor {
        let x_ln = self.ln_1.forward(x);
        let x = x + self.self_attn.forward_t(&x_ln, &x_ln, None, train);

        let x_ln = self.ln_2.forward(&x);
        let x = &x + self.cross_attn.forward_t(&x_ln, memory, Some(src_padding), train);

        let x_ln = self.ln_3.forward(&x);
        &x + self.mlp.forward_t(&x_ln, train)
    }
}


/// Encoder-decoder translation model.
pub struct Seq2SeqTransformer {
    src_emb: nn::Embedding,
    src_pos: nn::Embedding,
    trg_emb: nn::Embedding,
    trg_pos: nn::Embedding,
    encoder: Vec<EncoderLayer>,
    decoder: Vec<DecoderLayer>,
    ln_enc: LayerNorm,
    ln_dec: LayerNorm,
    lm_head: nn::Linear,
    pub config: Seq2SeqConfig,
}

impl Seq2SeqTransformer {
    pub fn new(vs: &nn::Path, config: &Seq2SeqConfig) -> Self {
        let src_emb = nn::embedding(vs / "src_emb", config.enc_vocab_size, config.enc_emb_size, Default::default());
        let src_pos = nn::embedding(vs / "src_pos", config.max_length, config.enc_emb_size, Default::default());
        let trg_emb = nn::embedding(vs / "trg_emb", config.dec_vocab_size, config.dec_emb_size, Default::default());
        let trg_pos = nn::embedding(vs / "trg_pos", config.max_length, config.dec_emb_size, Default::default());

        let encoder = config.enc_units.iter().enumerate()
            .map(|(i, &units)| EncoderLayer::new(&(vs / "enc" / i), config, units))
            .collect();
        let decoder = config.dec_units.iter().enumerate()
            .map(|(i, &units)| DecoderLayer::new(&(vs / "dec" / i), config, units))
            .collect();

        let ln_enc = LayerNorm::new(&(vs / "ln_enc"), config.enc_emb_size, config.layer_norm_epsilon);
        let ln_dec = LayerNorm::new(&(vs / "ln_dec"), config.dec_emb_size, config.layer_norm_epsilon);
        let lm_head = nn::linear(vs / "lm_head", config.dec_emb_size, config.dec_vocab_size, Default::default());

        Self {
            src_emb,
            src_pos,
            trg_emb,
            trg_pos,
            encoder,
            decoder,
            ln_enc,
            ln_dec,
            lm_head,
            config: config.clone(),
        }
    }

    fn embed(tokens: &Tensor, emb: &nn::Embedding, pos: &nn::Embedding) -> Tensor {
        let t = tokens.size()[1];
        let positions = Tensor::arange(t, (Kind::Int64, tokens.device())).unsqueeze(0);
        tokens.apply(emb) + positions.apply(pos)
    }

    /// src: [b, s] source ids, returns encoder memory [b, s, enc_emb_size]
    pub fn encode(&self, src: &Tensor, src_padding: &Tensor, train: bool) -> Tensor {
        let mut x = Self::embed(src, &self.src_emb, &self.src_pos).dropout(self.config.dropout, train);
        for layer in &self.encoder {
            x = layer.forward_t(&x, src_padding, train);
        }
        self.ln_enc.forward(&x)
    }

    /// trg: [b, t] decoder input ids, returns logits [b, t, dec_vocab_size]
    pub fn decode(&self, trg: &Tensor, memory: &Tensor, src_padding: &Tensor, train: bool) -> Tensor {
        let mut x = Self::embed(trg, &self.trg_emb, &self.trg_pos).dropout(self.config.dropout, train);
        for layer in &self.decoder {
            x = layer.forward_t(&x, memory, src_padding, train);
        }
        self.ln_dec.forward(&x).apply(&self.lm_head)
    }
}

impl Seq2Seq for Seq2SeqTransformer {
    fn forward_t(&self, src: &Tensor, trg: &Tensor, train: bool) -> ModelOutput {
        let src_padding = src.eq(self.config.pad_index);
        let memory = self.encode(src, &src_padding, train);
        let logits = self.decode(trg, &memory, &src_padding, train);
        let probs = logits.softmax(-1, Kind::Float);
        ModelOutput { probs, logits }
    }
}

unsafe impl Send for Seq2SeqTransformer {}
unsafe impl Sync for Seq2SeqTransformer {}
