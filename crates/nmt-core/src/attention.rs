use tch::{nn, Tensor, Kind};

/// Multi-head attention where keys and values may come from another stream.
///
/// Self-attention passes the same tensor as `x` and `memory`; the decoder's
/// cross-attention passes the encoder output as `memory`, whose width may
/// differ from the query width.
pub struct MultiHeadAttention {
    q_proj: nn::Linear,
    kv_proj: nn::Linear,
    c_proj: nn::Linear,
    n_head: i64,
    dropout: f64,
    causal: bool,
}

impl MultiHeadAttention {
    pub fn new(vs: &nn::Path, dim: i64, memory_dim: i64, n_head: i64, dropout: f64, causal: bool) -> Self {
        let q_proj = nn::linear(vs / "q_proj", dim, dim, Default::default());
        let kv_proj = nn::linear(vs / "kv_proj", memory_dim, 2 * dim, Default::default());
        let c_proj = nn::linear(vs / "c_proj", dim, dim, Default::default());

        Self {
            q_proj,
            kv_proj,
            c_proj,
            n_head,
            dropout,
            causal,
        }
    }

    /// x: [b, t, dim], memory: [b, s, memory_dim]
    /// key_padding: optional bool tensor [b, s], true where the key is padding.
    pub fn forward_t(&self, x: &Tensor, memory: &Tensor, key_padding: Option<&Tensor>, train: bool) -> Tensor {
        let size = x.size();
        let (b, t, c) = (size[0], size[1], size[2]);
        let s = memory.size()[1];
        let head_size = c / self.n_head;

        let q = x.apply(&self.q_proj)
            .view([b, t, self.n_head, head_size])
            .transpose(1, 2);
        let kv = memory.apply(&self.kv_proj);
        let chunks = kv.chunk(2, -1);
        let k = chunks[0].view([b, s, self.n_head, head_size]).transpose(1, 2);
        let v = chunks[1].view([b, s, self.n_head, head_size]).transpose(1, 2);

        let mut att = q.matmul(&k.transpose(-2, -1)) * (1.0 / (head_size as f64).sqrt());

        if self.causal {
            let mask = Tensor::ones(&[t, s], (Kind::Bool, x.device()))
                .tril(0)
                .reshape(&[1, 1, t, s]);
            att = att.masked_fill(&mask.logical_not(), f64::NEG_INFINITY);
        }
        if let Some(padding) = key_padding {
            att = att.masked_fill(&padding.view([b, 1, 1, s]), f64::NEG_INFINITY);
        }

        let att = att.softmax(-1, Kind::Float).dropout(self.dropout, train);
        let y = att.matmul(&v);
        let y = y.transpose(1, 2).contiguous().view([b, t, c]);
        y.apply(&self.c_proj)
    }
}

unsafe impl Send for MultiHeadAttention {}
unsafe impl Sync for MultiHeadAttention {}
