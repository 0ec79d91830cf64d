use tch::{nn, Kind, Tensor};

/// Layer normalization over the last dimension with learned gain and bias.
#[derive(Debug)]
pub struct LayerNorm {
    gain: Tensor,
    bias: Tensor,
    eps: f64,
}

impl LayerNorm {
    pub fn new(vs: &nn::Path, dim: i64, eps: f64) -> Self {
        Self {
            gain: vs.var("gain", &[dim], nn::Init::Const(1.0)),
            bias: vs.var("bias", &[dim], nn::Init::Const(0.0)),
            eps,
        }
    }

    /// x: [batch, seq_len, dim]
    pub fn forward(&self, x: &Tensor) -> Tensor {
        let mean = x.mean_dim(Some(&[-1][..]), true, Kind::Float);
        let centered = x - mean;
        let var = centered
            .pow_tensor_scalar(2.0)
            .mean_dim(Some(&[-1][..]), true, Kind::Float);

        centered * (var + self.eps).rsqrt() * &self.gain + &self.bias
    }
}
