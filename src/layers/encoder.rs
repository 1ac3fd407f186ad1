//! Encoder Stack
//!
//! An encoder layer is two sublayers, each wrapped in a residual connection
//! followed by layer normalization (post-norm, as in the original Transformer):
//!
//! ```text
//! x → SelfAttention → (+) → LayerNorm → FeedForward → (+) → LayerNorm → out
//! │                    ↑     │                         ↑
//! └────────────────────┘     └─────────────────────────┘
//! ```
//!
//! Every intermediate is checked for NaN/∞ and the pass stops with
//! [`ModelError::UnstableComputation`](crate::ModelError::UnstableComputation)
//! as soon as one appears. The encoder runs its layers in order, each one
//! feeding the next. Sequence length is preserved throughout.

use rand::Rng;

use super::attention::{AttentionKind, SelfAttention};
use super::ensure_finite;
use super::feed_forward::FeedForward;
use super::layer_norm::{LayerNorm, NormAffine};
use crate::error::{ModelError, Result};
use crate::matrix::Matrix;

/// `x + sublayer(x)`, rejected if anything went non-finite.
pub(crate) fn residual(stage: &str, x: &Matrix, sublayer_out: &Matrix) -> Result<Matrix> {
    let sum = x.add(sublayer_out)?;
    ensure_finite(stage, &sum.data)?;
    Ok(sum)
}

#[derive(Clone, Debug)]
pub struct EncoderLayer {
    pub attention: SelfAttention,
    pub norm1: LayerNorm,
    pub ffn: FeedForward,
    pub norm2: LayerNorm,
    pub kind: AttentionKind,
}

impl EncoderLayer {
    pub fn new<R: Rng + ?Sized>(
        dim: usize,
        kind: AttentionKind,
        affine: NormAffine,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self {
            attention: SelfAttention::new(dim, rng)?,
            norm1: LayerNorm::new(dim, affine),
            ffn: FeedForward::new(dim, rng)?,
            norm2: LayerNorm::new(dim, affine),
            kind,
        })
    }

    /// Transform a `[seq_len, dim]` sequence into another of the same shape.
    pub fn forward(&self, x: &Matrix) -> Result<Matrix> {
        let attn_out = self.attention.forward_with(self.kind, x, false)?;
        let h = self
            .norm1
            .forward(&residual("in encoder attention residual", x, &attn_out)?)?;

        let ffn_out = self.ffn.forward_sequence(&h)?;
        ensure_finite("in encoder feedforward", &ffn_out.data)?;
        self.norm2
            .forward(&residual("in encoder feedforward residual", &h, &ffn_out)?)
    }
}

#[derive(Clone, Debug)]
pub struct Encoder {
    pub layers: Vec<EncoderLayer>,
}

impl Encoder {
    /// Build `num_layers` independently initialised layers.
    pub fn new<R: Rng + ?Sized>(
        num_layers: usize,
        dim: usize,
        kind: AttentionKind,
        affine: NormAffine,
        rng: &mut R,
    ) -> Result<Self> {
        if num_layers == 0 {
            return Err(ModelError::InvalidConfig(
                "encoder needs at least one layer".into(),
            ));
        }
        let layers = (0..num_layers)
            .map(|_| EncoderLayer::new(dim, kind, affine, rng))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn forward(&self, x: &Matrix) -> Result<Matrix> {
        let mut hidden = x.clone();
        for layer in &self.layers {
            hidden = layer.forward(&hidden)?;
        }
        Ok(hidden)
    }
}
