//! Decoder Stack
//!
//! A decoder layer adds a cross-attention sublayer between self-attention
//! and the feedforward network, so every target position can look at the
//! encoder output:
//!
//! ```text
//! y → SelfAttention(y) → (+) → LayerNorm
//!   → CrossAttention(·, encoder_out) → (+) → LayerNorm
//!   → FeedForward → (+) → LayerNorm → out
//! ```
//!
//! Self-attention is causally masked when the layer is built with
//! `causal = true`, so position `i` never reads targets after `i`.
//!
//! ## Backward Pass
//!
//! Only the forward computation is implemented. [`DecoderLayer::backward`]
//! checks the gradient's shape and hands it back unchanged; it computes no
//! parameter gradients.

use rand::Rng;

use super::attention::{AttentionKind, SelfAttention};
use super::encoder::residual;
use super::ensure_finite;
use super::feed_forward::FeedForward;
use super::layer_norm::{LayerNorm, NormAffine};
use crate::error::{ModelError, Result};
use crate::matrix::Matrix;

#[derive(Clone, Debug)]
pub struct DecoderLayer {
    pub self_attention: SelfAttention,
    pub norm1: LayerNorm,
    pub cross_attention: SelfAttention,
    pub norm2: LayerNorm,
    pub ffn: FeedForward,
    pub norm3: LayerNorm,
    pub kind: AttentionKind,
    pub causal: bool,
}

impl DecoderLayer {
    pub fn new<R: Rng + ?Sized>(
        dim: usize,
        kind: AttentionKind,
        affine: NormAffine,
        causal: bool,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self {
            self_attention: SelfAttention::new(dim, rng)?,
            norm1: LayerNorm::new(dim, affine),
            cross_attention: SelfAttention::new(dim, rng)?,
            norm2: LayerNorm::new(dim, affine),
            ffn: FeedForward::new(dim, rng)?,
            norm3: LayerNorm::new(dim, affine),
            kind,
            causal,
        })
    }

    pub fn dim(&self) -> usize {
        self.self_attention.dim
    }

    /// Returns a sequence with the same length as `x`.
    pub fn forward(&self, x: &Matrix, encoder_output: &Matrix) -> Result<Matrix> {
        let self_out = self.self_attention.forward_with(self.kind, x, self.causal)?;
        let h1 = self
            .norm1
            .forward(&residual("in decoder self-attention residual", x, &self_out)?)?;

        let cross_out = self.cross_attention.forward_cross(&h1, encoder_output)?;
        let h2 = self
            .norm2
            .forward(&residual("in decoder cross-attention residual", &h1, &cross_out)?)?;

        let ffn_out = self.ffn.forward_sequence(&h2)?;
        ensure_finite("in decoder feedforward", &ffn_out.data)?;
        self.norm3
            .forward(&residual("in decoder feedforward residual", &h2, &ffn_out)?)
    }

    /// Pass `grad_output` through unchanged after validating its width.
    pub fn backward(&self, grad_output: &Matrix, _encoder_output: &Matrix) -> Result<Matrix> {
        if grad_output.cols != self.dim() {
            return Err(ModelError::dims(
                format!("gradient of width {}", self.dim()),
                format!("width {}", grad_output.cols),
            ));
        }
        Ok(grad_output.clone())
    }
}

#[derive(Clone, Debug)]
pub struct Decoder {
    pub layers: Vec<DecoderLayer>,
}

impl Decoder {
    pub fn new<R: Rng + ?Sized>(
        num_layers: usize,
        dim: usize,
        kind: AttentionKind,
        affine: NormAffine,
        causal: bool,
        rng: &mut R,
    ) -> Result<Self> {
        if num_layers == 0 {
            return Err(ModelError::InvalidConfig(
                "decoder needs at least one layer".into(),
            ));
        }
        let layers = (0..num_layers)
            .map(|_| DecoderLayer::new(dim, kind, affine, causal, rng))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Every layer sees the previous layer's output and the same encoder output.
    pub fn forward(&self, x: &Matrix, encoder_output: &Matrix) -> Result<Matrix> {
        let mut hidden = x.clone();
        for layer in &self.layers {
            hidden = layer.forward(&hidden, encoder_output)?;
        }
        Ok(hidden)
    }

    /// Thread a gradient through the layers in reverse order.
    pub fn backward(&self, grad_output: &Matrix, encoder_output: &Matrix) -> Result<Matrix> {
        let mut grad = grad_output.clone();
        for layer in self.layers.iter().rev() {
            grad = layer.backward(&grad, encoder_output)?;
        }
        Ok(grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn input(rows: usize, dim: usize, phase: f64) -> Matrix {
        Matrix::new(
            (0..rows * dim).map(|i| (i as f64 * 0.29 + phase).cos()).collect(),
            rows,
            dim,
        )
        .unwrap()
    }

    fn decoder(layers: usize, dim: usize, causal: bool) -> Decoder {
        let mut rng = StdRng::seed_from_u64(9);
        Decoder::new(
            layers,
            dim,
            AttentionKind::AllPairs,
            NormAffine::PerDimension,
            causal,
            &mut rng,
        )
        .unwrap()
    }

    #[test]
    fn test_decoder_preserves_length() {
        let dec = decoder(2, 8, true);
        let memory = input(5, 8, 0.0);
        for len in [0, 1, 3, 7] {
            let out = dec.forward(&input(len, 8, 1.0), &memory).unwrap();
            assert_eq!(out.shape(), [len, 8]);
        }
    }

    #[test]
    fn test_empty_encoder_output() {
        let dec = decoder(1, 4, true);
        let out = dec.forward(&input(2, 4, 0.5), &Matrix::zeros(0, 4)).unwrap();
        assert_eq!(out.shape(), [2, 4]);
        assert!(out.is_finite());
    }

    #[test]
    fn test_causal_prefix_unaffected_by_later_targets() {
        let mut dec = decoder(1, 4, true);
        dec.layers[0].norm3.gamma = vec![1.0; 4];
        let memory = input(3, 4, 0.0);

        let short = input(2, 4, 1.0);
        let mut long = short.clone();
        long.data.extend(input(1, 4, 2.0).data);
        long.rows += 1;

        let a = dec.forward(&short, &memory).unwrap();
        let b = dec.forward(&long, &memory).unwrap();
        for (x, y) in a.data.iter().zip(&b.data) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_output_depends_on_encoder() {
        let mut dec = decoder(1, 4, false);
        dec.layers[0].norm3.gamma = vec![1.0; 4];
        dec.layers[0].norm2.gamma = vec![1.0; 4];
        let y = input(2, 4, 1.0);
        let a = dec.forward(&y, &input(3, 4, 0.0)).unwrap();
        let b = dec.forward(&y, &input(3, 4, 2.0)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_nan_input_is_rejected() {
        let mut rng = StdRng::seed_from_u64(6);
        for kind in [AttentionKind::AllPairs, AttentionKind::PositionWise] {
            let dec = Decoder::new(1, 2, kind, NormAffine::PerDimension, true, &mut rng).unwrap();
            let finite = input(2, 2, 0.0);
            let nan = Matrix::new(vec![0.5, f64::NAN], 1, 2).unwrap();

            assert!(matches!(
                dec.forward(&nan, &finite),
                Err(ModelError::UnstableComputation { .. })
            ));
            assert!(matches!(
                dec.layers[0].forward(&finite, &nan),
                Err(ModelError::UnstableComputation { .. })
            ));
        }
    }

    #[test]
    fn test_backward_is_shape_checked_identity() {
        let dec = decoder(3, 4, true);
        let memory = input(2, 4, 0.0);
        let grad = input(3, 4, 0.3);
        assert_eq!(dec.backward(&grad, &memory).unwrap(), grad);
        assert!(matches!(
            dec.backward(&Matrix::zeros(3, 5), &memory),
            Err(ModelError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_layer_owns_three_norms() {
        let dec = decoder(1, 6, true);
        let layer = &dec.layers[0];
        for norm in [&layer.norm1, &layer.norm2, &layer.norm3] {
            assert_eq!(norm.dim(), 6);
        }
        assert_ne!(layer.self_attention.w_q, layer.cross_attention.w_q);
    }
}
