//! Scaled Dot-Product Attention
//!
//! Attention lets every position build its output from the value vectors of
//! the positions it considers relevant.
//!
//! ## All-Pairs Attention
//!
//! ```text
//! Q, K, V  = X·W_qᵀ, X·W_kᵀ, X·W_vᵀ         [seq, dim] each
//! scores   = (Q @ Kᵀ) / √dim                [seq, seq]
//! weights  = softmax(masked scores) per row
//! output   = weights @ V                    [seq, dim]
//! ```
//!
//! With a causal mask, position `i` only scores positions `0..=i`.
//!
//! ## Cross-Attention
//!
//! Same computation, but queries come from one sequence (the decoder) and
//! keys/values from another (the encoder output). The score matrix is
//! `[decoder_len, encoder_len]`.
//!
//! ## Position-Wise Attention
//!
//! [`SelfAttention::forward_position`] scores a position only against
//! itself. A softmax over a single score is always 1, so the output is just
//! `V = W_v · x`. Selected with [`AttentionKind::PositionWise`], it ignores
//! every other position in the sequence.
//!
//! ## Numerical Checks
//!
//! Any NaN or infinity in Q, K, V, the scores or the output aborts the pass
//! with [`ModelError::UnstableComputation`]. Nothing is silently replaced.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ensure_finite;
use crate::error::{ModelError, Result};
use crate::matrix::{dot, softmax, Matrix};

/// Which attention computation self-attention sublayers run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttentionKind {
    /// Every position attends over the whole (optionally masked) sequence
    #[default]
    AllPairs,
    /// Every position attends only to itself
    PositionWise,
}

/// Single-head attention with learned query/key/value projections.
#[derive(Clone, Debug)]
pub struct SelfAttention {
    /// Projection matrices, each [dim, dim], applied as `W · x`
    pub w_q: Matrix,
    pub w_k: Matrix,
    pub w_v: Matrix,
    pub dim: usize,
}

impl SelfAttention {
    /// Create projections with entries uniform in `[-√(6/dim), √(6/dim))`.
    pub fn new<R: Rng + ?Sized>(dim: usize, rng: &mut R) -> Result<Self> {
        if dim == 0 {
            return Err(ModelError::InvalidConfig(
                "attention dimension must be positive".into(),
            ));
        }
        let limit = (6.0 / dim as f64).sqrt();
        Ok(Self {
            w_q: Matrix::random_uniform(dim, dim, -limit, limit, rng)?,
            w_k: Matrix::random_uniform(dim, dim, -limit, limit, rng)?,
            w_v: Matrix::random_uniform(dim, dim, -limit, limit, rng)?,
            dim,
        })
    }

    /// Matrix-vector product; fails with [`ModelError::DimensionMismatch`]
    /// if the inner dimensions disagree.
    pub fn multiply(matrix: &Matrix, vector: &[f64]) -> Result<Vec<f64>> {
        matrix.matvec(vector)
    }

    fn scale(&self) -> f64 {
        (self.dim as f64).sqrt()
    }

    fn check_width(&self, x: &Matrix) -> Result<()> {
        if x.cols != self.dim {
            return Err(ModelError::dims(
                format!("sequence of width {}", self.dim),
                format!("width {}", x.cols),
            ));
        }
        Ok(())
    }

    /// Project every row of `x` through `w` (X·Wᵀ).
    fn project(w: &Matrix, x: &Matrix) -> Result<Matrix> {
        x.matmul(&w.transpose())
    }

    /// Attention of one position against itself.
    ///
    /// The single-entry softmax evaluates to 1 whenever the score is finite,
    /// so the result equals `W_v · input`.
    pub fn forward_position(&self, input: &[f64]) -> Result<Vec<f64>> {
        let q = Self::multiply(&self.w_q, input)?;
        let k = Self::multiply(&self.w_k, input)?;
        let v = Self::multiply(&self.w_v, input)?;
        ensure_finite("in query projection", &q)?;
        ensure_finite("in key projection", &k)?;
        ensure_finite("in value projection", &v)?;

        let score = dot(&q, &k)? / self.scale();
        ensure_finite("in attention score", &[score])?;

        let weight = softmax(&[score])[0];
        Ok(v.into_iter().map(|x| weight * x).collect())
    }

    /// All-pairs self-attention over a `[seq_len, dim]` sequence.
    pub fn forward(&self, x: &Matrix, causal: bool) -> Result<Matrix> {
        Ok(self.attend(x, x, causal)?.0)
    }

    /// Cross-attention: queries from `queries`, keys and values from `memory`.
    ///
    /// An empty `memory` gives a zero contribution for every query.
    pub fn forward_cross(&self, queries: &Matrix, memory: &Matrix) -> Result<Matrix> {
        self.check_width(queries)?;
        self.check_width(memory)?;
        if memory.is_empty() {
            return Ok(Matrix::zeros(queries.rows, self.dim));
        }
        Ok(self.attend(queries, memory, false)?.0)
    }

    /// Run the configured attention flavour over a sequence.
    pub fn forward_with(&self, kind: AttentionKind, x: &Matrix, causal: bool) -> Result<Matrix> {
        match kind {
            AttentionKind::AllPairs => self.forward(x, causal),
            AttentionKind::PositionWise => {
                self.check_width(x)?;
                let mut data = Vec::with_capacity(x.data.len());
                for row in x.iter_rows() {
                    data.extend(self.forward_position(row)?);
                }
                Matrix::new(data, x.rows, x.cols)
            }
        }
    }

    /// Softmax-normalised attention weights, `[seq_len, seq_len]`.
    pub fn attention_weights(&self, x: &Matrix, causal: bool) -> Result<Matrix> {
        Ok(self.attend(x, x, causal)?.1)
    }

    fn attend(&self, queries: &Matrix, memory: &Matrix, causal: bool) -> Result<(Matrix, Matrix)> {
        self.check_width(queries)?;
        self.check_width(memory)?;

        let q = Self::project(&self.w_q, queries)?;
        let k = Self::project(&self.w_k, memory)?;
        let v = Self::project(&self.w_v, memory)?;
        ensure_finite("in query projection", &q.data)?;
        ensure_finite("in key projection", &k.data)?;
        ensure_finite("in value projection", &v.data)?;

        let mut scores = q.matmul(&k.transpose())?.scale(1.0 / self.scale());
        ensure_finite("in attention scores", &scores.data)?;

        if causal {
            for i in 0..scores.rows {
                for j in i + 1..scores.cols {
                    scores.data[i * scores.cols + j] = f64::NEG_INFINITY;
                }
            }
        }

        let weights = scores.softmax_rows();
        let output = weights.matmul(&v)?;
        ensure_finite("after attention", &output.data)?;
        Ok((output, weights))
    }
}
