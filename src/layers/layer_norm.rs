//! Layer Normalization
//!
//! Normalizes a single position's vector to zero mean and unit variance, then
//! applies a learnable scale (gamma) and shift (beta). Statistics are taken
//! over the features of one vector, never across positions or batches.
//!
//! ## Forward Pass
//!
//! ```text
//! 1. mean   = sum(x) / N
//! 2. var    = sum((x - mean)²) / N
//! 3. x_norm = (x - mean) / √(var + ε)      ε = 1e-5
//! 4. y      = γ * x_norm + β
//! ```
//!
//! ## Affine Modes
//!
//! - [`NormAffine::PerDimension`]: `y[i] = γ[i] * x_norm[i] + β[i]`
//! - [`NormAffine::LeadingScalar`]: `y[i] = γ[0] * x_norm[i] + β[0]` for every
//!   `i`; only the first scale/shift entry is ever read
//!
//! Gamma starts at 0.001 and beta at 0, so a freshly built layer squeezes its
//! output close to zero.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::matrix::{all_finite, Matrix};

/// Initial value of every gamma entry
pub const GAMMA_INIT: f64 = 0.001;

/// Variance floor inside the square root
pub const LAYER_NORM_EPS: f64 = 1e-5;

/// How gamma/beta are applied after standardization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormAffine {
    #[default]
    PerDimension,
    LeadingScalar,
}

#[derive(Clone, Debug)]
pub struct LayerNorm {
    pub gamma: Vec<f64>, // Scale parameter [dim]
    pub beta: Vec<f64>,  // Shift parameter [dim]
    pub eps: f64,
    pub affine: NormAffine,
}

impl LayerNorm {
    pub fn new(dim: usize, affine: NormAffine) -> Self {
        Self {
            gamma: vec![GAMMA_INIT; dim],
            beta: vec![0.0; dim],
            eps: LAYER_NORM_EPS,
            affine,
        }
    }

    pub fn dim(&self) -> usize {
        self.gamma.len()
    }

    /// Zero-mean, unit-variance version of `input`, before gamma/beta.
    pub fn standardize(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != self.dim() {
            return Err(ModelError::dims(
                format!("vector of {}", self.dim()),
                format!("vector of {}", input.len()),
            ));
        }
        if !all_finite(input) {
            return Err(ModelError::unstable("in layer normalization input"));
        }

        let n = input.len() as f64;
        let mean = input.iter().sum::<f64>() / n;
        let variance = input.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
        let std = (variance + self.eps).sqrt();

        Ok(input.iter().map(|x| (x - mean) / std).collect())
    }

    /// Standardize `input` and apply the affine transform.
    pub fn normalize(&self, input: &[f64]) -> Result<Vec<f64>> {
        let mut out = self.standardize(input)?;
        match self.affine {
            NormAffine::PerDimension => {
                for ((y, g), b) in out.iter_mut().zip(&self.gamma).zip(&self.beta) {
                    *y = g * *y + b;
                }
            }
            NormAffine::LeadingScalar => {
                if let (Some(&g), Some(&b)) = (self.gamma.first(), self.beta.first()) {
                    for y in out.iter_mut() {
                        *y = g * *y + b;
                    }
                }
            }
        }
        if !all_finite(&out) {
            return Err(ModelError::unstable("after layer normalization"));
        }
        Ok(out)
    }

    /// Normalize every row of a `[seq_len, dim]` sequence.
    pub fn forward(&self, x: &Matrix) -> Result<Matrix> {
        let mut data = Vec::with_capacity(x.data.len());
        for row in x.iter_rows() {
            data.extend(self.normalize(row)?);
        }
        Matrix::new(data, x.rows, x.cols)
    }
}
