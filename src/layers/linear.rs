//! Linear Layer (Fully Connected)
//!
//! Performs an affine transformation: `y = x @ W + b`
//!
//! ```text
//! Input:  x [seq_len, in_features]
//! Weight: W [in_features, out_features]
//! Bias:   b [out_features]
//! Output: y [seq_len, out_features]
//! ```
//!
//! Weights are drawn uniformly from `[-limit, limit)`; biases start at zero.

use rand::Rng;

use crate::error::{ModelError, Result};
use crate::matrix::Matrix;

#[derive(Clone, Debug)]
pub struct Linear {
    pub weight: Matrix,
    pub bias: Vec<f64>,
}

impl Linear {
    /// Create a layer with uniform `[-limit, limit)` weights and zero bias.
    pub fn uniform<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        limit: f64,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self {
            weight: Matrix::random_uniform(in_features, out_features, -limit, limit, rng)?,
            bias: vec![0.0; out_features],
        })
    }

    pub fn in_features(&self) -> usize {
        self.weight.rows
    }

    pub fn out_features(&self) -> usize {
        self.weight.cols
    }

    /// y = x @ W + b for every row of `x`
    pub fn forward(&self, x: &Matrix) -> Result<Matrix> {
        x.matmul(&self.weight)?.add_row_vector(&self.bias)
    }

    /// y = v @ W + b for a single vector
    pub fn forward_vector(&self, v: &[f64]) -> Result<Vec<f64>> {
        if v.len() != self.in_features() {
            return Err(ModelError::dims(
                format!("vector of {}", self.in_features()),
                format!("vector of {}", v.len()),
            ));
        }
        let row = Matrix::new(v.to_vec(), 1, v.len())?;
        Ok(self.forward(&row)?.data)
    }
}
