//! Output Projection
//!
//! Maps a decoder vector to a probability distribution over the vocabulary:
//!
//! ```text
//! logits = W · x + b      W: [vocab_size, dim]
//! probs  = softmax(logits)
//! ```
//!
//! The weights are drawn from N(0, 0.02) by default. With
//! [`ProjectionInit::Constant`] every weight starts at the same value, which
//! makes all logits equal at initialisation and the output uniform.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ensure_finite;
use crate::error::{ModelError, Result};
use crate::matrix::{softmax, Matrix};

/// Standard deviation of the random projection weights
pub const PROJECTION_STD: f64 = 0.02;

/// How the projection weights are initialised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum ProjectionInit {
    #[default]
    Random,
    Constant(f64),
}

#[derive(Clone, Debug)]
pub struct FinalLayer {
    pub weight: Matrix, // [vocab_size, dim]
    pub bias: Vec<f64>, // [vocab_size]
}

impl FinalLayer {
    pub fn new<R: Rng + ?Sized>(
        input_dim: usize,
        vocab_size: usize,
        init: ProjectionInit,
        rng: &mut R,
    ) -> Result<Self> {
        if input_dim == 0 || vocab_size == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "projection needs a non-empty shape, got [{}, {}]",
                vocab_size, input_dim
            )));
        }
        let weight = match init {
            ProjectionInit::Random => {
                let normal = Normal::new(0.0, PROJECTION_STD)
                    .map_err(|e| ModelError::InvalidConfig(e.to_string()))?;
                let data = (0..vocab_size * input_dim)
                    .map(|_| normal.sample(rng))
                    .collect();
                Matrix::new(data, vocab_size, input_dim)?
            }
            ProjectionInit::Constant(value) => Matrix::filled(vocab_size, input_dim, value),
        };
        debug!(input_dim, vocab_size, ?init, "initialised output projection");
        Ok(Self {
            weight,
            bias: vec![0.0; vocab_size],
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.weight.rows
    }

    pub fn input_dim(&self) -> usize {
        self.weight.cols
    }

    /// Unnormalised scores `W · x + b`.
    pub fn logits(&self, x: &[f64]) -> Result<Vec<f64>> {
        let mut logits = self.weight.matvec(x)?;
        for (l, b) in logits.iter_mut().zip(&self.bias) {
            *l += b;
        }
        ensure_finite("in output logits", &logits)?;
        Ok(logits)
    }

    /// Probability distribution over the vocabulary for one position.
    ///
    /// Entries are strictly positive and sum to 1.
    pub fn forward(&self, x: &[f64]) -> Result<Vec<f64>> {
        Ok(softmax(&self.logits(x)?))
    }

    /// One distribution per row of a `[seq_len, dim]` sequence.
    pub fn forward_sequence(&self, x: &Matrix) -> Result<Vec<Vec<f64>>> {
        x.iter_rows().map(|row| self.forward(row)).collect()
    }

    /// `W[row] -= learning_rate * gradients`
    pub fn update_parameters(
        &mut self,
        gradients: &[f64],
        row: usize,
        learning_rate: f64,
    ) -> Result<()> {
        if gradients.len() != self.input_dim() {
            return Err(ModelError::dims(
                format!("gradient of {}", self.input_dim()),
                format!("gradient of {}", gradients.len()),
            ));
        }
        let weights = self.weight.row_mut(row)?;
        for (w, g) in weights.iter_mut().zip(gradients) {
            *w -= learning_rate * g;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn layer(init: ProjectionInit) -> FinalLayer {
        let mut rng = StdRng::seed_from_u64(21);
        FinalLayer::new(4, 6, init, &mut rng).unwrap()
    }

    #[test]
    fn test_distribution_properties() {
        let fl = layer(ProjectionInit::Random);
        let probs = fl.forward(&[0.5, -1.0, 2.0, 0.25]).unwrap();
        assert_eq!(probs.len(), 6);
        assert!(probs.iter().all(|&p| p > 0.0));
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_init_is_uniform() {
        let fl = layer(ProjectionInit::Constant(0.1));
        assert!(fl.weight.data.iter().all(|&w| w == 0.1));
        let probs = fl.forward(&[3.0, 1.0, -2.0, 0.5]).unwrap();
        for p in probs {
            assert!((p - 1.0 / 6.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_random_init_breaks_symmetry() {
        let fl = layer(ProjectionInit::Random);
        let probs = fl.forward(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!(probs.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_wrong_input_width() {
        let fl = layer(ProjectionInit::Random);
        assert!(matches!(
            fl.forward(&[1.0, 2.0]),
            Err(ModelError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_update_parameters_touches_one_row() {
        let mut fl = layer(ProjectionInit::Constant(0.1));
        fl.update_parameters(&[1.0, 0.0, -1.0, 2.0], 2, 0.5).unwrap();
        assert_eq!(fl.weight.row(2).unwrap(), &[-0.4, 0.1, 0.6, -0.9]);
        assert_eq!(fl.weight.row(1).unwrap(), &[0.1; 4]);

        assert!(matches!(
            fl.update_parameters(&[0.0; 4], 6, 0.1),
            Err(ModelError::IndexOutOfRange { index: 6, len: 6 })
        ));
        assert!(fl.update_parameters(&[0.0; 3], 0, 0.1).is_err());
    }

    #[test]
    fn test_forward_sequence() {
        let fl = layer(ProjectionInit::Random);
        let x = Matrix::new(vec![0.1; 12], 3, 4).unwrap();
        let dists = fl.forward_sequence(&x).unwrap();
        assert_eq!(dists.len(), 3);
        assert!(dists.iter().all(|d| d.len() == 6));
    }
}
