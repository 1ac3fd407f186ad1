//! Position-wise Feedforward Network
//!
//! Two linear maps with a ReLU in between, applied to each position
//! independently:
//!
//! ```text
//! x → Linear(dim → 4·dim) → ReLU → Linear(4·dim → dim) → y
//! ```
//!
//! The 4× expansion is the standard Transformer choice. Weights are drawn
//! uniformly from `[-0.1, 0.1)` and biases start at zero. The forward pass is
//! a pure function of the input and the current weights.

use rand::Rng;

use super::activation::{relu, relu_matrix};
use super::linear::Linear;
use crate::error::Result;
use crate::matrix::Matrix;

/// Hidden width multiplier
pub const EXPANSION: usize = 4;

/// Half-width of the uniform weight initialisation
pub const INIT_LIMIT: f64 = 0.1;

#[derive(Clone, Debug)]
pub struct FeedForward {
    pub fc1: Linear,
    pub fc2: Linear,
}

impl FeedForward {
    pub fn new<R: Rng + ?Sized>(dim: usize, rng: &mut R) -> Result<Self> {
        let hidden = dim * EXPANSION;
        Ok(Self {
            fc1: Linear::uniform(dim, hidden, INIT_LIMIT, rng)?,
            fc2: Linear::uniform(hidden, dim, INIT_LIMIT, rng)?,
        })
    }

    pub fn hidden_dim(&self) -> usize {
        self.fc1.out_features()
    }

    /// Feedforward on a single position vector
    pub fn forward(&self, x: &[f64]) -> Result<Vec<f64>> {
        let h = relu(&self.fc1.forward_vector(x)?);
        self.fc2.forward_vector(&h)
    }

    /// Feedforward on every row of a `[seq_len, dim]` sequence
    pub fn forward_sequence(&self, x: &Matrix) -> Result<Matrix> {
        let h = relu_matrix(&self.fc1.forward(x)?);
        self.fc2.forward(&h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ffn(dim: usize) -> FeedForward {
        let mut rng = StdRng::seed_from_u64(5);
        FeedForward::new(dim, &mut rng).unwrap()
    }

    #[test]
    fn test_shapes() {
        let f = ffn(6);
        assert_eq!(f.hidden_dim(), 24);
        assert_eq!(f.fc1.weight.shape(), [6, 24]);
        assert_eq!(f.fc2.weight.shape(), [24, 6]);
        assert_eq!(f.forward(&[0.1; 6]).unwrap().len(), 6);
    }

    #[test]
    fn test_zero_input_gives_bias() {
        let f = ffn(4);
        // relu(0 @ W1 + 0) = 0, so the output is b2 = 0
        assert_eq!(f.forward(&[0.0; 4]).unwrap(), vec![0.0; 4]);
    }

    #[test]
    fn test_pure_function() {
        let f = ffn(4);
        let x = [0.3, -0.2, 1.0, 0.5];
        assert_eq!(f.forward(&x).unwrap(), f.forward(&x).unwrap());
    }

    #[test]
    fn test_sequence_form_is_position_wise() {
        let f = ffn(3);
        let x = Matrix::new(vec![0.1, 0.2, 0.3, -0.4, 0.5, -0.6], 2, 3).unwrap();
        let y = f.forward_sequence(&x).unwrap();
        for i in 0..2 {
            let single = f.forward(x.row(i).unwrap()).unwrap();
            for (a, b) in y.row(i).unwrap().iter().zip(&single) {
                assert!((a - b).abs() < 1e-12);
            }
        }
    }
}
