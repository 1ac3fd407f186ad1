//! Activation Functions
//!
//! ## ReLU
//!
//! ```text
//! ReLU(x) = max(0, x)
//! ```
//!
//! The feedforward sublayer uses ReLU between its two linear maps, as in the
//! original Transformer paper.

use crate::matrix::Matrix;

// `f64::max` would turn NaN into 0 and hide it from the finiteness checks
#[inline]
fn relu_scalar(v: f64) -> f64 {
    if v < 0.0 {
        0.0
    } else {
        v
    }
}

/// ReLU applied element-wise to a vector
pub fn relu(x: &[f64]) -> Vec<f64> {
    x.iter().map(|&v| relu_scalar(v)).collect()
}

/// ReLU applied element-wise to every entry of a matrix
pub fn relu_matrix(x: &Matrix) -> Matrix {
    x.map(relu_scalar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relu_clamps_negatives() {
        assert_eq!(relu(&[-2.0, 0.0, 3.5]), vec![0.0, 0.0, 3.5]);
    }

    #[test]
    fn test_relu_propagates_nan() {
        assert!(relu(&[f64::NAN])[0].is_nan());
    }

    #[test]
    fn test_relu_matrix_keeps_shape() {
        let x = Matrix::new(vec![-1.0, 1.0, -0.5, 0.25], 2, 2).unwrap();
        let y = relu_matrix(&x);
        assert_eq!(y.shape(), [2, 2]);
        assert_eq!(y.data, vec![0.0, 1.0, 0.0, 0.25]);
    }
}
