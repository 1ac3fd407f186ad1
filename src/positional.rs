//! Sinusoidal Positional Encoding
//!
//! Attention on its own is blind to token order, so every embedding gets a
//! deterministic per-position offset added to it. The table is computed once
//! and never changes.
//!
//! ## Formula
//!
//! For position `p` and even column `i`:
//!
//! ```text
//! angle      = p / 10000^(2i / dim)
//! PE[p, i]   = sin(angle)
//! PE[p, i+1] = cos(angle)   (when i + 1 < dim)
//! ```
//!
//! Note that the exponent uses the even column index `i` directly rather than
//! `i / 2`, so frequencies fall off twice as fast as in the textbook variant.
//!
//! ## Truncation
//!
//! [`PositionalEncoding::apply`] only covers `min(seq_len, max_len)`
//! positions. Longer sequences are cut to `max_len` rows, so callers must not
//! assume the output length equals the input length.

use tracing::warn;

use crate::error::{ModelError, Result};
use crate::matrix::Matrix;

#[derive(Clone, Debug)]
pub struct PositionalEncoding {
    /// Precomputed table: [max_len, dim]
    table: Matrix,
}

impl PositionalEncoding {
    pub fn new(max_len: usize, dim: usize) -> Self {
        let mut table = Matrix::zeros(max_len, dim);
        for pos in 0..max_len {
            let row = &mut table.data[pos * dim..(pos + 1) * dim];
            for i in (0..dim).step_by(2) {
                let angle = pos as f64 / 10000f64.powf(2.0 * i as f64 / dim as f64);
                row[i] = angle.sin();
                if i + 1 < dim {
                    row[i + 1] = angle.cos();
                }
            }
        }
        Self { table }
    }

    pub fn max_len(&self) -> usize {
        self.table.rows
    }

    pub fn dim(&self) -> usize {
        self.table.cols
    }

    /// Encoding row for `pos`; fails with [`ModelError::PositionOutOfRange`]
    /// outside `[0, max_len)`.
    pub fn get_encoding(&self, pos: usize) -> Result<&[f64]> {
        self.table
            .row(pos)
            .map_err(|_| ModelError::PositionOutOfRange {
                position: pos,
                max_len: self.max_len(),
            })
    }

    /// Add the positional rows to `embeddings`, truncating to `max_len`.
    pub fn apply(&self, embeddings: &Matrix) -> Result<Matrix> {
        if embeddings.cols != self.dim() {
            return Err(ModelError::dims(
                format!("embeddings of width {}", self.dim()),
                format!("width {}", embeddings.cols),
            ));
        }

        let seq_len = embeddings.rows.min(self.max_len());
        if seq_len < embeddings.rows {
            warn!(
                seq_len = embeddings.rows,
                max_len = self.max_len(),
                "sequence truncated to positional table length"
            );
        }

        let n = seq_len * self.dim();
        let data = embeddings.data[..n]
            .iter()
            .zip(&self.table.data[..n])
            .map(|(e, p)| e + p)
            .collect();
        Matrix::new(data, seq_len, self.dim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_zero_alternates_zero_one() {
        let pe = PositionalEncoding::new(4, 6);
        assert_eq!(pe.get_encoding(0).unwrap(), &[0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_closed_form_values() {
        let dim = 8;
        let pe = PositionalEncoding::new(10, dim);
        let row = pe.get_encoding(3).unwrap();
        for i in (0..dim).step_by(2) {
            let angle = 3.0 / 10000f64.powf(2.0 * i as f64 / dim as f64);
            assert!((row[i] - angle.sin()).abs() < 1e-12);
            assert!((row[i + 1] - angle.cos()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_odd_dimension_last_column_is_sine() {
        let pe = PositionalEncoding::new(2, 3);
        let row = pe.get_encoding(1).unwrap();
        let angle = 1.0 / 10000f64.powf(4.0 / 3.0);
        assert!((row[2] - angle.sin()).abs() < 1e-12);
    }

    #[test]
    fn test_get_encoding_boundary() {
        let pe = PositionalEncoding::new(5, 4);
        assert!(pe.get_encoding(4).is_ok());
        assert!(matches!(
            pe.get_encoding(5),
            Err(ModelError::PositionOutOfRange {
                position: 5,
                max_len: 5
            })
        ));
    }

    #[test]
    fn test_apply_adds_rows() {
        let pe = PositionalEncoding::new(4, 2);
        let emb = Matrix::filled(2, 2, 1.0);
        let out = pe.apply(&emb).unwrap();
        assert_eq!(out.row(0).unwrap(), &[1.0, 2.0]);
        let expected: Vec<f64> = pe.get_encoding(1).unwrap().iter().map(|v| v + 1.0).collect();
        assert_eq!(out.row(1).unwrap(), expected.as_slice());
    }

    #[test]
    fn test_apply_truncates_long_sequences() {
        let pe = PositionalEncoding::new(3, 2);
        let out = pe.apply(&Matrix::zeros(7, 2)).unwrap();
        assert_eq!(out.shape(), [3, 2]);
    }

    #[test]
    fn test_apply_rejects_wrong_width() {
        let pe = PositionalEncoding::new(3, 2);
        assert!(pe.apply(&Matrix::zeros(1, 3)).is_err());
    }
}
