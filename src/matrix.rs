//! Dense Matrix and Vector Operations
//!
//! This module is the crate's entire numerical toolbox. There is no external
//! linear-algebra dependency: everything the Transformer needs is a 2-D,
//! row-major `f64` matrix plus a handful of vector helpers.
//!
//! ## Core Concepts
//!
//! - **Data**: Flat `Vec<f64>` storing all elements in row-major order
//! - **Shape**: `rows × cols`; a token sequence is a `[seq_len, model_dim]`
//!   matrix, one row per position
//! - **Vectors**: plain `&[f64]` / `Vec<f64>`
//!
//! ## Example
//!
//! ```rust
//! use bumblebee::Matrix;
//!
//! let a = Matrix::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3)?;
//! let b = Matrix::new(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], 3, 2)?;
//! let c = a.matmul(&b)?;
//! assert_eq!(c.shape(), [2, 2]);
//! # Ok::<(), bumblebee::ModelError>(())
//! ```
//!
//! ## Performance
//!
//! Matrix multiplication switches to a banded algorithm that hands bands of
//! output rows to Rayon once the work is large enough to amortise the thread
//! overhead. Each output element is still accumulated in
//! the same `k` order as the sequential loop, so both paths produce identical
//! results. Row-wise softmax is likewise computed in parallel.

use rand::distr::{Distribution, Uniform};
use rand::Rng;
use rayon::prelude::*;

use crate::error::{ModelError, Result};

/// Work threshold (m·n·k) above which matmul runs in parallel.
const PARALLEL_MATMUL_THRESHOLD: usize = 1_000;

/// Output rows per parallel task.
const MATMUL_BAND_ROWS: usize = 8;

/// Rows of the right-hand matrix consumed per cache tile.
const MATMUL_TILE: usize = 64;

/// A dense row-major matrix of `f64` values.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    /// Flat storage, `rows * cols` elements
    pub data: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
}

impl Matrix {
    /// Create a matrix from flat row-major data.
    ///
    /// Fails with [`ModelError::DimensionMismatch`] if `data.len()` is not
    /// `rows * cols`.
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(ModelError::dims(
                format!("{} elements for [{}, {}]", rows * cols, rows, cols),
                format!("{} elements", data.len()),
            ));
        }
        Ok(Self { data, rows, cols })
    }

    /// Create a matrix filled with zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Create a matrix filled with a single value
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            data: vec![value; rows * cols],
            rows,
            cols,
        }
    }

    /// Build a `[rows.len(), cols]` matrix from individual row vectors.
    ///
    /// Every row must have length `cols`.
    pub fn from_rows(rows: &[Vec<f64>], cols: usize) -> Result<Self> {
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(ModelError::dims(format!("row of {}", cols), row.len()));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            data,
            rows: rows.len(),
            cols,
        })
    }

    /// Create a matrix with independent uniform draws from `[low, high)`.
    pub fn random_uniform<R: Rng + ?Sized>(
        rows: usize,
        cols: usize,
        low: f64,
        high: f64,
        rng: &mut R,
    ) -> Result<Self> {
        let dist = Uniform::new(low, high).map_err(|e| {
            ModelError::InvalidConfig(format!("uniform range [{}, {}): {}", low, high, e))
        })?;
        let data = (0..rows * cols).map(|_| dist.sample(rng)).collect();
        Ok(Self { data, rows, cols })
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    fn shape_pair(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn shape_string(&self) -> String {
        format!("[{}, {}]", self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Borrow row `i`.
    pub fn row(&self, i: usize) -> Result<&[f64]> {
        if i >= self.rows {
            return Err(ModelError::IndexOutOfRange {
                index: i,
                len: self.rows,
            });
        }
        Ok(&self.data[i * self.cols..(i + 1) * self.cols])
    }

    /// Mutably borrow row `i`.
    pub fn row_mut(&mut self, i: usize) -> Result<&mut [f64]> {
        if i >= self.rows {
            return Err(ModelError::IndexOutOfRange {
                index: i,
                len: self.rows,
            });
        }
        Ok(&mut self.data[i * self.cols..(i + 1) * self.cols])
    }

    /// Iterate over rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.rows).map(move |i| &self.data[i * self.cols..(i + 1) * self.cols])
    }

    /// Copy rows out into owned vectors.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.iter_rows().map(<[f64]>::to_vec).collect()
    }

    /// Keep only the first `n` rows.
    pub fn truncate_rows(mut self, n: usize) -> Self {
        if n < self.rows {
            self.data.truncate(n * self.cols);
            self.rows = n;
        }
        self
    }

    /// Matrix multiplication `self @ other`.
    ///
    /// For `A` of shape `[m, k]` and `B` of shape `[k, n]` the result is
    /// `[m, n]` with `C[i,j] = Σ A[i,l]·B[l,j]`.
    ///
    /// Fails with [`ModelError::DimensionMismatch`] if the inner dimensions
    /// disagree.
    pub fn matmul(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(ModelError::dims(
                format!("rhs with {} rows", self.cols),
                format!("{} @ {}", self.shape_string(), other.shape_string()),
            ));
        }

        let (m, k) = self.shape_pair();
        let n = other.cols;

        if m == 0 || n == 0 {
            return Ok(Matrix::zeros(m, n));
        }

        // k == 0 never reaches the banded path: the product is below threshold
        if m * n * k >= PARALLEL_MATMUL_THRESHOLD {
            return Ok(self.matmul_banded(other));
        }

        let mut result = vec![0.0; m * n];
        for i in 0..m {
            for j in 0..n {
                let mut sum = 0.0;
                for l in 0..k {
                    sum += self.data[i * k + l] * other.data[l * n + j];
                }
                result[i * n + j] = sum;
            }
        }

        Ok(Matrix {
            data: result,
            rows: m,
            cols: n,
        })
    }

    /// Parallel matmul over bands of output rows.
    ///
    /// Each band of [`MATMUL_BAND_ROWS`] output rows is one rayon task. Inside
    /// a band the shared dimension is walked in tiles of [`MATMUL_TILE`] rows
    /// of `other`, so a tile stays in cache while every row of the band
    /// consumes it. Every `C[i,j]` still accumulates `l = 0..k` in order.
    fn matmul_banded(&self, other: &Matrix) -> Matrix {
        let (m, k) = self.shape_pair();
        let n = other.cols;
        let mut data = vec![0.0; m * n];

        data.par_chunks_mut(MATMUL_BAND_ROWS * n)
            .zip(self.data.par_chunks(MATMUL_BAND_ROWS * k))
            .for_each(|(out_band, lhs_band)| {
                for tile_start in (0..k).step_by(MATMUL_TILE) {
                    let tile_end = (tile_start + MATMUL_TILE).min(k);
                    let rhs_tile = other.data[tile_start * n..tile_end * n].chunks_exact(n);

                    for (out_row, lhs_row) in
                        out_band.chunks_exact_mut(n).zip(lhs_band.chunks_exact(k))
                    {
                        let lhs_tile = &lhs_row[tile_start..tile_end];
                        for (&a, rhs_row) in lhs_tile.iter().zip(rhs_tile.clone()) {
                            for (out, &b) in out_row.iter_mut().zip(rhs_row) {
                                *out += a * b;
                            }
                        }
                    }
                }
            });

        Matrix {
            data,
            rows: m,
            cols: n,
        }
    }

    /// Matrix-vector product `self · v`.
    ///
    /// Fails with [`ModelError::DimensionMismatch`] if `v.len() != cols`.
    pub fn matvec(&self, v: &[f64]) -> Result<Vec<f64>> {
        if v.len() != self.cols {
            return Err(ModelError::dims(
                format!("vector of {}", self.cols),
                format!("vector of {} for {}", v.len(), self.shape_string()),
            ));
        }
        Ok(self
            .iter_rows()
            .map(|row| row.iter().zip(v).map(|(a, b)| a * b).sum())
            .collect())
    }

    /// Swap rows and columns.
    pub fn transpose(&self) -> Matrix {
        let (rows, cols) = self.shape_pair();
        let mut result = vec![0.0; rows * cols];
        for i in 0..rows {
            for j in 0..cols {
                result[j * rows + i] = self.data[i * cols + j];
            }
        }
        Matrix {
            data: result,
            rows: cols,
            cols: rows,
        }
    }

    /// Element-wise addition; shapes must match exactly.
    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        if self.shape() != other.shape() {
            return Err(ModelError::dims(self.shape_string(), other.shape_string()));
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a + b)
            .collect();
        Ok(Matrix {
            data,
            rows: self.rows,
            cols: self.cols,
        })
    }

    /// Add `bias` to every row (`[*, n] + [n]`).
    pub fn add_row_vector(&self, bias: &[f64]) -> Result<Matrix> {
        if bias.len() != self.cols {
            return Err(ModelError::dims(
                format!("bias of {}", self.cols),
                format!("bias of {}", bias.len()),
            ));
        }
        let mut out = self.clone();
        for i in 0..out.rows {
            for (x, b) in out.data[i * out.cols..(i + 1) * out.cols]
                .iter_mut()
                .zip(bias)
            {
                *x += b;
            }
        }
        Ok(out)
    }

    /// Multiply all elements by a scalar
    pub fn scale(&self, scalar: f64) -> Matrix {
        Matrix {
            data: self.data.iter().map(|&x| x * scalar).collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Apply `f` to every element
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Matrix {
        Matrix {
            data: self.data.iter().map(|&x| f(x)).collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Numerically stable softmax applied to each row independently.
    ///
    /// Entries equal to `-inf` (masked scores) receive probability zero.
    pub fn softmax_rows(&self) -> Matrix {
        let cols = self.cols;
        let data: Vec<f64> = (0..self.rows)
            .into_par_iter()
            .flat_map_iter(|i| softmax(&self.data[i * cols..(i + 1) * cols]))
            .collect();
        Matrix {
            data,
            rows: self.rows,
            cols,
        }
    }

    /// True when no element is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        all_finite(&self.data)
    }
}

/// Numerically stable softmax over a single vector.
///
/// ```text
/// softmax(x)[i] = exp(x[i] - max(x)) / Σ exp(x[j] - max(x))
/// ```
///
/// Subtracting the maximum prevents overflow in `exp()` and makes the result
/// invariant to adding a constant to every entry. Entries of `-∞` get zero
/// weight; when every entry is `-∞` the weight is spread evenly. Any NaN or
/// `+∞` entry makes every output NaN, so callers can detect it with
/// [`all_finite`]. An empty input yields an empty output.
pub fn softmax(values: &[f64]) -> Vec<f64> {
    if values.iter().any(|&v| v.is_nan() || v == f64::INFINITY) {
        return vec![f64::NAN; values.len()];
    }
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    if max == f64::NEG_INFINITY {
        // all entries masked (or empty)
        let n = values.len();
        return vec![1.0 / n as f64; n];
    }
    let exps: Vec<f64> = values.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(ModelError::dims(a.len(), b.len()));
    }
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

/// Element-wise sum of two equal-length vectors (residual connection).
pub fn add_vectors(a: &[f64], b: &[f64]) -> Result<Vec<f64>> {
    if a.len() != b.len() {
        return Err(ModelError::dims(a.len(), b.len()));
    }
    Ok(a.iter().zip(b).map(|(x, y)| x + y).collect())
}

pub fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Index of the largest entry; the first one wins on ties.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
