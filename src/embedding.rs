//! Token Embedding Table
//!
//! Converts token ids to dense vectors. The table is a `[vocab_size, dim]`
//! matrix and looking up a token means copying its row.
//!
//! ```text
//! Input:  [seq_len]            (token ids)
//! Output: [seq_len, model_dim] (embedding vectors)
//! ```
//!
//! Rows are initialised with independent uniform draws from `[0, 1)` and are
//! never modified by the forward pass; only [`Embedding::load`] replaces them.
//!
//! ## Persistence Format
//!
//! Plain text, one line per vocabulary row, `dim` space-separated values per
//! line. Loading requires exactly `vocab_size` rows of exactly `dim` values.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use rand::Rng;
use tracing::{debug, info};

use crate::error::{ModelError, Result};
use crate::matrix::Matrix;

#[derive(Clone, Debug)]
pub struct Embedding {
    /// Embedding weight matrix: [vocab_size, dim]
    pub weight: Matrix,
}

impl Embedding {
    /// Create a `[vocab_size, dim]` table filled with uniform `[0, 1)` values.
    pub fn new<R: Rng + ?Sized>(vocab_size: usize, dim: usize, rng: &mut R) -> Result<Self> {
        if vocab_size == 0 || dim == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "embedding table needs a non-empty shape, got [{}, {}]",
                vocab_size, dim
            )));
        }
        let weight = Matrix::random_uniform(vocab_size, dim, 0.0, 1.0, rng)?;
        debug!(vocab_size, dim, "initialised embedding table");
        Ok(Self { weight })
    }

    pub fn vocab_size(&self) -> usize {
        self.weight.rows
    }

    pub fn dim(&self) -> usize {
        self.weight.cols
    }

    /// Row for `token_id`; fails with [`ModelError::IndexOutOfRange`] if
    /// `token_id >= vocab_size`.
    pub fn get_embedding(&self, token_id: usize) -> Result<&[f64]> {
        self.weight.row(token_id)
    }

    /// Look up every id in order, producing a `[ids.len(), dim]` sequence.
    pub fn token_to_embeddings(&self, token_ids: &[usize]) -> Result<Matrix> {
        let dim = self.dim();
        let mut data = Vec::with_capacity(token_ids.len() * dim);
        for &id in token_ids {
            data.extend_from_slice(self.get_embedding(id)?);
        }
        Matrix::new(data, token_ids.len(), dim)
    }

    /// Dump the table row-major, one row per line.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = fs::File::create(path).map_err(|e| ModelError::resource(path, e))?;
        let mut writer = BufWriter::new(file);
        for row in self.weight.iter_rows() {
            let line = row
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(writer, "{}", line).map_err(|e| ModelError::resource(path, e))?;
        }
        writer.flush().map_err(|e| ModelError::resource(path, e))?;
        info!(path = %path.display(), rows = self.vocab_size(), "saved embedding table");
        Ok(())
    }

    /// Replace the table with the contents of `path`.
    ///
    /// The file must hold exactly `vocab_size` lines of exactly `dim`
    /// finite numbers each, otherwise [`ModelError::DimensionMismatch`] is returned
    /// and the current table is left untouched.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ModelError::resource(path, e))?;
        self.weight = parse_rows(&contents, self.vocab_size(), self.dim())?;
        info!(path = %path.display(), rows = self.vocab_size(), "loaded embedding table");
        Ok(())
    }
}

fn parse_rows(contents: &str, rows: usize, cols: usize) -> Result<Matrix> {
    let mut data = Vec::with_capacity(rows * cols);
    let mut row_count = 0;

    for (line_idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        row_count += 1;
        if row_count > rows {
            return Err(ModelError::dims(
                format!("{} rows", rows),
                "more rows than the vocabulary",
            ));
        }

        let before = data.len();
        for field in line.split_whitespace() {
            let value = field
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    ModelError::dims(
                        format!("{} finite values on line {}", cols, line_idx + 1),
                        format!("value {:?}", field),
                    )
                })?;
            data.push(value);
        }
        let got = data.len() - before;
        if got != cols {
            return Err(ModelError::dims(
                format!("{} values on line {}", cols, line_idx + 1),
                format!("{} values", got),
            ));
        }
    }

    if row_count != rows {
        return Err(ModelError::dims(
            format!("{} rows", rows),
            format!("{} rows", row_count),
        ));
    }

    Matrix::new(data, rows, cols)
}
