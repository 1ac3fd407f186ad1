//! Evaluation Logger
//!
//! Records per-pair evaluation metrics in a CSV file so runs can be compared
//! afterwards.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bumblebee::EvalLogger;
//!
//! let mut logger = EvalLogger::new("eval_log.csv")?;
//! logger.log(0, 3, 4.2, "hello world")?;
//! # Ok::<(), bumblebee::ModelError>(())
//! ```
//!
//! ## CSV Format
//!
//! - `pair`: Index of the pair in the dataset
//! - `elapsed_seconds`: Time since the logger was created
//! - `targets`: Number of aligned target positions
//! - `total_loss`: Sum of per-token losses for the pair
//! - `mean_loss`: `total_loss / targets`
//! - `perplexity`: exp(mean_loss)
//! - `predicted`: Detokenized prediction, quoted

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::debug;

use crate::error::{ModelError, Result};
use crate::loss::perplexity;

pub const CSV_HEADER: &str = "pair,elapsed_seconds,targets,total_loss,mean_loss,perplexity,predicted";

pub struct EvalLogger {
    writer: BufWriter<File>,
    path: PathBuf,
    start_time: Instant,
}

impl EvalLogger {
    /// Create (or truncate) `log_path` and write the header row.
    pub fn new<P: AsRef<Path>>(log_path: P) -> Result<Self> {
        let path = log_path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| ModelError::resource(&path, e))?;
        let mut logger = Self {
            writer: BufWriter::new(file),
            path,
            start_time: Instant::now(),
        };
        logger.write_line(CSV_HEADER)?;
        Ok(logger)
    }

    /// Append one row. The row is flushed immediately.
    pub fn log(&mut self, pair: usize, targets: usize, total_loss: f64, predicted: &str) -> Result<()> {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let mean_loss = if targets == 0 {
            0.0
        } else {
            total_loss / targets as f64
        };
        // CSV quoting doubles embedded quotes
        let predicted = predicted.replace('"', "\"\"");
        let line = format!(
            "{},{:.2},{},{:.6},{:.6},{:.4},\"{}\"",
            pair,
            elapsed,
            targets,
            total_loss,
            mean_loss,
            perplexity(mean_loss),
            predicted
        );
        self.write_line(&line)?;
        debug!(pair, mean_loss, "logged evaluation");
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| ModelError::resource(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.csv");
        let mut logger = EvalLogger::new(&path).unwrap();
        logger.log(0, 2, 4.0, "say \"hi\"").unwrap();
        logger.log(1, 0, 0.0, "").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);

        let fields: Vec<&str> = lines[1].splitn(7, ',').collect();
        assert_eq!(fields[0], "0");
        assert_eq!(fields[2], "2");
        assert_eq!(fields[3], "4.000000");
        assert_eq!(fields[4], "2.000000");
        assert_eq!(fields[5], format!("{:.4}", 2f64.exp()));
        assert_eq!(fields[6], "\"say \"\"hi\"\"\"");

        assert!(lines[2].ends_with(",0,0.000000,0.000000,1.0000,\"\""));
    }

    #[test]
    fn test_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("eval.csv");
        assert!(matches!(
            EvalLogger::new(&path),
            Err(ModelError::ResourceUnavailable { .. })
        ));
    }
}
