//! Cross-Entropy Loss
//!
//! The loss for one position is the negative log probability the model
//! assigned to the correct token:
//!
//! ```text
//! loss = -ln(p[target] + ε)        ε = 1e-9
//! ```
//!
//! ε keeps the loss finite when the model gives the target zero probability.
//! A perfect prediction (`p[target] = 1`) scores `-ln(1 + 1e-9) ≈ -1e-9`.
//!
//! ## Sequence Alignment
//!
//! The model may emit a different number of distributions than there are
//! target tokens. Before scoring, [`align_sequences`] pads whichever side is
//! short:
//!
//! - too few distributions: append uniform distributions (`1 / vocab_size`)
//! - too few targets: append the end-of-sequence token id
//!
//! Nothing produced by either side is discarded.
//!
//! ## Perplexity
//!
//! ```text
//! perplexity = exp(mean loss)
//! ```
//!
//! A perfect model scores 1.0; uniform guessing over `V` tokens scores `V`.

use crate::error::{ModelError, Result};

/// Added to the target probability before taking the log
pub const LOSS_EPS: f64 = 1e-9;

/// `-ln(distribution[target_id] + ε)`
pub fn cross_entropy_loss(distribution: &[f64], target_id: usize) -> Result<f64> {
    let p = distribution
        .get(target_id)
        .ok_or(ModelError::IndexOutOfRange {
            index: target_id,
            len: distribution.len(),
        })?;
    Ok(-(p + LOSS_EPS).ln())
}

/// Pad distributions or targets so both sequences have the same length.
pub fn align_sequences(
    mut distributions: Vec<Vec<f64>>,
    mut targets: Vec<usize>,
    vocab_size: usize,
    end_token_id: usize,
) -> (Vec<Vec<f64>>, Vec<usize>) {
    if distributions.len() < targets.len() {
        let uniform = vec![1.0 / vocab_size as f64; vocab_size];
        distributions.resize(targets.len(), uniform);
    } else if targets.len() < distributions.len() {
        targets.resize(distributions.len(), end_token_id);
    }
    (distributions, targets)
}

/// Per-position losses for two sequences of equal length.
pub fn sequence_losses(distributions: &[Vec<f64>], targets: &[usize]) -> Result<Vec<f64>> {
    if distributions.len() != targets.len() {
        return Err(ModelError::dims(
            format!("{} targets", distributions.len()),
            format!("{} targets", targets.len()),
        ));
    }
    distributions
        .iter()
        .zip(targets)
        .map(|(dist, &target)| cross_entropy_loss(dist, target))
        .collect()
}

/// Gradient of the cross-entropy loss with respect to the logits when the
/// labels are one-hot: `predictions - labels`.
pub fn loss_gradient(predictions: &[f64], labels: &[f64]) -> Result<Vec<f64>> {
    if predictions.len() != labels.len() {
        return Err(ModelError::dims(predictions.len(), labels.len()));
    }
    Ok(predictions.iter().zip(labels).map(|(p, y)| p - y).collect())
}

pub fn perplexity(mean_loss: f64) -> f64 {
    mean_loss.exp()
}

/// Running total of per-token losses.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LossSummary {
    pub total: f64,
    pub count: usize,
}

impl LossSummary {
    pub fn add(&mut self, losses: &[f64]) {
        self.total += losses.iter().sum::<f64>();
        self.count += losses.len();
    }

    /// Mean per-token loss, `None` before any loss has been recorded.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / self.count as f64)
    }

    pub fn perplexity(&self) -> Option<f64> {
        self.mean().map(perplexity)
    }
}
