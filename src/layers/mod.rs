//! Neural Network Layers
//!
//! Every building block of the encoder–decoder Transformer lives here.
//!
//! ## Layers
//!
//! - **activation**: ReLU
//! - **linear**: Affine map `x @ W + b`
//! - **layer_norm**: Per-position layer normalization
//! - **attention**: Scaled dot-product self- and cross-attention
//! - **feed_forward**: Position-wise two-layer network
//! - **encoder**: Encoder layer and stack
//! - **decoder**: Decoder layer and stack
//! - **final_layer**: Projection to vocabulary probabilities
//!
//! ## Design Pattern
//!
//! Each layer owns its parameters and exposes a forward pass that takes a
//! `[seq_len, dim]` [`Matrix`](crate::matrix::Matrix) or a single position's
//! `&[f64]` and returns a fresh value:
//!
//! ```rust,ignore
//! pub struct Layer {
//!     // Parameters (weights, biases, etc.)
//! }
//!
//! impl Layer {
//!     pub fn new(..., rng: &mut R) -> Result<Self> { }
//!     pub fn forward(&self, x: &Matrix) -> Result<Matrix> { }
//! }
//! ```
//!
//! Forward passes never mutate the layer, so the same weights always map the
//! same input to the same output.

use tracing::warn;

use crate::error::{ModelError, Result};
use crate::matrix::all_finite;

pub mod activation;
pub mod attention;
pub mod decoder;
pub mod encoder;
pub mod feed_forward;
pub mod final_layer;
pub mod layer_norm;
pub mod linear;

// Re-export main types for convenience
pub use activation::{relu, relu_matrix};
pub use attention::{AttentionKind, SelfAttention};
pub use decoder::{Decoder, DecoderLayer};
pub use encoder::{Encoder, EncoderLayer};
pub use feed_forward::FeedForward;
pub use final_layer::{FinalLayer, ProjectionInit};
pub use layer_norm::{LayerNorm, NormAffine};
pub use linear::Linear;

/// Fail with [`ModelError::UnstableComputation`] if `values` holds NaN or ∞.
pub(crate) fn ensure_finite(stage: &str, values: &[f64]) -> Result<()> {
    if all_finite(values) {
        Ok(())
    } else {
        warn!(stage, "non-finite value, aborting forward pass");
        Err(ModelError::unstable(stage))
    }
}
