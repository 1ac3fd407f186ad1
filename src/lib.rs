//! Bumblebee: Minimal Encoder–Decoder Transformer
//!
//! A sequence-to-sequence Transformer implemented from scratch in Rust:
//! word-level tokenization, embeddings, sinusoidal positional encoding,
//! encoder and decoder stacks with self- and cross-attention, an output
//! projection, and cross-entropy loss. Only the forward computation is
//! implemented.
//!
//! # Modules
//!
//! - [`tokenizer`] - Word-level tokenization that grows as text is seen
//! - [`matrix`] - Dense row-major matrix and vector primitives
//! - [`embedding`] - Token embedding table
//! - [`positional`] - Sinusoidal positional encoding
//! - [`layers`] - Attention, feedforward, normalization, encoder, decoder
//! - [`loss`] - Cross-entropy, sequence alignment, perplexity
//! - [`model`] - Configuration and the full [`Transformer`]
//! - [`dataset`] - Line-pair dataset parsing
//! - [`eval_logger`] - CSV evaluation log
//!
//! # Example
//!
//! ```rust,no_run
//! use bumblebee::{dataset, Config, Transformer, WordTokenizer};
//!
//! let pairs = dataset::parse_pairs("hello world\n<end>\nhow are you\n<end>");
//! let mut tokenizer = WordTokenizer::new();
//! let tokenized = dataset::tokenize_pairs(&mut tokenizer, &pairs);
//! let end_id = tokenizer.tokenize("<end>")[0];
//!
//! let mut model = Transformer::new(&Config::tiny(tokenizer.vocab_size()))?;
//! for pair in &tokenized {
//!     let outcome = model.evaluate_pair(&pair.input, &pair.output, end_id)?;
//!     println!("loss {:.4}", outcome.mean_loss());
//! }
//! # Ok::<(), bumblebee::ModelError>(())
//! ```

pub mod dataset;
pub mod embedding;
pub mod error;
pub mod eval_logger;
pub mod layers;
pub mod loss;
pub mod matrix;
pub mod model;
pub mod positional;
pub mod tokenizer;

// Re-export main types for convenience
pub use dataset::{load_pairs, parse_pairs, tokenize_pairs, LinePair, TokenizedPair};
pub use embedding::Embedding;
pub use error::{ModelError, Result};
pub use eval_logger::EvalLogger;
pub use layers::{AttentionKind, NormAffine, ProjectionInit};
pub use loss::{align_sequences, cross_entropy_loss, loss_gradient, LossSummary};
pub use matrix::{softmax, Matrix};
pub use model::{Config, PairOutcome, Transformer};
pub use positional::PositionalEncoding;
pub use tokenizer::WordTokenizer;
