//! Encoder–Decoder Transformer
//!
//! This module wires the layers into the full sequence-to-sequence model:
//!
//! ```text
//! input ids                         target ids
//!     ↓                                 ↓
//! Embedding + PositionalEncoding    Embedding + PositionalEncoding
//!     ↓                                 ↓
//! Encoder (N layers) ──── memory ──→ Decoder (N layers)
//!                                       ↓
//!                                   FinalLayer → softmax
//!                                       ↓
//!                     one distribution per target position
//! ```
//!
//! ## Evaluating a Pair
//!
//! [`Transformer::evaluate_pair`] runs the forward pass, aligns the
//! distributions with the targets (see [`align_sequences`]), scores each
//! position with cross-entropy, and decodes two token sequences: one sampled
//! from each distribution and one taking the most likely token.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bumblebee::{Config, Transformer, WordTokenizer};
//!
//! let mut tokenizer = WordTokenizer::new();
//! let input = tokenizer.tokenize("hello world");
//! let target = tokenizer.tokenize("<end>");
//!
//! let mut config = Config::tiny(tokenizer.vocab_size());
//! config.seed = Some(42);
//! let mut model = Transformer::new(&config)?;
//! let outcome = model.evaluate_pair(&input, &target, target[0])?;
//! println!("mean loss {:.4}", outcome.mean_loss());
//! # Ok::<(), bumblebee::ModelError>(())
//! ```

use std::fs;
use std::path::Path;

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embedding::Embedding;
use crate::error::{ModelError, Result};
use crate::layers::{
    AttentionKind, Decoder, Encoder, FeedForward, FinalLayer, NormAffine, ProjectionInit,
};
use crate::loss::{align_sequences, sequence_losses};
use crate::matrix::{argmax, Matrix};
use crate::positional::PositionalEncoding;

/// Model configuration
///
/// # Fields
///
/// - `model_dim`: Width of every embedding and hidden vector
/// - `num_layers`: Layers in the encoder and, separately, in the decoder
/// - `max_seq_len`: Rows of the positional table; longer sequences are truncated
/// - `vocab_size`: Number of distinct tokens (rows of the embedding table)
/// - `attention`: All-pairs or position-wise self-attention
/// - `layer_norm`: Per-dimension or leading-scalar affine transform
/// - `final_init`: Random or constant output projection
/// - `causal_decoder`: Mask future targets in decoder self-attention
/// - `seed`: Fixed RNG seed for reproducible weights and sampling
/// - `end_token`: Word that marks the end of a target sequence
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model_dim: usize,
    pub num_layers: usize,
    pub max_seq_len: usize,
    pub vocab_size: usize,
    pub attention: AttentionKind,
    pub layer_norm: NormAffine,
    pub final_init: ProjectionInit,
    pub causal_decoder: bool,
    pub seed: Option<u64>,
    pub end_token: String,
}

/// Value of every output projection weight in parity mode
pub const PARITY_PROJECTION_WEIGHT: f64 = 0.1;

impl Default for Config {
    fn default() -> Self {
        Self::reference(0)
    }
}

impl Config {
    /// Full-size shape: 128-dim vectors, 6 layers, 640 positions.
    pub fn reference(vocab_size: usize) -> Self {
        Self {
            model_dim: 128,
            num_layers: 6,
            max_seq_len: 640,
            vocab_size,
            attention: AttentionKind::AllPairs,
            layer_norm: NormAffine::PerDimension,
            final_init: ProjectionInit::Random,
            causal_decoder: true,
            seed: None,
            end_token: "<end>".to_string(),
        }
    }

    /// Small and fast, for tests and demos
    pub fn tiny(vocab_size: usize) -> Self {
        Self {
            model_dim: 16,
            num_layers: 2,
            max_seq_len: 64,
            ..Self::reference(vocab_size)
        }
    }

    /// Switch to the simplified model: position-wise attention, leading-scalar
    /// layer norm and a constant output projection.
    pub fn with_parity(mut self) -> Self {
        self.attention = AttentionKind::PositionWise;
        self.layer_norm = NormAffine::LeadingScalar;
        self.final_init = ProjectionInit::Constant(PARITY_PROJECTION_WEIGHT);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("model_dim", self.model_dim),
            ("num_layers", self.num_layers),
            ("max_seq_len", self.max_seq_len),
            ("vocab_size", self.vocab_size),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(ModelError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        if self.end_token.is_empty() || self.end_token.contains(char::is_whitespace) {
            return Err(ModelError::InvalidConfig(format!(
                "end token must be a single word, got {:?}",
                self.end_token
            )));
        }
        if let ProjectionInit::Constant(v) = self.final_init {
            if !v.is_finite() {
                return Err(ModelError::InvalidConfig(
                    "constant projection weight must be finite".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| ModelError::resource(path, e))?;
        info!(path = %path.display(), "saved config");
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| ModelError::resource(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Everything computed for one input/target pair.
#[derive(Clone, Debug)]
pub struct PairOutcome {
    /// One vocabulary distribution per (aligned) target position
    pub distributions: Vec<Vec<f64>>,
    /// Target ids after alignment
    pub targets: Vec<usize>,
    pub losses: Vec<f64>,
    /// Token drawn at random from each distribution
    pub sampled: Vec<usize>,
    /// Most likely token of each distribution
    pub greedy: Vec<usize>,
}

impl PairOutcome {
    pub fn total_loss(&self) -> f64 {
        self.losses.iter().sum()
    }

    pub fn mean_loss(&self) -> f64 {
        if self.losses.is_empty() {
            0.0
        } else {
            self.total_loss() / self.losses.len() as f64
        }
    }
}

/// Draw a token id with probability proportional to `distribution`.
pub fn sample<R: Rng + ?Sized>(distribution: &[f64], rng: &mut R) -> Result<usize> {
    let index = WeightedIndex::new(distribution)
        .map_err(|e| ModelError::unstable(format!("in sampling distribution ({e})")))?;
    Ok(index.sample(rng))
}

/// The prefix of `ids` before the first `end_id`.
pub fn truncate_at_end(ids: &[usize], end_id: usize) -> &[usize] {
    let end = ids.iter().position(|&id| id == end_id).unwrap_or(ids.len());
    &ids[..end]
}

/// Complete encoder–decoder model
///
/// Owns every parameter plus the random number generator used for
/// initialisation and sampling. Forward passes never modify the weights.
pub struct Transformer {
    pub config: Config,
    pub embedding: Embedding,
    pub positional: PositionalEncoding,
    pub encoder: Encoder,
    pub decoder: Decoder,
    pub final_layer: FinalLayer,
    rng: StdRng,
}

impl Transformer {
    /// Build a model with freshly initialised weights.
    ///
    /// Uses `config.seed` when set, otherwise seeds from the OS.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let dim = config.model_dim;
        let embedding = Embedding::new(config.vocab_size, dim, &mut rng)?;
        let positional = PositionalEncoding::new(config.max_seq_len, dim);
        let encoder = Encoder::new(
            config.num_layers,
            dim,
            config.attention,
            config.layer_norm,
            &mut rng,
        )?;
        let decoder = Decoder::new(
            config.num_layers,
            dim,
            config.attention,
            config.layer_norm,
            config.causal_decoder,
            &mut rng,
        )?;
        let final_layer = FinalLayer::new(dim, config.vocab_size, config.final_init, &mut rng)?;

        let model = Self {
            config: config.clone(),
            embedding,
            positional,
            encoder,
            decoder,
            final_layer,
            rng,
        };
        debug!(
            dim,
            layers = config.num_layers,
            vocab_size = config.vocab_size,
            parameters = model.count_parameters(),
            "built transformer"
        );
        Ok(model)
    }

    /// Embeddings plus positional encoding, truncated to `max_seq_len` rows.
    pub fn embed(&self, token_ids: &[usize]) -> Result<Matrix> {
        let embeddings = self.embedding.token_to_embeddings(token_ids)?;
        self.positional.apply(&embeddings)
    }

    /// Encoder output (the decoder's memory) for `input_ids`.
    pub fn encode(&self, input_ids: &[usize]) -> Result<Matrix> {
        self.encoder.forward(&self.embed(input_ids)?)
    }

    /// Decoder output for `target_ids` attending over `memory`.
    pub fn decode(&self, target_ids: &[usize], memory: &Matrix) -> Result<Matrix> {
        self.decoder.forward(&self.embed(target_ids)?, memory)
    }

    /// One probability distribution per decoder position.
    ///
    /// The result has `min(target_ids.len(), max_seq_len)` entries.
    pub fn forward(&self, input_ids: &[usize], target_ids: &[usize]) -> Result<Vec<Vec<f64>>> {
        let memory = self.encode(input_ids)?;
        let decoded = self.decode(target_ids, &memory)?;
        self.final_layer.forward_sequence(&decoded)
    }

    /// Forward pass, alignment, loss and decoding for one pair.
    pub fn evaluate_pair(
        &mut self,
        input_ids: &[usize],
        target_ids: &[usize],
        end_token_id: usize,
    ) -> Result<PairOutcome> {
        let distributions = self.forward(input_ids, target_ids)?;
        let produced = distributions.len();
        let (distributions, targets) = align_sequences(
            distributions,
            target_ids.to_vec(),
            self.config.vocab_size,
            end_token_id,
        );
        let losses = sequence_losses(&distributions, &targets)?;

        let sampled = distributions
            .iter()
            .map(|dist| sample(dist, &mut self.rng))
            .collect::<Result<Vec<_>>>()?;
        let greedy = distributions
            .iter()
            .map(|dist| argmax(dist).unwrap_or(end_token_id))
            .collect();

        debug!(
            inputs = input_ids.len(),
            targets = target_ids.len(),
            produced,
            aligned = targets.len(),
            "evaluated pair"
        );
        Ok(PairOutcome {
            distributions,
            targets,
            losses,
            sampled,
            greedy,
        })
    }

    /// Total number of learnable parameters
    pub fn count_parameters(&self) -> usize {
        let mut total = self.embedding.weight.data.len();

        for layer in &self.encoder.layers {
            total += 3 * layer.attention.w_q.data.len();
            total += ffn_parameters(&layer.ffn);
            total += 2 * (layer.norm1.gamma.len() + layer.norm1.beta.len());
        }
        for layer in &self.decoder.layers {
            total += 3 * layer.self_attention.w_q.data.len();
            total += 3 * layer.cross_attention.w_q.data.len();
            total += ffn_parameters(&layer.ffn);
            total += 3 * (layer.norm1.gamma.len() + layer.norm1.beta.len());
        }

        total += self.final_layer.weight.data.len();
        total += self.final_layer.bias.len();
        total
    }
}

fn ffn_parameters(ffn: &FeedForward) -> usize {
    ffn.fc1.weight.data.len() + ffn.fc1.bias.len() + ffn.fc2.weight.data.len() + ffn.fc2.bias.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vocab: usize) -> Config {
        Config {
            model_dim: 8,
            num_layers: 2,
            max_seq_len: 16,
            seed: Some(7),
            ..Config::tiny(vocab)
        }
    }

    #[test]
    fn test_presets() {
        let reference = Config::reference(10);
        assert_eq!(
            (reference.model_dim, reference.num_layers, reference.max_seq_len),
            (128, 6, 640)
        );
        assert_eq!(reference.end_token, "<end>");
        assert!(reference.causal_decoder);
        assert!(Config::tiny(10).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        assert!(Config::reference(0).validate().is_err());
        let mut c = Config::tiny(5);
        c.model_dim = 0;
        assert!(matches!(c.validate(), Err(ModelError::InvalidConfig(_))));
        let mut c = Config::tiny(5);
        c.end_token = "two words".into();
        assert!(c.validate().is_err());
        assert!(Transformer::new(&Config::reference(0)).is_err());
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let c = Config::tiny(12).with_parity();
        c.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), c);
    }

    #[test]
    fn test_config_load_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{"model_dim": 32, "vocab_size": 4}"#).unwrap();
        let c = Config::load(&path).unwrap();
        assert_eq!(c.model_dim, 32);
        assert_eq!(c.num_layers, 6);
        assert_eq!(c.attention, AttentionKind::AllPairs);

        assert!(matches!(
            Config::load(dir.path().join("missing.json")),
            Err(ModelError::ResourceUnavailable { .. })
        ));
        fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ModelError::Serialization(_))));
    }

    #[test]
    fn test_forward_one_distribution_per_target() {
        let model = Transformer::new(&config(6)).unwrap();
        let dists = model.forward(&[0, 1], &[2, 3, 4]).unwrap();
        assert_eq!(dists.len(), 3);
        for d in &dists {
            assert_eq!(d.len(), 6);
            assert!((d.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert!(d.iter().all(|&p| p > 0.0));
        }
    }

    #[test]
    fn test_same_seed_same_model() {
        let a = Transformer::new(&config(5)).unwrap();
        let b = Transformer::new(&config(5)).unwrap();
        assert_eq!(
            a.forward(&[0, 1, 2], &[3, 4]).unwrap(),
            b.forward(&[0, 1, 2], &[3, 4]).unwrap()
        );
    }

    #[test]
    fn test_unknown_token_rejected() {
        let model = Transformer::new(&config(3)).unwrap();
        assert!(matches!(
            model.forward(&[0, 3], &[1]),
            Err(ModelError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_parity_mode_is_uniform() {
        let mut model = Transformer::new(&config(4).with_parity()).unwrap();
        let outcome = model.evaluate_pair(&[0, 1], &[2, 3], 3).unwrap();
        for dist in &outcome.distributions {
            for &p in dist {
                assert!((p - 0.25).abs() < 1e-12);
            }
        }
        let expected = -(0.25f64 + 1e-9).ln();
        for loss in &outcome.losses {
            assert!((loss - expected).abs() < 1e-9);
        }
        // ties resolve to the first token
        assert_eq!(outcome.greedy, vec![0, 0]);
    }

    #[test]
    fn test_long_targets_are_padded_uniform() {
        let mut c = config(3);
        c.max_seq_len = 2;
        let mut model = Transformer::new(&c).unwrap();
        let outcome = model.evaluate_pair(&[0], &[1, 1, 1, 2], 2).unwrap();
        assert_eq!(outcome.distributions.len(), 4);
        assert_eq!(outcome.targets, vec![1, 1, 1, 2]);
        assert_eq!(outcome.distributions[3], vec![1.0 / 3.0; 3]);
        assert_eq!(outcome.sampled.len(), 4);
        assert!(outcome.sampled.iter().all(|&id| id < 3));
    }

    #[test]
    fn test_empty_target_yields_nothing() {
        let mut model = Transformer::new(&config(3)).unwrap();
        let outcome = model.evaluate_pair(&[0, 1], &[], 2).unwrap();
        assert!(outcome.losses.is_empty());
        assert_eq!(outcome.mean_loss(), 0.0);
    }

    #[test]
    fn test_sample_follows_distribution() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..20 {
            assert_eq!(sample(&[0.0, 0.0, 1.0], &mut rng).unwrap(), 2);
        }
        assert!(matches!(
            sample(&[0.0, 0.0], &mut rng),
            Err(ModelError::UnstableComputation { .. })
        ));
    }

    #[test]
    fn test_truncate_at_end() {
        assert_eq!(truncate_at_end(&[4, 5, 2, 6], 2), &[4, 5]);
        assert_eq!(truncate_at_end(&[2], 2), &[] as &[usize]);
        assert_eq!(truncate_at_end(&[1, 3], 2), &[1, 3]);
    }

    #[test]
    fn test_count_parameters() {
        let model = Transformer::new(&config(10)).unwrap();
        let d = 8;
        let ffn = d * 4 * d + 4 * d + 4 * d * d + d;
        let encoder_layer = 3 * d * d + ffn + 4 * d;
        let decoder_layer = 6 * d * d + ffn + 6 * d;
        let expected = 10 * d + 2 * (encoder_layer + decoder_layer) + 10 * d + 10;
        assert_eq!(model.count_parameters(), expected);
    }
}
