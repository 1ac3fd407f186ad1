//! Evaluate an encoder–decoder Transformer on a line-pair dataset.
//!
//! Reads the dataset, builds the vocabulary from every pair, initialises a
//! model sized to that vocabulary, and for each pair prints the predicted and
//! expected output followed by the aggregate loss.
//!
//! ## Usage
//!
//! ```bash
//! # Full-size model (128-dim, 6 layers) on the default dataset
//! cargo run --release
//!
//! # Smaller model, reproducible, with a CSV log
//! cargo run --release -- --data pairs.txt --dim 32 --layers 2 --seed 42 --log-csv eval.csv
//!
//! # Simplified single-position attention and constant projection
//! cargo run --release -- --parity
//!
//! # More detail
//! RUST_LOG=bumblebee=debug cargo run --release
//! ```

use std::path::PathBuf;
use std::process;

use bumblebee::model::truncate_at_end;
use bumblebee::{
    load_pairs, tokenize_pairs, Config, EvalLogger, LossSummary, ModelError, Transformer,
    WordTokenizer,
};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bumblebee",
    about = "Evaluate an encoder-decoder Transformer on input/output line pairs"
)]
struct Args {
    /// Dataset: input line followed by expected output line, repeated
    #[arg(long, default_value = "data/dataset.txt")]
    data: PathBuf,

    /// Load the model configuration from a JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model dimension
    #[arg(long)]
    dim: Option<usize>,

    /// Number of encoder layers (and decoder layers)
    #[arg(long)]
    layers: Option<usize>,

    /// Positional table length; longer sequences are truncated
    #[arg(long)]
    max_len: Option<usize>,

    /// Random seed for weights and sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Position-wise attention, leading-scalar layer norm, constant projection
    #[arg(long)]
    parity: bool,

    /// Write the vocabulary to this file
    #[arg(long)]
    save_vocab: Option<PathBuf>,

    /// Write the embedding table to this file
    #[arg(long)]
    save_embeddings: Option<PathBuf>,

    /// Write per-pair metrics to this CSV file
    #[arg(long)]
    log_csv: Option<PathBuf>,
}

impl Args {
    fn model_config(&self) -> Result<Config, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::reference(0),
        };
        if let Some(dim) = self.dim {
            config.model_dim = dim;
        }
        if let Some(layers) = self.layers {
            config.num_layers = layers;
        }
        if let Some(max_len) = self.max_len {
            config.max_seq_len = max_len;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.parity {
            config = config.with_parity();
        }
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bumblebee=info".parse()?))
        .init();

    let args = Args::parse();
    let mut config = args.model_config()?;

    let pairs = match load_pairs(&args.data) {
        Ok(pairs) => pairs,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    println!("Loaded {} pairs from {}", pairs.len(), args.data.display());

    let mut tokenizer = WordTokenizer::new();
    let tokenized = tokenize_pairs(&mut tokenizer, &pairs);
    let end_id = tokenizer
        .tokenize(&config.end_token)
        .first()
        .copied()
        .ok_or_else(|| ModelError::InvalidConfig("end token must not be empty".into()))?;
    config.vocab_size = tokenizer.vocab_size();
    info!(vocab_size = config.vocab_size, "vocabulary built");

    let mut model = Transformer::new(&config)?;
    info!(
        parameters = model.count_parameters(),
        dim = config.model_dim,
        layers = config.num_layers,
        "model ready"
    );

    if let Some(path) = &args.save_vocab {
        tokenizer.save(path)?;
    }
    if let Some(path) = &args.save_embeddings {
        model.embedding.save(path)?;
    }
    let mut logger = args.log_csv.as_ref().map(EvalLogger::new).transpose()?;

    let mut summary = LossSummary::default();
    for (i, pair) in tokenized.iter().enumerate() {
        let outcome = model.evaluate_pair(&pair.input, &pair.output, end_id)?;
        summary.add(&outcome.losses);

        let predicted = tokenizer.detokenize(truncate_at_end(&outcome.sampled, end_id))?;
        let most_likely = tokenizer.detokenize(truncate_at_end(&outcome.greedy, end_id))?;
        let actual = tokenizer.detokenize(truncate_at_end(&outcome.targets, end_id))?;

        println!("Input: \n{}", pairs[i].input);
        println!("Predicted: \n{}", predicted);
        println!("Most likely: \n{}", most_likely);
        println!("Actual: \n{}", actual);
        println!();

        if let Some(logger) = logger.as_mut() {
            logger.log(i, outcome.losses.len(), outcome.total_loss(), &predicted)?;
        }
    }

    if let (Some(mean), Some(perplexity)) = (summary.mean(), summary.perplexity()) {
        println!("Total loss: {:.6}", summary.total);
        println!("Mean loss: {:.6}", mean);
        println!("Perplexity: {:.4}", perplexity);
    } else {
        println!("No pairs evaluated");
    }

    Ok(())
}
