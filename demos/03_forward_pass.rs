//! Forward Pass Demonstration
//!
//! This example runs the full encoder–decoder model on a toy dataset:
//! - Parsing line pairs and building the vocabulary
//! - Comparing the default model with the simplified parity mode
//! - Inspecting per-position distributions and losses
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example 03_forward_pass
//! ```
//!
//! # Expected Runtime
//!
//! Less than 1 second

use bumblebee::model::truncate_at_end;
use bumblebee::{parse_pairs, tokenize_pairs, Config, LossSummary, Transformer, WordTokenizer};

const DATASET: &str = "hello world\n<end>\nhow are you\nfine thanks <end>\nwhat is this\na small model <end>\n";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n{}", "=".repeat(70));
    println!("  Encoder–Decoder Forward Pass");
    println!("{}", "=".repeat(70));

    let pairs = parse_pairs(DATASET);
    let mut tokenizer = WordTokenizer::new();
    let tokenized = tokenize_pairs(&mut tokenizer, &pairs);
    let end_id = tokenizer.tokenize("<end>")[0];
    println!(
        "\n{} pairs, vocabulary of {} words",
        pairs.len(),
        tokenizer.vocab_size()
    );

    let base = Config {
        seed: Some(42),
        ..Config::tiny(tokenizer.vocab_size())
    };
    let variants = [("all-pairs", base.clone()), ("parity", base.with_parity())];

    for (name, config) in variants {
        println!("\n{}", "─".repeat(70));
        println!("Model: {}", name);
        println!("{}", "─".repeat(70));

        let mut model = Transformer::new(&config)?;
        println!("Parameters: {}", model.count_parameters());

        let mut summary = LossSummary::default();
        for (pair, ids) in pairs.iter().zip(&tokenized) {
            let outcome = model.evaluate_pair(&ids.input, &ids.output, end_id)?;
            summary.add(&outcome.losses);

            println!("\n  {:?} → {:?}", pair.input, pair.output);
            for (pos, (dist, target)) in outcome.distributions.iter().zip(&outcome.targets).enumerate() {
                println!(
                    "    pos {}: p(target) = {:.4}  loss = {:.4}",
                    pos, dist[*target], outcome.losses[pos]
                );
            }
            println!(
                "    most likely: {:?}",
                tokenizer.detokenize(truncate_at_end(&outcome.greedy, end_id))?
            );
        }

        if let (Some(mean), Some(ppl)) = (summary.mean(), summary.perplexity()) {
            println!("\n  total loss {:.4}, mean {:.4}, perplexity {:.2}", summary.total, mean, ppl);
        }
    }

    println!("\n{}", "=".repeat(70));
    println!("  Done");
    println!("{}", "=".repeat(70));
    Ok(())
}
