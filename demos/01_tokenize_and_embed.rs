//! Tokenization and Embedding Demonstration
//!
//! This example walks through the input side of the model:
//! - Growing a word-level vocabulary from text
//! - Detokenizing ids back to words
//! - Looking up embedding vectors
//! - Adding sinusoidal positional encodings
//! - Saving and reloading the vocabulary
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example 01_tokenize_and_embed
//! ```
//!
//! # Expected Runtime
//!
//! Less than 1 second

use bumblebee::{Embedding, PositionalEncoding, WordTokenizer};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n{}", "=".repeat(70));
    println!("  Tokenization and Embedding Demonstration");
    println!("{}", "=".repeat(70));

    // ========== Tokenization ==========
    println!("\n{}", "─".repeat(70));
    println!("1. Growing a Vocabulary");
    println!("{}", "─".repeat(70));

    let mut tokenizer = WordTokenizer::new();
    for line in ["hello world", "<end>", "how are you", "<end>"] {
        let ids = tokenizer.tokenize(line);
        println!(
            "  {:<14} → {:?}  (vocab size {})",
            format!("{:?}", line),
            ids,
            tokenizer.vocab_size()
        );
    }

    println!("\nVocabulary:");
    for (id, word) in tokenizer.entries() {
        println!("  {:>3}  {}", id, word);
    }

    let ids = tokenizer.tokenize("how are you world");
    println!("\nDetokenized {:?}: {:?}", ids, tokenizer.detokenize(&ids)?);
    match tokenizer.detokenize(&[99]) {
        Ok(text) => println!("Unexpected: {}", text),
        Err(e) => println!("Unknown id rejected: {}", e),
    }

    // ========== Embeddings ==========
    println!("\n{}", "─".repeat(70));
    println!("2. Embedding Lookup");
    println!("{}", "─".repeat(70));

    let dim = 8;
    let mut rng = StdRng::seed_from_u64(42);
    let embedding = Embedding::new(tokenizer.vocab_size(), dim, &mut rng)?;
    let sequence = embedding.token_to_embeddings(&ids)?;
    println!("Table shape: [{}, {}]", embedding.vocab_size(), embedding.dim());
    println!("Sequence shape: {:?}", sequence.shape());
    println!("Row for 'how': {:.3?}", embedding.get_embedding(ids[0])?);

    // ========== Positional Encoding ==========
    println!("\n{}", "─".repeat(70));
    println!("3. Positional Encoding");
    println!("{}", "─".repeat(70));

    let positional = PositionalEncoding::new(3, dim);
    for pos in 0..3 {
        println!("  pos {}: {:.3?}", pos, positional.get_encoding(pos)?);
    }
    let encoded = positional.apply(&sequence)?;
    println!(
        "\n{} embeddings in, {} encoded rows out (table holds {} positions)",
        sequence.rows,
        encoded.rows,
        positional.max_len()
    );

    // ========== Persistence ==========
    println!("\n{}", "─".repeat(70));
    println!("4. Saving the Vocabulary");
    println!("{}", "─".repeat(70));

    let path = std::env::temp_dir().join("bumblebee_demo_vocab.txt");
    tokenizer.save(&path)?;
    let reloaded = WordTokenizer::load(&path)?;
    println!("Saved to {}", path.display());
    println!(
        "Reloaded {} words; 'you' → {:?}",
        reloaded.vocab_size(),
        reloaded.token_id("you")
    );
    std::fs::remove_file(&path)?;

    println!("\n{}", "=".repeat(70));
    println!("  Done");
    println!("{}", "=".repeat(70));
    Ok(())
}
