//! Matrix Operations Demonstration
//!
//! This example demonstrates the numeric primitives the model is built on:
//! - Matrix multiplication (sequential and parallel)
//! - Transpose and matrix-vector products
//! - Stable softmax and its shift invariance
//! - Layer normalization
//! - Attention weights with and without a causal mask
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example 02_matrix_operations
//! ```
//!
//! # Expected Runtime
//!
//! Less than 1 second

use bumblebee::layers::{LayerNorm, NormAffine, SelfAttention};
use bumblebee::{softmax, Matrix};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n{}", "=".repeat(70));
    println!("  Matrix Operations Demonstration");
    println!("{}", "=".repeat(70));

    // ========== Matrix Multiplication ==========
    println!("\n{}", "─".repeat(70));
    println!("1. Matrix Multiplication");
    println!("{}", "─".repeat(70));

    let a = Matrix::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3)?;
    let b = Matrix::new(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], 3, 2)?;
    let c = a.matmul(&b)?;
    println!("A [2×3] @ B [3×2] = {:?} {:?}", c.shape(), c.data);
    println!("Aᵀ shape: {:?}", a.transpose().shape());
    println!("A · [1, 1, 1] = {:?}", a.matvec(&[1.0, 1.0, 1.0])?);

    match a.matmul(&a) {
        Ok(_) => println!("Unexpected success"),
        Err(e) => println!("A @ A rejected: {}", e),
    }

    let mut rng = StdRng::seed_from_u64(0);
    let big_a = Matrix::random_uniform(256, 256, -1.0, 1.0, &mut rng)?;
    let big_b = Matrix::random_uniform(256, 256, -1.0, 1.0, &mut rng)?;
    let start = Instant::now();
    let big_c = big_a.matmul(&big_b)?;
    println!(
        "\n256×256 @ 256×256 (parallel blocks): {:?} in {:.2?}",
        big_c.shape(),
        start.elapsed()
    );

    // ========== Softmax ==========
    println!("\n{}", "─".repeat(70));
    println!("2. Softmax");
    println!("{}", "─".repeat(70));

    let logits = [1.0, 2.0, 3.0];
    let shifted: Vec<f64> = logits.iter().map(|x| x + 1000.0).collect();
    let p = softmax(&logits);
    let q = softmax(&shifted);
    println!("softmax({:?}) = {:.4?}", logits, p);
    println!("softmax(+1000)     = {:.4?}", q);
    println!("sum = {:.12}", p.iter().sum::<f64>());

    // ========== Layer Normalization ==========
    println!("\n{}", "─".repeat(70));
    println!("3. Layer Normalization");
    println!("{}", "─".repeat(70));

    let norm = LayerNorm::new(4, NormAffine::PerDimension);
    let x = [2.0, 4.0, 6.0, 8.0];
    println!("standardize({:?}) = {:.4?}", x, norm.standardize(&x)?);
    println!("normalize (γ = 0.001)       = {:.6?}", norm.normalize(&x)?);

    // ========== Attention ==========
    println!("\n{}", "─".repeat(70));
    println!("4. Attention Weights");
    println!("{}", "─".repeat(70));

    let attention = SelfAttention::new(4, &mut rng)?;
    let sequence = Matrix::random_uniform(3, 4, 0.0, 1.0, &mut rng)?;
    for causal in [false, true] {
        let weights = attention.attention_weights(&sequence, causal)?;
        println!("\ncausal = {}", causal);
        for row in weights.iter_rows() {
            println!("  {:.3?}", row);
        }
    }

    println!("\n{}", "=".repeat(70));
    println!("  Done");
    println!("{}", "=".repeat(70));
    Ok(())
}
