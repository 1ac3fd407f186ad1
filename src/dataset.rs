//! Line-Pair Datasets
//!
//! A dataset is plain text where each input line is followed by its expected
//! output line:
//!
//! ```text
//! hello world
//! <end>
//! how are you
//! <end>
//! ```
//!
//! Blank (or whitespace-only) lines are ignored before pairing, and a final
//! input line without an output is dropped.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{ModelError, Result};
use crate::tokenizer::WordTokenizer;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinePair {
    pub input: String,
    pub output: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenizedPair {
    pub input: Vec<usize>,
    pub output: Vec<usize>,
}

/// Split `text` into consecutive (input, output) line pairs.
pub fn parse_pairs(text: &str) -> Vec<LinePair> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() % 2 == 1 {
        warn!(line = lines.len(), "dropping unpaired trailing line");
    }
    lines
        .chunks_exact(2)
        .map(|pair| LinePair {
            input: pair[0].to_string(),
            output: pair[1].to_string(),
        })
        .collect()
}

/// Read and pair a dataset file.
///
/// A missing or unreadable file is [`ModelError::ResourceUnavailable`].
pub fn load_pairs<P: AsRef<Path>>(path: P) -> Result<Vec<LinePair>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| ModelError::resource(path, e))?;
    let pairs = parse_pairs(&text);
    info!(path = %path.display(), pairs = pairs.len(), "loaded dataset");
    Ok(pairs)
}

/// Tokenize every pair in order, input before output, growing the vocabulary.
pub fn tokenize_pairs(tokenizer: &mut WordTokenizer, pairs: &[LinePair]) -> Vec<TokenizedPair> {
    pairs
        .iter()
        .map(|pair| TokenizedPair {
            input: tokenizer.tokenize(&pair.input),
            output: tokenizer.tokenize(&pair.output),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_pairs() {
        let pairs = parse_pairs("hello world\n<end>\nhow are you\n<end>");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].input, "hello world");
        assert_eq!(pairs[1].output, "<end>");
    }

    #[test]
    fn test_blank_lines_and_trailer() {
        let pairs = parse_pairs("\na\n\n   \nb\nc\n\n");
        assert_eq!(
            pairs,
            vec![LinePair {
                input: "a".into(),
                output: "b".into()
            }]
        );
        assert!(parse_pairs("").is_empty());
    }

    #[test]
    fn test_load_pairs() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "one\ntwo\r\nthree\nfour\n").unwrap();
        let pairs = load_pairs(file.path()).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].output, "two");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_pairs(dir.path().join("nope.txt")),
            Err(ModelError::ResourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_tokenize_pairs_order() {
        let mut tok = WordTokenizer::new();
        let pairs = parse_pairs("hello world\n<end>\nhow are you\n<end>");
        let tokenized = tokenize_pairs(&mut tok, &pairs);
        assert_eq!(tokenized[0].input, vec![0, 1]);
        assert_eq!(tokenized[0].output, vec![2]);
        assert_eq!(tokenized[1].input, vec![3, 4, 5]);
        assert_eq!(tokenized[1].output, vec![2]);
        assert_eq!(tok.vocab_size(), 6);
    }
}
