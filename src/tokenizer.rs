//! Word-Level Tokenizer
//!
//! Maps whitespace-delimited words to integer ids and back. Unlike a trained
//! subword tokenizer there is no training phase: the vocabulary grows as text
//! is tokenized, assigning the next free id to every word seen for the first
//! time.
//!
//! ## Invariants
//!
//! - Ids are dense and assigned in first-seen order starting at 0
//! - The word ↔ id mapping is a bijection (no shared ids, no aliased words)
//! - The vocabulary only grows; nothing is ever removed
//!
//! ## Example
//!
//! ```rust
//! use bumblebee::WordTokenizer;
//!
//! let mut tokenizer = WordTokenizer::new();
//! let ids = tokenizer.tokenize("hello world hello");
//! assert_eq!(ids, vec![0, 1, 0]);
//! assert_eq!(tokenizer.vocab_size(), 2);
//! assert_eq!(tokenizer.detokenize(&ids)?, "hello world hello ");
//! # Ok::<(), bumblebee::ModelError>(())
//! ```
//!
//! ## Persistence Format
//!
//! One `word id` pair per line, written in id order. Loading rebuilds both
//! directions of the mapping and rejects malformed lines, duplicate words or
//! ids, and ids at or beyond the number of entries.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{ModelError, Result};

/// Incrementally built word-level vocabulary.
#[derive(Clone, Debug, Default)]
pub struct WordTokenizer {
    /// Maps words to their ids
    vocab: HashMap<String, usize>,

    /// Maps ids back to words; index == id
    words: Vec<String>,
}

impl WordTokenizer {
    /// Create a tokenizer with an empty vocabulary
    pub fn new() -> Self {
        Self::default()
    }

    /// Split `text` on whitespace and return one id per word.
    ///
    /// Words not seen before are registered with the next id (the current
    /// vocabulary size). Never fails; empty or blank text gives an empty
    /// sequence.
    pub fn tokenize(&mut self, text: &str) -> Vec<usize> {
        text.split_whitespace()
            .map(|word| self.intern(word))
            .collect()
    }

    fn intern(&mut self, word: &str) -> usize {
        if let Some(&id) = self.vocab.get(word) {
            return id;
        }
        let id = self.words.len();
        self.vocab.insert(word.to_string(), id);
        self.words.push(word.to_string());
        id
    }

    /// Look up each id's word and join them, each followed by a single space.
    ///
    /// Fails with [`ModelError::UnknownTokenId`] for an id that was never
    /// registered.
    pub fn detokenize(&self, ids: &[usize]) -> Result<String> {
        let mut text = String::new();
        for &id in ids {
            let word = self.word(id).ok_or(ModelError::UnknownTokenId(id))?;
            text.push_str(word);
            text.push(' ');
        }
        Ok(text)
    }

    /// Number of distinct words seen so far
    pub fn vocab_size(&self) -> usize {
        self.words.len()
    }

    /// Id of `word`, if it has been registered
    pub fn token_id(&self, word: &str) -> Option<usize> {
        self.vocab.get(word).copied()
    }

    /// Word registered under `id`
    pub fn word(&self, id: usize) -> Option<&str> {
        self.words.get(id).map(String::as_str)
    }

    /// `(id, word)` pairs in id order
    pub fn entries(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.words.iter().enumerate().map(|(id, w)| (id, w.as_str()))
    }

    /// One-hot label vector of length `vocab_size()` with a 1 at `id`.
    pub fn one_hot(&self, id: usize) -> Result<Vec<f64>> {
        if id >= self.vocab_size() {
            return Err(ModelError::IndexOutOfRange {
                index: id,
                len: self.vocab_size(),
            });
        }
        let mut label = vec![0.0; self.vocab_size()];
        label[id] = 1.0;
        Ok(label)
    }

    /// Write the vocabulary as `word id` lines.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = fs::File::create(path).map_err(|e| ModelError::resource(path, e))?;
        let mut writer = BufWriter::new(file);
        for (id, word) in self.entries() {
            writeln!(writer, "{} {}", word, id).map_err(|e| ModelError::resource(path, e))?;
        }
        writer.flush().map_err(|e| ModelError::resource(path, e))?;
        info!(path = %path.display(), words = self.vocab_size(), "saved vocabulary");
        Ok(())
    }

    /// Load a vocabulary written by [`save`](Self::save).
    ///
    /// Blank lines are ignored. Any other line that is not exactly `word id`,
    /// repeats a word or an id, or uses an id outside `0..n` (n being the
    /// number of non-blank lines) fails with
    /// [`ModelError::CorruptVocabulary`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ModelError::resource(path, e))?;
        let tokenizer = Self::parse(&contents)?;
        info!(path = %path.display(), words = tokenizer.vocab_size(), "loaded vocabulary");
        Ok(tokenizer)
    }

    fn parse(contents: &str) -> Result<Self> {
        // a dense vocabulary of n entries only uses ids 0..n
        let entries = contents.lines().filter(|l| !l.trim().is_empty()).count();
        let mut by_id: Vec<Option<String>> = vec![None; entries];
        let mut vocab = HashMap::with_capacity(entries);

        for (line_idx, line) in contents.lines().enumerate() {
            let line_no = line_idx + 1;
            let corrupt = |reason: String| ModelError::CorruptVocabulary {
                line: line_no,
                reason,
            };

            let mut fields = line.split_whitespace();
            let (word, id) = match (fields.next(), fields.next(), fields.next()) {
                (None, _, _) => continue,
                (Some(word), Some(id), None) => (word, id),
                _ => return Err(corrupt(format!("expected `word id`, got {:?}", line))),
            };
            let id: usize = id
                .parse()
                .map_err(|_| corrupt(format!("invalid token id {:?}", id)))?;
            if id >= entries {
                return Err(corrupt(format!(
                    "token id {} out of range for {} entries",
                    id, entries
                )));
            }

            if vocab.insert(word.to_string(), id).is_some() {
                return Err(corrupt(format!("duplicate word {:?}", word)));
            }
            if by_id[id].replace(word.to_string()).is_some() {
                return Err(corrupt(format!("duplicate token id {}", id)));
            }
        }

        // n distinct ids below n leave no gaps
        let words = by_id.into_iter().flatten().collect();
        Ok(Self { vocab, words })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_assigned_in_first_seen_order() {
        let mut tokenizer = WordTokenizer::new();
        assert_eq!(tokenizer.tokenize("the cat saw the dog"), vec![0, 1, 2, 0, 3]);
        assert_eq!(tokenizer.vocab_size(), 4);
        assert_eq!(tokenizer.tokenize("dog cat fish"), vec![3, 1, 4]);
        assert_eq!(tokenizer.vocab_size(), 5);
    }

    #[test]
    fn test_empty_and_blank_text() {
        let mut tokenizer = WordTokenizer::new();
        assert!(tokenizer.tokenize("").is_empty());
        assert!(tokenizer.tokenize(" \t \n").is_empty());
        assert_eq!(tokenizer.vocab_size(), 0);
    }

    #[test]
    fn test_detokenize_roundtrip_words() {
        let mut tokenizer = WordTokenizer::new();
        let texts = ["hello   world", "how are\tyou", "  leading and trailing  "];
        for text in texts {
            let ids = tokenizer.tokenize(text);
            assert!(ids.iter().all(|&id| id < tokenizer.vocab_size()));

            let decoded = tokenizer.detokenize(&ids).unwrap();
            let original: Vec<&str> = text.split_whitespace().collect();
            let roundtrip: Vec<&str> = decoded.split_whitespace().collect();
            assert_eq!(original, roundtrip);
        }
    }

    #[test]
    fn test_detokenize_keeps_trailing_space() {
        let mut tokenizer = WordTokenizer::new();
        let ids = tokenizer.tokenize("a b");
        assert_eq!(tokenizer.detokenize(&ids).unwrap(), "a b ");
        assert_eq!(tokenizer.detokenize(&[]).unwrap(), "");
    }

    #[test]
    fn test_detokenize_unknown_id() {
        let mut tokenizer = WordTokenizer::new();
        tokenizer.tokenize("only");
        assert!(matches!(
            tokenizer.detokenize(&[0, 5]),
            Err(ModelError::UnknownTokenId(5))
        ));
    }

    #[test]
    fn test_one_hot() {
        let mut tokenizer = WordTokenizer::new();
        tokenizer.tokenize("x y z");
        assert_eq!(tokenizer.one_hot(1).unwrap(), vec![0.0, 1.0, 0.0]);
        assert!(tokenizer.one_hot(3).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");

        let mut tokenizer = WordTokenizer::new();
        tokenizer.tokenize("hello world <end> how are you <end>");
        tokenizer.save(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("hello 0\nworld 1\n<end> 2\n"));

        let loaded = WordTokenizer::load(&path).unwrap();
        assert_eq!(loaded.vocab_size(), 6);
        for (id, word) in tokenizer.entries() {
            assert_eq!(loaded.token_id(word), Some(id));
            assert_eq!(loaded.word(id), Some(word));
        }
    }

    #[test]
    fn test_load_accepts_any_line_order() {
        let tokenizer = WordTokenizer::parse("b 1\n\na 0\n").unwrap();
        assert_eq!(tokenizer.word(0), Some("a"));
        assert_eq!(tokenizer.word(1), Some("b"));
    }

    #[test]
    fn test_load_rejects_malformed_lines() {
        for bad in ["hello\n", "hello one\n", "a 0 extra\n", "a 0\na 1\n", "a 0\nb 0\n", "a 0\nb 2\n"] {
            let err = WordTokenizer::parse(bad).unwrap_err();
            assert!(
                matches!(err, ModelError::CorruptVocabulary { .. }),
                "expected CorruptVocabulary for {:?}, got {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_load_rejects_ids_beyond_entry_count() {
        for bad in ["a 18446744073709551615\n", "a 100000000\n", "a 0\n\nb 5\n"] {
            match WordTokenizer::parse(bad) {
                Err(ModelError::CorruptVocabulary { reason, .. }) => {
                    assert!(reason.contains("out of range"), "{:?}", reason)
                }
                other => panic!("expected CorruptVocabulary for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = WordTokenizer::load(dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, ModelError::ResourceUnavailable { .. }));
    }
}
