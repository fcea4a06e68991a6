// src/data/corpus.rs

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::batch::{Batch, BatchSource};
use crate::error::{Result, SeqLstmError};

/// Character vocabulary, most frequent first.
#[derive(Debug, Clone)]
pub struct CharCorpus {
    chars: Vec<char>,
    index: HashMap<char, usize>,
}

impl CharCorpus {
    /// Builds the vocabulary from `text`; ties in frequency sort by char.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut counts: HashMap<char, usize> = HashMap::new();
        for c in text.chars() {
            *counts.entry(c).or_insert(0) += 1;
        }
        if counts.is_empty() {
            return Err(SeqLstmError::DatasetEmpty("input text is empty".into()));
        }
        let mut ranked: Vec<(char, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(Self::from_chars(ranked.into_iter().map(|(c, _)| c).collect()))
    }

    pub fn from_chars(chars: Vec<char>) -> Self {
        let index = chars.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Self { chars, index }
    }

    /// Reads `path` and returns the vocabulary together with the full text.
    pub fn from_file(path: &Path) -> Result<(Self, String)> {
        let text = fs::read_to_string(path).map_err(|source| SeqLstmError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let corpus = Self::from_text(&text)?;
        Ok((corpus, text))
    }

    pub fn vocab_size(&self) -> usize {
        self.chars.len()
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn index_of(&self, c: char) -> Option<usize> {
        self.index.get(&c).copied()
    }

    pub fn encode(&self, text: &str) -> Result<Vec<usize>> {
        text.chars()
            .map(|c| {
                self.index_of(c).ok_or_else(|| {
                    SeqLstmError::ConfigError(format!("character {c:?} is not in the vocabulary"))
                })
            })
            .collect()
    }

    pub fn decode(&self, tokens: &[usize]) -> Result<String> {
        tokens
            .iter()
            .map(|&t| {
                self.chars.get(t).copied().ok_or(SeqLstmError::UnknownToken {
                    index: t,
                    vocab_size: self.chars.len(),
                })
            })
            .collect()
    }

    pub fn save_vocab(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(&self.chars)?;
        fs::write(path, json).map_err(|source| SeqLstmError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_vocab(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|source| SeqLstmError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let chars: Vec<char> = serde_json::from_str(&json)?;
        Ok(Self::from_chars(chars))
    }
}

/// Text batcher: the token stream is cut into `batch_size` contiguous rows,
/// and each row is split along time into `num_batches` windows, so row `b`
/// of batch `k + 1` continues where row `b` of batch `k` stopped.
pub struct CharBatches {
    x_rows: Vec<Vec<usize>>,
    y_rows: Vec<Vec<usize>>,
    vocab_size: usize,
    window: usize,
    num_batches: usize,
    pointer: usize,
}

impl CharBatches {
    pub fn new(tokens: &[usize], vocab_size: usize, batch_size: usize, window: usize) -> Result<Self> {
        if batch_size == 0 || window == 0 {
            return Err(SeqLstmError::ConfigError(
                "batch_size and window must be positive".into(),
            ));
        }
        let num_batches = tokens.len() / (batch_size * window);
        if num_batches == 0 {
            return Err(SeqLstmError::DatasetEmpty(format!(
                "{} tokens is not enough for one batch of {}x{}",
                tokens.len(),
                batch_size,
                window
            )));
        }

        let used = num_batches * batch_size * window;
        let x = &tokens[..used];
        let mut y: Vec<usize> = x[1..].to_vec();
        y.push(x[0]);

        let row_len = num_batches * window;
        let x_rows = x.chunks(row_len).map(|r| r.to_vec()).collect();
        let y_rows = y.chunks(row_len).map(|r| r.to_vec()).collect();

        Ok(Self {
            x_rows,
            y_rows,
            vocab_size,
            window,
            num_batches,
            pointer: 0,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn batch_size(&self) -> usize {
        self.x_rows.len()
    }

    /// Raw token windows of batch `k`: `(inputs, targets)`.
    pub fn tokens_at(&self, k: usize) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
        let span = k * self.window..(k + 1) * self.window;
        let xs = self.x_rows.iter().map(|r| r[span.clone()].to_vec()).collect();
        let ys = self.y_rows.iter().map(|r| r[span.clone()].to_vec()).collect();
        (xs, ys)
    }
}

impl BatchSource for CharBatches {
    fn num_batches(&self) -> usize {
        self.num_batches
    }

    fn reset_batch_pointer(&mut self) {
        self.pointer = 0;
    }

    fn next_batch(&mut self) -> Result<Batch> {
        let (xs, ys) = self.tokens_at(self.pointer % self.num_batches);
        self.pointer += 1;
        Batch::one_hot(&xs, &ys, self.vocab_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_orders_by_frequency() {
        let corpus = CharCorpus::from_text("abbccc").unwrap();
        assert_eq!(corpus.chars(), &['c', 'b', 'a']);
        assert_eq!(corpus.encode("cab").unwrap(), vec![0, 2, 1]);
        assert_eq!(corpus.decode(&[1, 0]).unwrap(), "bc");
    }

    #[test]
    fn unknown_character_is_config_error() {
        let corpus = CharCorpus::from_text("ab").unwrap();
        assert!(corpus.encode("z").is_err());
    }

    #[test]
    fn vocab_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");
        let corpus = CharCorpus::from_text("hello world").unwrap();
        corpus.save_vocab(&path).unwrap();
        let loaded = CharCorpus::load_vocab(&path).unwrap();
        assert_eq!(loaded.chars(), corpus.chars());
    }

    #[test]
    fn too_little_text_is_rejected() {
        assert!(CharBatches::new(&[0, 1, 2], 3, 2, 2).is_err());
    }
}
