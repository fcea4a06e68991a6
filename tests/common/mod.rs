//! Common test utilities and helpers
//!
//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use burn::backend::ndarray::{NdArray, NdArrayDevice};
use burn::backend::Autodiff;
use burn::tensor::{Tensor, TensorData};
use seqlstm::{Batch, CharBatches, CharCorpus, ModelConfig, TrainingConfig};

pub type TestBackend = NdArray;
pub type TestTrainBackend = Autodiff<TestBackend>;

pub const TEXT: &str = "the cat sat on the mat and the dog sat on the log. ";

pub fn test_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}

/// Small stacked model for fast tests.
pub fn test_model_config(vocab_size: usize) -> ModelConfig {
    ModelConfig::char_level(vocab_size)
        .with_hidden_size(8)
        .with_num_layers(2)
}

pub fn test_training_config(batch_size: usize, window: usize) -> TrainingConfig {
    TrainingConfig::new()
        .with_batch_size(batch_size)
        .with_num_unrollings(window)
        .with_num_epochs(1)
        .with_learning_rate(0.01)
        .with_save_every(1000)
        .with_log_every(1)
}

pub fn corpus_text(repeats: usize) -> String {
    TEXT.repeat(repeats)
}

pub fn char_batches(repeats: usize, batch_size: usize, window: usize) -> (CharCorpus, CharBatches) {
    let text = corpus_text(repeats);
    let corpus = CharCorpus::from_text(&text).expect("corpus");
    let tokens = corpus.encode(&text).expect("encode");
    let batches =
        CharBatches::new(&tokens, corpus.vocab_size(), batch_size, window).expect("batches");
    (corpus, batches)
}

/// One-hot batch over a cyclic token pattern.
pub fn cyclic_batch(vocab_size: usize, batch_size: usize, window: usize) -> Batch {
    let rows: Vec<Vec<usize>> = (0..batch_size)
        .map(|b| (0..window).map(|t| (b + t) % vocab_size).collect())
        .collect();
    let targets: Vec<Vec<usize>> = (0..batch_size)
        .map(|b| (0..window).map(|t| (b + t + 1) % vocab_size).collect())
        .collect();
    Batch::one_hot(&rows, &targets, vocab_size).expect("batch")
}

pub fn write_text_file(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("input.txt");
    let mut file = std::fs::File::create(&path).expect("Failed to create text file");
    file.write_all(text.as_bytes()).expect("Failed to write text");
    path
}

pub fn values<const D: usize>(tensor: Tensor<TestBackend, D>) -> Vec<f32> {
    tensor.into_data().iter::<f32>().collect()
}

pub fn tensor3(data: Vec<f32>, shape: [usize; 3]) -> Tensor<TestBackend, 3> {
    Tensor::from_data(TensorData::new(data, shape), &test_device())
}

pub fn assert_close(a: &[f32], b: &[f32], tol: f32) {
    assert_eq!(a.len(), b.len(), "length mismatch");
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert!((x - y).abs() <= tol, "index {}: {} vs {}", i, x, y);
    }
}
