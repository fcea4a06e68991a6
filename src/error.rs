use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of failures. Every kind halts the enclosing
/// operation (batch, epoch or export); nothing is retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Restore,
    NumericInstability,
    ExportIncomplete,
    Io,
}

#[derive(Error, Debug)]
pub enum SeqLstmError {
    // --- I/O ---
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // --- Configuration ---
    #[error("Shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        got: String,
    },

    #[error("Invalid config: {0}")]
    ConfigError(String),

    #[error("Token index {index} outside vocabulary of {vocab_size}")]
    UnknownToken { index: usize, vocab_size: usize },

    #[error("Unknown entry point `{0}`")]
    UnknownEntryPoint(String),

    #[error("Dataset empty: {0}")]
    DatasetEmpty(String),

    // --- Restore ---
    #[error("No checkpoint found in {0}")]
    CheckpointNotFound(PathBuf),

    #[error("Checkpoint load failed: {0}")]
    CheckpointLoad(String),

    // --- Numerics ---
    #[error("Non-finite {what} at step {step}: {value}")]
    NumericInstability {
        step: usize,
        what: &'static str,
        value: f64,
    },

    // --- Export ---
    #[error("Export incomplete: {0}")]
    ExportIncomplete(String),
}

impl SeqLstmError {
    pub fn shape(context: &'static str, expected: impl ToString, got: impl ToString) -> Self {
        Self::ShapeMismatch {
            context,
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::FileRead { .. } | Self::FileWrite { .. } | Self::Io(_) | Self::Json(_) => {
                ErrorCategory::Io
            }
            Self::ShapeMismatch { .. }
            | Self::ConfigError(_)
            | Self::UnknownToken { .. }
            | Self::UnknownEntryPoint(_)
            | Self::DatasetEmpty(_) => ErrorCategory::Configuration,
            Self::CheckpointNotFound(_) | Self::CheckpointLoad(_) => ErrorCategory::Restore,
            Self::NumericInstability { .. } => ErrorCategory::NumericInstability,
            Self::ExportIncomplete(_) => ErrorCategory::ExportIncomplete,
        }
    }
}

pub type Result<T> = std::result::Result<T, SeqLstmError>;
