//! seqlstm: stacked LSTM sequence models on burn
//!
//! Char-level and frame-level (MFCC) next-token models, trained with
//! truncated BPTT and exported as frozen inference graphs.

pub mod backend;
pub mod commands;
pub mod data;
pub mod error;
pub mod helpers;
pub mod logger;
pub mod model;
pub mod utils;

pub use data::{Batch, BatchSource, CharBatches, CharCorpus, InMemoryBatches};
pub use error::{ErrorCategory, Result, SeqLstmError};
pub use model::{
    CheckpointManager, FrozenGraph, GraphFreezer, ModelConfig, ModelState, RnnModel, Sampler,
    SamplingPolicy, Trainer, TrainingConfig,
};

/// Name of the backend selected by cargo features.
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        return "CUDA";
    }

    #[cfg(all(feature = "gpu", not(feature = "cuda")))]
    {
        return "WGPU";
    }

    #[cfg(not(any(feature = "cuda", feature = "gpu")))]
    {
        return "CPU (NdArray)";
    }
}
