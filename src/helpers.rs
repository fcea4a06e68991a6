//! Common Helper Functions
//!
//! Shared utilities used across multiple commands.

use std::path::Path;

use crate::backend::MyBackend;
use crate::data::{CharBatches, CharCorpus};
use crate::error::{Result, SeqLstmError};
use crate::model::{CheckpointManager, CheckpointMeta, ModelConfig, RnnModel, TrainingConfig};

pub const VOCAB_FILE: &str = "vocab.json";

/// Model configuration for a named preset.
pub fn get_model_config(preset: &str, vocab_size: Option<usize>) -> Result<ModelConfig> {
    match preset {
        "char" => vocab_size
            .map(ModelConfig::char_level)
            .ok_or_else(|| SeqLstmError::ConfigError("preset `char` needs a vocabulary size".into())),
        "mfcc-intent" => Ok(ModelConfig::mfcc_intent()),
        other => Err(SeqLstmError::ConfigError(format!("unknown preset `{other}`"))),
    }
}

/// Reads a text corpus and cuts it into training windows.
pub fn load_char_batches(
    data: &Path,
    corpus: Option<&CharCorpus>,
    training: &TrainingConfig,
) -> Result<(CharCorpus, CharBatches)> {
    let (built, text) = CharCorpus::from_file(data)?;
    let corpus = corpus.cloned().unwrap_or(built);
    let tokens = corpus.encode(&text)?;
    let batches = CharBatches::new(
        &tokens,
        corpus.vocab_size(),
        training.batch_size,
        training.num_unrollings,
    )?;
    Ok((corpus, batches))
}

/// Everything a checkpoint directory holds, with parameters on the
/// inference backend.
pub struct TrainedModel {
    pub model: RnnModel<MyBackend>,
    pub model_config: ModelConfig,
    pub training_config: TrainingConfig,
    pub meta: CheckpointMeta,
    pub corpus: Option<CharCorpus>,
}

pub fn load_trained(checkpoint_dir: &Path, device: &<MyBackend as burn::tensor::backend::Backend>::Device) -> Result<TrainedModel> {
    if !checkpoint_dir.is_dir() {
        return Err(SeqLstmError::CheckpointNotFound(checkpoint_dir.to_path_buf()));
    }
    let manager = CheckpointManager::new(checkpoint_dir, 0)?;
    let (model_config, training_config) = manager.load_configs()?;
    let (model, meta) = manager.restore(RnnModel::new(&model_config, device), device)?;

    let vocab_path = checkpoint_dir.join(VOCAB_FILE);
    let corpus = if vocab_path.exists() {
        Some(CharCorpus::load_vocab(&vocab_path)?)
    } else {
        None
    };

    Ok(TrainedModel {
        model,
        model_config,
        training_config,
        meta,
        corpus,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_resolve() {
        assert_eq!(get_model_config("char", Some(65)).unwrap().input_size, 65);
        assert_eq!(get_model_config("mfcc-intent", None).unwrap().output_size, 40);
        assert!(get_model_config("char", None).is_err());
        assert!(get_model_config("gru", None).is_err());
    }
}
