// src/model/checkpoint.rs
//! Parameter snapshots on disk
//!
//! Layout of a checkpoint directory:
//!   model_config.json, training_config.json   architecture + schedule
//!   model-{step}.mpk.gz                       parameters (full precision)
//!   model-{step}.json                         `CheckpointMeta` for that step
//!   checkpoint.json                           retained snapshots, newest last

use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    config::Config,
    module::Module,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder as _},
    tensor::backend::Backend,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::clip::param_shapes;
use super::config::{ModelConfig, TrainingConfig};
use super::rnn::RnnModel;
use crate::error::{Result, SeqLstmError};

const INDEX_FILE: &str = "checkpoint.json";
const MODEL_CONFIG_FILE: &str = "model_config.json";
const TRAINING_CONFIG_FILE: &str = "training_config.json";

type Recorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Progress recorded next to each parameter snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Optimizer updates applied so far.
    pub global_step: usize,
    pub epoch: usize,
    /// Index of the last batch trained within `epoch`.
    pub batch: usize,
    pub batches_per_epoch: usize,
    pub learning_rate: f64,
    pub average_loss: f64,
}

impl CheckpointMeta {
    pub fn epoch_complete(&self) -> bool {
        self.batch + 1 >= self.batches_per_epoch
    }

    /// Epoch training continues at after restoring this snapshot.
    pub fn resume_epoch(&self) -> usize {
        if self.epoch_complete() {
            self.epoch + 1
        } else {
            self.epoch
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointIndex {
    checkpoints: Vec<CheckpointMeta>,
}

pub struct CheckpointManager {
    dir: PathBuf,
    max_to_keep: usize,
}

impl CheckpointManager {
    /// `max_to_keep == 0` keeps every snapshot.
    pub fn new(dir: impl Into<PathBuf>, max_to_keep: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| SeqLstmError::FileWrite {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, max_to_keep })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stem(&self, step: usize) -> PathBuf {
        self.dir.join(format!("model-{step}"))
    }

    fn read_index(&self) -> Result<CheckpointIndex> {
        let path = self.dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(CheckpointIndex::default());
        }
        let json = fs::read_to_string(&path).map_err(|source| SeqLstmError::FileRead {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&json)
            .map_err(|e| SeqLstmError::CheckpointLoad(format!("{}: {e}", path.display())))
    }

    fn write_index(&self, index: &CheckpointIndex) -> Result<()> {
        let path = self.dir.join(INDEX_FILE);
        let json = serde_json::to_string_pretty(index)?;
        fs::write(&path, json).map_err(|source| SeqLstmError::FileWrite { path, source })
    }

    pub fn save<B: Backend>(&self, model: &RnnModel<B>, meta: &CheckpointMeta) -> Result<PathBuf> {
        let stem = self.stem(meta.global_step);
        model
            .clone()
            .save_file(stem.clone(), &Recorder::new())
            .map_err(|e| SeqLstmError::FileWrite {
                path: stem.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            })?;

        let meta_path = stem.with_extension("json");
        fs::write(&meta_path, serde_json::to_string_pretty(meta)?).map_err(|source| {
            SeqLstmError::FileWrite {
                path: meta_path.clone(),
                source,
            }
        })?;

        let mut index = self.read_index()?;
        index.checkpoints.retain(|m| m.global_step != meta.global_step);
        index.checkpoints.push(meta.clone());
        if self.max_to_keep > 0 {
            while index.checkpoints.len() > self.max_to_keep {
                let old = index.checkpoints.remove(0);
                self.remove_files(old.global_step);
            }
        }
        self.write_index(&index)?;

        info!(step = meta.global_step, epoch = meta.epoch, "checkpoint saved to {}", stem.display());
        Ok(stem)
    }

    fn remove_files(&self, step: usize) {
        let stem = self.stem(step);
        for path in [stem.with_extension("mpk.gz"), stem.with_extension("json")] {
            match fs::remove_file(&path) {
                Ok(()) => debug!("pruned {}", path.display()),
                Err(e) => warn!("could not prune {}: {e}", path.display()),
            }
        }
    }

    /// All retained snapshots, oldest first.
    pub fn list(&self) -> Result<Vec<CheckpointMeta>> {
        Ok(self.read_index()?.checkpoints)
    }

    pub fn latest(&self) -> Result<CheckpointMeta> {
        self.read_index()?
            .checkpoints
            .pop()
            .ok_or_else(|| SeqLstmError::CheckpointNotFound(self.dir.clone()))
    }

    /// Loads the newest snapshot into `model`, whose architecture must match.
    pub fn restore<B: Backend>(
        &self,
        model: RnnModel<B>,
        device: &B::Device,
    ) -> Result<(RnnModel<B>, CheckpointMeta)> {
        let meta = self.latest()?;
        let stem = self.stem(meta.global_step);
        let model = load_matching(model, &stem, device)?;
        info!(step = meta.global_step, "restored checkpoint {}", stem.display());
        Ok((model, meta))
    }

    pub fn save_configs(&self, model: &ModelConfig, training: &TrainingConfig) -> Result<()> {
        for (name, result) in [
            (MODEL_CONFIG_FILE, model.save(self.dir.join(MODEL_CONFIG_FILE))),
            (TRAINING_CONFIG_FILE, training.save(self.dir.join(TRAINING_CONFIG_FILE))),
        ] {
            result.map_err(|source| SeqLstmError::FileWrite {
                path: self.dir.join(name),
                source,
            })?;
        }
        Ok(())
    }

    pub fn load_configs(&self) -> Result<(ModelConfig, TrainingConfig)> {
        let model_path = self.dir.join(MODEL_CONFIG_FILE);
        let training_path = self.dir.join(TRAINING_CONFIG_FILE);
        let model = ModelConfig::load(&model_path)
            .map_err(|e| SeqLstmError::CheckpointLoad(format!("{}: {e}", model_path.display())))?;
        let training = TrainingConfig::load(&training_path).map_err(|e| {
            SeqLstmError::CheckpointLoad(format!("{}: {e}", training_path.display()))
        })?;
        Ok((model, training))
    }
}

/// Loads the record at `path` into `model` and rejects parameters whose dims
/// differ from the ones `model` was built with.
pub(crate) fn load_matching<B: Backend>(
    model: RnnModel<B>,
    path: &Path,
    device: &B::Device,
) -> Result<RnnModel<B>> {
    let record: <RnnModel<B> as Module<B>>::Record = Recorder::new()
        .load(path.to_path_buf(), device)
        .map_err(|e| SeqLstmError::CheckpointLoad(format!("{}: {e}", path.display())))?;
    // Applying a record with another layer count panics inside burn.
    let layers = record.cells.layers.len();
    if layers != model.num_layers() {
        return Err(SeqLstmError::CheckpointLoad(format!(
            "{}: snapshot has {layers} layers, model has {}",
            path.display(),
            model.num_layers()
        )));
    }
    let expected = param_shapes::<B, _>(&model);
    let loaded = model.load_record(record);
    let found = param_shapes::<B, _>(&loaded);
    if found != expected {
        return Err(SeqLstmError::CheckpointLoad(format!(
            "{}: parameter shapes {found:?} do not match the model {expected:?}",
            path.display()
        )));
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(step: usize) -> CheckpointMeta {
        CheckpointMeta {
            global_step: step,
            epoch: 0,
            batch: step,
            batches_per_epoch: 10,
            learning_rate: 0.002,
            average_loss: 1.0,
        }
    }

    #[test]
    fn resume_epoch_depends_on_completion() {
        let mut m = meta(4);
        assert_eq!(m.resume_epoch(), 0);
        m.batch = 9;
        assert_eq!(m.resume_epoch(), 1);
    }

    #[test]
    fn latest_on_empty_dir_is_restore_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 3).unwrap();
        let err = manager.latest().unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Restore);
    }

    #[test]
    fn configs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 3).unwrap();
        let model = ModelConfig::new(7, 7).with_hidden_size(16);
        let training = TrainingConfig::new().with_batch_size(4);
        manager.save_configs(&model, &training).unwrap();
        let (m, t) = manager.load_configs().unwrap();
        assert_eq!(m.hidden_size, 16);
        assert_eq!(t.batch_size, 4);
    }
}
