//! Resume Command
//!
//! Continues training from the newest checkpoint in a directory.

use std::path::PathBuf;
use std::time::Instant;

use crate::backend::{get_device, TrainBackend};
use crate::data::CharCorpus;
use crate::error::{Result, SeqLstmError};
use crate::helpers::{load_char_batches, VOCAB_FILE};
use crate::logger::{MetricsCsv, TrainLogger};
use crate::model::{CheckpointManager, Trainer};

use super::train::report_outcome;

pub fn execute(checkpoint_dir: &PathBuf, data: &PathBuf, num_epochs: Option<usize>) -> Result<()> {
    super::banner("🔄 Resuming training");
    println!("  Checkpoint: {:?}", checkpoint_dir);

    if !checkpoint_dir.is_dir() {
        return Err(SeqLstmError::CheckpointNotFound(checkpoint_dir.clone()));
    }

    let device = get_device();
    let (model_config, mut training_config) =
        CheckpointManager::new(checkpoint_dir, 0)?.load_configs()?;
    if let Some(epochs) = num_epochs {
        training_config.num_epochs = epochs;
    }
    let manager = CheckpointManager::new(checkpoint_dir, training_config.max_to_keep)?;

    let vocab = CharCorpus::load_vocab(&checkpoint_dir.join(VOCAB_FILE))?;
    let (_, mut batches) = load_char_batches(data, Some(&vocab), &training_config)?;

    let logger = TrainLogger::new(checkpoint_dir, training_config.log_every)?;
    let metrics = MetricsCsv::open_append(checkpoint_dir)?;
    let mut trainer: Trainer<TrainBackend> =
        Trainer::new(&model_config, training_config, device)?
            .with_logs(logger, metrics)
            .with_stop_signal(super::interrupt_flag());
    let meta = trainer.resume_from(&manager)?;

    println!(
        "  Restored step {} (epoch {}), continuing at epoch {}",
        meta.global_step,
        meta.epoch,
        trainer.start_epoch()
    );
    super::rule();

    let start = Instant::now();
    let outcome = trainer.fit(&mut batches, Some(&manager))?;
    report_outcome(&outcome, start.elapsed().as_secs());
    Ok(())
}
