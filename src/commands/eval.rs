//! Eval Command
//!
//! Reports loss and perplexity of the newest checkpoint on a text file.

use std::path::PathBuf;

use crate::backend::get_device;
use crate::error::{Result, SeqLstmError};
use crate::helpers::{load_char_batches, load_trained};
use crate::logger::TrainLogger;
use crate::model::Evaluator;

pub fn execute(checkpoint_dir: &PathBuf, data: &PathBuf, max_batches: Option<usize>) -> Result<()> {
    super::banner("📏 Evaluation");

    let device = get_device();
    let trained = load_trained(checkpoint_dir, &device)?;
    let corpus = trained.corpus.as_ref().ok_or_else(|| {
        SeqLstmError::ConfigError(format!("{:?} has no vocabulary", checkpoint_dir))
    })?;
    let (_, mut batches) = load_char_batches(data, Some(corpus), &trained.training_config)?;

    let metrics = Evaluator::new(max_batches).evaluate(&trained.model, &mut batches, &device)?;
    println!("  Checkpoint step {}", trained.meta.global_step);
    println!("  {}", metrics);

    let mut logger = TrainLogger::new(checkpoint_dir, trained.training_config.log_every)?;
    logger.log_message(&format!("evaluating on {}", data.display()));
    logger.log_eval(trained.meta.global_step, metrics.loss, metrics.perplexity);
    super::rule();
    Ok(())
}
