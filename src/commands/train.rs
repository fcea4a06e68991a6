//! Train Command
//!
//! Trains a character-level model on a plain-text corpus.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;

use crate::backend::{get_device, TrainBackend};
use crate::data::BatchSource;
use crate::error::Result;
use crate::helpers::{load_char_batches, VOCAB_FILE};
use crate::logger::{MetricsCsv, TrainLogger};
use crate::model::{CheckpointManager, FitOutcome, ModelConfig, Trainer, TrainingConfig};
use crate::utils::{format_duration, format_params};

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Plain-text training corpus
    #[arg(short, long)]
    pub data: PathBuf,
    /// Checkpoint and log directory
    #[arg(short, long)]
    pub output: PathBuf,
    #[arg(long, default_value = "128")]
    pub hidden_size: usize,
    #[arg(long, default_value = "2")]
    pub num_layers: usize,
    #[arg(long, default_value = "0.0")]
    pub dropout: f64,
    #[arg(long, default_value = "0.0")]
    pub forget_bias: f64,
    #[arg(long, default_value = "100")]
    pub batch_size: usize,
    #[arg(long, default_value = "47")]
    pub num_unrollings: usize,
    #[arg(long, default_value = "50")]
    pub num_epochs: usize,
    #[arg(long, default_value = "0.002")]
    pub learning_rate: f64,
    #[arg(long, default_value = "0.97")]
    pub decay_rate: f64,
    #[arg(long, default_value = "5.0")]
    pub max_grad_norm: f64,
    #[arg(long, default_value = "100")]
    pub save_every: usize,
    #[arg(long, default_value = "5")]
    pub max_to_keep: usize,
    #[arg(long, default_value = "10")]
    pub log_every: usize,
}

impl TrainArgs {
    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig::new()
            .with_batch_size(self.batch_size)
            .with_num_unrollings(self.num_unrollings)
            .with_num_epochs(self.num_epochs)
            .with_learning_rate(self.learning_rate)
            .with_decay_rate(self.decay_rate)
            .with_max_grad_norm(self.max_grad_norm)
            .with_save_every(self.save_every)
            .with_max_to_keep(self.max_to_keep)
            .with_log_every(self.log_every)
    }

    pub fn model_config(&self, vocab_size: usize) -> ModelConfig {
        ModelConfig::char_level(vocab_size)
            .with_hidden_size(self.hidden_size)
            .with_num_layers(self.num_layers)
            .with_dropout(self.dropout)
            .with_forget_bias(self.forget_bias)
    }
}

pub fn execute(args: &TrainArgs) -> Result<()> {
    super::banner("🚀 Training");

    let device = get_device();
    let training_config = args.training_config();
    training_config.validate()?;

    let (corpus, mut batches) = load_char_batches(&args.data, None, &training_config)?;
    let model_config = args.model_config(corpus.vocab_size());
    model_config.validate()?;

    println!("  Data: {:?}", args.data);
    println!("  Vocabulary: {} chars", corpus.vocab_size());
    println!(
        "  Batches/epoch: {} ({} x {} chars)",
        batches.num_batches(),
        training_config.batch_size,
        training_config.num_unrollings
    );
    println!(
        "  Model: {} layers x {} hidden, {} params",
        model_config.num_layers,
        model_config.hidden_size,
        format_params(model_config.num_parameters())
    );
    super::rule();

    let manager = CheckpointManager::new(&args.output, training_config.max_to_keep)?;
    manager.save_configs(&model_config, &training_config)?;
    corpus.save_vocab(&args.output.join(VOCAB_FILE))?;

    let logger = TrainLogger::new(&args.output, training_config.log_every)?;
    let metrics = MetricsCsv::new(&args.output)?;
    let mut trainer: Trainer<TrainBackend> =
        Trainer::new(&model_config, training_config, device)?
            .with_logs(logger, metrics)
            .with_stop_signal(super::interrupt_flag());

    let start = Instant::now();
    let outcome = trainer.fit(&mut batches, Some(&manager))?;
    report_outcome(&outcome, start.elapsed().as_secs());
    Ok(())
}

pub(crate) fn report_outcome(outcome: &FitOutcome, secs: u64) {
    super::rule();
    match outcome {
        FitOutcome::Completed {
            global_step,
            average_loss,
        } => println!(
            "  ✅ Done: {} steps, last epoch loss {:.4} ({})",
            global_step,
            average_loss,
            format_duration(secs)
        ),
        FitOutcome::Interrupted {
            global_step,
            epoch,
            batch,
        } => println!(
            "  ⏸  Stopped at epoch {} batch {} after {} steps ({})",
            epoch,
            batch,
            global_step,
            format_duration(secs)
        ),
    }
    super::rule();
}
