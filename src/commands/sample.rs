//! Sample Command
//!
//! Generates text from a trained character model.

use std::path::PathBuf;

use clap::ValueEnum;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::backend::get_device;
use crate::error::{Result, SeqLstmError};
use crate::helpers::load_trained;
use crate::model::{Sampler, SamplingPolicy};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    Argmax,
    Stochastic,
    /// Stochastic only after a space, argmax inside words
    Space,
}

pub fn execute(
    checkpoint_dir: &PathBuf,
    length: usize,
    prime: &str,
    temperature: f32,
    policy: PolicyArg,
    seed: u64,
) -> Result<()> {
    let device = get_device();
    let trained = load_trained(checkpoint_dir, &device)?;
    let corpus = trained.corpus.ok_or_else(|| {
        SeqLstmError::ConfigError(format!("{:?} has no vocabulary", checkpoint_dir))
    })?;

    let policy = match policy {
        PolicyArg::Argmax => SamplingPolicy::Argmax,
        PolicyArg::Stochastic => SamplingPolicy::Stochastic,
        PolicyArg::Space => SamplingPolicy::ConditionalOnSeparator {
            separator: corpus.index_of(' ').ok_or_else(|| {
                SeqLstmError::ConfigError("vocabulary has no space character".into())
            })?,
        },
    };

    let sampler = Sampler::new(&trained.model, device)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let text = sampler.sample_text(&corpus, prime, length, temperature, policy, &mut rng)?;
    println!("{}", text);
    Ok(())
}
