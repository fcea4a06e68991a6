// src/model/config.rs
//! Model and training hyperparameters

use burn::config::Config;

use crate::error::SeqLstmError;

#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Width of one input frame (vocab size for one-hot char input, 13 for MFCC).
    pub input_size: usize,

    /// Number of output classes.
    pub output_size: usize,

    #[config(default = "128")]
    pub hidden_size: usize,

    #[config(default = "2")]
    pub num_layers: usize,

    /// Probability of dropping a unit between stacked layers while training.
    #[config(default = "0.0")]
    pub dropout: f64,

    /// Added to the forget gate pre-activation.
    #[config(default = "0.0")]
    pub forget_bias: f64,
}

impl ModelConfig {
    /// Character model: one-hot input over the vocabulary, predicts the next char.
    pub fn char_level(vocab_size: usize) -> Self {
        Self::new(vocab_size, vocab_size)
            .with_hidden_size(128)
            .with_num_layers(2)
    }

    /// Frame model driven by 13 MFCC coefficients, 40 intent labels per frame.
    pub fn mfcc_intent() -> Self {
        Self::new(13, 40).with_hidden_size(64).with_num_layers(2)
    }

    pub fn num_parameters(&self) -> usize {
        let h = self.hidden_size;
        let first_layer = 4 * h * (h + self.input_size + 1);
        let upper_layers = self.num_layers.saturating_sub(1) * 4 * h * (h + h + 1);
        let softmax = self.output_size * (h + 1);
        first_layer + upper_layers + softmax
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.input_size == 0 || self.output_size == 0 || self.hidden_size == 0 {
            return Err(SeqLstmError::ConfigError(format!(
                "sizes must be non-zero (input={}, output={}, hidden={})",
                self.input_size, self.output_size, self.hidden_size
            )));
        }
        if self.num_layers == 0 {
            return Err(SeqLstmError::ConfigError("num_layers must be >= 1".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(SeqLstmError::ConfigError(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }
}

#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = "100")]
    pub batch_size: usize,

    /// Window length T of one training call.
    #[config(default = "47")]
    pub num_unrollings: usize,

    #[config(default = "50")]
    pub num_epochs: usize,

    #[config(default = "0.002")]
    pub learning_rate: f64,

    /// Per-epoch multiplicative learning rate decay.
    #[config(default = "0.97")]
    pub decay_rate: f64,

    #[config(default = "5.0")]
    pub max_grad_norm: f64,

    /// Checkpoint cadence in global steps.
    #[config(default = "100")]
    pub save_every: usize,

    #[config(default = "5")]
    pub max_to_keep: usize,

    #[config(default = "10")]
    pub log_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingConfig {
    /// Small windows for the MFCC intent model: 7 clips of 100 frames.
    pub fn mfcc_intent() -> Self {
        Self::new()
            .with_batch_size(7)
            .with_num_unrollings(100)
            .with_learning_rate(0.001)
    }

    pub fn learning_rate_for_epoch(&self, epoch: usize) -> f64 {
        self.learning_rate * self.decay_rate.powi(epoch as i32)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.batch_size == 0 || self.num_unrollings == 0 {
            return Err(SeqLstmError::ConfigError(format!(
                "batch_size and num_unrollings must be non-zero (got {} x {})",
                self.batch_size, self.num_unrollings
            )));
        }
        if !(self.max_grad_norm > 0.0) {
            return Err(SeqLstmError::ConfigError(format!(
                "max_grad_norm must be positive, got {}",
                self.max_grad_norm
            )));
        }
        if !(self.learning_rate > 0.0) || !(self.decay_rate > 0.0) {
            return Err(SeqLstmError::ConfigError(format!(
                "learning_rate and decay_rate must be positive (got {}, {})",
                self.learning_rate, self.decay_rate
            )));
        }
        if self.save_every == 0 {
            return Err(SeqLstmError::ConfigError("save_every must be >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_count_matches_formula() {
        let config = ModelConfig::new(13, 40).with_hidden_size(64).with_num_layers(2);
        let expected = 4 * 64 * (64 + 13 + 1) + 4 * 64 * (64 + 64 + 1) + 40 * 65;
        assert_eq!(config.num_parameters(), expected);
    }

    #[test]
    fn learning_rate_decays_per_epoch() {
        let config = TrainingConfig::new().with_learning_rate(0.1).with_decay_rate(0.5);
        assert!((config.learning_rate_for_epoch(0) - 0.1).abs() < 1e-12);
        assert!((config.learning_rate_for_epoch(2) - 0.025).abs() < 1e-12);
    }

    #[test]
    fn rejects_zero_layers() {
        let config = ModelConfig::new(4, 4).with_num_layers(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_json_round_trip() {
        let config = ModelConfig::mfcc_intent().with_forget_bias(1.0);
        let json = serde_json::to_string(&config).unwrap();
        let back: ModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hidden_size, 64);
        assert_eq!(back.forget_bias, 1.0);
        assert!(back.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_clip() {
        let config = TrainingConfig::new().with_max_grad_norm(0.0);
        assert!(config.validate().is_err());
    }
}
