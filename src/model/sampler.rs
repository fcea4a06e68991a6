//! Autoregressive generation from a trained model

use burn::tensor::{backend::Backend, Tensor, TensorData};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::debug;

use super::projector::softmax_with_temperature;
use super::rnn::RnnModel;
use super::state::ModelState;
use crate::data::CharCorpus;
use crate::error::{Result, SeqLstmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingPolicy {
    /// Always the most probable token.
    Argmax,
    /// Draw from the full distribution.
    Stochastic,
    /// Draw only right after `separator` was fed in, argmax otherwise.
    ConditionalOnSeparator { separator: usize },
}

impl SamplingPolicy {
    fn stochastic_after(&self, previous: usize) -> bool {
        match *self {
            Self::Argmax => false,
            Self::Stochastic => true,
            Self::ConditionalOnSeparator { separator } => previous == separator,
        }
    }
}

pub fn argmax(probs: &[f32]) -> usize {
    probs
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
        .0
}

pub struct Sampler<'a, B: Backend> {
    model: &'a RnnModel<B>,
    device: B::Device,
}

impl<'a, B: Backend> Sampler<'a, B> {
    pub fn new(model: &'a RnnModel<B>, device: B::Device) -> Result<Self> {
        if model.input_size() != model.output_size() {
            return Err(SeqLstmError::ConfigError(format!(
                "sampling feeds tokens back one-hot; input_size {} != output_size {}",
                model.input_size(),
                model.output_size()
            )));
        }
        Ok(Self { model, device })
    }

    fn vocab_size(&self) -> usize {
        self.model.output_size()
    }

    fn one_hot(&self, token: usize) -> Tensor<B, 2> {
        let mut data = vec![0.0f32; self.vocab_size()];
        data[token] = 1.0;
        Tensor::from_data(TensorData::new(data, [1, self.vocab_size()]), &self.device)
    }

    fn feed(&self, state: ModelState<B>, token: usize) -> Result<(Vec<f32>, ModelState<B>)> {
        let (logits, state) = self.model.step(state, self.one_hot(token))?;
        Ok((logits.into_data().iter::<f32>().collect(), state))
    }

    /// Produces exactly `length` new tokens. A non-empty `seed` primes the
    /// state with all tokens but the last, which becomes the first input;
    /// an empty seed starts from a uniformly random token.
    pub fn generate<R: Rng>(
        &self,
        seed: &[usize],
        length: usize,
        temperature: f32,
        policy: SamplingPolicy,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        if !(temperature > 0.0) || !temperature.is_finite() {
            return Err(SeqLstmError::ConfigError(format!(
                "temperature must be a positive finite number, got {temperature}"
            )));
        }
        let vocab_size = self.vocab_size();
        if let Some(&bad) = seed.iter().find(|&&t| t >= vocab_size) {
            return Err(SeqLstmError::UnknownToken {
                index: bad,
                vocab_size,
            });
        }
        if let SamplingPolicy::ConditionalOnSeparator { separator } = policy {
            if separator >= vocab_size {
                return Err(SeqLstmError::UnknownToken {
                    index: separator,
                    vocab_size,
                });
            }
        }

        let mut state = self.model.zero_state(1, &self.device);
        let mut current = match seed.split_last() {
            Some((&last, warmup)) => {
                for &token in warmup {
                    state = self.feed(state, token)?.1;
                }
                last
            }
            None => rng.gen_range(0..vocab_size),
        };

        let mut generated = Vec::with_capacity(length);
        for step in 0..length {
            let (logits, next) = self.feed(state, current)?;
            state = next;
            let probs = softmax_with_temperature(&logits, temperature);

            let token = if policy.stochastic_after(current) {
                let dist = WeightedIndex::new(&probs).map_err(|_| {
                    SeqLstmError::NumericInstability {
                        step,
                        what: "sampling distribution",
                        value: probs.iter().map(|&p| p as f64).sum(),
                    }
                })?;
                dist.sample(rng)
            } else {
                argmax(&probs)
            };

            generated.push(token);
            current = token;
        }
        debug!(seed = seed.len(), generated = generated.len(), "sampled");
        Ok(generated)
    }

    /// Text in, text out: returns `prime` followed by `length` sampled chars.
    pub fn sample_text<R: Rng>(
        &self,
        corpus: &CharCorpus,
        prime: &str,
        length: usize,
        temperature: f32,
        policy: SamplingPolicy,
        rng: &mut R,
    ) -> Result<String> {
        let seed = corpus.encode(prime)?;
        let generated = self.generate(&seed, length, temperature, policy, rng)?;
        Ok(format!("{}{}", prime, corpus.decode(&generated)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_picks_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.6, 0.3]), 1);
        assert_eq!(argmax(&[0.5, 0.5]), 0);
    }

    #[test]
    fn conditional_policy_tracks_separator() {
        let policy = SamplingPolicy::ConditionalOnSeparator { separator: 3 };
        assert!(policy.stochastic_after(3));
        assert!(!policy.stochastic_after(2));
        assert!(!SamplingPolicy::Argmax.stochastic_after(3));
        assert!(SamplingPolicy::Stochastic.stochastic_after(0));
    }
}
