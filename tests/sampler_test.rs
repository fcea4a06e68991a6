//! Sampler Tests
//!
//! Generation length, policies and argument validation.

mod common;

use common::{test_device, TestBackend};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use seqlstm::model::{ModelConfig, RnnModel, Sampler, SamplingPolicy};
use seqlstm::{CharCorpus, ErrorCategory};

fn model(vocab: usize) -> RnnModel<TestBackend> {
    let config = ModelConfig::char_level(vocab).with_hidden_size(8);
    RnnModel::new(&config, &test_device())
}

#[test]
fn test_generates_exact_length_within_vocab() {
    let model = model(6);
    let sampler = Sampler::new(&model, test_device()).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for policy in [
        SamplingPolicy::Argmax,
        SamplingPolicy::Stochastic,
        SamplingPolicy::ConditionalOnSeparator { separator: 0 },
    ] {
        let out = sampler.generate(&[1, 2, 3], 25, 1.0, policy, &mut rng).unwrap();
        assert_eq!(out.len(), 25);
        assert!(out.iter().all(|&t| t < 6));
    }
}

#[test]
fn test_argmax_is_deterministic() {
    let model = model(5);
    let sampler = Sampler::new(&model, test_device()).unwrap();
    let a = sampler
        .generate(&[0, 1], 12, 0.7, SamplingPolicy::Argmax, &mut ChaCha8Rng::seed_from_u64(1))
        .unwrap();
    let b = sampler
        .generate(&[0, 1], 12, 0.7, SamplingPolicy::Argmax, &mut ChaCha8Rng::seed_from_u64(99))
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_stochastic_is_reproducible_with_seed() {
    let model = model(5);
    let sampler = Sampler::new(&model, test_device()).unwrap();
    let run = |seed| {
        sampler
            .generate(&[2], 30, 1.0, SamplingPolicy::Stochastic, &mut ChaCha8Rng::seed_from_u64(seed))
            .unwrap()
    };
    assert_eq!(run(3), run(3));
}

#[test]
fn test_empty_seed_starts_from_random_token() {
    let model = model(4);
    let sampler = Sampler::new(&model, test_device()).unwrap();
    let out = sampler
        .generate(&[], 10, 1.0, SamplingPolicy::Argmax, &mut ChaCha8Rng::seed_from_u64(5))
        .unwrap();
    assert_eq!(out.len(), 10);
}

#[test]
fn test_invalid_arguments_are_configuration_errors() {
    let model = model(4);
    let sampler = Sampler::new(&model, test_device()).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    for temperature in [0.0, -1.0, f32::NAN] {
        let err = sampler
            .generate(&[0], 3, temperature, SamplingPolicy::Argmax, &mut rng)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    let err = sampler
        .generate(&[0, 9], 3, 1.0, SamplingPolicy::Argmax, &mut rng)
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn test_frame_model_cannot_sample() {
    let config = ModelConfig::mfcc_intent().with_hidden_size(8);
    let model: RnnModel<TestBackend> = RnnModel::new(&config, &test_device());
    let err = Sampler::new(&model, test_device()).err().unwrap();
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn test_sample_text_keeps_prime() {
    let corpus = CharCorpus::from_text("abc abc abc").unwrap();
    let model = model(corpus.vocab_size());
    let sampler = Sampler::new(&model, test_device()).unwrap();
    let separator = corpus.index_of(' ').unwrap();

    let text = sampler
        .sample_text(
            &corpus,
            "ab",
            8,
            1.0,
            SamplingPolicy::ConditionalOnSeparator { separator },
            &mut ChaCha8Rng::seed_from_u64(11),
        )
        .unwrap();
    assert!(text.starts_with("ab"));
    assert_eq!(text.chars().count(), 10);
}
