//! Model Integration Tests
//!
//! Forward pass, unrolling and state threading of the stacked LSTM.

mod common;

use burn::module::Module;
use burn::tensor::Tensor;
use common::{assert_close, tensor3, test_device, values, TestBackend};
use seqlstm::model::{stable_softmax, unroll, ModelConfig, RnnModel};
use seqlstm::ErrorCategory;

fn frames(batch: usize, window: usize, width: usize) -> Vec<f32> {
    (0..batch * window * width)
        .map(|i| ((i * 7 % 11) as f32 - 5.0) / 5.0)
        .collect()
}

#[test]
fn test_single_layer_probabilities_sum_to_one() {
    let device = test_device();
    let config = ModelConfig::new(3, 3).with_hidden_size(4).with_num_layers(1);
    let model: RnnModel<TestBackend> = RnnModel::new(&config, &device);

    let inputs = tensor3(frames(2, 5, 3), [2, 5, 3]);
    let (probs, state) = model
        .window_probabilities(model.zero_state(2, &device), inputs)
        .unwrap();

    assert_eq!(probs.dims(), [10, 3]);
    let probs = values(probs);
    for row in probs.chunks(3) {
        let sum: f32 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "row sums to {}", sum);
        assert!(row.iter().all(|p| *p >= 0.0));
    }
    assert_eq!(state.num_layers(), 1);
    assert_eq!(state.layer(0).unwrap().hidden.dims(), [2, 4]);
}

#[test]
fn test_parameter_count_matches_formula() {
    let device = test_device();
    for (input, output, hidden, layers) in [(3, 3, 4, 1), (13, 40, 16, 2), (10, 7, 8, 3)] {
        let config = ModelConfig::new(input, output)
            .with_hidden_size(hidden)
            .with_num_layers(layers);
        let model: RnnModel<TestBackend> = RnnModel::new(&config, &device);
        assert_eq!(model.num_params(), config.num_parameters());
    }
}

#[test]
fn test_window_logits_are_batch_major() {
    let device = test_device();
    let config = ModelConfig::new(4, 5).with_hidden_size(6);
    let model: RnnModel<TestBackend> = RnnModel::new(&config, &device);
    let data = frames(2, 3, 4);

    let (window_logits, _) = model
        .forward_window(model.zero_state(2, &device), tensor3(data.clone(), [2, 3, 4]))
        .unwrap();
    let window_logits = values(window_logits);

    // Step manually and place row (b, t) at b * T + t.
    let mut state = model.zero_state(2, &device);
    let mut expected = vec![0.0f32; 2 * 3 * 5];
    for t in 0..3 {
        let mut step_input = Vec::new();
        for b in 0..2 {
            let start = (b * 3 + t) * 4;
            step_input.extend_from_slice(&data[start..start + 4]);
        }
        let x: Tensor<TestBackend, 2> =
            Tensor::from_data(burn::tensor::TensorData::new(step_input, [2, 4]), &device);
        let (logits, next) = model.step(state, x).unwrap();
        state = next;
        let logits = values(logits);
        for b in 0..2 {
            let row = b * 3 + t;
            expected[row * 5..(row + 1) * 5].copy_from_slice(&logits[b * 5..(b + 1) * 5]);
        }
    }

    assert_close(&window_logits, &expected, 1e-5);
}

#[test]
fn test_state_threading_equals_longer_window() {
    let device = test_device();
    let config = ModelConfig::new(3, 3).with_hidden_size(5).with_num_layers(2);
    let model: RnnModel<TestBackend> = RnnModel::new(&config, &device);
    let data = frames(1, 6, 3);

    let (full, _) = model
        .forward_window(model.zero_state(1, &device), tensor3(data.clone(), [1, 6, 3]))
        .unwrap();

    let (first, mid) = model
        .forward_window(model.zero_state(1, &device), tensor3(data[..9].to_vec(), [1, 3, 3]))
        .unwrap();
    let (second, _) = model
        .forward_window(mid, tensor3(data[9..].to_vec(), [1, 3, 3]))
        .unwrap();

    let mut chained = values(first);
    chained.extend(values(second));
    assert_close(&values(full), &chained, 1e-5);
}

#[test]
fn test_unroll_is_deterministic() {
    let device = test_device();
    let config = ModelConfig::new(3, 3).with_hidden_size(4);
    let model: RnnModel<TestBackend> = RnnModel::new(&config, &device);
    let inputs = tensor3(frames(2, 4, 3), [2, 4, 3]);

    let (a, state_a) = unroll(model.cells(), model.zero_state(2, &device), inputs.clone()).unwrap();
    let (b, state_b) = unroll(model.cells(), model.zero_state(2, &device), inputs).unwrap();

    assert_eq!(a.len(), 4);
    for (x, y) in a.into_iter().zip(b) {
        assert_eq!(values(x), values(y));
    }
    for (x, y) in state_a.layers().iter().zip(state_b.layers()) {
        assert_eq!(values(x.memory.clone()), values(y.memory.clone()));
    }
}

#[test]
fn test_wrong_input_width_is_configuration_error() {
    let device = test_device();
    let config = ModelConfig::new(3, 3).with_hidden_size(4);
    let model: RnnModel<TestBackend> = RnnModel::new(&config, &device);

    let err = model
        .forward_window(model.zero_state(1, &device), tensor3(vec![0.0; 8], [1, 2, 4]))
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn test_wrong_state_batch_is_configuration_error() {
    let device = test_device();
    let config = ModelConfig::new(3, 3).with_hidden_size(4);
    let model: RnnModel<TestBackend> = RnnModel::new(&config, &device);

    let err = model
        .forward_window(model.zero_state(3, &device), tensor3(vec![0.0; 6], [1, 2, 3]))
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn test_softmax_is_stable_for_large_logits() {
    let device = test_device();
    let logits: Tensor<TestBackend, 2> = Tensor::from_data(
        burn::tensor::TensorData::new(vec![1e4f32, 1e4 + 1.0, -1e4], [1, 3]),
        &device,
    );
    let probs = values(stable_softmax(logits));
    assert!(probs.iter().all(|p| p.is_finite()));
    assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
}

#[test]
fn test_zero_input_single_step_distribution() {
    let device = test_device();
    let config = ModelConfig::new(3, 3).with_hidden_size(4).with_num_layers(1);
    let model: RnnModel<TestBackend> = RnnModel::new(&config, &device);

    let (probs, state) = model
        .window_probabilities(model.zero_state(1, &device), tensor3(vec![0.0; 3], [1, 1, 3]))
        .unwrap();

    assert_eq!(probs.dims(), [1, 3]);
    let probs = values(probs);
    assert!(probs.iter().all(|p| p.is_finite() && *p > 0.0));
    assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    assert_eq!(state.layer(0).unwrap().memory.dims(), [1, 4]);
}

#[test]
fn test_forget_bias_changes_carried_memory() {
    let device = test_device();
    let base = ModelConfig::new(3, 3).with_hidden_size(4).with_num_layers(1);
    let model: RnnModel<TestBackend> = RnnModel::new(&base, &device);
    let biased: RnnModel<TestBackend> =
        RnnModel::new(&base.clone().with_forget_bias(5.0), &device).load_record(model.clone().into_record());
    let data = frames(1, 3, 3);

    let (plain, _) = model
        .forward_window(model.zero_state(1, &device), tensor3(data.clone(), [1, 3, 3]))
        .unwrap();
    let (shifted, _) = biased
        .forward_window(biased.zero_state(1, &device), tensor3(data.clone(), [1, 3, 3]))
        .unwrap();
    let plain = values(plain);
    let shifted = values(shifted);

    // First step starts from zero memory, so the forget gate has nothing to scale.
    assert_close(&plain[..3], &shifted[..3], 1e-6);
    assert!(
        plain[3..].iter().zip(&shifted[3..]).any(|(a, b)| (a - b).abs() > 1e-6),
        "forget bias had no effect"
    );
}
