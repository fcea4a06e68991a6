//! Stacked LSTM cells
//!
//! Each layer owns one fused gate projection `[x, h] -> 4H` whose output is
//! split into (input, candidate, forget, output) gates. Layers run bottom to
//! top inside a single time step; the only hand-off between layers is the
//! hidden vector.

use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    tensor::{activation, backend::Backend, Tensor},
};

use super::config::ModelConfig;
use super::state::{LayerState, ModelState};
use crate::error::{Result, SeqLstmError};

#[derive(Module, Debug)]
pub struct LstmCell<B: Backend> {
    gates: Linear<B>,
    hidden_size: usize,
    forget_bias: f64,
}

impl<B: Backend> LstmCell<B> {
    pub fn new(input_size: usize, hidden_size: usize, forget_bias: f64, device: &B::Device) -> Self {
        Self {
            gates: LinearConfig::new(input_size + hidden_size, 4 * hidden_size)
                .with_bias(true)
                .init(device),
            hidden_size,
            forget_bias,
        }
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn step(&self, input: Tensor<B, 2>, state: LayerState<B>) -> LayerState<B> {
        let [batch, _] = input.dims();
        let h = self.hidden_size;

        let xh = Tensor::cat(vec![input, state.hidden], 1);
        let gates = self.gates.forward(xh);

        let input_gate = gates.clone().slice([0..batch, 0..h]);
        let candidate = gates.clone().slice([0..batch, h..2 * h]);
        let forget_gate = gates.clone().slice([0..batch, 2 * h..3 * h]);
        let output_gate = gates.slice([0..batch, 3 * h..4 * h]);

        let memory = state.memory * activation::sigmoid(forget_gate.add_scalar(self.forget_bias))
            + activation::sigmoid(input_gate) * candidate.tanh();
        let hidden = memory.clone().tanh() * activation::sigmoid(output_gate);

        LayerState { memory, hidden }
    }
}

#[derive(Module, Debug)]
pub struct CellStack<B: Backend> {
    layers: Vec<LstmCell<B>>,
    dropout: Dropout,
    input_size: usize,
    hidden_size: usize,
}

impl<B: Backend> CellStack<B> {
    pub fn new(config: &ModelConfig, device: &B::Device) -> Self {
        let layers = (0..config.num_layers)
            .map(|layer| {
                let input_size = if layer == 0 {
                    config.input_size
                } else {
                    config.hidden_size
                };
                LstmCell::new(input_size, config.hidden_size, config.forget_bias, device)
            })
            .collect();

        Self {
            layers,
            dropout: DropoutConfig::new(config.dropout).init(),
            input_size: config.input_size,
            hidden_size: config.hidden_size,
        }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn zero_state(&self, batch_size: usize, device: &B::Device) -> ModelState<B> {
        ModelState::zeros(self.num_layers(), batch_size, self.hidden_size, device)
    }

    /// One time step through every layer: `input` is `[batch, input_size]`,
    /// the returned output is the top layer's hidden vector `[batch, hidden]`.
    pub fn step(
        &self,
        state: ModelState<B>,
        input: Tensor<B, 2>,
    ) -> Result<(Tensor<B, 2>, ModelState<B>)> {
        let [batch, width] = input.dims();
        if width != self.input_size {
            return Err(SeqLstmError::shape("cell input width", self.input_size, width));
        }
        state.check(self.num_layers(), batch, self.hidden_size)?;
        Ok(self.step_unchecked(state, input))
    }

    pub(crate) fn step_unchecked(
        &self,
        state: ModelState<B>,
        input: Tensor<B, 2>,
    ) -> (Tensor<B, 2>, ModelState<B>) {
        let top = self.layers.len() - 1;
        let mut x = input;
        let mut next = Vec::with_capacity(self.layers.len());

        for (index, (cell, layer_state)) in self
            .layers
            .iter()
            .zip(state.into_layers())
            .enumerate()
        {
            let new_state = cell.step(x, layer_state);
            x = if index < top {
                // Dropout is a no-op outside autodiff backends.
                self.dropout.forward(new_state.hidden.clone())
            } else {
                new_state.hidden.clone()
            };
            next.push(new_state);
        }

        (x, ModelState::from_layers(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::TensorData;

    type TB = NdArray;

    fn stack(layers: usize) -> (CellStack<TB>, NdArrayDevice) {
        let device = NdArrayDevice::Cpu;
        let config = ModelConfig::new(5, 3).with_hidden_size(4).with_num_layers(layers);
        (CellStack::new(&config, &device), device)
    }

    fn values<const D: usize>(tensor: Tensor<TB, D>) -> Vec<f32> {
        tensor.into_data().iter::<f32>().collect()
    }

    fn input(device: &NdArrayDevice) -> Tensor<TB, 2> {
        Tensor::from_data(
            TensorData::new(vec![0.5f32, -1.0, 0.25, 2.0, 0.0, 1.0, 1.0, -0.5, 0.0, 0.3], [2, 5]),
            device,
        )
    }

    #[test]
    fn step_keeps_hidden_width_per_layer() {
        let (cells, device) = stack(3);
        let state = cells.zero_state(2, &device);
        let (output, next) = cells.step(state, input(&device)).unwrap();

        assert_eq!(output.dims(), [2, 4]);
        assert_eq!(next.num_layers(), 3);
        for layer in next.layers() {
            assert_eq!(layer.memory.dims(), [2, 4]);
            assert_eq!(layer.hidden.dims(), [2, 4]);
        }
    }

    #[test]
    fn step_is_deterministic() {
        let (cells, device) = stack(2);
        let (a, state_a) = cells.step(cells.zero_state(2, &device), input(&device)).unwrap();
        let (b, state_b) = cells.step(cells.zero_state(2, &device), input(&device)).unwrap();

        assert_eq!(values(a), values(b));
        for (x, y) in state_a.layers().iter().zip(state_b.layers()) {
            assert_eq!(values(x.memory.clone()), values(y.memory.clone()));
            assert_eq!(values(x.hidden.clone()), values(y.hidden.clone()));
        }
    }

    #[test]
    fn output_is_top_hidden() {
        let (cells, device) = stack(2);
        let (output, next) = cells.step(cells.zero_state(2, &device), input(&device)).unwrap();
        let top = next.layer(1).unwrap().hidden.clone();
        assert_eq!(values(output), values(top));
    }

    #[test]
    fn rejects_wrong_input_width() {
        let (cells, device) = stack(1);
        let bad: Tensor<TB, 2> = Tensor::zeros([2, 4], &device);
        let err = cells.step(cells.zero_state(2, &device), bad).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Configuration);
    }
}
