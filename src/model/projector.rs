//! Output projection, softmax and cross-entropy

use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    tensor::{activation, backend::Backend, Int, Tensor},
};

use super::unroll::stack_outputs;

/// One affine map shared by every time step and batch row.
#[derive(Module, Debug)]
pub struct OutputProjector<B: Backend> {
    linear: Linear<B>,
    output_size: usize,
}

impl<B: Backend> OutputProjector<B> {
    pub fn new(hidden_size: usize, output_size: usize, device: &B::Device) -> Self {
        Self {
            linear: LinearConfig::new(hidden_size, output_size)
                .with_bias(true)
                .init(device),
            output_size,
        }
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Per-step outputs -> logits `[batch * T, output_size]`, row `b * T + t`.
    pub fn project(&self, outputs: Vec<Tensor<B, 2>>) -> Tensor<B, 2> {
        self.logits(stack_outputs(outputs))
    }

    /// `[batch, T, hidden]` -> `[batch * T, output_size]`.
    pub fn logits(&self, outputs: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, window, hidden] = outputs.dims();
        self.linear.forward(outputs.reshape([batch * window, hidden]))
    }

    /// Single step `[batch, hidden]` -> `[batch, output_size]`.
    pub fn step_logits(&self, output: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(output)
    }
}

/// Row-wise softmax; the row max is subtracted before exponentiating.
pub fn stable_softmax<B: Backend>(logits: Tensor<B, 2>) -> Tensor<B, 2> {
    let max = logits.clone().detach().max_dim(1);
    let exp = (logits - max).exp();
    let sum = exp.clone().sum_dim(1);
    exp / sum
}

/// Mean of `-log p[target]` over all rows.
pub fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    let log_probs = activation::log_softmax(logits, 1);
    let selected = log_probs.gather(1, targets.unsqueeze_dim(1));
    selected.mean().neg()
}

/// Host-side softmax of `logits / temperature`.
pub fn softmax_with_temperature(logits: &[f32], temperature: f32) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = logits
        .iter()
        .map(|x| ((x - max) / temperature).exp())
        .collect();
    let sum: f32 = exp.iter().sum();
    exp.iter().map(|x| x / sum).collect()
}
