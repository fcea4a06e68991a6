//! Sequence unrolling over a fixed window

use burn::tensor::{backend::Backend, Tensor};

use super::cell::CellStack;
use super::state::ModelState;
use crate::error::{Result, SeqLstmError};

/// Feeds `inputs` (`[batch, T, input_size]`) through the stack one time step
/// at a time, starting from `initial`. Returns the T per-step outputs
/// (`[batch, hidden]` each) and the state after the last step.
pub fn unroll<B: Backend>(
    cells: &CellStack<B>,
    initial: ModelState<B>,
    inputs: Tensor<B, 3>,
) -> Result<(Vec<Tensor<B, 2>>, ModelState<B>)> {
    let [batch, window, width] = inputs.dims();
    if width != cells.input_size() {
        return Err(SeqLstmError::shape("unroll input width", cells.input_size(), width));
    }
    if window == 0 {
        return Err(SeqLstmError::shape("unroll window", ">= 1", 0));
    }
    initial.check(cells.num_layers(), batch, cells.hidden_size())?;

    let mut state = initial;
    let mut outputs = Vec::with_capacity(window);
    for t in 0..window {
        let x_t = inputs
            .clone()
            .slice([0..batch, t..t + 1, 0..width])
            .reshape([batch, width]);
        let (output, next) = cells.step_unchecked(state, x_t);
        outputs.push(output);
        state = next;
    }

    Ok((outputs, state))
}

/// `[batch, hidden]` x T -> `[batch, T, hidden]`, batch-major.
pub fn stack_outputs<B: Backend>(outputs: Vec<Tensor<B, 2>>) -> Tensor<B, 3> {
    let steps: Vec<Tensor<B, 3>> = outputs
        .into_iter()
        .map(|output| output.unsqueeze_dim(1))
        .collect();
    Tensor::cat(steps, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::TensorData;

    type TB = NdArray;

    fn values<const D: usize>(tensor: Tensor<TB, D>) -> Vec<f32> {
        tensor.into_data().iter::<f32>().collect()
    }

    #[test]
    fn unroll_equals_manual_chaining() {
        let device = NdArrayDevice::Cpu;
        let config = ModelConfig::new(3, 3).with_hidden_size(6).with_num_layers(2);
        let cells = CellStack::<TB>::new(&config, &device);

        let (batch, window, width) = (2, 4, 3);
        let raw: Vec<f32> = (0..batch * window * width)
            .map(|i| ((i as f32) * 0.37).sin())
            .collect();
        let inputs: Tensor<TB, 3> =
            Tensor::from_data(TensorData::new(raw, [batch, window, width]), &device);

        let (outputs, final_state) =
            unroll(&cells, cells.zero_state(batch, &device), inputs.clone()).unwrap();
        assert_eq!(outputs.len(), window);

        let mut state = cells.zero_state(batch, &device);
        for (t, unrolled) in outputs.iter().enumerate() {
            let x_t = inputs
                .clone()
                .slice([0..batch, t..t + 1, 0..width])
                .reshape([batch, width]);
            let (manual, next) = cells.step(state, x_t).unwrap();
            assert_eq!(values(manual), values(unrolled.clone()), "step {}", t);
            state = next;
        }

        for (a, b) in final_state.layers().iter().zip(state.layers()) {
            assert_eq!(values(a.memory.clone()), values(b.memory.clone()));
            assert_eq!(values(a.hidden.clone()), values(b.hidden.clone()));
        }
    }

    #[test]
    fn stacked_outputs_are_batch_major() {
        let device = NdArrayDevice::Cpu;
        let a: Tensor<TB, 2> = Tensor::from_data(TensorData::new(vec![1.0f32, 2.0], [2, 1]), &device);
        let b: Tensor<TB, 2> = Tensor::from_data(TensorData::new(vec![3.0f32, 4.0], [2, 1]), &device);
        let stacked = stack_outputs(vec![a, b]);
        assert_eq!(stacked.dims(), [2, 2, 1]);
        assert_eq!(values(stacked), vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn rejects_mismatched_state() {
        let device = NdArrayDevice::Cpu;
        let config = ModelConfig::new(3, 3).with_hidden_size(6).with_num_layers(2);
        let cells = CellStack::<TB>::new(&config, &device);
        let inputs: Tensor<TB, 3> = Tensor::zeros([2, 4, 3], &device);
        let wrong_batch = cells.zero_state(1, &device);
        assert!(unroll(&cells, wrong_batch, inputs).is_err());
    }
}
