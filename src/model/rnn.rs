//! Stacked recurrent model: cells + output projection

use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor},
};

use super::cell::CellStack;
use super::config::ModelConfig;
use super::projector::{stable_softmax, OutputProjector};
use super::state::ModelState;
use super::unroll::unroll;
use crate::error::Result;

#[derive(Module, Debug)]
pub struct RnnModel<B: Backend> {
    cells: CellStack<B>,
    projector: OutputProjector<B>,
}

impl<B: Backend> RnnModel<B> {
    pub fn new(config: &ModelConfig, device: &B::Device) -> Self {
        Self {
            cells: CellStack::new(config, device),
            projector: OutputProjector::new(config.hidden_size, config.output_size, device),
        }
    }

    pub fn cells(&self) -> &CellStack<B> {
        &self.cells
    }

    pub fn projector(&self) -> &OutputProjector<B> {
        &self.projector
    }

    pub fn input_size(&self) -> usize {
        self.cells.input_size()
    }

    pub fn output_size(&self) -> usize {
        self.projector.output_size()
    }

    pub fn hidden_size(&self) -> usize {
        self.cells.hidden_size()
    }

    pub fn num_layers(&self) -> usize {
        self.cells.num_layers()
    }

    pub fn zero_state(&self, batch_size: usize, device: &B::Device) -> ModelState<B> {
        self.cells.zero_state(batch_size, device)
    }

    /// Single step: `[batch, input]` -> logits `[batch, output]`.
    pub fn step(
        &self,
        state: ModelState<B>,
        input: Tensor<B, 2>,
    ) -> Result<(Tensor<B, 2>, ModelState<B>)> {
        let (output, state) = self.cells.step(state, input)?;
        Ok((self.projector.step_logits(output), state))
    }

    /// Whole window: `[batch, T, input]` -> logits `[batch * T, output]`.
    pub fn forward_window(
        &self,
        state: ModelState<B>,
        inputs: Tensor<B, 3>,
    ) -> Result<(Tensor<B, 2>, ModelState<B>)> {
        let (outputs, state) = unroll(&self.cells, state, inputs)?;
        Ok((self.projector.project(outputs), state))
    }

    pub fn window_probabilities(
        &self,
        state: ModelState<B>,
        inputs: Tensor<B, 3>,
    ) -> Result<(Tensor<B, 2>, ModelState<B>)> {
        let (logits, state) = self.forward_window(state, inputs)?;
        Ok((stable_softmax(logits), state))
    }
}
