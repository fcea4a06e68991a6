//! Recurrent state threaded between calls

use burn::tensor::{backend::Backend, Tensor};

use crate::error::{Result, SeqLstmError};

/// (memory, hidden) pair of one stacked layer, each `[batch, hidden]`.
#[derive(Clone, Debug)]
pub struct LayerState<B: Backend> {
    pub memory: Tensor<B, 2>,
    pub hidden: Tensor<B, 2>,
}

impl<B: Backend> LayerState<B> {
    pub fn zeros(batch_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        Self {
            memory: Tensor::zeros([batch_size, hidden_size], device),
            hidden: Tensor::zeros([batch_size, hidden_size], device),
        }
    }

    pub fn detach(self) -> Self {
        Self {
            memory: self.memory.detach(),
            hidden: self.hidden.detach(),
        }
    }
}

/// One `LayerState` per layer, bottom layer first.
#[derive(Clone, Debug)]
pub struct ModelState<B: Backend> {
    layers: Vec<LayerState<B>>,
}

impl<B: Backend> ModelState<B> {
    pub fn zeros(
        num_layers: usize,
        batch_size: usize,
        hidden_size: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            layers: (0..num_layers)
                .map(|_| LayerState::zeros(batch_size, hidden_size, device))
                .collect(),
        }
    }

    pub fn from_layers(layers: Vec<LayerState<B>>) -> Self {
        Self { layers }
    }

    pub fn layers(&self) -> &[LayerState<B>] {
        &self.layers
    }

    pub fn into_layers(self) -> Vec<LayerState<B>> {
        self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&LayerState<B>> {
        self.layers.get(index)
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn batch_size(&self) -> usize {
        self.layers
            .first()
            .map(|layer| layer.hidden.dims()[0])
            .unwrap_or(0)
    }

    /// Cuts the autodiff graph so the next window backpropagates only through itself.
    pub fn detach(self) -> Self {
        Self {
            layers: self.layers.into_iter().map(LayerState::detach).collect(),
        }
    }

    /// Checks layer count and per-layer widths against the configured stack.
    pub fn check(&self, num_layers: usize, batch_size: usize, hidden_size: usize) -> Result<()> {
        if self.layers.len() != num_layers {
            return Err(SeqLstmError::shape("state layers", num_layers, self.layers.len()));
        }
        for layer in &self.layers {
            let expected = [batch_size, hidden_size];
            for dims in [layer.memory.dims(), layer.hidden.dims()] {
                if dims != expected {
                    return Err(SeqLstmError::shape(
                        "layer state",
                        format!("{:?}", expected),
                        format!("{:?}", dims),
                    ));
                }
            }
        }
        Ok(())
    }
}
