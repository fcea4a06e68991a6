// src/data/batch.rs

use burn::tensor::{backend::Backend, Int, Tensor, TensorData};

use crate::error::{Result, SeqLstmError};

/// One training window: `inputs` is `[batch][T][input_size]` and `targets`
/// is `[batch][T]`, both stored flat in batch-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    inputs: Vec<f32>,
    targets: Vec<usize>,
    batch_size: usize,
    window: usize,
    input_size: usize,
}

impl Batch {
    /// Nested form. Every row must have the same window length and every
    /// frame the same width.
    pub fn new(inputs: Vec<Vec<Vec<f32>>>, targets: Vec<Vec<usize>>) -> Result<Self> {
        let batch_size = inputs.len();
        if batch_size == 0 {
            return Err(SeqLstmError::DatasetEmpty("batch has no rows".into()));
        }
        if targets.len() != batch_size {
            return Err(SeqLstmError::shape("batch target rows", batch_size, targets.len()));
        }
        let window = inputs[0].len();
        let input_size = inputs[0].first().map(|frame| frame.len()).unwrap_or(0);

        let mut flat_inputs = Vec::with_capacity(batch_size * window * input_size);
        for row in &inputs {
            if row.len() != window {
                return Err(SeqLstmError::shape("batch window", window, row.len()));
            }
            for frame in row {
                if frame.len() != input_size {
                    return Err(SeqLstmError::shape("batch input width", input_size, frame.len()));
                }
                flat_inputs.extend_from_slice(frame);
            }
        }

        let mut flat_targets = Vec::with_capacity(batch_size * window);
        for row in &targets {
            if row.len() != window {
                return Err(SeqLstmError::shape("batch target window", window, row.len()));
            }
            flat_targets.extend_from_slice(row);
        }

        Self::from_flat(flat_inputs, flat_targets, batch_size, window, input_size)
    }

    pub fn from_flat(
        inputs: Vec<f32>,
        targets: Vec<usize>,
        batch_size: usize,
        window: usize,
        input_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 || window == 0 || input_size == 0 {
            return Err(SeqLstmError::ConfigError(format!(
                "batch dimensions must be positive (batch={batch_size}, window={window}, input={input_size})"
            )));
        }
        if inputs.len() != batch_size * window * input_size {
            return Err(SeqLstmError::shape(
                "batch inputs",
                batch_size * window * input_size,
                inputs.len(),
            ));
        }
        if targets.len() != batch_size * window {
            return Err(SeqLstmError::shape("batch targets", batch_size * window, targets.len()));
        }
        Ok(Self {
            inputs,
            targets,
            batch_size,
            window,
            input_size,
        })
    }

    /// Token rows encoded one-hot over `vocab_size`.
    pub fn one_hot(tokens: &[Vec<usize>], targets: &[Vec<usize>], vocab_size: usize) -> Result<Self> {
        let batch_size = tokens.len();
        let window = tokens.first().map(|row| row.len()).unwrap_or(0);
        let mut inputs = vec![0.0f32; batch_size * window * vocab_size];
        for (b, row) in tokens.iter().enumerate() {
            if row.len() != window {
                return Err(SeqLstmError::shape("batch window", window, row.len()));
            }
            for (t, &token) in row.iter().enumerate() {
                if token >= vocab_size {
                    return Err(SeqLstmError::UnknownToken {
                        index: token,
                        vocab_size,
                    });
                }
                inputs[(b * window + t) * vocab_size + token] = 1.0;
            }
        }
        let flat_targets: Vec<usize> = targets.iter().flatten().copied().collect();
        Self::from_flat(inputs, flat_targets, batch_size, window, vocab_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn inputs(&self) -> &[f32] {
        &self.inputs
    }

    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    /// Fails unless the batch matches the unroll mode it is fed to.
    pub fn check_shape(&self, batch_size: usize, window: usize, input_size: usize) -> Result<()> {
        if self.batch_size != batch_size {
            return Err(SeqLstmError::shape("batch size", batch_size, self.batch_size));
        }
        if self.window != window {
            return Err(SeqLstmError::shape("batch window", window, self.window));
        }
        if self.input_size != input_size {
            return Err(SeqLstmError::shape("batch input width", input_size, self.input_size));
        }
        Ok(())
    }

    pub fn check_targets(&self, output_size: usize) -> Result<()> {
        match self.targets.iter().find(|&&t| t >= output_size) {
            Some(&index) => Err(SeqLstmError::UnknownToken {
                index,
                vocab_size: output_size,
            }),
            None => Ok(()),
        }
    }

    pub fn inputs_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 3> {
        Tensor::from_data(
            TensorData::new(
                self.inputs.clone(),
                [self.batch_size, self.window, self.input_size],
            ),
            device,
        )
    }

    /// Targets flattened to `[batch * T]`, row `b * T + t`.
    pub fn targets_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1, Int> {
        // i32 keeps the int element native on the CUDA and WGPU backends.
        let data: Vec<i32> = self.targets.iter().map(|&t| t as i32).collect();
        Tensor::from_data(TensorData::new(data, [self.targets.len()]), device)
    }
}

/// Ordered supplier of batches for one epoch.
pub trait BatchSource {
    fn num_batches(&self) -> usize;

    fn reset_batch_pointer(&mut self);

    fn next_batch(&mut self) -> Result<Batch>;
}

/// Pre-built batches (frame-level features, tests).
pub struct InMemoryBatches {
    batches: Vec<Batch>,
    pointer: usize,
}

impl InMemoryBatches {
    pub fn new(batches: Vec<Batch>) -> Result<Self> {
        if batches.is_empty() {
            return Err(SeqLstmError::DatasetEmpty("no batches".into()));
        }
        Ok(Self {
            batches,
            pointer: 0,
        })
    }
}

impl BatchSource for InMemoryBatches {
    fn num_batches(&self) -> usize {
        self.batches.len()
    }

    fn reset_batch_pointer(&mut self) {
        self.pointer = 0;
    }

    fn next_batch(&mut self) -> Result<Batch> {
        let batch = self.batches[self.pointer % self.batches.len()].clone();
        self.pointer += 1;
        Ok(batch)
    }
}
