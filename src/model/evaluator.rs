//! Loss and perplexity over a batch source, without gradients

use burn::{
    module::AutodiffModule,
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion,
    },
};

use super::loss_monitor::LossMonitor;
use super::projector::cross_entropy;
use super::rnn::RnnModel;
use crate::data::BatchSource;
use crate::error::{Result, SeqLstmError};

#[derive(Debug, Clone, Default)]
pub struct EvalMetrics {
    pub loss: f64,
    pub perplexity: f64,
    pub windows_evaluated: usize,
}

impl std::fmt::Display for EvalMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Loss: {:.4} | PPL: {:.2} | Windows: {}",
            self.loss, self.perplexity, self.windows_evaluated
        )
    }
}

/// Walks `max_batches` (or all) batches in order, carrying state across
/// windows the same way training does.
pub struct Evaluator {
    max_batches: Option<usize>,
}

impl Evaluator {
    pub fn new(max_batches: Option<usize>) -> Self {
        Self { max_batches }
    }

    /// Evaluates parameters on an inference backend. Autodiff backends are
    /// rejected since dropout stays active on them; use [`Self::evaluate_trained`].
    pub fn evaluate<B: Backend>(
        &self,
        model: &RnnModel<B>,
        source: &mut dyn BatchSource,
        device: &B::Device,
    ) -> Result<EvalMetrics> {
        if B::ad_enabled() {
            return Err(SeqLstmError::ConfigError(
                "evaluation needs an inference backend model".into(),
            ));
        }
        let available = source.num_batches();
        let num_batches = self.max_batches.map_or(available, |n| n.min(available));
        if num_batches == 0 {
            return Err(SeqLstmError::DatasetEmpty("nothing to evaluate".into()));
        }

        source.reset_batch_pointer();
        let mut monitor = LossMonitor::new();
        let mut state = None;

        for _ in 0..num_batches {
            let batch = source.next_batch()?;
            batch.check_targets(model.output_size())?;
            let current = match state.take() {
                Some(s) => s,
                None => model.zero_state(batch.batch_size(), device),
            };
            let (logits, next) =
                model.forward_window(current, batch.inputs_tensor::<B>(device))?;
            let loss: f64 = cross_entropy(logits, batch.targets_tensor::<B>(device))
                .into_scalar()
                .elem();
            monitor.update(loss);
            state = Some(next);
        }

        Ok(EvalMetrics {
            loss: monitor.average(),
            perplexity: monitor.perplexity(),
            windows_evaluated: monitor.count(),
        })
    }

    /// Evaluates a model still on the training backend through its `valid()` copy.
    pub fn evaluate_trained<AB: AutodiffBackend>(
        &self,
        model: &RnnModel<AB>,
        source: &mut dyn BatchSource,
        device: &<AB::InnerBackend as Backend>::Device,
    ) -> Result<EvalMetrics> {
        self.evaluate(&model.valid(), source, device)
    }
}
