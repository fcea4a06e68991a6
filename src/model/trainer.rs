//! Training loop: truncated BPTT over consecutive windows, Adam updates,
//! global-norm clipping and per-epoch learning-rate decay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use burn::{
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, Adam, AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use tracing::{debug, info};

use super::checkpoint::{CheckpointManager, CheckpointMeta};
use super::clip::clip_by_global_norm;
use super::config::{ModelConfig, TrainingConfig};
use super::loss_monitor::LossMonitor;
use super::projector::cross_entropy;
use super::rnn::RnnModel;
use super::state::ModelState;
use crate::data::{Batch, BatchSource};
use crate::error::{Result, SeqLstmError};
use crate::logger::{MetricsCsv, TrainLogger};

/// Result of one optimizer step.
#[derive(Debug)]
pub struct StepOutput<B: AutodiffBackend> {
    /// Mean cross-entropy of this window.
    pub loss: f64,
    /// Running average since the last monitor reset.
    pub average_loss: f64,
    pub perplexity: f64,
    /// Gradient global norm before clipping.
    pub grad_norm: f64,
    pub learning_rate: f64,
    /// Final state of the window, detached from the graph.
    pub state: ModelState<B>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FitOutcome {
    Completed {
        global_step: usize,
        average_loss: f64,
    },
    Interrupted {
        global_step: usize,
        epoch: usize,
        batch: usize,
    },
}

pub struct Trainer<B: AutodiffBackend> {
    model: RnnModel<B>,
    optimizer: OptimizerAdaptor<Adam<B::InnerBackend>, RnnModel<B>, B>,
    config: TrainingConfig,
    monitor: LossMonitor,
    learning_rate: f64,
    global_step: usize,
    start_epoch: usize,
    stop: Arc<AtomicBool>,
    logger: Option<TrainLogger>,
    metrics: Option<MetricsCsv>,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(
        model_config: &ModelConfig,
        config: TrainingConfig,
        device: B::Device,
    ) -> Result<Self> {
        model_config.validate()?;
        config.validate()?;
        let model = RnnModel::new(model_config, &device);
        Ok(Self::from_model(model, config, device))
    }

    pub fn from_model(model: RnnModel<B>, config: TrainingConfig, device: B::Device) -> Self {
        let optimizer = AdamConfig::new().with_epsilon(1e-8).init();
        let learning_rate = config.learning_rate;
        Self {
            model,
            optimizer,
            config,
            monitor: LossMonitor::new(),
            learning_rate,
            global_step: 0,
            start_epoch: 0,
            stop: Arc::new(AtomicBool::new(false)),
            logger: None,
            metrics: None,
            device,
        }
    }

    /// Shares a flag that, once set, stops `fit` at the next batch boundary.
    pub fn with_stop_signal(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_logs(mut self, logger: TrainLogger, metrics: MetricsCsv) -> Self {
        self.logger = Some(logger);
        self.metrics = Some(metrics);
        self
    }

    pub fn model(&self) -> &RnnModel<B> {
        &self.model
    }

    pub fn into_model(self) -> RnnModel<B> {
        self.model
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    pub fn start_epoch(&self) -> usize {
        self.start_epoch
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn monitor(&self) -> &LossMonitor {
        &self.monitor
    }

    pub fn zero_state(&self) -> ModelState<B> {
        self.model.zero_state(self.config.batch_size, &self.device)
    }

    /// Restores parameters and progress from the newest checkpoint.
    /// Moments of the optimizer start fresh.
    pub fn resume_from(&mut self, manager: &CheckpointManager) -> Result<CheckpointMeta> {
        let (model, meta) = manager.restore(self.model.clone(), &self.device)?;
        self.model = model;
        self.global_step = meta.global_step;
        self.start_epoch = meta.resume_epoch();
        self.learning_rate = self.config.learning_rate_for_epoch(self.start_epoch);
        info!(
            step = meta.global_step,
            epoch = self.start_epoch,
            "resuming training"
        );
        Ok(meta)
    }

    /// One forward/backward/update over `batch`, starting from `state`.
    pub fn train_step(&mut self, batch: &Batch, state: ModelState<B>) -> Result<StepOutput<B>> {
        batch.check_shape(
            self.config.batch_size,
            self.config.num_unrollings,
            self.model.input_size(),
        )?;
        batch.check_targets(self.model.output_size())?;

        let inputs = batch.inputs_tensor::<B>(&self.device);
        let targets = batch.targets_tensor::<B>(&self.device);

        let (logits, final_state) = self.model.forward_window(state, inputs)?;
        let loss = cross_entropy(logits, targets);
        let loss_value: f64 = loss.clone().into_scalar().elem();
        if !loss_value.is_finite() {
            return Err(SeqLstmError::NumericInstability {
                step: self.global_step,
                what: "loss",
                value: loss_value,
            });
        }
        let average_loss = self.monitor.update(loss_value);

        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        let (grads, grad_norm) =
            clip_by_global_norm::<B, _>(&self.model, grads, self.config.max_grad_norm);
        if !grad_norm.is_finite() {
            return Err(SeqLstmError::NumericInstability {
                step: self.global_step,
                what: "gradient norm",
                value: grad_norm,
            });
        }

        self.model = self
            .optimizer
            .step(self.learning_rate, self.model.clone(), grads);
        self.global_step += 1;

        Ok(StepOutput {
            loss: loss_value,
            average_loss,
            perplexity: self.monitor.perplexity(),
            grad_norm,
            learning_rate: self.learning_rate,
            state: final_state.detach(),
        })
    }

    /// Runs epochs `start_epoch..num_epochs` over `source`.
    pub fn fit(
        &mut self,
        source: &mut dyn BatchSource,
        checkpoints: Option<&CheckpointManager>,
    ) -> Result<FitOutcome> {
        let num_batches = source.num_batches();
        if num_batches == 0 {
            return Err(SeqLstmError::DatasetEmpty("batch source has no batches".into()));
        }
        let num_epochs = self.config.num_epochs;
        let save_every = self.config.save_every.max(1);

        for epoch in self.start_epoch..num_epochs {
            self.learning_rate = self.config.learning_rate_for_epoch(epoch);
            self.monitor.reset();
            source.reset_batch_pointer();
            let mut state = self.zero_state();

            info!(epoch, lr = self.learning_rate, "epoch start");
            if let Some(logger) = self.logger.as_mut() {
                logger.log_epoch(epoch, self.learning_rate);
            }

            for b in 0..num_batches {
                if self.stop.load(Ordering::SeqCst) {
                    info!(epoch, batch = b, "stop requested");
                    if let Some(manager) = checkpoints {
                        if b > 0 {
                            self.save_checkpoint(manager, epoch, b - 1, num_batches)?;
                        } else if epoch > 0 {
                            self.save_checkpoint(manager, epoch - 1, num_batches - 1, num_batches)?;
                        }
                    }
                    return Ok(FitOutcome::Interrupted {
                        global_step: self.global_step,
                        epoch,
                        batch: b,
                    });
                }

                let started = Instant::now();
                let batch = source.next_batch()?;
                let out = self.train_step(&batch, state)?;
                state = out.state;
                let elapsed = started.elapsed().as_secs_f64();

                self.report(epoch, b, num_batches, out.loss, out.grad_norm, elapsed);

                let index = epoch * num_batches + b;
                let last = epoch + 1 == num_epochs && b + 1 == num_batches;
                if let Some(manager) = checkpoints {
                    if index % save_every == 0 || last {
                        self.save_checkpoint(manager, epoch, b, num_batches)?;
                    }
                }
            }
        }

        Ok(FitOutcome::Completed {
            global_step: self.global_step,
            average_loss: self.monitor.average(),
        })
    }

    fn report(
        &mut self,
        epoch: usize,
        batch: usize,
        num_batches: usize,
        loss: f64,
        grad_norm: f64,
        elapsed: f64,
    ) {
        let step = self.global_step;
        let log_every = self.config.log_every.max(1);
        if step % log_every == 0 {
            info!(
                "{}/{} (epoch {}), train_loss = {:.3}, ppl = {:.3}, grad_norm = {:.3}, time/batch = {:.3}",
                epoch * num_batches + batch,
                self.config.num_epochs * num_batches,
                epoch,
                self.monitor.average(),
                self.monitor.perplexity(),
                grad_norm,
                elapsed
            );
        } else {
            debug!(step, loss, grad_norm, "train step");
        }
        if let Some(logger) = self.logger.as_mut() {
            logger.log_step(step, epoch, self.monitor.average(), self.learning_rate, grad_norm);
        }
        if let Some(metrics) = self.metrics.as_mut() {
            let rate = if elapsed > 0.0 { 1.0 / elapsed } else { 0.0 };
            metrics.record(step, epoch, loss, self.learning_rate, grad_norm, rate);
        }
    }

    fn save_checkpoint(
        &mut self,
        manager: &CheckpointManager,
        epoch: usize,
        batch: usize,
        batches_per_epoch: usize,
    ) -> Result<()> {
        let meta = CheckpointMeta {
            global_step: self.global_step,
            epoch,
            batch,
            batches_per_epoch,
            learning_rate: self.learning_rate,
            average_loss: self.monitor.average(),
        };
        let path = manager.save(&self.model, &meta)?;
        if let Some(logger) = self.logger.as_mut() {
            logger.log_checkpoint(self.global_step, &path);
        }
        Ok(())
    }

    /// Parameters on the inner backend, for evaluation, sampling and export.
    pub fn valid_model(&self) -> RnnModel<B::InnerBackend> {
        self.model.valid()
    }
}
