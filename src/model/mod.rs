mod cell;
mod checkpoint;
mod clip;
mod config;
mod evaluator;
mod freeze;
mod loss_monitor;
mod projector;
mod rnn;
mod sampler;
mod state;
mod trainer;
mod unroll;

pub use cell::{CellStack, LstmCell};
pub use checkpoint::{CheckpointManager, CheckpointMeta};
pub use clip::{clip_by_global_norm, clip_scale, global_norm, param_shapes, params_are_finite};
pub use config::{ModelConfig, TrainingConfig};
pub use evaluator::{EvalMetrics, Evaluator};
pub use freeze::{
    EntryPoints, FetchValue, FrozenGraph, GraphFreezer, GraphManifest, HostTensor, StepSession,
    Subgraph,
    SEQ_SCOPE, STEP_SCOPE, ZEROS,
};
pub use loss_monitor::LossMonitor;
pub use projector::{cross_entropy, softmax_with_temperature, stable_softmax, OutputProjector};
pub use rnn::RnnModel;
pub use sampler::{argmax, Sampler, SamplingPolicy};
pub use state::{LayerState, ModelState};
pub use trainer::{FitOutcome, StepOutput, Trainer};
pub use unroll::{stack_outputs, unroll};
