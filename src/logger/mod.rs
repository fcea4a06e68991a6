mod metrics;

pub use metrics::{MetricsCsv, TrainLogger};
