// src/data/mod.rs

mod batch;
mod corpus;

pub use batch::{Batch, BatchSource, InMemoryBatches};
pub use corpus::{CharBatches, CharCorpus};
