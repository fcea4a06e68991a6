//! Freeze Command
//!
//! Exports the newest checkpoint as a frozen inference artifact.

use std::path::PathBuf;

use crate::backend::get_device;
use crate::error::Result;
use crate::helpers::load_trained;
use crate::model::GraphFreezer;

pub fn execute(checkpoint_dir: &PathBuf, output: &PathBuf, seq_window: usize) -> Result<()> {
    super::banner("🧊 Freezing graph");

    let device = get_device();
    let trained = load_trained(checkpoint_dir, &device)?;
    let graph = GraphFreezer::with_seq_window(seq_window).freeze_constants(
        trained.model,
        &trained.model_config,
        trained.meta.global_step,
        &device,
    )?;
    graph.save(output)?;

    let manifest = graph.manifest();
    println!("  Trained steps: {}", manifest.trained_steps);
    for entry in &manifest.subgraphs {
        println!("  [{}] window {}", entry.scope, entry.window);
        println!("    in:  {}", entry.inputs);
        println!("    out: {}", entry.output);
        println!("    state: {} tensors", entry.initial_state.len());
    }
    println!("  Written to {:?}", output);
    super::rule();
    Ok(())
}
