//! Info Command
//!
//! Shows model configuration and parameter count.

use crate::error::Result;
use crate::helpers::get_model_config;
use crate::utils::format_params;

pub fn execute(
    preset: &str,
    vocab_size: Option<usize>,
    hidden_size: Option<usize>,
    num_layers: Option<usize>,
) -> Result<()> {
    let mut config = get_model_config(preset, vocab_size)?;
    if let Some(h) = hidden_size {
        config.hidden_size = h;
    }
    if let Some(l) = num_layers {
        config.num_layers = l;
    }
    config.validate()?;

    let params = config.num_parameters();
    super::banner(&format!("📊 Model: {}", preset));
    println!("  Parameters: {}", format_params(params));
    println!("  input_size: {}", config.input_size);
    println!("  output_size: {}", config.output_size);
    println!("  hidden_size: {}", config.hidden_size);
    println!("  num_layers: {}", config.num_layers);
    println!("  Weights (f32): {:.1} KB", (params * 4) as f64 / 1024.0);
    super::rule();
    Ok(())
}
