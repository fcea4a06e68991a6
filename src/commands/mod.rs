//! Commands Module
//!
//! All CLI subcommand implementations.

pub mod eval;
pub mod freeze;
pub mod info;
pub mod resume;
pub mod sample;
pub mod train;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flag raised by Ctrl-C; training stops at the next batch boundary and
/// saves a checkpoint.
pub(crate) fn interrupt_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!("Ctrl-C handler not installed: {e}");
    }
    flag
}

pub(crate) fn banner(title: &str) {
    println!("═══════════════════════════════════════════════════════════");
    println!("  {}", title);
    println!("═══════════════════════════════════════════════════════════");
}

pub(crate) fn rule() {
    println!("═══════════════════════════════════════════════════════════");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_flag_starts_clear() {
        let flag = interrupt_flag();
        assert!(!flag.load(Ordering::SeqCst));
    }
}
