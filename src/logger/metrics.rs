// src/logger/metrics.rs
//! Training log file and CSV metrics

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

/// Appends human-readable progress lines to `training.log`.
pub struct TrainLogger {
    file: File,
    start_time: Instant,
    log_every: usize,
}

impl TrainLogger {
    pub fn new(output_dir: &Path, log_every: usize) -> std::io::Result<Self> {
        std::fs::create_dir_all(output_dir)?;
        let log_path = output_dir.join("training.log");

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            file,
            start_time: Instant::now(),
            log_every: log_every.max(1),
        })
    }

    fn write_line(&mut self, body: &str) {
        let elapsed = self.start_time.elapsed().as_secs();
        let _ = writeln!(self.file, "[{:>6}s] {}", elapsed, body);
        let _ = self.file.flush();
    }

    pub fn log_step(&mut self, step: usize, epoch: usize, loss: f64, lr: f64, grad_norm: f64) {
        if step % self.log_every != 0 {
            return;
        }
        self.write_line(&format!(
            "Step {:>6} | Epoch {:>3} | Loss: {:.4} | PPL: {:>8.2} | LR: {:.2e} | GradNorm: {:.4}",
            step,
            epoch,
            loss,
            loss.exp(),
            lr,
            grad_norm
        ));
    }

    pub fn log_eval(&mut self, step: usize, eval_loss: f64, eval_ppl: f64) {
        self.write_line(&format!(
            "EVAL Step {:>6} | Loss: {:.4} | PPL: {:.2}",
            step, eval_loss, eval_ppl
        ));
    }

    pub fn log_checkpoint(&mut self, step: usize, path: &Path) {
        self.write_line(&format!("CHECKPOINT Step {} -> {}", step, path.display()));
    }

    pub fn log_epoch(&mut self, epoch: usize, learning_rate: f64) {
        self.write_line(&format!("=== EPOCH {} (lr {:.2e}) ===", epoch, learning_rate));
    }

    pub fn log_message(&mut self, msg: &str) {
        self.write_line(msg);
    }
}

/// `metrics.csv`, one row per training step.
pub struct MetricsCsv {
    file: File,
}

impl MetricsCsv {
    pub const HEADER: &'static str = "global_step,epoch,loss,ppl,lr,grad_norm,windows_per_sec";

    pub fn new(output_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(output_dir)?;
        let mut file = File::create(output_dir.join("metrics.csv"))?;
        writeln!(file, "{}", Self::HEADER)?;
        Ok(Self { file })
    }

    /// Reopens an existing file, writing the header only if it is new.
    pub fn open_append(output_dir: &Path) -> std::io::Result<Self> {
        let path = output_dir.join("metrics.csv");
        if !path.exists() {
            return Self::new(output_dir);
        }
        let file = OpenOptions::new().append(true).open(&path)?;
        Ok(Self { file })
    }

    pub fn record(
        &mut self,
        global_step: usize,
        epoch: usize,
        loss: f64,
        lr: f64,
        grad_norm: f64,
        windows_per_sec: f64,
    ) {
        let _ = writeln!(
            self.file,
            "{},{},{:.6},{:.4},{:.4e},{:.4},{:.2}",
            global_step,
            epoch,
            loss,
            loss.exp(),
            lr,
            grad_norm,
            windows_per_sec
        );
        let _ = self.file.flush();
    }
}
