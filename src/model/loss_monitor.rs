//! Running loss average and perplexity

/// Sum of per-window mean losses and the number of windows seen.
///
/// `average()` divides by `max(count, 1)`, so a freshly reset monitor reports
/// 0.0 rather than NaN. Training and evaluation share this policy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LossMonitor {
    sum: f64,
    count: f64,
}

impl LossMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0.0;
    }

    /// Records one window's mean loss and returns the running average.
    pub fn update(&mut self, mean_step_loss: f64) -> f64 {
        self.sum += mean_step_loss;
        self.count += 1.0;
        self.average()
    }

    pub fn average(&self) -> f64 {
        self.sum / self.count.max(1.0)
    }

    pub fn perplexity(&self) -> f64 {
        self.average().exp()
    }

    pub fn count(&self) -> usize {
        self.count as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_update_is_the_value() {
        let mut monitor = LossMonitor::new();
        monitor.reset();
        assert_eq!(monitor.update(2.5), 2.5);
    }

    #[test]
    fn repeated_identical_loss_keeps_average() {
        let mut monitor = LossMonitor::new();
        monitor.update(1.75);
        assert_eq!(monitor.update(1.75), 1.75);
    }

    #[test]
    fn perplexity_is_exp_average() {
        let mut monitor = LossMonitor::new();
        for loss in [3.0, 2.0, 1.0] {
            monitor.update(loss);
            assert!((monitor.perplexity() - monitor.average().exp()).abs() < 1e-12);
        }
        assert!((monitor.average() - 2.0).abs() < 1e-12);
        assert_eq!(monitor.count(), 3);
    }

    #[test]
    fn reset_state_does_not_divide_by_zero() {
        let mut monitor = LossMonitor::new();
        monitor.update(4.0);
        monitor.reset();
        assert_eq!(monitor.average(), 0.0);
        assert_eq!(monitor.perplexity(), 1.0);
    }
}
