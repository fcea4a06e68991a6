// src/utils/format.rs
//! Human-readable numbers for command output

const SUFFIXES: [(f64, &str, usize); 3] = [(1e9, "B", 2), (1e6, "M", 1), (1e3, "K", 1)];

/// Parameter counts: 85.0M, 1.50B, 12.3K.
pub fn format_params(n: usize) -> String {
    let value = n as f64;
    SUFFIXES
        .iter()
        .find(|&&(scale, _, _)| value >= scale)
        .map(|&(scale, suffix, digits)| format!("{:.*}{}", digits, value / scale, suffix))
        .unwrap_or_else(|| n.to_string())
}

/// Wall-clock time as `1h2m5s`, dropping leading zero units.
pub fn format_duration(secs: u64) -> String {
    match (secs / 3600, secs % 3600 / 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, s) => format!("{m}m{s}s"),
        (h, m, s) => format!("{h}h{m}m{s}s"),
    }
}
