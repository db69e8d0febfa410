use std::time::{Duration, Instant};
use tracing::info;

/// Logs the start and end of a pipeline phase with its wall-clock time.
pub struct PhaseTimer {
    phase: String,
    start: Instant,
}

impl PhaseTimer {
    pub fn start(phase: impl Into<String>) -> Self {
        let phase = phase.into();
        info!("=== Phase: {} ===", phase);
        Self {
            phase,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        info!("=== Done: {} (took {:.2?}) ===", self.phase, self.elapsed());
    }
}

/// Format an amount with space thousands separators, rounded to the unit.
/// 1234567.4 → "1 234 567"
pub fn fmt_xaf(amount: f64) -> String {
    if !amount.is_finite() {
        return "n/a".to_string();
    }
    let n = amount.round() as i64;
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    if n < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_xaf() {
        assert_eq!(fmt_xaf(1_234_567.4), "1 234 567");
        assert_eq!(fmt_xaf(0.0), "0");
        assert_eq!(fmt_xaf(-42_000.0), "-42 000");
        assert_eq!(fmt_xaf(999.6), "1 000");
        assert_eq!(fmt_xaf(f64::NAN), "n/a");
    }
}
