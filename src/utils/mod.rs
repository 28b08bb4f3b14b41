use std::time::Instant;
use tracing::info;

/// Logs how long a run mode took when dropped.
pub struct RunTimer {
    run: &'static str,
    start: Instant,
}

impl RunTimer {
    pub fn start(run: &'static str) -> Self {
        info!("▶ {}", run);
        Self {
            run,
            start: Instant::now(),
        }
    }
}

impl Drop for RunTimer {
    fn drop(&mut self) {
        info!("■ {} finished in {:.1?}", self.run, self.start.elapsed());
    }
}

/// 12345 → "12,345"
pub fn fmt_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
