use std::time::{Duration, Instant};

/// Wall-clock timer for replay runs
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time without stopping the timer
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Operations per second for `count` operations since start
    pub fn rate(&self, count: u64) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            count as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_latency_timer() {
        let timer = LatencyTimer::start();
        thread::sleep(Duration::from_millis(1));

        assert!(timer.rate(10) > 0.0);
        assert!(timer.elapsed() >= Duration::from_millis(1));
    }
}
