use std::time::Duration;
use tokio::time::sleep;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Fixed pause a dispatch worker takes after every client it handles.
///
/// The delay is `1s / rps` computed in integer nanoseconds. A zero rate means no
/// pacing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    delay: Duration,
}

impl Pacer {
    pub fn from_rps(rps: u64) -> Self {
        let delay = if rps == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(NANOS_PER_SECOND / rps)
        };
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_delay_from_rps() {
        assert_eq!(Pacer::from_rps(1).delay(), Duration::from_secs(1));
        assert_eq!(Pacer::from_rps(1000).delay(), Duration::from_millis(1));
        assert_eq!(Pacer::from_rps(3).delay(), Duration::from_nanos(333_333_333));
        assert_eq!(Pacer::from_rps(0).delay(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_sleeps_for_delay() {
        let pacer = Pacer::from_rps(10);
        let start = Instant::now();
        pacer.pause().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
