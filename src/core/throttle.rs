use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-host politeness window. Each reservation pushes the host's next
/// free slot `delay` further out, so concurrent callers are serialized.
#[derive(Debug, Default)]
pub struct HostThrottle {
    ready_at: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how long the caller must wait before fetching from `host`.
    pub fn reserve(&self, host: &str, delay: Duration) -> Duration {
        if delay.is_zero() {
            return Duration::ZERO;
        }

        let now = Instant::now();
        let mut ready_at = self.ready_at.lock();
        let slot = ready_at
            .get(host)
            .copied()
            .filter(|at| *at > now)
            .unwrap_or(now);
        ready_at.insert(host.to_string(), slot + delay);
        slot - now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_is_immediate() {
        let throttle = HostThrottle::new();
        assert_eq!(
            throttle.reserve("www.asus.com", Duration::from_secs(1)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_consecutive_reservations_are_spaced() {
        let throttle = HostThrottle::new();
        let delay = Duration::from_secs(1);
        throttle.reserve("www.asus.com", delay);
        let second = throttle.reserve("www.asus.com", delay);
        let third = throttle.reserve("www.asus.com", delay);

        assert!(second > Duration::from_millis(900) && second <= delay);
        assert!(third > Duration::from_millis(1900) && third <= delay * 2);
    }

    #[test]
    fn test_hosts_are_independent() {
        let throttle = HostThrottle::new();
        let delay = Duration::from_secs(1);
        throttle.reserve("www.asus.com", delay);
        assert_eq!(throttle.reserve("osp.avm.de", delay), Duration::ZERO);
    }

    #[test]
    fn test_zero_delay_never_waits() {
        let throttle = HostThrottle::new();
        throttle.reserve("www.asus.com", Duration::ZERO);
        assert_eq!(throttle.reserve("www.asus.com", Duration::ZERO), Duration::ZERO);
    }
}
