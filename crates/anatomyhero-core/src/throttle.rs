//! Rate limiting for pointer hover and search input.
//!
//! Both take the caller's clock as a `Duration` since some fixed start, so
//! they work the same under bevy's `Time`, a browser timer, or a test.

use std::time::Duration;

/// Lets at most one event through per interval
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Duration>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True if an event at `now` should be processed
    pub fn ready(&mut self, now: Duration) -> bool {
        match self.last {
            Some(last) if now.saturating_sub(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Holds the latest value until input has been quiet for the delay
#[derive(Debug, Clone)]
pub struct Debounce<T> {
    delay: Duration,
    pending: Option<(T, Duration)>,
}

impl<T> Debounce<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Replace any pending value and restart the delay
    pub fn push(&mut self, value: T, now: Duration) {
        self.pending = Some((value, now));
    }

    /// Take the pending value once the delay has elapsed since the last push
    pub fn poll(&mut self, now: Duration) -> Option<T> {
        match &self.pending {
            Some((_, at)) if now.saturating_sub(*at) >= self.delay => {
                self.pending.take().map(|(value, _)| value)
            }
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_throttle_interval() {
        let mut throttle = Throttle::new(ms(100));
        assert!(throttle.ready(ms(0)));
        assert!(!throttle.ready(ms(50)));
        assert!(!throttle.ready(ms(99)));
        assert!(throttle.ready(ms(100)));
        assert!(!throttle.ready(ms(150)));
        assert!(throttle.ready(ms(200)));
    }

    #[test]
    fn test_debounce_keeps_latest() {
        let mut debounce = Debounce::new(ms(300));
        debounce.push("he", ms(0));
        debounce.push("hea", ms(100));
        assert_eq!(debounce.poll(ms(350)), None);
        assert!(debounce.is_pending());
        assert_eq!(debounce.poll(ms(400)), Some("hea"));
        assert_eq!(debounce.poll(ms(800)), None);

        debounce.push("x", ms(900));
        debounce.cancel();
        assert_eq!(debounce.poll(ms(2000)), None);
    }
}
