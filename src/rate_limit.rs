//! Spacing between external calls.
//!
//! Third-party geocoding and routing endpoints throttle aggressively (public
//! Nominatim allows one request per second). A `Throttle` is shared by every
//! client of one engine and guarantees at least `delay` between the start of
//! consecutive external calls. Cache hits never touch it.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_call: Mutex::new(None),
        }
    }

    /// A throttle that never sleeps.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Block until the next external call may be issued, then claim the slot.
    ///
    /// The lock is held while sleeping so concurrent callers queue up behind
    /// each other instead of all firing when the window opens.
    pub fn wait(&self) {
        if self.delay.is_zero() {
            return;
        }

        let mut last_call = self.last_call.lock();
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let remaining = self.delay - elapsed;
                tracing::trace!("Throttling external call for {:?}", remaining);
                std::thread::sleep(remaining);
            }
        }
        *last_call = Some(Instant::now());
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_never_sleeps() {
        let throttle = Throttle::disabled();
        let start = Instant::now();
        for _ in 0..100 {
            throttle.wait();
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_first_call_is_immediate() {
        let throttle = Throttle::new(Duration::from_secs(5));
        let start = Instant::now();
        throttle.wait();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_spacing_between_calls() {
        let throttle = Throttle::new(Duration::from_millis(30));
        let start = Instant::now();
        throttle.wait();
        throttle.wait();
        throttle.wait();
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
