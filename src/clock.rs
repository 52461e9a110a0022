use std::{
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

#[cfg(test)]
pub(crate) use manual::ManualClock;

/// Time source for the capture loop. Lets tests drive the reconnect delay and
/// FPS checkpoints without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Milliseconds since the Unix epoch, or 0 if the system clock is before it.
pub fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod manual {
    use std::{
        sync::{Mutex, PoisonError},
        time::{Duration, Instant},
    };

    use super::Clock;

    /// Clock that only moves when told to; `sleep` advances it instantly.
    #[derive(Debug)]
    pub struct ManualClock {
        origin: Instant,
        state: Mutex<ManualState>,
    }

    #[derive(Debug, Default)]
    struct ManualState {
        elapsed: Duration,
        sleeps: Vec<Duration>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                state: Mutex::new(ManualState::default()),
            }
        }

        pub fn advance(&self, duration: Duration) {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.elapsed += duration;
        }

        /// Every duration passed to `sleep`, in call order.
        pub fn sleeps(&self) -> Vec<Duration> {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.sleeps.clone()
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            self.origin + state.elapsed
        }

        fn sleep(&self, duration: Duration) {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.elapsed += duration;
            state.sleeps.push(duration);
        }
    }
}
