//! Repeated connection attempts with a growing delay.

use std::{thread, time::Duration};

use super::{Error, Mixer};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub attempts: u32,
    /// Delay before the second attempt.
    pub delay: Duration,
    /// Factor applied to the delay after each failed attempt.
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
            backoff: 1.5,
        }
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails with a non transient error
    /// or all attempts are exhausted.
    pub fn run<T>(
        &self,
        context: &str,
        mut op: impl FnMut() -> Result<T, Error>,
    ) -> Result<T, Error> {
        let attempts = self.attempts.max(1);
        let mut delay = self.delay;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op() {
                Ok(res) => return Ok(res),
                Err(err) if attempt < attempts && err.is_transient() => {
                    log::warn!("{context}: attempt {attempt}/{attempts} failed: {err}");
                    thread::sleep(delay);
                    delay = delay.mul_f64(self.backoff.max(1.0));
                }
                Err(err) => {
                    log::error!("{context}: attempt {attempt}/{attempts} failed: {err}");
                    return Err(err);
                }
            }
        }
    }
}

/// Connects `mixer`, retrying on transient errors.
pub fn connect_with_retry(
    mixer: &dyn Mixer,
    policy: &RetryPolicy,
    timeout: Duration,
) -> Result<(), Error> {
    let context = format!("Connecting {} mixer at {}", mixer.name(), mixer.config());
    policy.run(&context, || mixer.connect(timeout))
}
