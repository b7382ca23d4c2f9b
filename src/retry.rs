use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Outcome of a policy that ran out of attempts: how many were made and the
/// error the final one produced.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// A retry schedule decoupled from any particular operation: a fixed attempt
/// cap with exponentially growing delays between attempts (base, 2x base,
/// 4x base, ...). Both the rewrite engine and the fetcher run their fallible
/// calls through this.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            // Deterministic spacing; the serial pipeline has no thundering
            // herd to spread out.
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.base_delay * 32,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Run `op` until it succeeds or `max_attempts` is reached. The operation
    /// receives the 1-based attempt number, mostly for logging.
    pub async fn run<T, E, Op, Fut>(&self, mut op: Op) -> Result<T, RetryExhausted<E>>
    where
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut schedule = self.schedule();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    let delay = schedule.next_backoff().unwrap_or(self.base_delay);
                    warn!(
                        "Attempt {}/{} failed: {}, retrying in {:?}",
                        attempt, self.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}
