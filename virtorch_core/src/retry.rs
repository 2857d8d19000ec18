/*
* Bounded polling.
*
* Every wait on the remote platform (disk unlock, vm settle, delete retries)
* goes through Poll::until so that interval, backoff and deadline behave the same.
* A single attempt can't outlive the deadline: it is cancelled when the deadline
* is reached.
*/
use backoff::backoff::Backoff as _;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};

// Error Handling
use log::trace;
use virtorch_error::VirtorchError;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Wait the same interval between attempts.
    #[default]
    Fixed,
    /// Double the interval after each attempt, up to max.
    Exponential {
        #[serde(with = "humantime_serde")]
        max: Duration,
    },
}

/// Stand-in for an unbounded timeout, about thirty years.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Successive delays between attempts.
pub enum Delays {
    Fixed(Duration),
    Exponential(ExponentialBackoff),
}
impl Iterator for Delays {
    type Item = Duration;
    fn next(&mut self) -> Option<Duration> {
        match self {
            Delays::Fixed(interval) => Some(*interval),
            Delays::Exponential(policy) => policy.next_backoff(),
        }
    }
}

/// The outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Ready(T),
    /// Not there yet, try again after the next interval.
    Pending(VirtorchError),
    /// Give up right away.
    Failed(VirtorchError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default)]
    pub backoff: Backoff,
}

impl Poll {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            backoff: Backoff::Fixed,
        }
    }
    pub fn exponential(mut self, max: Duration) -> Self {
        self.backoff = Backoff::Exponential { max };
        self
    }

    /// Delays to wait after each attempt, in order.
    pub fn delays(&self) -> Delays {
        match &self.backoff {
            Backoff::Fixed => Delays::Fixed(self.interval),
            Backoff::Exponential { max } => Delays::Exponential(ExponentialBackoff {
                current_interval: self.interval,
                initial_interval: self.interval,
                randomization_factor: 0.0,
                multiplier: 2.0,
                max_interval: *max,
                max_elapsed_time: None,
                ..Default::default()
            }),
        }
    }

    /// When a wait started at start gives up.
    /// Timeouts too large for the clock never elapse.
    pub fn deadline_from(&self, start: Instant) -> Instant {
        start
            .checked_add(self.timeout)
            .or_else(|| start.checked_add(FAR_FUTURE))
            .unwrap_or(start)
    }

    /*
     * Run op until it is ready, fails, or the timeout elapses.
     * Returns VirtorchError::Timeout carrying the last pending condition.
     */
    pub async fn until<T, F, Fut>(&self, what: &str, op: F) -> Result<T, VirtorchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        self.until_deadline(what, None, op).await
    }

    /*
     * Same as until(),
     * but never waits past an outer deadline (nested waits).
     */
    pub async fn until_deadline<T, F, Fut>(
        &self,
        what: &str,
        outer: Option<Instant>,
        mut op: F,
    ) -> Result<T, VirtorchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let start = Instant::now();
        let deadline = match outer {
            Some(outer) => outer.min(self.deadline_from(start)),
            None => self.deadline_from(start),
        };

        let mut delays = self.delays();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let last = match timeout_at(deadline, op()).await {
                Ok(Attempt::Ready(value)) => return Ok(value),
                Ok(Attempt::Failed(err)) => return Err(err),
                Ok(Attempt::Pending(err)) => err,
                Err(_) => VirtorchError::Unavailable {
                    reason: format!("attempt #{} was still running at the deadline", attempt),
                },
            };
            trace!("[poll] {} attempt #{}: {}", what, attempt, last);

            let now = Instant::now();
            if now >= deadline {
                return Err(VirtorchError::Timeout {
                    what: what.to_owned(),
                    after: now.duration_since(start),
                    last: last.to_string(),
                });
            }
            let remaining = deadline.saturating_duration_since(now);
            let delay = delays.next().unwrap_or(self.interval);
            sleep(delay.min(remaining)).await;
        }
    }
}
