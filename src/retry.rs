//! Bounded retries with a fixed cooldown.
//!
//! Two policies are used against the upstream:
//!
//! * [`Policy::GATEWAY`]: one retry, immediately, and only when the failed
//!   attempt did not already run on a freshly established session.
//! * [`Policy::IMAGE`]: up to three attempts with a ten second pause after
//!   every failure.
//!
//! Exhausting the attempts returns the last failure unchanged.

use std::{fmt, future::Future, time::Duration};

/// Retry budget and delay between attempts.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Policy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Delay after a failed attempt before the next one starts.
    pub cooldown: Duration,
}

/// Outcome of consulting a [`Policy`] after a failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Decision {
    /// Run attempt number `attempt` after waiting `delay`.
    Retry { delay: Duration, attempt: u32 },
    /// Give up and surface the failure.
    Stop,
}

impl Policy {
    /// Gateway calls get exactly one re-login.
    pub const GATEWAY: Self = Self {
        max_attempts: 2,
        cooldown: Duration::ZERO,
    };

    /// Image CDN fetches.
    pub const IMAGE: Self = Self {
        max_attempts: 3,
        cooldown: Duration::from_secs(10),
    };

    /// Decides what to do after attempt number `attempt` (1-based) failed.
    #[must_use]
    pub fn decide(&self, attempt: u32, retryable: bool) -> Decision {
        if retryable && attempt < self.max_attempts {
            Decision::Retry {
                delay: self.cooldown,
                attempt: attempt + 1,
            }
        } else {
            Decision::Stop
        }
    }
}

/// Runs `op` until it succeeds or `policy` says to stop.
///
/// `op` receives the 1-based attempt number. `retryable` is consulted for
/// every failure; a failure it rejects is returned at once.
///
/// # Errors
///
/// Returns the failure of the last attempt.
pub async fn retry<T, E, F, Fut, C>(
    policy: Policy,
    what: &str,
    mut op: F,
    retryable: C,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => match policy.decide(attempt, retryable(&e)) {
                Decision::Retry {
                    delay,
                    attempt: next,
                } => {
                    if delay.is_zero() {
                        warn!("{what} failed: {e}; retrying");
                    } else {
                        warn!("{what} failed: {e}; retrying in {}s", delay.as_secs());
                        tokio::time::sleep(delay).await;
                    }
                    attempt = next;
                }
                Decision::Stop => return Err(e),
            },
        }
    }
}
