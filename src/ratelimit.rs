//! Per-class request throttling.
//!
//! The upstream enforces informal limits per kind of request and throttles
//! or bans clients that exceed them. Each [`Class`] gets its own limiter;
//! budgets are never shared between classes.
//!
//! | Class      | Rate          |
//! |------------|---------------|
//! | `Gateway`  | 5 per second  |
//! | `Api`      | 5 per second  |
//! | `Track`    | 1 per 2 seconds |
//! | `Image`    | 1 per 2 seconds |
//!
//! Requests that would exceed a limit are delayed, never rejected.

use std::{fmt, num::NonZeroU32, time::Duration};

use governor::{DefaultDirectRateLimiter, Quota};

/// Category of upstream request sharing one rate-limit budget.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Class {
    /// Private RPC gateway calls.
    Gateway,
    /// Public REST API calls.
    Api,
    /// Track file downloads.
    Track,
    /// Image CDN downloads.
    Image,
}

impl Class {
    /// Calls allowed per interval, and the interval.
    #[must_use]
    pub const fn rate(self) -> (u32, Duration) {
        match self {
            Self::Gateway | Self::Api => (5, Duration::from_secs(1)),
            Self::Track | Self::Image => (1, Duration::from_secs(2)),
        }
    }

    fn quota(self) -> Quota {
        let (calls, interval) = self.rate();
        let burst = NonZeroU32::new(calls).expect("calls per interval is zero");
        Quota::with_period(interval / calls)
            .expect("quota time interval is zero")
            .allow_burst(burst)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Gateway => write!(f, "gateway"),
            Self::Api => write!(f, "api"),
            Self::Track => write!(f, "track"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// Proof that a call of some class was admitted.
///
/// Dropping it has no effect: capacity is consumed on acquisition and
/// replenishes over time, independent of how the call ends.
#[derive(Debug)]
#[must_use]
pub struct Permit {
    class: Class,
}

impl Permit {
    #[must_use]
    pub fn class(&self) -> Class {
        self.class
    }
}

/// One limiter per [`Class`], shared by all concurrent callers.
pub struct RateLimiters {
    gateway: DefaultDirectRateLimiter,
    api: DefaultDirectRateLimiter,
    track: DefaultDirectRateLimiter,
    image: DefaultDirectRateLimiter,
}

impl RateLimiters {
    #[must_use]
    pub fn new() -> Self {
        Self {
            gateway: governor::RateLimiter::direct(Class::Gateway.quota()),
            api: governor::RateLimiter::direct(Class::Api.quota()),
            track: governor::RateLimiter::direct(Class::Track.quota()),
            image: governor::RateLimiter::direct(Class::Image.quota()),
        }
    }

    fn limiter(&self, class: Class) -> &DefaultDirectRateLimiter {
        match class {
            Class::Gateway => &self.gateway,
            Class::Api => &self.api,
            Class::Track => &self.track,
            Class::Image => &self.image,
        }
    }

    /// Waits until a call of `class` may proceed.
    ///
    /// Only the calling task is suspended.
    pub async fn acquire(&self, class: Class) -> Permit {
        let limiter = self.limiter(class);
        if limiter.check().is_err() {
            debug!("throttling {class} request");
            // No need to await with jitter because the level of concurrency is low.
            limiter.until_ready().await;
        }

        Permit { class }
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RateLimiters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RateLimiters").finish_non_exhaustive()
    }
}
