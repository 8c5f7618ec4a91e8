//! Per-connection input throttling

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

/// Client messages allowed per second when nothing is configured.
/// Turns are one message each; this only stops floods such as a stuck key repeat.
pub const DEFAULT_INPUT_RATE: u32 = 30;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket for one WebSocket client, counting what it refused
pub struct InputRateLimiter {
    limiter: DirectLimiter,
    rejected: AtomicU64,
}

impl InputRateLimiter {
    /// `per_second` of zero is treated as one
    pub fn new(per_second: u32) -> Self {
        let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_second(rate)),
            rejected: AtomicU64::new(0),
        }
    }

    /// True if the message may be forwarded to the session
    pub fn admit(&self) -> bool {
        let admitted = self.limiter.check().is_ok();
        if !admitted {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
        admitted
    }

    /// Messages refused so far
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

impl Default for InputRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_RATE)
    }
}
