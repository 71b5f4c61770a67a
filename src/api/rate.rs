//! Per-client call ceiling over a rolling minute

use std::time::{Duration, Instant};

use super::error::ApiError;

const WINDOW: Duration = Duration::from_secs(60);

/// Call counter for one client instance. Not shared between clients.
#[derive(Debug)]
pub struct RateGate {
    limit: u32,
    call_count: u32,
    window_start: Instant,
}

impl RateGate {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            call_count: 0,
            window_start: Instant::now(),
        }
    }

    pub fn admit(&mut self) -> Result<(), ApiError> {
        self.admit_at(Instant::now())
    }

    /// Count one call made at `now`, or refuse it once the ceiling is hit.
    /// A refused call is not counted.
    pub fn admit_at(&mut self, now: Instant) -> Result<(), ApiError> {
        if now.saturating_duration_since(self.window_start) > WINDOW {
            self.call_count = 0;
            self.window_start = now;
        }
        if self.call_count >= self.limit {
            return Err(ApiError::RateLimitExceeded { limit: self.limit });
        }
        self.call_count += 1;
        Ok(())
    }

    pub fn call_count(&self) -> u32 {
        self.call_count
    }
}
