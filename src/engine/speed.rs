//! Speed → inter-step delay mapping.
//!
//! The curve is quadratic, `max_delay * (1 - speed/100)^2`, for every call
//! site including the first step of a run. Speed 100 means no delay at all.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use std::time::Duration;

use crate::core::config::MAX_SPEED;
use crate::core::errors::{IsvError, Result};

/// Default delay at speed 0.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(3_000);

/// Pure mapping from a speed setting to a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedModel {
    max_delay: Duration,
}

impl Default for SpeedModel {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DELAY)
    }
}

impl SpeedModel {
    /// Model whose speed-0 delay is `max_delay`.
    #[must_use]
    pub const fn new(max_delay: Duration) -> Self {
        Self { max_delay }
    }

    /// Delay at speed 0.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay for a speed in `0..=100`. Out-of-range speeds are rejected.
    pub fn delay_for(&self, speed: u8) -> Result<Duration> {
        validate_speed(speed)?;
        Ok(self.delay_for_valid(speed))
    }

    /// Delay for a speed already known to be in range. Values above 100 are
    /// treated as 100.
    #[must_use]
    pub(crate) fn delay_for_valid(&self, speed: u8) -> Duration {
        if speed >= MAX_SPEED {
            return Duration::ZERO;
        }
        let slowness = 1.0 - f64::from(speed) / f64::from(MAX_SPEED);
        let millis = self.max_delay.as_millis() as f64 * slowness * slowness;
        Duration::from_millis(millis.round() as u64)
    }
}

/// Reject speeds outside `0..=100`.
pub fn validate_speed(speed: u8) -> Result<()> {
    if speed > MAX_SPEED {
        return Err(IsvError::invalid(format!(
            "speed must be in [0, {MAX_SPEED}], got {speed}"
        )));
    }
    Ok(())
}
