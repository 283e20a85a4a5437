//! Prediction value generation
//!
//! A prediction is an ephemeral tuple of a target round time and two
//! bounded-random coefficients. Values are computed fresh on every
//! request and never stored or replayed. Times are rendered in the
//! Indian timezone, matching the audience of the original bot.

use chrono::{DateTime, FixedOffset, Utc};
use rand::Rng;
use std::time::Duration;

/// India Standard Time (UTC+05:30) has no DST, so a fixed offset is exact.
fn indian_timezone() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("IST offset is in range")
}

/// Current time in IST
#[must_use]
pub fn indian_time_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&indian_timezone())
}

/// Render a timestamp the way the bot displays it, e.g. `07:45:12 PM`
#[must_use]
pub fn format_time(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%I:%M:%S %p").to_string()
}

/// One generated prediction
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Round the prediction applies to
    pub target_time: DateTime<FixedOffset>,
    /// Primary coefficient, uniform in [1.30, 2.40]
    pub primary: f64,
    /// Safe coefficient, uniform in [1.30, min(primary, 2.0)]
    pub safe: f64,
}

impl Prediction {
    /// Generate fresh values with the target round `delay` in the future.
    #[must_use]
    pub fn generate(delay: Duration) -> Self {
        let mut rng = rand::rng();

        let primary = round2(rng.random_range(1.30..=2.40));
        let safe_upper = primary.min(2.0);
        let safe = if safe_upper <= 1.30 {
            1.30
        } else {
            round2(rng.random_range(1.30..=safe_upper))
        };

        let delay_secs = i64::try_from(delay.as_secs()).unwrap_or(i64::MAX);
        let target_time = indian_time_now() + chrono::Duration::seconds(delay_secs);

        Self {
            target_time,
            primary,
            safe,
        }
    }

    /// The coefficient shown to the user, padded above the raw value.
    #[must_use]
    pub fn displayed_coefficient(&self) -> f64 {
        round2(self.primary + 0.10)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
