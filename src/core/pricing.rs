//! Cost estimation with the DeepSeek off-peak discount window

use chrono::{DateTime, Duration, Timelike, Utc};
use std::fmt;

/// USD per million tokens, input side
const STANDARD_INPUT: f64 = 0.27;
/// USD per million tokens, output side
const STANDARD_OUTPUT: f64 = 1.10;
/// Discounted input rate during the saver window
const DISCOUNT_INPUT: f64 = 0.135;
/// Discounted output rate during the saver window
const DISCOUNT_OUTPUT: f64 = 0.55;

/// Saver window start, 16:30 UTC, in fractional hours
const SAVER_START_HOUR: f64 = 16.5;
/// Saver window end, 00:30 UTC, in fractional hours
const SAVER_END_HOUR: f64 = 0.5;

/// Pricing tier in effect at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Full price
    Standard,
    /// Off-peak 50% discount (16:30 - 00:30 UTC)
    Discount,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Standard => write!(f, "standard"),
            Tier::Discount => write!(f, "discount"),
        }
    }
}

impl Tier {
    fn rates(self) -> (f64, f64) {
        match self {
            Tier::Standard => (STANDARD_INPUT, STANDARD_OUTPUT),
            Tier::Discount => (DISCOUNT_INPUT, DISCOUNT_OUTPUT),
        }
    }
}

/// Whether the given instant falls in the 16:30-00:30 UTC saver window
pub fn is_off_peak_at(now: DateTime<Utc>) -> bool {
    let hour = now.hour() as f64 + now.minute() as f64 / 60.0;
    hour >= SAVER_START_HOUR || hour < SAVER_END_HOUR
}

/// Pricing tier at a given instant
pub fn pricing_tier_at(now: DateTime<Utc>) -> Tier {
    if is_off_peak_at(now) {
        Tier::Discount
    } else {
        Tier::Standard
    }
}

/// Pricing tier right now
pub fn pricing_tier() -> Tier {
    pricing_tier_at(Utc::now())
}

/// Estimate the cost of translating `token_count` tokens at a given instant.
pub fn estimate_total_cost_at(token_count: usize, now: DateTime<Utc>) -> (f64, Tier) {
    let tier = pricing_tier_at(now);
    let (input, output) = tier.rates();
    let total = (token_count as f64 / 1_000_000.0) * (input + output);
    (total, tier)
}

/// Estimate the cost of translating `token_count` tokens right now.
pub fn estimate_total_cost(token_count: usize) -> (f64, Tier) {
    estimate_total_cost_at(token_count, Utc::now())
}

/// Time until the saver window opens, or `None` if it is already open.
pub fn time_until_saver_mode_at(now: DateTime<Utc>) -> Option<Duration> {
    if is_off_peak_at(now) {
        return None;
    }
    let current_minutes = (now.hour() * 60 + now.minute()) as i64;
    let saver_start_minutes = 16 * 60 + 30;
    Some(Duration::minutes(saver_start_minutes - current_minutes))
}

/// Time until the saver window opens, measured from now.
pub fn time_until_saver_mode() -> Option<Duration> {
    time_until_saver_mode_at(Utc::now())
}
