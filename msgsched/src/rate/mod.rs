/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Sample-rate parsing, formatting and enumeration.
//!
//! Rates are exchanged as text (`"4"`, `"0.5"`, `"1/3"`) in configuration and
//! catalogue files and converted to `f64` Hz for the allocation engine.  The
//! set of legal rates for a stream follows from its cycle timing:
//!
//! | Parameter | Meaning |
//! |---|---|
//! | `max_msgs_per_sec` | messages that can be sent in one second |
//! | `max_msgs_per_cycle` | messages sent before the list repeats |
//! | `period` | `max_msgs_per_cycle / max_msgs_per_sec`, seconds per cycle |
//! | `max_sec_per_msg` | longest allowed gap between two copies of a message |

pub mod math;

use tracing::debug;

use math::{divisors_descending, format_five_places};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Two rates closer than this are treated as the same rate.
pub const RATE_TOLERANCE: f64 = 1e-6;

// ── Error type ────────────────────────────────────────────────────────────────

/// A rate string could not be converted to a number of samples per second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateError {
    /// The text is neither a number nor a `a/b` fraction.
    Malformed(String),

    /// The fraction has a zero denominator.
    ZeroDenominator(String),

    /// The rate is negative or not finite.
    OutOfRange(String),
}

impl std::fmt::Display for RateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateError::Malformed(text) => write!(f, "'{text}' is not a valid rate"),
            RateError::ZeroDenominator(text) => {
                write!(f, "rate '{text}' has a zero denominator")
            }
            RateError::OutOfRange(text) => {
                write!(f, "rate '{text}' must be a finite, non-negative value")
            }
        }
    }
}

impl std::error::Error for RateError {}

// ── Parsing / formatting ──────────────────────────────────────────────────────

/// Convert `"x"` or `"a/b"` into samples per second.
pub fn parse_rate(text: &str) -> Result<f64, RateError> {
    let trimmed = text.trim();

    let value = match trimmed.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num
                .trim()
                .parse()
                .map_err(|_| RateError::Malformed(text.to_string()))?;
            let den: f64 = den
                .trim()
                .parse()
                .map_err(|_| RateError::Malformed(text.to_string()))?;
            if den == 0.0 {
                return Err(RateError::ZeroDenominator(text.to_string()));
            }
            num / den
        }
        None => trimmed
            .parse()
            .map_err(|_| RateError::Malformed(text.to_string()))?,
    };

    if !value.is_finite() || value < 0.0 {
        return Err(RateError::OutOfRange(text.to_string()));
    }
    Ok(value)
}

/// Format `samples` per `seconds` as a rate string.
///
/// A whole-number style value is used when `samples` divides evenly by
/// `seconds` (to five decimal places); otherwise the `1/x` form is used with
/// `x = seconds / samples`.
pub fn format_rate(samples: f64, seconds: f64) -> String {
    let scaled_samples = (samples * 100_000.0) as i64;
    let scaled_seconds = (seconds * 100_000.0) as i64;

    let even = scaled_seconds != 0 && scaled_samples % scaled_seconds <= 10;
    if even {
        format_five_places(samples / seconds)
    } else {
        format!("1/{}", format_five_places(seconds / samples))
    }
}

/// `true` when two rates are equal within [`RATE_TOLERANCE`].
pub fn rates_match(a: f64, b: f64) -> bool {
    (a - b).abs() < RATE_TOLERANCE
}

// ── Sample-rate enumeration ───────────────────────────────────────────────────

/// Build the list of legal sample rates for one stream, highest first.
///
/// * `include_uneven`: every count from `max_msgs_per_cycle` down to 1 per
///   cycle; otherwise only counts that divide the cycle evenly.
/// * Rates slower than once per cycle follow as `1/x`, for `x` from two
///   periods up to `max_sec_per_msg` in steps of one period.
///
/// Returns an empty list when `max_msgs_per_sec` or `max_msgs_per_cycle` is
/// zero.
pub fn calculate_sample_rates(
    max_sec_per_msg: u32,
    max_msgs_per_sec: u32,
    max_msgs_per_cycle: u32,
    include_uneven: bool,
) -> Vec<String> {
    if max_msgs_per_sec == 0 || max_msgs_per_cycle == 0 {
        return Vec::new();
    }

    let period = max_msgs_per_cycle as f64 / max_msgs_per_sec as f64;
    let mut rates: Vec<String> = Vec::new();

    let counts: Vec<u32> = if include_uneven {
        (1..=max_msgs_per_cycle).rev().collect()
    } else {
        divisors_descending(max_msgs_per_cycle)
    };

    for count in counts {
        push_unique(&mut rates, format_rate(count as f64, period));
    }

    // Integer step count avoids accumulating float error over long ranges
    let mut step = 2u32;
    loop {
        let sec = period * step as f64;
        if sec > max_sec_per_msg as f64 + RATE_TOLERANCE {
            break;
        }
        push_unique(&mut rates, format_rate(1.0, sec));
        step += 1;
    }

    debug!(
        max_sec_per_msg,
        max_msgs_per_sec,
        max_msgs_per_cycle,
        include_uneven,
        rates = ?rates,
        "Sample rates calculated"
    );

    rates
}

fn push_unique(rates: &mut Vec<String>, rate: String) {
    if !rates.contains(&rate) {
        rates.push(rate);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
