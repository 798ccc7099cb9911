/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Pure arithmetic helpers used by rate formatting and option enumeration.
//!
//! These are free functions rather than methods so they can be used and tested
//! independently of the scheduler.

/// All divisors of `n` in descending order.  Returns an empty list for `0`.
///
/// Only factors up to `sqrt(n)` are tested; each one contributes its
/// companion value as well.
pub fn divisors_descending(n: u32) -> Vec<u32> {
    let mut low = Vec::new();
    let mut high = Vec::new();

    let mut div = 1;
    while div <= n / div {
        if n % div == 0 {
            low.push(div);
            if n / div != div {
                high.push(n / div);
            }
        }
        div += 1;
    }

    // high is already descending; low ascending
    high.extend(low.into_iter().rev());
    high
}

/// Round a non-negative ratio to the nearest whole count, halves rounding up.
///
/// Negative and non-finite inputs collapse to `0`.
pub fn round_count(value: f64) -> usize {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    (value + 0.5).floor() as usize
}

/// Format `value` with five decimals, then drop trailing zeros and a bare
/// decimal point (`2.50000` → `2.5`, `4.00000` → `4`).
pub fn format_five_places(value: f64) -> String {
    let text = format!("{:.5}", value);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
