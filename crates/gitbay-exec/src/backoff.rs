// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry backoff: exponential growth with jitter, capped.

use std::time::Duration;

use rand::Rng;

/// Delay before the retry that will run as `next_attempt` (2 = first
/// retry). `base * 2^(n-1)`, jittered by ±25%, capped at `max`.
pub fn retry_delay(base: Duration, max: Duration, next_attempt: u32) -> Duration {
    let exponent = next_attempt.saturating_sub(2).min(16);
    let raw = base.saturating_mul(1u32 << exponent).min(max);

    let jitter = rand::thread_rng().gen_range(0.75..=1.25);
    let jittered = raw.mul_f64(jitter);
    jittered.min(max)
}
