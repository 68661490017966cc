// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use verif_core::{Threshold, VerifError};

/// Decimal places retained by resolved quantile thresholds.
pub const QUANTILE_DECIMALS: i32 = 5;

/// Empirical quantile of `sorted` (ascending) at probability `p`.
///
/// Uses the `p * (n + 1)` plotting position with linear interpolation between neighbours,
/// clamped to the sample extremes. NaN entries are ignored; an empty sample yields NaN.
pub fn quantile(sorted: &[f64], p: f64) -> Result<f64, VerifError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(VerifError::invalid_input(format!(
            "quantile probability must lie in [0, 1]; got {p}"
        )));
    }

    let finite: Vec<f64> = if sorted.iter().any(|v| v.is_nan()) {
        sorted.iter().copied().filter(|v| !v.is_nan()).collect()
    } else {
        sorted.to_vec()
    };

    let n = finite.len();
    match n {
        0 => return Ok(f64::NAN),
        1 => return Ok(finite[0]),
        _ => {}
    }

    let position = p * (n as f64 + 1.0);
    if position < 1.0 {
        return Ok(finite[0]);
    }
    if position >= n as f64 {
        return Ok(finite[n - 1]);
    }

    let floor = position.floor();
    let index = floor as usize;
    let lower = finite[index - 1];
    let upper = finite[index];
    Ok(lower + (position - floor) * (upper - lower))
}

fn round_to_decimals(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(QUANTILE_DECIMALS);
    (value * scale).round() / scale
}

/// Resolves a probability threshold into a quantile threshold against `sorted` climatology.
///
/// Thresholds without probabilities are returned unchanged. Resolution only reads the
/// declared probabilities, so resolving an already-resolved threshold is a no-op.
pub fn quantile_threshold(threshold: &Threshold, sorted: &[f64]) -> Result<Threshold, VerifError> {
    let Some(probabilities) = threshold.probabilities() else {
        return Ok(threshold.clone());
    };
    let values = probabilities.try_map(|p| quantile(sorted, p).map(round_to_decimals))?;
    threshold.with_values(values)
}
