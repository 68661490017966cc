// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod pools;
pub mod quantile;
pub mod thresholds;
pub mod transform;

pub use quantile::{QUANTILE_DECIMALS, quantile, quantile_threshold};
pub use transform::{EnsembleSummary, ensemble_summary};

/// Crate identifier used in diagnostics.
pub fn crate_name() -> &'static str {
    "verif-slice"
}
