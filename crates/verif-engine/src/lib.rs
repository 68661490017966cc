// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod catalogue;
mod category;
pub mod deferred;
mod dispatch;
pub mod ensemble;
pub mod executor;
pub mod policy;
pub mod single_valued;
pub mod store;

pub use catalogue::MetricCatalogue;
pub use deferred::Deferred;
pub use ensemble::EnsembleStatisticsProcessor;
pub use executor::Executors;
pub use policy::{EffectiveSampleSize, SampleSizePolicy, SlicePlan};
pub use single_valued::SingleValuedStatisticsProcessor;
pub use store::{StatisticsBatch, StatisticsStore, StatisticsStoreBuilder};

/// Crate identifier used in diagnostics.
pub fn crate_name() -> &'static str {
    "verif-engine"
}
