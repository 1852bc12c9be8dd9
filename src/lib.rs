//! Composite drought-risk indicator for East African regions.
//!
//! Monthly NDVI, rainfall and root-zone soil moisture are turned into
//! seasonal z-scores, sign-aligned so higher means drier, averaged into a
//! risk index, smoothed over three months and ranked across regions per
//! month on a 0-100 scale.
//!
//! - `loader`: CSV observations per variable
//! - `normalize`: seasonal z-scores and risk direction
//! - `composite`: outer join, mean-of-present index, smoothing
//! - `rescale`: per-date percentile ranks
//! - `snapshot`: reference-date deltas and risk buckets
//! - `store`: persisted table and its freshness
//! - `query`, `choropleth`, `reports`: read-side helpers for the dashboard

pub mod choropleth;
pub mod composite;
pub mod config;
pub mod enrich;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod query;
pub mod reports;
pub mod rescale;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod util;

pub use config::{DateRange, PipelineConfig, RegionDefinition};
pub use error::{PipelineError, Result};
pub use pipeline::Pipeline;
pub use query::{Filter, Indicator};
pub use types::{CompositeRow, Observation, RegionKey, RiskCategory, ScaledRow, SnapshotRow};
