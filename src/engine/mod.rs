//! Demand aggregation, supply estimation and fleet allocation.
//!
//! Rows that pass the filter chain are folded into per-cell tallies for
//! three views (all day, morning, evening), scored against the busiest cell,
//! sized with a Little's Law supply estimate, and allocated a fleet either
//! ideally or greedily under a ceiling.

pub mod aggregate;
pub mod fish_bowl;
pub mod optimize;
pub mod pipeline;
pub mod score;
pub mod supply;
pub mod types;

pub use pipeline::{process, process_with_fish_bowl};
pub use types::{FleetSummary, HexCluster, PlanOutput, ProcessedClusters};
