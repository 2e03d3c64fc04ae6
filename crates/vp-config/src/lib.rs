//! Volpose configuration loading and validation.
//!
//! This crate provides:
//! - Typed parameters for the volumetric pose-estimation pipeline
//! - Loading of a primary YAML document plus its linked `io_config` document
//! - Merging (primary wins) and aggregate semantic validation
//! - Config snapshots for reproducibility

pub mod load;
pub mod params;
pub mod snapshot;
pub mod validate;

pub use load::{load, load_with, load_with_snapshot, LoadOptions};
pub use params::{Config, Interp, LossTerm, MaxNumSamples, Metric, TrainMode, VoxelGrid};
pub use snapshot::ConfigSnapshot;
pub use vp_common::{ConfigError, Issue, IssueKind, MirrorMap, ValidationReport};

/// The `max_num_samples` sentinel meaning "predict every sample".
pub const MAX_SENTINEL: &str = "max";
