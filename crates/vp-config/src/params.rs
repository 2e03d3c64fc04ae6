//! Typed pipeline parameters.
//!
//! [`Config`] is the validated, immutable result of [`crate::load`]. Every
//! field corresponds to one top-level key of the merged document; unknown
//! keys are preserved verbatim in [`Config::extra`] when strict mode is off.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::PathBuf;
use vp_common::MirrorMap;

/// Volumetric interpolation mode for projecting views into the voxel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interp {
    Nearest,
    Linear,
}

impl Interp {
    pub const ALL: &'static [Interp] = &[Interp::Nearest, Interp::Linear];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interp::Nearest => "nearest",
            Interp::Linear => "linear",
        }
    }

    pub fn parse(s: &str) -> Option<Interp> {
        match s {
            "nearest" => Some(Interp::Nearest),
            "linear" => Some(Interp::Linear),
            _ => None,
        }
    }
}

/// How training starts relative to existing weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainMode {
    /// Fresh weights.
    New,
    /// Continue an interrupted run from its last checkpoint.
    Resume,
    /// Start from pretrained weights with a new output head.
    Finetune,
}

impl TrainMode {
    pub const ALL: &'static [TrainMode] =
        &[TrainMode::New, TrainMode::Resume, TrainMode::Finetune];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrainMode::New => "new",
            TrainMode::Resume => "resume",
            TrainMode::Finetune => "finetune",
        }
    }

    pub fn parse(s: &str) -> Option<TrainMode> {
        match s {
            "new" => Some(TrainMode::New),
            "resume" => Some(TrainMode::Resume),
            "finetune" => Some(TrainMode::Finetune),
            _ => None,
        }
    }
}

/// Recognized evaluation metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "euclidean_distance_3D")]
    EuclideanDistance3d,
    #[serde(rename = "centered_euclidean_distance_3D")]
    CenteredEuclideanDistance3d,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::EuclideanDistance3d => "euclidean_distance_3D",
            Metric::CenteredEuclideanDistance3d => "centered_euclidean_distance_3D",
        }
    }

    pub fn parse(s: &str) -> Option<Metric> {
        match s {
            "euclidean_distance_3D" => Some(Metric::EuclideanDistance3d),
            "centered_euclidean_distance_3D" => Some(Metric::CenteredEuclideanDistance3d),
            _ => None,
        }
    }
}

/// Prediction sample cap: a positive count, or the `"max"` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxNumSamples {
    Unbounded,
    Limit(u64),
}

impl MaxNumSamples {
    /// `Some(n)` for a bounded run, `None` for unbounded.
    pub fn limit(&self) -> Option<u64> {
        match self {
            MaxNumSamples::Unbounded => None,
            MaxNumSamples::Limit(n) => Some(*n),
        }
    }
}

impl Serialize for MaxNumSamples {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MaxNumSamples::Unbounded => serializer.serialize_str(crate::MAX_SENTINEL),
            MaxNumSamples::Limit(n) => serializer.serialize_u64(*n),
        }
    }
}

/// One weighted term of the training loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossTerm {
    pub loss_weight: f64,
}

/// The voxel grid the volumetric network operates on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoxelGrid {
    /// Lower bound of each axis, in world units relative to the COM.
    pub vmin: f64,
    /// Upper bound of each axis.
    pub vmax: f64,
    /// Grid resolution per axis; the grid holds `nvox^3` cells.
    pub nvox: u32,
}

impl VoxelGrid {
    /// Edge length of a single voxel.
    pub fn voxel_size(&self) -> f64 {
        (self.vmax - self.vmin) / f64::from(self.nvox)
    }
}

/// Validated pipeline configuration.
///
/// Constructed once by [`crate::load`]; immutable afterwards, so it can be
/// shared by reference across threads without synchronization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    // Identity
    pub io_config: PathBuf,
    pub camnames: Vec<String>,
    pub random_seed: i64,

    // Data
    pub crop_height: [i64; 2],
    pub crop_width: [i64; 2],

    // Volume
    pub vmin: f64,
    pub vmax: f64,
    pub nvox: u32,
    pub interp: Interp,

    // Train
    pub batch_size: u32,
    pub epochs: u32,
    pub lr: f64,
    pub train_mode: TrainMode,
    pub com_augmentation: bool,
    pub num_validation_per_exp: u32,
    pub save_period: u32,
    pub data_split_seed: u64,

    // Architecture
    pub expval: bool,
    pub net_type: String,
    pub n_channels_in: u32,
    pub n_channels_out: u32,
    pub new_n_channels_out: u32,
    pub n_views: u32,

    // Loss
    pub metric: Vec<Metric>,
    pub loss: BTreeMap<String, LossTerm>,

    // Augmentation
    pub medfilt_window: u32,
    pub rand_view_replace: bool,
    pub n_rand_views: u32,
    pub mirror_augmentation: bool,
    pub left_keypoints: Vec<usize>,
    pub right_keypoints: Vec<usize>,
    pub augment_hue: bool,
    pub augment_brightness: bool,
    pub augment_bright_val: f64,

    // Prediction
    pub max_num_samples: MaxNumSamples,

    /// Keypoint swap table derived from the left/right lists at load time.
    pub(crate) mirror: MirrorMap,

    /// Unrecognized keys, preserved for forward compatibility.
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Config {
    /// The voxel grid spanned by `vmin`/`vmax` at resolution `nvox`.
    pub fn voxel_grid(&self) -> VoxelGrid {
        VoxelGrid {
            vmin: self.vmin,
            vmax: self.vmax,
            nvox: self.nvox,
        }
    }

    /// The left/right keypoint swap table for mirror augmentation.
    pub fn mirror_map(&self) -> &MirrorMap {
        &self.mirror
    }

    /// Number of configured cameras.
    pub fn n_cameras(&self) -> usize {
        self.camnames.len()
    }

    /// `Some(n)` to cap prediction at `n` samples, `None` to run unbounded.
    pub fn prediction_limit(&self) -> Option<u64> {
        self.max_num_samples.limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interp_parse() {
        assert_eq!(Interp::parse("nearest"), Some(Interp::Nearest));
        assert_eq!(Interp::parse("linear"), Some(Interp::Linear));
        assert_eq!(Interp::parse("cubic"), None);
    }

    #[test]
    fn test_train_mode_parse() {
        assert_eq!(TrainMode::parse("finetune"), Some(TrainMode::Finetune));
        assert_eq!(TrainMode::parse("continued"), None);
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!(
            Metric::parse("euclidean_distance_3D"),
            Some(Metric::EuclideanDistance3d)
        );
        assert_eq!(Metric::parse("mse"), None);
    }

    #[test]
    fn test_max_num_samples_limit() {
        assert_eq!(MaxNumSamples::Unbounded.limit(), None);
        assert_eq!(MaxNumSamples::Limit(500).limit(), Some(500));
    }

    #[test]
    fn test_voxel_size() {
        let grid = VoxelGrid {
            vmin: -120.0,
            vmax: 120.0,
            nvox: 80,
        };
        assert!((grid.voxel_size() - 3.0).abs() < 1e-12);
    }
}
