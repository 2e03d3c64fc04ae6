//! No-mock configuration loading tests.
//!
//! Covers:
//! - Loading a real primary + io_config document pair from disk
//! - Merge precedence (primary wins, io_config fills gaps)
//! - Reference resolution failures and nesting rejection
//! - Aggregate reporting of multiple violations in one failure
//! - Snapshot capture and comparison

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vp_config::{load, load_with, load_with_snapshot, ConfigError, LoadOptions, MaxNumSamples};

const IO_YAML: &str = r#"
camnames: [Camera1, Camera2, Camera3, Camera4, Camera5, Camera6]
crop_height: [0, 1152]
crop_width: [0, 1280]
epochs: 100
batch_size: 8
"#;

const PRIMARY_YAML: &str = r#"
io_config: io.yaml
random_seed: 1234
vmin: -120.0
vmax: 120.0
nvox: 80
interp: nearest
batch_size: 4
lr: 0.001
train_mode: finetune
COM_augmentation: true
num_validation_per_exp: 4
save_period: 10
data_split_seed: 7
expval: true
net_type: compressed_dannce
n_channels_in: 3
n_channels_out: 20
new_n_channels_out: 20
n_views: 6
metric: [euclidean_distance_3D]
loss:
  mask_nan_keep_loss:
    loss_weight: 1.0
medfilt_window: 5
rand_view_replace: true
n_rand_views: 2
mirror_augmentation: true
left_keypoints: [5, 7, 9]
right_keypoints: [6, 8, 10]
augment_hue: false
augment_brightness: true
augment_bright_val: 0.05
max_num_samples: max
"#;

fn write_pair(dir: &Path, primary: &str, io: &str) -> PathBuf {
    fs::write(dir.join("io.yaml"), io).expect("write io fixture");
    let primary_path = dir.join("dannce_config.yaml");
    fs::write(&primary_path, primary).expect("write primary fixture");
    primary_path
}

#[test]
fn test_load_valid_pair() {
    let dir = TempDir::new().expect("tempdir");
    let primary = write_pair(dir.path(), PRIMARY_YAML, IO_YAML);

    let config = load(&primary).expect("valid pair should load");

    // Values from the primary document.
    assert_eq!(config.random_seed, 1234);
    assert_eq!(config.net_type, "compressed_dannce");
    assert_eq!(config.max_num_samples, MaxNumSamples::Unbounded);

    // Values filled in from io.yaml.
    assert_eq!(config.n_cameras(), 6);
    assert_eq!(config.crop_height, [0, 1152]);
    assert_eq!(config.epochs, 100);

    // Derived accessors.
    assert!((config.voxel_grid().voxel_size() - 3.0).abs() < 1e-12);
    assert_eq!(config.mirror_map().swap(7), 8);
    assert_eq!(config.prediction_limit(), None);
}

#[test]
fn test_merge_precedence_primary_wins() {
    let dir = TempDir::new().expect("tempdir");
    let primary = write_pair(dir.path(), PRIMARY_YAML, IO_YAML);

    let config = load(&primary).expect("valid pair should load");

    // Both documents define batch_size; the primary's 4 beats io.yaml's 8.
    assert_eq!(config.batch_size, 4);
    // Only io.yaml defines epochs.
    assert_eq!(config.epochs, 100);
}

#[test]
fn test_missing_io_config_file() {
    let dir = TempDir::new().expect("tempdir");
    let primary_path = dir.path().join("dannce_config.yaml");
    fs::write(&primary_path, PRIMARY_YAML).expect("write primary fixture");

    let err = load(&primary_path).expect_err("dangling io_config must fail");
    match err {
        ConfigError::MissingReference { path } => {
            assert!(path.ends_with("io.yaml"), "unexpected path: {path}");
        }
        other => panic!("expected MissingReference, got {other}"),
    }
}

#[test]
fn test_nested_io_config_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let nested_io = format!("io_config: deeper.yaml\n{IO_YAML}");
    let primary = write_pair(dir.path(), PRIMARY_YAML, &nested_io);

    let err = load(&primary).expect_err("nested io_config must fail");
    assert!(matches!(err, ConfigError::NestedReference { .. }));
}

#[test]
fn test_missing_primary_file() {
    let err = load("/nonexistent/dannce_config.yaml").expect_err("missing primary must fail");
    assert!(matches!(err, ConfigError::Io { .. }));
    assert_eq!(err.code(), 60);
}

#[test]
fn test_all_violations_reported_together() {
    let dir = TempDir::new().expect("tempdir");
    let broken = PRIMARY_YAML
        .replace("vmin: -120.0", "vmin: 200.0")
        .replace("n_rand_views: 2", "n_rand_views: 7")
        .replace("train_mode: finetune", "train_mode: continued");
    let primary = write_pair(dir.path(), &broken, IO_YAML);

    let err = load(&primary).expect_err("broken config must fail");
    match err {
        ConfigError::Validation(report) => {
            assert_eq!(report.len(), 3, "every violation reported: {report}");
            assert!(report.mentions("vmin"));
            assert!(report.mentions("n_rand_views"));
            assert!(report.mentions("train_mode"));
        }
        other => panic!("expected Validation, got {other}"),
    }
}

#[test]
fn test_bounded_max_num_samples() {
    let dir = TempDir::new().expect("tempdir");
    let bounded = PRIMARY_YAML.replace("max_num_samples: max", "max_num_samples: 500");
    let primary = write_pair(dir.path(), &bounded, IO_YAML);

    let config = load(&primary).expect("bounded config should load");
    assert_eq!(config.max_num_samples, MaxNumSamples::Limit(500));
    assert_eq!(config.prediction_limit(), Some(500));
}

#[test]
fn test_idempotent_loads_compare_equal() {
    let dir = TempDir::new().expect("tempdir");
    let primary = write_pair(dir.path(), PRIMARY_YAML, IO_YAML);

    let first = load(&primary).expect("first load");
    let second = load(&primary).expect("second load");
    assert_eq!(first, second);
}

#[test]
fn test_strict_mode_rejects_unknown_keys() {
    let dir = TempDir::new().expect("tempdir");
    let extended = format!("{PRIMARY_YAML}com_debug: ./debug\n");
    let primary = write_pair(dir.path(), &extended, IO_YAML);

    // Lenient: preserved untouched.
    let config = load(&primary).expect("lenient mode should load");
    assert!(config.extra.contains_key("com_debug"));

    // Strict: rejected, naming the key.
    let err = load_with(&primary, LoadOptions { strict: true })
        .expect_err("strict mode must reject unknown keys");
    match err {
        ConfigError::Validation(report) => assert!(report.mentions("com_debug")),
        other => panic!("expected Validation, got {other}"),
    }
}

#[test]
fn test_snapshot_capture_and_match() {
    let dir = TempDir::new().expect("tempdir");
    let primary = write_pair(dir.path(), PRIMARY_YAML, IO_YAML);

    let (_, snap1) = load_with_snapshot(&primary, LoadOptions::default()).expect("first load");
    let (_, snap2) = load_with_snapshot(&primary, LoadOptions::default()).expect("second load");

    assert!(snap1.matches(&snap2));
    assert_eq!(snap1.short_id().len(), 12);
    assert_eq!(snap1.summary.net_type, "compressed_dannce");
    assert_eq!(snap1.summary.n_cameras, 6);
    assert!(snap1.io_hash.is_some());

    // JSON round-trip preserves identity.
    let restored =
        vp_config::ConfigSnapshot::from_json(&snap1.to_json().expect("serialize snapshot"))
            .expect("deserialize snapshot");
    assert!(restored.matches(&snap1));
}

#[test]
fn test_snapshot_detects_changed_io_document() {
    let dir = TempDir::new().expect("tempdir");
    let primary = write_pair(dir.path(), PRIMARY_YAML, IO_YAML);
    let (_, before) = load_with_snapshot(&primary, LoadOptions::default()).expect("load");

    // Edit io.yaml without touching the primary.
    let edited = IO_YAML.replace("epochs: 100", "epochs: 200");
    fs::write(dir.path().join("io.yaml"), edited).expect("rewrite io fixture");
    let (config, after) = load_with_snapshot(&primary, LoadOptions::default()).expect("reload");

    assert_eq!(config.epochs, 200);
    assert!(!before.matches(&after));
}
