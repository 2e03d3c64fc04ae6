//! Schema extraction and semantic validation of a merged document.
//!
//! Every key is checked independently and every problem is collected into
//! one [`ValidationReport`]; the caller gets all violations in a single
//! failure. Cross-field invariants are only evaluated when the keys they
//! span extracted cleanly, so one broken key never cascades into spurious
//! follow-on errors.

use crate::params::{Config, Interp, LossTerm, MaxNumSamples, Metric, TrainMode};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use vp_common::{ConfigError, Issue, MirrorMap, ValidationReport};

/// Every key the schema recognizes.
pub const KNOWN_KEYS: &[&str] = &[
    "io_config",
    "camnames",
    "random_seed",
    "crop_height",
    "crop_width",
    "vmin",
    "vmax",
    "nvox",
    "interp",
    "batch_size",
    "epochs",
    "lr",
    "train_mode",
    "COM_augmentation",
    "num_validation_per_exp",
    "save_period",
    "data_split_seed",
    "expval",
    "net_type",
    "n_channels_in",
    "n_channels_out",
    "new_n_channels_out",
    "n_views",
    "metric",
    "loss",
    "medfilt_window",
    "rand_view_replace",
    "n_rand_views",
    "mirror_augmentation",
    "left_keypoints",
    "right_keypoints",
    "augment_hue",
    "augment_brightness",
    "augment_bright_val",
    "max_num_samples",
];

/// Build a validated [`Config`] from a merged document.
///
/// In strict mode unrecognized keys are reported; otherwise they are
/// preserved in [`Config::extra`].
pub fn validate_document(doc: &Mapping, strict: bool) -> Result<Config, ConfigError> {
    let mut report = ValidationReport::new();

    let io_config = PathBuf::from(take_string(doc, "io_config", &mut report));
    let camnames = take_camnames(doc, &mut report);
    let random_seed = take_i64(doc, "random_seed", &mut report);

    let crop_height = take_crop_pair(doc, "crop_height", &mut report);
    let crop_width = take_crop_pair(doc, "crop_width", &mut report);

    let vmin = take_f64(doc, "vmin", &mut report);
    let vmax = take_f64(doc, "vmax", &mut report);
    let nvox = take_positive_u32(doc, "nvox", &mut report);
    let interp = take_interp(doc, &mut report);

    let batch_size = take_positive_u32(doc, "batch_size", &mut report);
    let epochs = take_positive_u32(doc, "epochs", &mut report);
    let lr = take_positive_f64(doc, "lr", &mut report);
    let train_mode = take_train_mode(doc, &mut report);
    let com_augmentation = take_bool(doc, "COM_augmentation", &mut report);
    let num_validation_per_exp = take_u32(doc, "num_validation_per_exp", &mut report);
    let save_period = take_u32(doc, "save_period", &mut report);
    let data_split_seed = take_u64(doc, "data_split_seed", &mut report);

    let expval = take_bool(doc, "expval", &mut report);
    let net_type = take_identifier(doc, "net_type", &mut report);
    let n_channels_in = take_positive_u32(doc, "n_channels_in", &mut report);
    let n_channels_out = take_positive_u32(doc, "n_channels_out", &mut report);
    let new_n_channels_out = take_positive_u32(doc, "new_n_channels_out", &mut report);
    let n_views = take_positive_u32(doc, "n_views", &mut report);

    let metric = take_metrics(doc, &mut report);
    let loss = take_loss(doc, &mut report);

    let medfilt_window = take_medfilt_window(doc, &mut report);
    let rand_view_replace = take_bool(doc, "rand_view_replace", &mut report);
    let n_rand_views = take_u32(doc, "n_rand_views", &mut report);
    let mirror_augmentation = take_bool(doc, "mirror_augmentation", &mut report);
    let left_keypoints = take_index_list(doc, "left_keypoints", &mut report);
    let right_keypoints = take_index_list(doc, "right_keypoints", &mut report);
    let augment_hue = take_bool(doc, "augment_hue", &mut report);
    let augment_brightness = take_bool(doc, "augment_brightness", &mut report);
    let augment_bright_val = take_unit_f64(doc, "augment_bright_val", &mut report);

    let max_num_samples = take_max_num_samples(doc, &mut report);

    let extra = collect_extra(doc, strict, &mut report);

    // Cross-field invariants, gated on clean extraction of their inputs.
    if !report.mentions("vmin") && !report.mentions("vmax") && vmin >= vmax {
        report.push(Issue::invariant(
            "vmin",
            format!("vmin ({vmin}) must be < vmax ({vmax})"),
        ));
    }

    if !report.mentions("n_rand_views") && !report.mentions("n_views") && n_rand_views > n_views {
        report.push(Issue::invariant(
            "n_rand_views",
            format!("n_rand_views ({n_rand_views}) must not exceed n_views ({n_views})"),
        ));
    }

    let mirror = if report.mentions("left_keypoints")
        || report.mentions("right_keypoints")
        || report.mentions("n_channels_out")
    {
        None
    } else {
        match MirrorMap::new(&left_keypoints, &right_keypoints, n_channels_out as usize) {
            Ok(map) => Some(map),
            Err(err) => {
                report.push(Issue::invariant("left_keypoints", err.to_string()));
                None
            }
        }
    };

    match mirror {
        Some(mirror) if report.is_empty() => Ok(Config {
            io_config,
            camnames,
            random_seed,
            crop_height,
            crop_width,
            vmin,
            vmax,
            nvox,
            interp,
            batch_size,
            epochs,
            lr,
            train_mode,
            com_augmentation,
            num_validation_per_exp,
            save_period,
            data_split_seed,
            expval,
            net_type,
            n_channels_in,
            n_channels_out,
            new_n_channels_out,
            n_views,
            metric,
            loss,
            medfilt_window,
            rand_view_replace,
            n_rand_views,
            mirror_augmentation,
            left_keypoints,
            right_keypoints,
            augment_hue,
            augment_brightness,
            augment_bright_val,
            max_num_samples,
            mirror,
            extra,
        }),
        _ => Err(ConfigError::Validation(report)),
    }
}

fn get<'a>(doc: &'a Mapping, key: &str) -> Option<&'a Value> {
    doc.get(Value::from(key))
}

fn required<'a>(doc: &'a Mapping, key: &str, report: &mut ValidationReport) -> Option<&'a Value> {
    let value = get(doc, key);
    if value.is_none() {
        report.push(Issue::missing(key));
    }
    value
}

fn take_bool(doc: &Mapping, key: &str, report: &mut ValidationReport) -> bool {
    match required(doc, key, report) {
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            report.push(Issue::invalid(key, type_mismatch("boolean", other)));
            false
        }
        None => false,
    }
}

fn take_i64(doc: &Mapping, key: &str, report: &mut ValidationReport) -> i64 {
    match required(doc, key, report).map(Value::as_i64) {
        Some(Some(n)) => n,
        Some(None) => {
            report.push(Issue::invalid(key, "must be an integer"));
            0
        }
        None => 0,
    }
}

fn take_u32(doc: &Mapping, key: &str, report: &mut ValidationReport) -> u32 {
    match required(doc, key, report).map(Value::as_u64) {
        Some(Some(n)) if n <= u64::from(u32::MAX) => n as u32,
        Some(_) => {
            report.push(Issue::invalid(key, "must be a non-negative integer"));
            0
        }
        None => 0,
    }
}

fn take_u64(doc: &Mapping, key: &str, report: &mut ValidationReport) -> u64 {
    match required(doc, key, report).map(Value::as_u64) {
        Some(Some(n)) => n,
        Some(None) => {
            report.push(Issue::invalid(key, "must be a non-negative integer"));
            0
        }
        None => 0,
    }
}

fn take_positive_u32(doc: &Mapping, key: &str, report: &mut ValidationReport) -> u32 {
    match required(doc, key, report).map(Value::as_u64) {
        Some(Some(n)) if n > 0 && n <= u64::from(u32::MAX) => n as u32,
        Some(_) => {
            report.push(Issue::invalid(key, "must be a positive integer"));
            0
        }
        None => 0,
    }
}

fn take_f64(doc: &Mapping, key: &str, report: &mut ValidationReport) -> f64 {
    match required(doc, key, report).map(Value::as_f64) {
        Some(Some(x)) if x.is_finite() => x,
        Some(Some(x)) => {
            report.push(Issue::invalid(key, format!("must be a finite number, got {x}")));
            0.0
        }
        Some(None) => {
            report.push(Issue::invalid(key, "must be a number"));
            0.0
        }
        None => 0.0,
    }
}

fn take_positive_f64(doc: &Mapping, key: &str, report: &mut ValidationReport) -> f64 {
    let x = take_f64(doc, key, report);
    if !report.mentions(key) && !(x > 0.0) {
        report.push(Issue::invalid(key, format!("must be positive, got {x}")));
    }
    x
}

fn take_unit_f64(doc: &Mapping, key: &str, report: &mut ValidationReport) -> f64 {
    let x = take_f64(doc, key, report);
    if !report.mentions(key) && !(0.0..=1.0).contains(&x) {
        report.push(Issue::invalid(key, format!("must be in [0, 1], got {x}")));
    }
    x
}

fn take_string(doc: &Mapping, key: &str, report: &mut ValidationReport) -> String {
    match required(doc, key, report) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            report.push(Issue::invalid(key, type_mismatch("string", other)));
            String::new()
        }
        None => String::new(),
    }
}

fn take_identifier(doc: &Mapping, key: &str, report: &mut ValidationReport) -> String {
    let s = take_string(doc, key, report);
    if !report.mentions(key) && s.trim().is_empty() {
        report.push(Issue::invalid(key, "must be a non-empty identifier"));
    }
    s
}

fn take_interp(doc: &Mapping, report: &mut ValidationReport) -> Interp {
    let s = take_string(doc, "interp", report);
    if report.mentions("interp") {
        return Interp::Nearest;
    }
    match Interp::parse(&s) {
        Some(interp) => interp,
        None => {
            report.push(Issue::invalid(
                "interp",
                format!("unrecognized mode '{s}'; expected one of: nearest, linear"),
            ));
            Interp::Nearest
        }
    }
}

fn take_train_mode(doc: &Mapping, report: &mut ValidationReport) -> TrainMode {
    let s = take_string(doc, "train_mode", report);
    if report.mentions("train_mode") {
        return TrainMode::New;
    }
    match TrainMode::parse(&s) {
        Some(mode) => mode,
        None => {
            report.push(Issue::invalid(
                "train_mode",
                format!("unrecognized mode '{s}'; expected one of: new, resume, finetune"),
            ));
            TrainMode::New
        }
    }
}

fn take_camnames(doc: &Mapping, report: &mut ValidationReport) -> Vec<String> {
    let key = "camnames";
    let seq = match required(doc, key, report) {
        Some(Value::Sequence(seq)) => seq,
        Some(other) => {
            report.push(Issue::invalid(key, type_mismatch("sequence of strings", other)));
            return Vec::new();
        }
        None => return Vec::new(),
    };

    let mut names = Vec::with_capacity(seq.len());
    for item in seq {
        match item {
            Value::String(s) => names.push(s.clone()),
            other => {
                report.push(Issue::invalid(key, type_mismatch("string entry", other)));
                return Vec::new();
            }
        }
    }

    if names.is_empty() {
        report.push(Issue::invalid(key, "must list at least one camera"));
        return Vec::new();
    }

    let mut seen = HashSet::new();
    for name in &names {
        if !seen.insert(name.as_str()) {
            report.push(Issue::invalid(key, format!("duplicate camera name '{name}'")));
            return Vec::new();
        }
    }

    names
}

fn take_crop_pair(doc: &Mapping, key: &str, report: &mut ValidationReport) -> [i64; 2] {
    let seq = match required(doc, key, report) {
        Some(Value::Sequence(seq)) => seq,
        Some(other) => {
            report.push(Issue::invalid(key, type_mismatch("[min, max] pair", other)));
            return [0, 0];
        }
        None => return [0, 0],
    };

    let pair: Option<Vec<i64>> = seq.iter().map(Value::as_i64).collect();
    match pair.as_deref() {
        Some([min, max]) => {
            if *min < 0 || *max < 0 {
                report.push(Issue::invalid(key, "bounds must be non-negative"));
                [0, 0]
            } else if min >= max {
                report.push(Issue::invariant(
                    key,
                    format!("min ({min}) must be < max ({max})"),
                ));
                [0, 0]
            } else {
                [*min, *max]
            }
        }
        _ => {
            report.push(Issue::invalid(key, "must be a pair of two integers"));
            [0, 0]
        }
    }
}

fn take_index_list(doc: &Mapping, key: &str, report: &mut ValidationReport) -> Vec<usize> {
    let seq = match required(doc, key, report) {
        Some(Value::Sequence(seq)) => seq,
        Some(other) => {
            report.push(Issue::invalid(key, type_mismatch("sequence of indices", other)));
            return Vec::new();
        }
        None => return Vec::new(),
    };

    let indices: Option<Vec<u64>> = seq.iter().map(Value::as_u64).collect();
    match indices {
        Some(idxs) => idxs.into_iter().map(|i| i as usize).collect(),
        None => {
            report.push(Issue::invalid(key, "entries must be non-negative integers"));
            Vec::new()
        }
    }
}

fn take_metrics(doc: &Mapping, report: &mut ValidationReport) -> Vec<Metric> {
    let key = "metric";
    let seq = match required(doc, key, report) {
        Some(Value::Sequence(seq)) => seq,
        Some(other) => {
            report.push(Issue::invalid(key, type_mismatch("sequence of metric names", other)));
            return Vec::new();
        }
        None => return Vec::new(),
    };

    let mut metrics = Vec::with_capacity(seq.len());
    for item in seq {
        let name = match item {
            Value::String(s) => s.as_str(),
            other => {
                report.push(Issue::invalid(key, type_mismatch("metric name", other)));
                return Vec::new();
            }
        };
        match Metric::parse(name) {
            Some(metric) => metrics.push(metric),
            None => {
                report.push(Issue::invalid(
                    key,
                    format!(
                        "unrecognized metric '{name}'; expected one of: \
                         euclidean_distance_3D, centered_euclidean_distance_3D"
                    ),
                ));
                return Vec::new();
            }
        }
    }
    metrics
}

fn take_loss(doc: &Mapping, report: &mut ValidationReport) -> BTreeMap<String, LossTerm> {
    let key = "loss";
    let map = match required(doc, key, report) {
        Some(Value::Mapping(map)) => map,
        Some(other) => {
            report.push(Issue::invalid(key, type_mismatch("mapping of loss terms", other)));
            return BTreeMap::new();
        }
        None => return BTreeMap::new(),
    };

    if map.is_empty() {
        report.push(Issue::invalid(key, "must define at least one loss term"));
        return BTreeMap::new();
    }

    let mut terms = BTreeMap::new();
    for (name, value) in map {
        let Some(name) = name.as_str() else {
            report.push(Issue::invalid(key, "loss names must be strings"));
            return BTreeMap::new();
        };
        let term: LossTerm = match serde_yaml::from_value(value.clone()) {
            Ok(term) => term,
            Err(_) => {
                report.push(Issue::invalid(
                    key,
                    format!("loss '{name}' must carry a numeric loss_weight"),
                ));
                return BTreeMap::new();
            }
        };
        if term.loss_weight < 0.0 || !term.loss_weight.is_finite() {
            report.push(Issue::invalid(
                key,
                format!(
                    "loss '{name}' weight must be non-negative, got {}",
                    term.loss_weight
                ),
            ));
            return BTreeMap::new();
        }
        terms.insert(name.to_string(), term);
    }
    terms
}

fn take_medfilt_window(doc: &Mapping, report: &mut ValidationReport) -> u32 {
    let key = "medfilt_window";
    let window = take_positive_u32(doc, key, report);
    if !report.mentions(key) && window % 2 == 0 {
        report.push(Issue::invalid(
            key,
            format!("median filter window must be odd, got {window}"),
        ));
    }
    window
}

fn take_max_num_samples(doc: &Mapping, report: &mut ValidationReport) -> MaxNumSamples {
    let key = "max_num_samples";
    match required(doc, key, report) {
        Some(Value::String(s)) if s.eq_ignore_ascii_case(crate::MAX_SENTINEL) => {
            MaxNumSamples::Unbounded
        }
        Some(Value::String(s)) => {
            report.push(Issue::invalid(
                key,
                format!("must be a positive integer or the sentinel \"max\", got '{s}'"),
            ));
            MaxNumSamples::Unbounded
        }
        Some(value) => match value.as_u64() {
            Some(n) if n > 0 => MaxNumSamples::Limit(n),
            _ => {
                report.push(Issue::invalid(
                    key,
                    "must be a positive integer or the sentinel \"max\"",
                ));
                MaxNumSamples::Unbounded
            }
        },
        None => MaxNumSamples::Unbounded,
    }
}

fn collect_extra(
    doc: &Mapping,
    strict: bool,
    report: &mut ValidationReport,
) -> BTreeMap<String, serde_yaml::Value> {
    let mut extra = BTreeMap::new();
    for (key, value) in doc {
        let Some(name) = key.as_str() else {
            report.push(Issue::invalid(
                &format!("{key:?}"),
                "top-level keys must be strings",
            ));
            continue;
        };
        if KNOWN_KEYS.contains(&name) {
            continue;
        }
        if strict {
            report.push(Issue::unknown(name));
        } else {
            extra.insert(name.to_string(), value.clone());
        }
    }
    extra
}

fn type_mismatch(expected: &str, got: &Value) -> String {
    let got = match got {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    };
    format!("expected {expected}, got {got}")
}
