//! Document loading and merging.
//!
//! A primary YAML document names a secondary one through its `io_config`
//! key. The secondary is resolved relative to the primary's directory,
//! loaded, and merged underneath: the primary wins on conflict, the
//! secondary only fills gaps. Exactly one level of indirection is allowed.

use crate::params::Config;
use crate::snapshot::ConfigSnapshot;
use crate::validate::validate_document;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vp_common::ConfigError;

/// Loader behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Reject unrecognized top-level keys instead of preserving them.
    pub strict: bool,
}

/// Load, merge, and validate a configuration.
///
/// Equivalent to [`load_with`] with default [`LoadOptions`].
pub fn load(primary_path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    load_with(primary_path, LoadOptions::default())
}

/// Load, merge, and validate a configuration with explicit options.
pub fn load_with(
    primary_path: impl AsRef<Path>,
    options: LoadOptions,
) -> Result<Config, ConfigError> {
    load_documents(primary_path.as_ref())?.finish(options)
}

/// Load a configuration and capture a [`ConfigSnapshot`] of the documents
/// it was built from.
pub fn load_with_snapshot(
    primary_path: impl AsRef<Path>,
    options: LoadOptions,
) -> Result<(Config, ConfigSnapshot), ConfigError> {
    let docs = load_documents(primary_path.as_ref())?;
    let snapshot_input = docs.snapshot_input();
    let config = docs.finish(options)?;
    let snapshot = ConfigSnapshot::new(
        &config,
        &snapshot_input.primary_path,
        &snapshot_input.primary_text,
        snapshot_input.io_path.as_deref(),
        snapshot_input.io_text.as_deref(),
    );
    Ok((config, snapshot))
}

/// Raw documents read from disk, before validation.
struct LoadedDocuments {
    primary_path: PathBuf,
    primary_text: String,
    primary: Mapping,
    io_path: Option<PathBuf>,
    io_text: Option<String>,
    io: Option<Mapping>,
}

struct SnapshotInput {
    primary_path: PathBuf,
    primary_text: String,
    io_path: Option<PathBuf>,
    io_text: Option<String>,
}

impl LoadedDocuments {
    fn snapshot_input(&self) -> SnapshotInput {
        SnapshotInput {
            primary_path: self.primary_path.clone(),
            primary_text: self.primary_text.clone(),
            io_path: self.io_path.clone(),
            io_text: self.io_text.clone(),
        }
    }

    /// Merge (primary wins) and validate.
    fn finish(self, options: LoadOptions) -> Result<Config, ConfigError> {
        let mut merged = self.io.unwrap_or_default();
        for (key, value) in self.primary {
            merged.insert(key, value);
        }
        debug!(keys = merged.len(), "merged configuration documents");

        let config = validate_document(&merged, options.strict)?;
        info!(
            primary = %self.primary_path.display(),
            cameras = config.n_cameras(),
            net_type = %config.net_type,
            "configuration loaded"
        );
        Ok(config)
    }
}

fn load_documents(primary_path: &Path) -> Result<LoadedDocuments, ConfigError> {
    debug!(path = %primary_path.display(), "reading primary document");
    let primary_text = read_file(primary_path)?;
    let primary = parse_mapping(primary_path, &primary_text)?;

    // io_config may be absent or mistyped; validation reports that with the
    // rest of the problems. The secondary is only fetched when the key is a
    // usable string.
    let io_ref = primary
        .get(Value::from("io_config"))
        .and_then(Value::as_str)
        .map(str::to_owned);

    let (io_path, io_text, io) = match io_ref {
        Some(reference) => {
            let resolved = resolve_reference(primary_path, &reference);
            if !resolved.is_file() {
                return Err(ConfigError::MissingReference {
                    path: resolved.display().to_string(),
                });
            }
            debug!(path = %resolved.display(), "reading io_config document");
            let text = read_file(&resolved)?;
            let doc = parse_mapping(&resolved, &text)?;
            if doc.contains_key(Value::from("io_config")) {
                return Err(ConfigError::NestedReference {
                    path: resolved.display().to_string(),
                });
            }
            (Some(resolved), Some(text), Some(doc))
        }
        None => (None, None, None),
    };

    Ok(LoadedDocuments {
        primary_path: primary_path.to_path_buf(),
        primary_text,
        primary,
        io_path,
        io_text,
        io,
    })
}

/// Resolve an `io_config` reference relative to the primary's directory.
fn resolve_reference(primary_path: &Path, reference: &str) -> PathBuf {
    let reference = Path::new(reference);
    if reference.is_absolute() {
        return reference.to_path_buf();
    }
    match primary_path.parent() {
        Some(dir) => dir.join(reference),
        None => reference.to_path_buf(),
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn parse_mapping(path: &Path, text: &str) -> Result<Mapping, ConfigError> {
    let value: Value = serde_yaml::from_str(text).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    match value {
        Value::Mapping(map) => Ok(map),
        other => Err(ConfigError::Parse {
            path: path.display().to_string(),
            message: format!(
                "top level must be a mapping of keys to values, got {}",
                match other {
                    Value::Null => "an empty document",
                    Value::Sequence(_) => "a sequence",
                    _ => "a scalar",
                }
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_reference() {
        let resolved = resolve_reference(Path::new("/exp/rat1/dannce_config.yaml"), "io.yaml");
        assert_eq!(resolved, PathBuf::from("/exp/rat1/io.yaml"));
    }

    #[test]
    fn test_resolve_absolute_reference() {
        let resolved = resolve_reference(Path::new("/exp/rat1/config.yaml"), "/shared/io.yaml");
        assert_eq!(resolved, PathBuf::from("/shared/io.yaml"));
    }

    #[test]
    fn test_parse_rejects_non_mapping() {
        let err = parse_mapping(Path::new("x.yaml"), "- 1\n- 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.code(), 61);
    }

    #[test]
    fn test_parse_rejects_malformed_yaml() {
        let err = parse_mapping(Path::new("x.yaml"), "a: [1, 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
