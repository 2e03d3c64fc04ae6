//! Configuration snapshots for reproducibility.
//!
//! Trained models are only reproducible together with the exact
//! configuration that produced them. A snapshot captures content hashes of
//! the primary and io documents plus a summary of the values that shape a
//! run, so a training result can later be matched to its configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::params::Config;

/// A frozen record of the configuration a run started from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Hostname where the snapshot was taken.
    #[serde(default)]
    pub hostname: Option<String>,

    /// Path of the primary document.
    pub primary_path: String,

    /// SHA-256 hash of the primary document's content.
    pub primary_hash: String,

    /// Path of the io_config document, if one was loaded.
    #[serde(default)]
    pub io_path: Option<String>,

    /// SHA-256 hash of the io_config document's content.
    #[serde(default)]
    pub io_hash: Option<String>,

    /// Combined hash of both documents (for quick comparison).
    pub combined_hash: String,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// The values that shape a training or prediction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub net_type: String,
    pub train_mode: String,
    pub nvox: u32,
    pub batch_size: u32,
    pub epochs: u32,
    pub n_views: u32,
    pub n_cameras: usize,
    pub n_channels_out: u32,
    pub expval: bool,
}

impl ConfigSnapshot {
    /// Create a snapshot from a loaded configuration and the document texts
    /// it was built from.
    pub fn new(
        config: &Config,
        primary_path: &Path,
        primary_text: &str,
        io_path: Option<&Path>,
        io_text: Option<&str>,
    ) -> Self {
        let primary_hash = hash_content(primary_text);
        let io_hash = io_text.map(hash_content);

        let combined = format!(
            "{}:{}",
            primary_hash,
            io_hash.as_deref().unwrap_or("none")
        );
        let combined_hash = hash_content(&combined);

        ConfigSnapshot {
            timestamp: Utc::now(),
            hostname: hostname::get()
                .ok()
                .map(|h| h.to_string_lossy().to_string()),
            primary_path: primary_path.display().to_string(),
            primary_hash,
            io_path: io_path.map(|p| p.display().to_string()),
            io_hash,
            combined_hash,
            summary: ConfigSummary::from_config(config),
        }
    }

    /// Serialize the snapshot to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether two snapshots were taken from identical documents.
    pub fn matches(&self, other: &ConfigSnapshot) -> bool {
        self.combined_hash == other.combined_hash
    }

    /// Short identifier for logs and filenames.
    pub fn short_id(&self) -> &str {
        &self.combined_hash[..12.min(self.combined_hash.len())]
    }
}

impl ConfigSummary {
    fn from_config(config: &Config) -> Self {
        ConfigSummary {
            net_type: config.net_type.clone(),
            train_mode: config.train_mode.as_str().to_string(),
            nvox: config.nvox,
            batch_size: config.batch_size,
            epochs: config.epochs,
            n_views: config.n_views,
            n_cameras: config.n_cameras(),
            n_channels_out: config.n_channels_out,
            expval: config.expval,
        }
    }
}

/// Hash content with SHA-256 and return a hex string.
fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_content_deterministic() {
        let a = hash_content("nvox: 80");
        let b = hash_content("nvox: 80");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_combined_hash_differs_by_io_text() {
        // Same primary text, different io text: combined hashes diverge.
        let p = hash_content("primary");
        let c1 = hash_content(&format!("{p}:{}", hash_content("io-a")));
        let c2 = hash_content(&format!("{p}:{}", hash_content("io-b")));
        assert_ne!(c1, c2);
    }
}
