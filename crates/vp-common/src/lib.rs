//! Volpose shared types.
//!
//! This crate provides:
//! - The configuration error taxonomy with stable error codes
//! - The aggregate validation report used by the loader
//! - The left/right keypoint mirror map used for mirror augmentation

pub mod error;
pub mod mirror;

pub use error::{ConfigError, Issue, IssueKind, ValidationReport};
pub use mirror::MirrorMap;
