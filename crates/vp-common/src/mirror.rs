//! Left/right keypoint mirror map.
//!
//! Mirror augmentation flips an image horizontally and must relabel
//! left-side keypoints as right-side ones and vice versa. The map is a
//! total function over keypoint indices: paired indices swap, everything
//! else (midline keypoints such as the spine) maps to itself.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a mirror map could not be built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MirrorMapError {
    #[error("left and right keypoint lists have different lengths ({left} vs {right})")]
    LengthMismatch { left: usize, right: usize },

    #[error("keypoint {0} appears on both sides")]
    Overlap(usize),

    #[error("keypoint {index} is out of range for {n_keypoints} keypoints")]
    OutOfRange { index: usize, n_keypoints: usize },
}

/// A validated swap table over keypoint indices `0..n_keypoints`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorMap {
    n_keypoints: usize,
    table: Vec<usize>,
}

impl MirrorMap {
    /// Build a mirror map from paired left/right index lists.
    ///
    /// `left[i]` swaps with `right[i]`. The lists must be the same length,
    /// disjoint, duplicate-free, and every index must be below
    /// `n_keypoints`.
    pub fn new(
        left: &[usize],
        right: &[usize],
        n_keypoints: usize,
    ) -> Result<Self, MirrorMapError> {
        if left.len() != right.len() {
            return Err(MirrorMapError::LengthMismatch {
                left: left.len(),
                right: right.len(),
            });
        }

        for &idx in left.iter().chain(right.iter()) {
            if idx >= n_keypoints {
                return Err(MirrorMapError::OutOfRange {
                    index: idx,
                    n_keypoints,
                });
            }
        }

        let mut table: Vec<usize> = (0..n_keypoints).collect();
        for (&l, &r) in left.iter().zip(right.iter()) {
            if l == r {
                return Err(MirrorMapError::Overlap(l));
            }
            // A repeated index within one side, or an index shared across
            // sides, shows up as a slot that was already remapped.
            if table[l] != l {
                return Err(MirrorMapError::Overlap(l));
            }
            if table[r] != r {
                return Err(MirrorMapError::Overlap(r));
            }
            table[l] = r;
            table[r] = l;
        }

        Ok(MirrorMap { n_keypoints, table })
    }

    /// The mirrored index for `idx`; identity for midline keypoints.
    pub fn swap(&self, idx: usize) -> usize {
        self.table[idx]
    }

    /// Total number of keypoints the map covers.
    pub fn n_keypoints(&self) -> usize {
        self.n_keypoints
    }

    /// Apply the map to a full pose, reordering keypoint slots in place.
    pub fn permute<T: Copy>(&self, pose: &mut [T]) {
        debug_assert_eq!(pose.len(), self.n_keypoints);
        let original: Vec<T> = pose.to_vec();
        for (idx, slot) in pose.iter_mut().enumerate() {
            *slot = original[self.table[idx]];
        }
    }
}
