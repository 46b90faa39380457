//! Feature extraction and the shared rolling feature history.
//!
//! The only feature is the normalised box area. History is scene-wide, not
//! per-track: it models the typical object size the camera sees.

use std::collections::VecDeque;

use crate::detection::{BoundingBox, FrameSize};
use crate::error::FeatureError;

/// Number of scalar features per vector.
pub const FEATURE_DIM: usize = 1;

/// Maximum number of feature vectors kept in history.
pub const HISTORY_CAPACITY: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_DIM],
}

impl FeatureVector {
    pub fn from_normalized_area(area: f64) -> Self {
        Self { values: [area] }
    }

    pub fn normalized_area(&self) -> f64 {
        self.values[0]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

/// Normalised area of `bbox` relative to `frame`.
///
/// Zero-area boxes give `0.0`. Boxes reaching past the frame edge are not
/// clipped, so the value can exceed `1.0` for oversized boxes.
pub fn extract_features(bbox: &BoundingBox, frame: FrameSize) -> Result<FeatureVector, FeatureError> {
    if !bbox.is_finite() {
        return Err(FeatureError::NonFinite(*bbox));
    }

    let (width, height) = (bbox.width(), bbox.height());
    if width < 0.0 || height < 0.0 {
        return Err(FeatureError::NegativeArea { width, height });
    }

    let frame_area = frame.area();
    if frame_area <= 0.0 {
        return Err(FeatureError::EmptyFrame {
            width: frame.width,
            height: frame.height,
        });
    }

    Ok(FeatureVector::from_normalized_area(width * height / frame_area))
}

/// Bounded FIFO of feature vectors; oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct FeatureHistory {
    buf: VecDeque<FeatureVector>,
    capacity: usize,
}

impl FeatureHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, feature: FeatureVector) {
        if self.capacity == 0 {
            return;
        }
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(feature);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureVector> {
        self.buf.iter()
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<FeatureVector> {
        self.buf.iter().copied().collect()
    }
}

impl Default for FeatureHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}
