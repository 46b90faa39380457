//! Per-frame tracker output handed to the lock engine.
//!
//! Detections are produced by an external detector/tracker (YOLO-style
//! `track` output). The engine only reads the track id and the box; label and
//! confidence travel along for consumers that draw the result.

use serde::{Deserialize, Serialize};

/// Stable object handle assigned by the external tracker.
pub type TrackId = i64;

/// Axis-aligned box in pixel coordinates, `(x1, y1)` top-left and `(x2, y2)`
/// bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        f64::from(self.x2) - f64::from(self.x1)
    }

    pub fn height(&self) -> f64 {
        f64::from(self.y2) - f64::from(self.y1)
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Pixel dimensions of the frame the detections came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        f64::from(self.width) * f64::from(self.height)
    }
}

/// One tracked object in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub track_id: TrackId,
    pub bbox: BoundingBox,
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(track_id: TrackId, bbox: BoundingBox) -> Self {
        Self {
            track_id,
            bbox,
            label: String::new(),
            confidence: 1.0,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>, confidence: f32) -> Self {
        self.label = label.into();
        self.confidence = confidence;
        self
    }
}
