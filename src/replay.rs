//! Replay a recorded tracker stream through a lock engine.
//!
//! Input is JSON lines, one frame per line:
//!
//! ```text
//! {"frame": 1, "width": 1920, "height": 1080,
//!  "detections": [{"track_id": 3, "bbox": [10, 20, 110, 220], "label": "car", "confidence": 0.91}]}
//! ```
//!
//! Detections without a `track_id` were not picked up by the tracker and are
//! not handed to the engine. Output is one JSON line per frame with the
//! decisions keyed by track id.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::anomaly::AnomalyModel;
use crate::detection::{BoundingBox, Detection, FrameSize, TrackId};
use crate::engine::{FrameDecisions, LockEngine};

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionRecord {
    #[serde(default)]
    pub track_id: Option<TrackId>,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrameRecord {
    #[serde(default)]
    pub frame: Option<u64>,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub detections: Vec<DetectionRecord>,
}

impl FrameRecord {
    pub fn frame_size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// Detections the tracker assigned an id to.
    pub fn tracked_detections(&self) -> Vec<Detection> {
        self.detections
            .iter()
            .filter_map(|d| {
                d.track_id
                    .map(|id| Detection::new(id, d.bbox).with_label(d.label.clone(), d.confidence))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameOutput {
    pub frame: u64,
    pub decisions: FrameDecisions,
}

/// Totals for one replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub frames: u64,
    pub untracked_detections: u64,
    pub locked_decisions: u64,
    pub peak_active_locks: usize,
}

/// Feed every frame in `reader` through `engine`, writing decisions to `writer`.
pub fn replay<M, R, W>(engine: &mut LockEngine<M>, reader: R, mut writer: W) -> Result<ReplaySummary>
where
    M: AnomalyModel,
    R: BufRead,
    W: Write,
{
    let mut summary = ReplaySummary::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_no))?;
        if line.trim().is_empty() {
            continue;
        }

        let record: FrameRecord = serde_json::from_str(&line)
            .with_context(|| format!("Invalid frame record on line {}", line_no))?;

        summary.frames += 1;
        let frame = record.frame.unwrap_or(summary.frames);
        let detections = record.tracked_detections();
        let untracked = record.detections.len() - detections.len();
        if untracked > 0 {
            summary.untracked_detections += untracked as u64;
            debug!("Frame {}: {} detection(s) without track id", frame, untracked);
        }

        let decisions = engine.update_locks(&detections, record.frame_size());
        summary.locked_decisions += decisions.values().filter(|d| d.locked).count() as u64;
        summary.peak_active_locks = summary.peak_active_locks.max(engine.active_locks());

        serde_json::to_writer(&mut writer, &FrameOutput { frame, decisions })
            .with_context(|| format!("Failed to write decisions for frame {}", frame))?;
        writer.write_all(b"\n")?;
    }

    writer.flush()?;

    let stats = engine.stats();
    info!(
        "Replay finished: frames={} size_locks={} anomaly_locks={} rejected={} model_fitted={}",
        summary.frames,
        stats.size_locks,
        stats.anomaly_locks,
        stats.detections_rejected,
        engine.is_model_fitted()
    );

    Ok(summary)
}
