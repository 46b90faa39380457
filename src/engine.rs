//! Lock Decision Engine: per-frame target locking for tracked objects
//!
//! Each frame:
//!   1. every detection's normalised area is extracted and appended to the
//!      scene-wide history (malformed boxes are dropped here)
//!   2. the anomaly model is fitted if the history just became large enough
//!   3. each track is either counting down an active lock, or evaluated
//!      against the size trigger and then the anomaly trigger
//!
//! A lock holds for `lock_duration_frames` observations of the track no
//! matter what the track does meanwhile. Frames where the track is absent do
//! not advance its countdown.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::anomaly::{AnomalyDetector, AnomalyModel, IsolationForest, DEFAULT_SEED};
use crate::config::LockConfig;
use crate::detection::{Detection, FrameSize, TrackId};
use crate::features::{extract_features, FeatureVector};

// ─── Output types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockStatus {
    Scanning,
    TargetSize,
    Anomaly,
    /// Active lock with this many observed frames left.
    Locked(u32),
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStatus::Scanning => f.write_str("SCANNING"),
            LockStatus::TargetSize => f.write_str("TARGET (SIZE)"),
            LockStatus::Anomaly => f.write_str("ANOMALY"),
            LockStatus::Locked(remaining) => write!(f, "LOCKED ({})", remaining),
        }
    }
}

impl Serialize for LockStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Decision for one track in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockDecision {
    pub locked: bool,
    pub status: LockStatus,
}

impl LockDecision {
    fn scanning() -> Self {
        Self {
            locked: false,
            status: LockStatus::Scanning,
        }
    }

    fn locked(status: LockStatus) -> Self {
        Self { locked: true, status }
    }
}

/// Decisions for every track present in a frame, ordered by track id.
pub type FrameDecisions = BTreeMap<TrackId, LockDecision>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub frames: u64,
    pub detections_evaluated: u64,
    pub detections_rejected: u64,
    pub size_locks: u64,
    pub anomaly_locks: u64,
    pub expired_locks: u64,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Owns all per-stream state. One instance per video stream; frames must be
/// fed in order.
pub struct LockEngine<M: AnomalyModel = IsolationForest> {
    config: LockConfig,
    detector: AnomalyDetector<M>,
    /// track id → observed frames left before the lock releases (always > 0)
    lock_timers: HashMap<TrackId, u32>,
    stats: EngineStats,
}

impl LockEngine<IsolationForest> {
    pub fn new(config: LockConfig) -> Self {
        let model = IsolationForest::new(config.contamination, DEFAULT_SEED);
        Self::with_model(config, model)
    }
}

impl<M: AnomalyModel> LockEngine<M> {
    pub fn with_model(config: LockConfig, model: M) -> Self {
        let detector = AnomalyDetector::with_model(model, config.anomaly_buffer_size);
        Self {
            config,
            detector,
            lock_timers: HashMap::new(),
            stats: EngineStats::default(),
        }
    }

    /// Process one frame of tracked detections.
    pub fn update_locks(&mut self, detections: &[Detection], frame: FrameSize) -> FrameDecisions {
        self.stats.frames += 1;

        let mut features: Vec<(TrackId, FeatureVector)> = Vec::with_capacity(detections.len());
        for det in detections {
            match extract_features(&det.bbox, frame) {
                Ok(feature) => {
                    self.detector.observe(feature);
                    features.push((det.track_id, feature));
                }
                Err(e) => {
                    self.stats.detections_rejected += 1;
                    warn!("Track {} skipped this frame: {}", det.track_id, e);
                }
            }
        }

        self.detector.maybe_fit();

        let mut decisions = FrameDecisions::new();
        for (track_id, feature) in features {
            self.stats.detections_evaluated += 1;
            let decision = self.evaluate(track_id, &feature);
            decisions.insert(track_id, decision);
        }
        decisions
    }

    fn evaluate(&mut self, track_id: TrackId, feature: &FeatureVector) -> LockDecision {
        if let Some(remaining) = self.lock_timers.get_mut(&track_id) {
            *remaining = remaining.saturating_sub(1);
            let left = *remaining;
            if left > 0 {
                return LockDecision::locked(LockStatus::Locked(left));
            }
            self.lock_timers.remove(&track_id);
            self.stats.expired_locks += 1;
            debug!("Track {} lock expired, re-evaluating", track_id);
        }

        let status = if feature.normalized_area() > self.config.size_threshold {
            LockStatus::TargetSize
        } else if self.detector.is_fitted() && self.flags_anomaly(track_id, feature) {
            LockStatus::Anomaly
        } else {
            return LockDecision::scanning();
        };

        match status {
            LockStatus::TargetSize => self.stats.size_locks += 1,
            _ => self.stats.anomaly_locks += 1,
        }
        self.lock_timers
            .insert(track_id, self.config.lock_duration_frames.max(1));
        debug!(
            "Track {} locked: {} (area={:.4})",
            track_id,
            status,
            feature.normalized_area()
        );

        LockDecision::locked(status)
    }

    fn flags_anomaly(&self, track_id: TrackId, feature: &FeatureVector) -> bool {
        match self.detector.is_anomalous(feature) {
            Ok(flagged) => flagged,
            Err(e) => {
                warn!("Track {}: anomaly check skipped: {}", track_id, e);
                false
            }
        }
    }

    pub fn is_model_fitted(&self) -> bool {
        self.detector.is_fitted()
    }

    pub fn history_len(&self) -> usize {
        self.detector.history().len()
    }

    /// Frames left on the track's lock, `None` when unlocked.
    pub fn lock_remaining(&self, track_id: TrackId) -> Option<u32> {
        self.lock_timers.get(&track_id).copied()
    }

    pub fn active_locks(&self) -> usize {
        self.lock_timers.len()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }
}
