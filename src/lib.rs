//! Target-lock decision engine.
//!
//! Consumes per-frame tracker output (track id + bounding box) and decides
//! which tracks to flag as targets. A track locks when its box covers more
//! than a configured share of the frame, or when an isolation forest fitted
//! once on the scene's observed object sizes marks it as unusual. A lock
//! then holds for a fixed number of observed frames.

pub mod anomaly;
pub mod config;
pub mod detection;
pub mod engine;
pub mod error;
pub mod features;
pub mod logging;
pub mod replay;

pub use crate::anomaly::{AnomalyDetector, AnomalyModel, IsolationForest};
pub use crate::config::{load_config, AppConfig, LockConfig, LoggingConfig};
pub use crate::detection::{BoundingBox, Detection, FrameSize, TrackId};
pub use crate::engine::{EngineStats, FrameDecisions, LockDecision, LockEngine, LockStatus};
pub use crate::error::{ConfigError, FeatureError, ModelError};
pub use crate::features::{extract_features, FeatureHistory, FeatureVector, HISTORY_CAPACITY};
