//! Error types for the lock engine and its configuration.
//!
//! Library code returns these typed errors; the replay driver and the binary
//! wrap them in `anyhow` with context.

use thiserror::Error;

use crate::detection::BoundingBox;

/// A detection that cannot be turned into a feature vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("bounding box has non-finite coordinates: {0:?}")]
    NonFinite(BoundingBox),

    #[error("bounding box has negative extent (width={width}, height={height})")]
    NegativeArea { width: f64, height: f64 },

    #[error("frame has zero pixel area ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("anomaly model queried before it was fitted")]
    NotFitted,

    #[error("cannot fit anomaly model on an empty history")]
    EmptyTrainingSet,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}
