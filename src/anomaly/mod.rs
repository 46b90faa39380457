//! Size-anomaly detection
//!
//! `AnomalyDetector` owns the scene-wide feature history and a single model
//! that is trained once, the first time enough history has accumulated, and
//! is only queried afterwards. Later observations still enter the history
//! but never retrain the model.

mod isolation_forest;

pub use isolation_forest::{IsolationForest, DEFAULT_SEED};

use tracing::{info, warn};

use crate::error::ModelError;
use crate::features::{FeatureHistory, FeatureVector, HISTORY_CAPACITY};

/// Trait for anomaly models
pub trait AnomalyModel {
    /// Train on a snapshot of observed features
    fn fit(&mut self, data: &[FeatureVector]) -> Result<(), ModelError>;

    /// Anomaly score (higher = more anomalous)
    fn score(&self, sample: &FeatureVector) -> Result<f64, ModelError>;

    fn is_anomalous(&self, sample: &FeatureVector) -> Result<bool, ModelError>;

    fn is_fitted(&self) -> bool;

    fn name(&self) -> &str;
}

/// Feature history plus a fit-once model.
#[derive(Debug, Clone)]
pub struct AnomalyDetector<M: AnomalyModel = IsolationForest> {
    history: FeatureHistory,
    model: M,
    min_samples: usize,
    fitted: bool,
}

impl AnomalyDetector<IsolationForest> {
    pub fn new(min_samples: usize, contamination: f64) -> Self {
        Self::with_model(IsolationForest::new(contamination, DEFAULT_SEED), min_samples)
    }
}

impl<M: AnomalyModel> AnomalyDetector<M> {
    pub fn with_model(model: M, min_samples: usize) -> Self {
        Self {
            history: FeatureHistory::new(HISTORY_CAPACITY),
            model,
            min_samples,
            fitted: false,
        }
    }

    pub fn observe(&mut self, feature: FeatureVector) {
        self.history.push(feature);
    }

    /// Fits the model on the current history the first time it holds at least
    /// `min_samples` entries. Returns `true` only for the call that fitted.
    pub fn maybe_fit(&mut self) -> bool {
        if self.fitted || self.history.is_empty() || self.history.len() < self.min_samples {
            return false;
        }

        match self.model.fit(&self.history.snapshot()) {
            Ok(()) => {
                self.fitted = true;
                info!(
                    "Anomaly model '{}' fitted on {} observations",
                    self.model.name(),
                    self.history.len()
                );
                true
            }
            Err(e) => {
                warn!("Anomaly model fit failed: {}", e);
                false
            }
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn is_anomalous(&self, feature: &FeatureVector) -> Result<bool, ModelError> {
        if !self.fitted {
            return Err(ModelError::NotFitted);
        }
        self.model.is_anomalous(feature)
    }

    pub fn history(&self) -> &FeatureHistory {
        &self.history
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}
