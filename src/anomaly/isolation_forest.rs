//! Isolation forest over feature vectors.
//!
//! Anomalies are points that random axis-aligned splits isolate in few steps.
//! Each tree is grown on a random subsample; the anomaly score of a point is
//! `2^(-E[h(x)] / c(psi))` where `h` is the path length and `c(psi)` the
//! average unsuccessful-search length of a BST with `psi` nodes. The decision
//! threshold is the `1 - contamination` quantile of the training scores.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::AnomalyModel;
use crate::error::ModelError;
use crate::features::FeatureVector;

const N_TREES: usize = 100;
const MAX_SAMPLES: usize = 256;
pub const DEFAULT_SEED: u64 = 42;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated quantile of an ascending slice, `q` in `[0, 1]`.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn grow(points: Vec<&[f64]>, dim: usize, depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
        let size = points.len();
        if depth >= max_depth || size <= 1 {
            return Node::Leaf { size };
        }

        let feature = rng.gen_range(0..dim);
        let (min, max) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[feature]), hi.max(p[feature]))
            });
        if max <= min {
            return Node::Leaf { size };
        }

        let threshold = rng.gen_range(min..max);
        let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
            points.into_iter().partition(|p| p[feature] < threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(Self::grow(left, dim, depth + 1, max_depth, rng)),
            right: Box::new(Self::grow(right, dim, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, sample: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] < *threshold { &**left } else { &**right };
                    depth += 1.0;
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    trees: Vec<IsolationTree>,
    /// `c(psi)` for the subsample size the trees were grown on.
    normalizer: f64,
    threshold: f64,
}

impl Fitted {
    fn score(&self, sample: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.path_length(sample)).sum();
        let mean = total / self.trees.len() as f64;
        2f64.powf(-mean / self.normalizer)
    }
}

/// Seeded isolation forest. Fitting the same snapshot with the same seed
/// always produces the same forest.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    contamination: f64,
    seed: u64,
    fitted: Option<Fitted>,
}

impl IsolationForest {
    pub fn new(contamination: f64, seed: u64) -> Self {
        Self {
            contamination,
            seed,
            fitted: None,
        }
    }

    /// Score above which a sample counts as anomalous, once fitted.
    pub fn threshold(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.threshold)
    }

    fn fitted(&self) -> Result<&Fitted, ModelError> {
        self.fitted.as_ref().ok_or(ModelError::NotFitted)
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new(0.05, DEFAULT_SEED)
    }
}

impl AnomalyModel for IsolationForest {
    fn fit(&mut self, data: &[FeatureVector]) -> Result<(), ModelError> {
        if data.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }

        let n = data.len();
        let dim = data[0].as_slice().len();
        let subsample = MAX_SAMPLES.min(n);
        let max_depth = (subsample.max(2) as f64).log2().ceil() as usize;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let trees: Vec<IsolationTree> = (0..N_TREES)
            .map(|_| {
                let points: Vec<&[f64]> = index::sample(&mut rng, n, subsample)
                    .iter()
                    .map(|i| data[i].as_slice())
                    .collect();
                IsolationTree {
                    root: IsolationTree::grow(points, dim, 0, max_depth, &mut rng),
                }
            })
            .collect();

        let normalizer = match average_path_length(subsample) {
            c if c > 0.0 => c,
            _ => 1.0,
        };

        let mut fitted = Fitted {
            trees,
            normalizer,
            threshold: f64::INFINITY,
        };

        let mut scores: Vec<f64> = data.iter().map(|s| fitted.score(s.as_slice())).collect();
        scores.sort_by(|a, b| a.total_cmp(b));
        fitted.threshold = quantile(&scores, 1.0 - self.contamination);

        debug!(
            "Isolation forest fitted: samples={} subsample={} max_depth={} threshold={:.4}",
            n, subsample, max_depth, fitted.threshold
        );

        self.fitted = Some(fitted);
        Ok(())
    }

    fn score(&self, sample: &FeatureVector) -> Result<f64, ModelError> {
        Ok(self.fitted()?.score(sample.as_slice()))
    }

    fn is_anomalous(&self, sample: &FeatureVector) -> Result<bool, ModelError> {
        let fitted = self.fitted()?;
        Ok(fitted.score(sample.as_slice()) > fitted.threshold)
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn name(&self) -> &str {
        "isolation-forest"
    }
}
