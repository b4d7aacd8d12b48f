//! Local statistic provider contract
//!
//! The cluster engine does not compute local spatial statistics (local
//! Gi*, local Si*, ...) itself; it consumes them through
//! [`LocalStatisticProvider`]. Per-feature scores are computed once per
//! run before seed ranking; the regional score is recomputed over the
//! growing region at every growth step and drives the acceptance
//! criterion.

use std::collections::BTreeMap;

use ecotope_core::{Error, FeatureCollection, FeatureId, Result};

use crate::weights::WeightsMatrix;

/// Read-only inputs handed to a statistic provider.
pub struct ScoreContext<'a> {
    pub weights: &'a WeightsMatrix,
    /// Target attribute value per feature
    pub values: &'a BTreeMap<FeatureId, f64>,
}

/// A pluggable source of local and regional statistics.
///
/// Implementations must be pure with respect to the context: the engine
/// may evaluate `regional_score` concurrently for several candidate
/// regions and combines the results deterministically.
pub trait LocalStatisticProvider: Send + Sync {
    /// One score per feature, computed once per run. Must cover every
    /// feature in the weights matrix.
    fn local_scores(&self, ctx: &ScoreContext<'_>) -> Result<BTreeMap<FeatureId, f64>>;

    /// The statistic recomputed over `members` as one region.
    fn regional_score(&self, ctx: &ScoreContext<'_>, members: &[FeatureId]) -> Result<f64>;
}

/// Bridge for scores computed by an external statistic service.
///
/// Wraps a ready-made per-feature score map (e.g. z-scores written by a
/// separate Gi* computation); the regional score is the mean of the
/// member scores, which is what the growth criterion then tests.
#[derive(Debug, Clone)]
pub struct PrecomputedScores {
    scores: BTreeMap<FeatureId, f64>,
}

impl PrecomputedScores {
    pub fn new(scores: BTreeMap<FeatureId, f64>) -> Self {
        Self { scores }
    }

    /// Read the score of every feature from a numeric attribute.
    pub fn from_attribute(features: &FeatureCollection, attribute: &str) -> Result<Self> {
        let mut scores = BTreeMap::new();
        for f in features.iter() {
            let value = match f.get_property(attribute) {
                None => {
                    return Err(Error::UnknownAttribute(format!(
                        "{} (feature {})",
                        attribute, f.id
                    )))
                }
                Some(v) => v.as_f64().ok_or_else(|| Error::NonNumericAttribute {
                    feature: f.id.clone(),
                    attribute: attribute.to_string(),
                })?,
            };
            scores.insert(f.id.clone(), value);
        }
        Ok(Self { scores })
    }
}

impl LocalStatisticProvider for PrecomputedScores {
    fn local_scores(&self, ctx: &ScoreContext<'_>) -> Result<BTreeMap<FeatureId, f64>> {
        for id in ctx.weights.ids() {
            if !self.scores.contains_key(id) {
                return Err(Error::Configuration(format!(
                    "no precomputed score for feature {}",
                    id
                )));
            }
        }
        Ok(self.scores.clone())
    }

    fn regional_score(&self, _ctx: &ScoreContext<'_>, members: &[FeatureId]) -> Result<f64> {
        if members.is_empty() {
            return Err(Error::Algorithm("regional score of an empty region".into()));
        }
        let mut sum = 0.0;
        for id in members {
            sum += self.scores.get(id).ok_or_else(|| {
                Error::Algorithm(format!("no score for region member {}", id))
            })?;
        }
        Ok(sum / members.len() as f64)
    }
}
