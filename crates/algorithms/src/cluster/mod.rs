//! AMOEBA cluster detection
//!
//! A Multidirectional Optimal Ecotope-Based Algorithm: grows spatially
//! contiguous clusters from ranked seed features over a spatial weights
//! matrix, admitting one neighbor at a time while a statistical acceptance
//! criterion holds, and resolves overlaps between clusters discovered from
//! different seeds.
//!
//! Reference:
//! Aldstadt, J. & Getis, A. (2006). Using AMOEBA to create a spatial
//! weights matrix and identify spatial clusters. Geographical Analysis,
//! 38(4).

mod criterion;
mod grow;
mod resolve;
mod seed;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use ecotope_core::{
    Algorithm, CancelToken, Error, Feature, FeatureCollection, FeatureId, Result,
};

use crate::stats::{LocalStatisticProvider, PrecomputedScores, ScoreContext};
use crate::weights::WeightsMatrix;

pub use criterion::{Criterion, ScorePredicate};
pub use seed::{rank_seeds, SeedEntry, SeedOption, SeedOrdering};

use grow::{grow_region, GrowContext};
use resolve::ClusterResolver;

/// Policy for regions that overlap an earlier cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Overlap {
    /// Discard the whole later region
    Remove,
    /// Strip the shared members from the later region
    Avoid,
}

/// Predicate over a feature; `true` removes the feature from candidate
/// consideration during growth, as if absent from the graph
pub type FeaturePredicate = Arc<dyn Fn(&Feature) -> bool + Send + Sync>;

/// Parameters for AMOEBA cluster detection
#[derive(Clone)]
pub struct AmoebaParams {
    /// Which features may seed a region
    pub seed_option: SeedOption,
    /// Seed ranking direction
    pub ordering: SeedOrdering,
    /// Growth acceptance criterion
    pub criterion: Criterion,
    /// Overlap policy between clusters from different seeds
    pub overlap: Overlap,
    /// Drop clusters with exactly one member (after overlap resolution)
    pub exclude_singletons: bool,
    /// Optional exclusion predicate over feature attributes
    pub exclusion: Option<FeaturePredicate>,
    /// Report the complement set of never-clustered feature ids
    pub report_unclustered: bool,
}

impl Default for AmoebaParams {
    fn default() -> Self {
        Self {
            seed_option: SeedOption::All,
            ordering: SeedOrdering::Descending,
            criterion: Criterion::Maximization { threshold: 1.96 },
            overlap: Overlap::Avoid,
            exclude_singletons: false,
            exclusion: None,
            report_unclustered: false,
        }
    }
}

impl fmt::Debug for AmoebaParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmoebaParams")
            .field("seed_option", &self.seed_option)
            .field("ordering", &self.ordering)
            .field("criterion", &self.criterion)
            .field("overlap", &self.overlap)
            .field("exclude_singletons", &self.exclude_singletons)
            .field("exclusion", &self.exclusion.as_ref().map(|_| ".."))
            .field("report_unclustered", &self.report_unclustered)
            .finish()
    }
}

/// A finalized, conflict-resolved cluster
#[derive(Debug, Clone, Serialize)]
pub struct Cluster {
    /// 1-based id, assigned in resolution order
    pub id: u32,
    /// Members in admission order, seed first
    pub members: Vec<FeatureId>,
    pub size: usize,
    /// Mean of the target attribute over members
    pub attribute_mean: f64,
    /// Regional statistic at acceptance
    pub score: f64,
}

/// Result of a detection run
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub clusters: Vec<Cluster>,
    /// Complement set of never-clustered features, if requested
    pub unclustered: Option<Vec<FeatureId>>,
}

/// Run AMOEBA cluster detection.
///
/// Seeds are processed one at a time in rank order; growth for one seed
/// runs to completion and is resolved against earlier clusters before the
/// next seed starts, because overlap handling depends on earlier clusters
/// being final. `target_attribute` supplies the per-feature values behind
/// the statistic and the reported cluster means.
///
/// # Errors
///
/// Configuration problems (weights/feature mismatch, missing scores,
/// unknown attributes) are reported before any region is grown.
/// Cancellation fails the whole run with [`Error::Cancelled`]; no partial
/// cluster set is returned.
pub fn amoeba(
    features: &FeatureCollection,
    weights: &WeightsMatrix,
    provider: &dyn LocalStatisticProvider,
    target_attribute: &str,
    params: &AmoebaParams,
    cancel: &CancelToken,
) -> Result<Detection> {
    cancel.checkpoint()?;

    if features.is_empty() {
        return Err(Error::Configuration(
            "cluster detection over an empty feature set".into(),
        ));
    }
    if weights.len() != features.len() {
        return Err(Error::Configuration(format!(
            "weights matrix covers {} features, collection has {}",
            weights.len(),
            features.len()
        )));
    }

    // Target attribute values, validated up front
    let mut values: BTreeMap<FeatureId, f64> = BTreeMap::new();
    for f in features.iter() {
        if !weights.contains(&f.id) {
            return Err(Error::Configuration(format!(
                "feature {} missing from the weights matrix",
                f.id
            )));
        }
        let v = match f.get_property(target_attribute) {
            None => {
                return Err(Error::UnknownAttribute(format!(
                    "{} (feature {})",
                    target_attribute, f.id
                )))
            }
            Some(value) => value.as_f64().ok_or_else(|| Error::NonNumericAttribute {
                feature: f.id.clone(),
                attribute: target_attribute.to_string(),
            })?,
        };
        values.insert(f.id.clone(), v);
    }
    if values.len() != features.len() {
        return Err(Error::Configuration("duplicate feature ids".into()));
    }

    let score_ctx = ScoreContext {
        weights,
        values: &values,
    };

    // Local scores once per run, before ranking
    let local_scores = provider.local_scores(&score_ctx)?;
    for id in features.ids() {
        if !local_scores.contains_key(id) {
            return Err(Error::Configuration(format!(
                "statistic provider returned no score for feature {}",
                id
            )));
        }
    }

    // Exclusion predicate evaluated once; excluded features behave as if
    // absent from the graph during growth
    let excluded: BTreeSet<FeatureId> = match &params.exclusion {
        Some(pred) => features
            .iter()
            .filter(|f| pred(f))
            .map(|f| f.id.clone())
            .collect(),
        None => BTreeSet::new(),
    };

    let ranked = rank_seeds(&local_scores, &params.seed_option, params.ordering)?;
    info!(
        seeds = ranked.len(),
        features = features.len(),
        "growing regions"
    );

    let mut resolver = ClusterResolver::new(params.overlap);
    let mut queue: std::collections::VecDeque<SeedEntry> = ranked.into();

    // Explicit work queue: pop-and-process, one seed at a time
    while let Some(entry) = queue.pop_front() {
        cancel.checkpoint()?;

        // A feature absorbed into an earlier region no longer seeds
        if resolver.claimed().contains(&entry.feature) {
            continue;
        }

        let gc = GrowContext {
            provider,
            scores: ScoreContext {
                weights,
                values: &values,
            },
            criterion: &params.criterion,
            excluded: &excluded,
            claimed: resolver.claimed(),
            avoid_claimed: params.overlap == Overlap::Avoid,
            cancel,
        };

        match grow_region(&entry.feature, &gc)? {
            None => {
                debug!(seed = %entry.feature, "seed produced no region");
            }
            Some(region) => {
                debug!(
                    seed = %entry.feature,
                    size = region.members.len(),
                    steps = region.trace.len(),
                    score = region.score,
                    "region finalized"
                );
                resolver.commit(region);
            }
        }
    }

    let all_ids: Vec<FeatureId> = features.ids().cloned().collect();
    let (clusters, unclustered) = resolver.finish(
        params.exclude_singletons,
        &values,
        params.report_unclustered.then_some(all_ids.as_slice()),
    )?;

    info!(clusters = clusters.len(), "detection finished");
    Ok(Detection {
        clusters,
        unclustered,
    })
}

/// Owned input bundle for the [`Algorithm`] trait front end.
#[derive(Debug, Clone)]
pub struct AmoebaInput {
    pub features: FeatureCollection,
    pub weights: WeightsMatrix,
    /// Externally computed per-feature scores
    pub scores: BTreeMap<FeatureId, f64>,
    pub target_attribute: String,
}

/// AMOEBA cluster detection algorithm
#[derive(Debug, Clone, Default)]
pub struct Amoeba;

impl Algorithm for Amoeba {
    type Input = AmoebaInput;
    type Output = Detection;
    type Params = AmoebaParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "AMOEBA"
    }

    fn description(&self) -> &'static str {
        "Grow spatial clusters from ranked seeds over a weights matrix"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let provider = PrecomputedScores::new(input.scores);
        amoeba(
            &input.features,
            &input.weights,
            &provider,
            &input.target_attribute,
            &params,
            &CancelToken::new(),
        )
    }
}
