//! Region growth
//!
//! One region is grown per seed: starting from the seed alone, the grower
//! repeatedly picks the admissible neighbor whose admission yields the
//! most favorable recomputed regional score, admits it while the
//! acceptance criterion still holds, and stops at the first rejection or
//! when the frontier is empty. The region passes through the states
//! Seeded → Growing → Accepted/Terminal; a finalized region is handed to
//! the resolver.

use std::collections::BTreeSet;

use rayon::prelude::*;
use tracing::trace;

use ecotope_core::{CancelToken, FeatureId, Result};

use super::criterion::Criterion;
use crate::stats::{LocalStatisticProvider, ScoreContext};

/// A finalized region, ready for overlap resolution.
#[derive(Debug, Clone)]
pub(crate) struct GrownRegion {
    /// Members in admission order, seed first
    pub members: Vec<FeatureId>,
    /// Regional score at acceptance
    pub score: f64,
    /// Regional score after every accepted admission, seed included.
    /// Every entry satisfied the criterion at the moment it was recorded.
    pub trace: Vec<f64>,
}

/// Immutable surroundings of one growth run.
pub(crate) struct GrowContext<'a> {
    pub provider: &'a dyn LocalStatisticProvider,
    /// Weights matrix plus target values, shared with the provider
    pub scores: ScoreContext<'a>,
    pub criterion: &'a Criterion,
    /// Features removed from candidate consideration entirely, as if
    /// absent from the graph
    pub excluded: &'a BTreeSet<FeatureId>,
    /// Members of previously finalized regions
    pub claimed: &'a BTreeSet<FeatureId>,
    /// Overlap = Avoid: claimed features are inadmissible during growth.
    /// Otherwise they stay eligible and the resolver settles the overlap.
    pub avoid_claimed: bool,
    pub cancel: &'a CancelToken,
}

/// Grow a maximal region from `seed`.
///
/// Returns `None` when the seed itself fails the criterion (no region is
/// produced). A region of size 1 is a valid outcome; whether it survives
/// is the resolver's decision.
pub(crate) fn grow_region(
    seed: &FeatureId,
    gc: &GrowContext<'_>,
) -> Result<Option<GrownRegion>> {
    // Seeded: the singleton region must pass on its own
    let mut members = vec![seed.clone()];
    let mut member_set: BTreeSet<FeatureId> = members.iter().cloned().collect();

    let seed_score = gc.provider.regional_score(&gc.scores, &members)?;
    if !gc.criterion.accepts(seed_score) {
        trace!(%seed, score = seed_score, "seed rejected");
        return Ok(None);
    }

    let mut score = seed_score;
    let mut trace_scores = vec![seed_score];

    // Growing: one admission per iteration
    loop {
        gc.cancel.checkpoint()?;

        let frontier = admissible_frontier(&members, &member_set, gc);
        if frontier.is_empty() {
            // Terminal: growth stalled, region finalizes as-is
            break;
        }

        // Recompute the regional score per candidate. The evaluation may
        // run in parallel; candidate order (id ascending, from the
        // BTreeSet) and the sequential selection below keep the outcome
        // deterministic.
        let candidates: Vec<FeatureId> = frontier.into_iter().collect();
        let evals: Vec<(FeatureId, f64)> = candidates
            .into_par_iter()
            .map(|candidate| {
                let mut probe = Vec::with_capacity(members.len() + 1);
                probe.extend_from_slice(&members);
                probe.push(candidate.clone());
                gc.provider
                    .regional_score(&gc.scores, &probe)
                    .map(|s| (candidate, s))
            })
            .collect::<Result<_>>()?;

        let Some((best, best_score)) = gc.criterion.select(&evals) else {
            // No candidate satisfies a Custom criterion
            break;
        };

        if !gc.criterion.accepts(best_score) {
            // Accepted: the region keeps its pre-candidate form
            break;
        }

        trace!(%seed, admitted = %best, score = best_score, "region grew");
        member_set.insert(best.clone());
        members.push(best);
        score = best_score;
        trace_scores.push(best_score);
    }

    Ok(Some(GrownRegion {
        members,
        score,
        trace: trace_scores,
    }))
}

/// Union of the members' neighbor rows minus the members themselves,
/// excluded features, and (under overlap avoidance) already claimed
/// features.
fn admissible_frontier(
    members: &[FeatureId],
    member_set: &BTreeSet<FeatureId>,
    gc: &GrowContext<'_>,
) -> BTreeSet<FeatureId> {
    let mut frontier = BTreeSet::new();
    for member in members {
        for (neighbor, _) in gc.scores.weights.neighbors(member) {
            if member_set.contains(neighbor) || gc.excluded.contains(neighbor) {
                continue;
            }
            if gc.avoid_claimed && gc.claimed.contains(neighbor) {
                continue;
            }
            frontier.insert(neighbor.clone());
        }
    }
    frontier
}
