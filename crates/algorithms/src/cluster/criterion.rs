//! Acceptance criteria for region growth
//!
//! A criterion both ranks candidate admissions (which neighbor to try
//! next) and decides whether the resulting regional score keeps the
//! region alive. The variants are closed: criterion kind is resolved once
//! at configuration time, never re-dispatched per step.

use std::fmt;
use std::sync::Arc;

use ecotope_core::FeatureId;

/// Typed predicate over a regional score
pub type ScorePredicate = Arc<dyn Fn(f64) -> bool + Send + Sync>;

/// Growth acceptance criterion.
#[derive(Clone)]
pub enum Criterion {
    /// Keep the region while the regional score stays at or above the
    /// threshold; grow toward the highest score
    Maximization { threshold: f64 },
    /// Keep the region while the regional score stays at or below the
    /// threshold; grow toward the lowest score
    Minimization { threshold: f64 },
    /// Arbitrary predicate over the regional score
    Custom(ScorePredicate),
}

impl Criterion {
    /// Does `score` satisfy the criterion?
    pub fn accepts(&self, score: f64) -> bool {
        if score.is_nan() {
            return false;
        }
        match self {
            Criterion::Maximization { threshold } => score >= *threshold,
            Criterion::Minimization { threshold } => score <= *threshold,
            Criterion::Custom(pred) => pred(score),
        }
    }

    /// Pick the candidate to try next from `(candidate, resulting score)`
    /// evaluations.
    ///
    /// `evals` must be ordered by candidate id ascending; keeping the
    /// first of equal scores then yields the id-ascending tie-break.
    /// Maximization picks the highest resulting score, Minimization the
    /// lowest; Custom picks the predicate-satisfying candidate with the
    /// highest score. NaN evaluations are never selected.
    pub(crate) fn select(&self, evals: &[(FeatureId, f64)]) -> Option<(FeatureId, f64)> {
        let mut best: Option<(&FeatureId, f64)> = None;
        for (id, score) in evals {
            if score.is_nan() {
                continue;
            }
            if let Criterion::Custom(pred) = self {
                if !pred(*score) {
                    continue;
                }
            }
            let better = match best {
                None => true,
                Some((_, current)) => match self {
                    Criterion::Minimization { .. } => *score < current,
                    _ => *score > current,
                },
            };
            if better {
                best = Some((id, *score));
            }
        }
        best.map(|(id, score)| (id.clone(), score))
    }
}

impl fmt::Debug for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Maximization { threshold } => f
                .debug_struct("Maximization")
                .field("threshold", threshold)
                .finish(),
            Criterion::Minimization { threshold } => f
                .debug_struct("Minimization")
                .field("threshold", threshold)
                .finish(),
            Criterion::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
