//! Seed ranking
//!
//! Seeds are candidate starting features for region growth, ordered by
//! their local score. The comparator is total and direction-independent:
//! equal scores always fall back to feature id ascending, so descending
//! and ascending rankings of the same scores are exact reverses of each
//! other except for the stable id order within ties.

use std::collections::BTreeMap;
use std::fmt;

use ecotope_core::{Error, FeatureId, Result};

use super::criterion::ScorePredicate;

/// A ranked seed: feature id plus its local score
#[derive(Debug, Clone, PartialEq)]
pub struct SeedEntry {
    pub feature: FeatureId,
    pub score: f64,
}

/// Ranking direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedOrdering {
    /// Highest score first
    #[default]
    Descending,
    /// Lowest score first
    Ascending,
}

/// Which features are eligible as seeds
#[derive(Clone, Default)]
pub enum SeedOption {
    /// Every feature
    #[default]
    All,
    /// A caller-supplied subset; every id must exist
    Selected(std::collections::BTreeSet<FeatureId>),
    /// Features whose local score satisfies a predicate
    Custom(ScorePredicate),
}

impl fmt::Debug for SeedOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedOption::All => f.write_str("All"),
            SeedOption::Selected(ids) => f.debug_tuple("Selected").field(&ids.len()).finish(),
            SeedOption::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Rank eligible seeds by score.
///
/// Pure: callers may re-rank the same scores at will. The engine consumes
/// the result through an explicit work queue.
pub fn rank_seeds(
    scores: &BTreeMap<FeatureId, f64>,
    option: &SeedOption,
    ordering: SeedOrdering,
) -> Result<Vec<SeedEntry>> {
    if let SeedOption::Selected(ids) = option {
        for id in ids {
            if !scores.contains_key(id) {
                return Err(Error::Configuration(format!(
                    "selected seed {} has no local score",
                    id
                )));
            }
        }
    }

    let mut entries: Vec<SeedEntry> = scores
        .iter()
        .filter(|(id, score)| match option {
            SeedOption::All => true,
            SeedOption::Selected(ids) => ids.contains(*id),
            SeedOption::Custom(pred) => pred(**score),
        })
        .map(|(id, score)| SeedEntry {
            feature: id.clone(),
            score: *score,
        })
        .collect();

    entries.sort_by(|a, b| {
        let by_score = match ordering {
            SeedOrdering::Descending => b.score.total_cmp(&a.score),
            SeedOrdering::Ascending => a.score.total_cmp(&b.score),
        };
        by_score.then_with(|| a.feature.cmp(&b.feature))
    });

    Ok(entries)
}
