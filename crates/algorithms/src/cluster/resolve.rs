//! Overlap resolution and cluster finalization
//!
//! Regions arrive in seed-processing order, one at a time, interleaved
//! with growth: claims committed for an earlier region constrain the
//! growth of every later one. After all seeds are processed, singleton
//! regions are dropped (if requested) and 1-based cluster ids are
//! assigned in resolution order.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use ecotope_core::{Error, FeatureId, Result};

use super::grow::GrownRegion;
use super::{Cluster, Overlap};

/// Accumulates finalized regions and their claims across a run.
pub(crate) struct ClusterResolver {
    policy: Overlap,
    claimed: BTreeSet<FeatureId>,
    resolved: Vec<GrownRegion>,
}

impl ClusterResolver {
    pub fn new(policy: Overlap) -> Self {
        Self {
            policy,
            claimed: BTreeSet::new(),
            resolved: Vec::new(),
        }
    }

    /// Features claimed by regions resolved so far.
    pub fn claimed(&self) -> &BTreeSet<FeatureId> {
        &self.claimed
    }

    /// Resolve one freshly grown region against the earlier ones.
    pub fn commit(&mut self, mut region: GrownRegion) {
        match self.policy {
            Overlap::Remove => {
                // Any collision with an earlier cluster discards the whole
                // later region
                if region.members.iter().any(|m| self.claimed.contains(m)) {
                    debug!(seed = %region.members[0], "region discarded: overlaps earlier cluster");
                    return;
                }
            }
            Overlap::Avoid => {
                region.members.retain(|m| !self.claimed.contains(m));
                if region.members.is_empty() {
                    debug!("region discarded: emptied by overlap avoidance");
                    return;
                }
            }
        }

        for member in &region.members {
            self.claimed.insert(member.clone());
        }
        self.resolved.push(region);
    }

    /// Drop singletons, assign ids, and attach summary statistics.
    ///
    /// `values` is the target attribute per feature; the cluster summary
    /// reports its mean over the final membership. The regional score is
    /// the value recorded at acceptance.
    pub fn finish(
        self,
        exclude_singletons: bool,
        values: &BTreeMap<FeatureId, f64>,
        report_unclustered: Option<&[FeatureId]>,
    ) -> Result<(Vec<Cluster>, Option<Vec<FeatureId>>)> {
        let mut clusters = Vec::new();
        let mut next_id: u32 = 1;

        for region in self.resolved {
            // Singleton exclusion comes after all overlap resolution; a
            // dropped singleton keeps its claim so earlier-seed priority
            // is unaffected
            if exclude_singletons && region.members.len() == 1 {
                continue;
            }

            let mut sum = 0.0;
            for member in &region.members {
                sum += values.get(member).ok_or_else(|| {
                    Error::Algorithm(format!("no attribute value for member {}", member))
                })?;
            }

            clusters.push(Cluster {
                id: next_id,
                size: region.members.len(),
                attribute_mean: sum / region.members.len() as f64,
                score: region.score,
                members: region.members,
            });
            next_id += 1;
        }

        let unclustered = report_unclustered.map(|all_ids| {
            let in_cluster: BTreeSet<&FeatureId> =
                clusters.iter().flat_map(|c| c.members.iter()).collect();
            all_ids
                .iter()
                .filter(|id| !in_cluster.contains(id))
                .cloned()
                .collect()
        });

        Ok((clusters, unclustered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(members: &[&str], score: f64) -> GrownRegion {
        GrownRegion {
            members: members.iter().map(|m| FeatureId::new(*m)).collect(),
            score,
            trace: vec![score],
        }
    }

    fn values(pairs: &[(&str, f64)]) -> BTreeMap<FeatureId, f64> {
        pairs
            .iter()
            .map(|&(id, v)| (FeatureId::new(id), v))
            .collect()
    }

    fn all_ids(ids: &[&str]) -> Vec<FeatureId> {
        ids.iter().map(|id| FeatureId::new(*id)).collect()
    }

    #[test]
    fn test_remove_discards_whole_overlapping_region() {
        let mut resolver = ClusterResolver::new(Overlap::Remove);
        resolver.commit(region(&["a", "b"], 2.5));
        resolver.commit(region(&["b", "c", "d"], 2.2));

        let (clusters, _) = resolver
            .finish(false, &values(&[("a", 1.0), ("b", 1.0)]), None)
            .unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size, 2);
    }

    #[test]
    fn test_avoid_strips_claimed_members() {
        let mut resolver = ClusterResolver::new(Overlap::Avoid);
        resolver.commit(region(&["a", "b"], 2.5));
        resolver.commit(region(&["b", "c"], 2.2));

        let vals = values(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let (clusters, _) = resolver.finish(false, &vals, None).unwrap();

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[1].members, vec![FeatureId::new("c")]);
    }

    #[test]
    fn test_avoid_discards_emptied_region() {
        let mut resolver = ClusterResolver::new(Overlap::Avoid);
        resolver.commit(region(&["a", "b"], 2.5));
        resolver.commit(region(&["a", "b"], 2.0));

        let (clusters, _) = resolver
            .finish(false, &values(&[("a", 1.0), ("b", 1.0)]), None)
            .unwrap();
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn test_singleton_exclusion_after_stripping() {
        let mut resolver = ClusterResolver::new(Overlap::Avoid);
        resolver.commit(region(&["a", "b"], 2.5));
        // Shrinks to the singleton {c} via avoidance, then is dropped
        resolver.commit(region(&["b", "c"], 2.2));

        let vals = values(&[("a", 1.0), ("b", 1.0), ("c", 1.0)]);
        let (clusters, _) = resolver.finish(true, &vals, None).unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size, 2);
    }

    #[test]
    fn test_ids_assigned_in_resolution_order() {
        let mut resolver = ClusterResolver::new(Overlap::Remove);
        resolver.commit(region(&["a"], 3.0));
        resolver.commit(region(&["b", "c"], 2.0));
        resolver.commit(region(&["d"], 1.0));

        let vals = values(&[("a", 1.0), ("b", 1.0), ("c", 1.0), ("d", 1.0)]);
        let (clusters, _) = resolver.finish(false, &vals, None).unwrap();

        assert_eq!(
            clusters.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_attribute_mean() {
        let mut resolver = ClusterResolver::new(Overlap::Remove);
        resolver.commit(region(&["a", "b"], 2.5));

        let vals = values(&[("a", 10.0), ("b", 20.0)]);
        let (clusters, _) = resolver.finish(false, &vals, None).unwrap();
        assert!((clusters[0].attribute_mean - 15.0).abs() < 1e-12);
        assert!((clusters[0].score - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_unclustered_complement() {
        let mut resolver = ClusterResolver::new(Overlap::Remove);
        resolver.commit(region(&["a", "b"], 2.5));

        let vals = values(&[("a", 1.0), ("b", 1.0)]);
        let ids = all_ids(&["a", "b", "c", "d"]);
        let (_, unclustered) = resolver.finish(false, &vals, Some(&ids)).unwrap();

        assert_eq!(unclustered.unwrap(), all_ids(&["c", "d"]));
    }

    #[test]
    fn test_dropped_singleton_counts_as_unclustered() {
        let mut resolver = ClusterResolver::new(Overlap::Remove);
        resolver.commit(region(&["a", "b"], 2.5));
        resolver.commit(region(&["c"], 2.0));

        let vals = values(&[("a", 1.0), ("b", 1.0), ("c", 1.0)]);
        let ids = all_ids(&["a", "b", "c"]);
        let (clusters, unclustered) = resolver.finish(true, &vals, Some(&ids)).unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(unclustered.unwrap(), all_ids(&["c"]));
    }
}
