//! Distance-based neighbor construction
//!
//! Neighbor relations are computed between feature centroids in the
//! configured metric. A threshold band admits every other feature within
//! the given distance (inclusive); k-nearest admits exactly k, with
//! boundary ties broken by feature id ascending so repeated runs agree.
//! An optional exponent converts distance to an inverse-distance weight.

use std::collections::BTreeMap;

use geo::{Centroid, HasDimensions};

use ecotope_core::{Error, FeatureCollection, FeatureId, Result};

use super::kdtree::{CentroidIndex, IndexedPoint, Neighbor};
use super::{DistanceBand, DistanceMetric};

pub(super) fn distance_rows(
    features: &FeatureCollection,
    band: DistanceBand,
    metric: DistanceMetric,
    decay_exponent: Option<f64>,
) -> Result<BTreeMap<FeatureId, BTreeMap<FeatureId, f64>>> {
    let ids: Vec<&FeatureId> = features.ids().collect();
    let centroids = checked_centroids(features)?;

    let index = CentroidIndex::build(
        centroids
            .iter()
            .enumerate()
            .map(|(item, &(x, y))| IndexedPoint { x, y, item })
            .collect(),
        metric,
    );

    // First pass: raw neighbor distances per feature
    let mut raw: Vec<Vec<(usize, f64)>> = Vec::with_capacity(ids.len());
    for (i, &(x, y)) in centroids.iter().enumerate() {
        let found = match band {
            DistanceBand::Threshold(d) => others(index.within(x, y, d), i),
            DistanceBand::KNearest(k) => {
                // The (k+1)-nearest pool always covers the k nearest others,
                // whether or not the query feature itself is in it
                let mut pool = others(index.nearest_k(x, y, k + 1), i);
                sort_by_distance_then_id(&mut pool, &ids);
                let cutoff = pool[k - 1].distance;
                // Re-query at the cutoff so boundary ties can be broken by
                // id instead of by tree traversal order
                let mut eligible = others(index.within(x, y, cutoff), i);
                sort_by_distance_then_id(&mut eligible, &ids);
                eligible.truncate(k);
                eligible
            }
        };
        raw.push(found.into_iter().map(|n| (n.item, n.distance)).collect());
    }

    // Second pass: distances to weights
    let mut rows: BTreeMap<FeatureId, BTreeMap<FeatureId, f64>> = BTreeMap::new();
    match decay_exponent {
        None => {
            for (i, neighbors) in raw.iter().enumerate() {
                let row = neighbors
                    .iter()
                    .map(|&(j, _)| (ids[j].clone(), 1.0))
                    .collect();
                rows.insert(ids[i].clone(), row);
            }
        }
        Some(e) => {
            // Zero-distance pairs take the largest finite decayed weight in
            // the matrix rather than infinity; 1.0 if every pair coincides
            let max_finite = raw
                .iter()
                .flatten()
                .filter(|&&(_, d)| d > 0.0)
                .map(|&(_, d)| d.powf(-e))
                .fold(f64::NEG_INFINITY, f64::max);
            let zero_weight = if max_finite.is_finite() { max_finite } else { 1.0 };

            for (i, neighbors) in raw.iter().enumerate() {
                let row = neighbors
                    .iter()
                    .map(|&(j, d)| {
                        let w = if d > 0.0 { d.powf(-e) } else { zero_weight };
                        (ids[j].clone(), w)
                    })
                    .collect();
                rows.insert(ids[i].clone(), row);
            }
        }
    }

    Ok(rows)
}

/// Drop the query feature itself from a result set
fn others(found: Vec<Neighbor>, this: usize) -> Vec<Neighbor> {
    found.into_iter().filter(|n| n.item != this).collect()
}

fn sort_by_distance_then_id(neighbors: &mut [Neighbor], ids: &[&FeatureId]) {
    neighbors.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| ids[a.item].cmp(ids[b.item]))
    });
}

/// Centroid coordinates per feature, failing on the first feature without
/// one.
fn checked_centroids(features: &FeatureCollection) -> Result<Vec<(f64, f64)>> {
    features
        .iter()
        .map(|f| {
            let g = f.geometry.as_ref().ok_or_else(|| Error::InvalidGeometry {
                feature: f.id.clone(),
                reason: "null geometry".into(),
            })?;
            if g.is_empty() {
                return Err(Error::InvalidGeometry {
                    feature: f.id.clone(),
                    reason: "empty geometry".into(),
                });
            }
            let c = g.centroid().ok_or_else(|| Error::InvalidGeometry {
                feature: f.id.clone(),
                reason: "geometry has no centroid".into(),
            })?;
            Ok((c.x(), c.y()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::{WeightsMatrix, WeightsMode, WeightsParams};
    use ecotope_core::Feature;
    use geo_types::Point;

    fn line(ids: &[&str], spacing: f64) -> FeatureCollection {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Feature::new(*id, Point::new(i as f64 * spacing, 0.0).into()))
            .collect()
    }

    fn build(fc: &FeatureCollection, mode: WeightsMode) -> WeightsMatrix {
        WeightsMatrix::build(
            fc,
            &WeightsParams {
                mode,
                row_standardize: false,
                self_neighbor: false,
            },
        )
        .unwrap()
    }

    fn neighbor_ids(w: &WeightsMatrix, id: &str) -> Vec<String> {
        w.neighbors(&FeatureId::new(id))
            .map(|(n, _)| n.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let fc = line(&["a", "b", "c"], 1.0);
        let w = build(
            &fc,
            WeightsMode::Distance {
                band: DistanceBand::Threshold(1.0),
                metric: DistanceMetric::Euclidean,
                decay_exponent: None,
            },
        );

        assert_eq!(neighbor_ids(&w, "a"), vec!["b"]);
        assert_eq!(neighbor_ids(&w, "b"), vec!["a", "c"]);
    }

    #[test]
    fn test_threshold_is_symmetric() {
        let fc = line(&["a", "b", "c", "d"], 1.5);
        let w = build(
            &fc,
            WeightsMode::Distance {
                band: DistanceBand::Threshold(2.0),
                metric: DistanceMetric::Euclidean,
                decay_exponent: None,
            },
        );

        for a in w.ids() {
            for (b, wab) in w.neighbors(a) {
                assert_eq!(w.weight(b, a), Some(wab));
            }
        }
    }

    #[test]
    fn test_knn_exact_count() {
        let fc = line(&["a", "b", "c", "d", "e"], 1.0);
        let w = build(
            &fc,
            WeightsMode::Distance {
                band: DistanceBand::KNearest(2),
                metric: DistanceMetric::Euclidean,
                decay_exponent: None,
            },
        );

        for id in w.ids() {
            assert_eq!(w.neighbor_count(id), 2, "row {}", id);
        }
        assert_eq!(neighbor_ids(&w, "a"), vec!["b", "c"]);
        assert_eq!(neighbor_ids(&w, "e"), vec!["c", "d"]);
    }

    #[test]
    fn test_knn_boundary_ties_broken_by_id() {
        // b and c are equidistant from a; with k = 1 the smaller id wins
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new("a", Point::new(0.0, 0.0).into()));
        fc.push(Feature::new("c", Point::new(1.0, 0.0).into()));
        fc.push(Feature::new("b", Point::new(-1.0, 0.0).into()));

        let w = build(
            &fc,
            WeightsMode::Distance {
                band: DistanceBand::KNearest(1),
                metric: DistanceMetric::Euclidean,
                decay_exponent: None,
            },
        );

        assert_eq!(neighbor_ids(&w, "a"), vec!["b"]);
    }

    #[test]
    fn test_knn_is_directional() {
        // d sits far right: c is among d's nearest, but d is nobody's
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new("a", Point::new(0.0, 0.0).into()));
        fc.push(Feature::new("b", Point::new(1.0, 0.0).into()));
        fc.push(Feature::new("c", Point::new(2.0, 0.0).into()));
        fc.push(Feature::new("d", Point::new(10.0, 0.0).into()));

        let w = build(
            &fc,
            WeightsMode::Distance {
                band: DistanceBand::KNearest(2),
                metric: DistanceMetric::Euclidean,
                decay_exponent: None,
            },
        );

        assert!(w.weight(&FeatureId::new("d"), &FeatureId::new("c")).is_some());
        assert!(w.weight(&FeatureId::new("c"), &FeatureId::new("d")).is_none());
    }

    #[test]
    fn test_manhattan_metric() {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new("a", Point::new(0.0, 0.0).into()));
        fc.push(Feature::new("b", Point::new(1.0, 1.0).into()));
        fc.push(Feature::new("c", Point::new(1.8, 0.0).into()));

        // Manhattan: d(a,b) = 2.0, d(a,c) = 1.8 → c is a's nearest
        let w = build(
            &fc,
            WeightsMode::Distance {
                band: DistanceBand::KNearest(1),
                metric: DistanceMetric::Manhattan,
                decay_exponent: None,
            },
        );
        assert_eq!(neighbor_ids(&w, "a"), vec!["c"]);

        // Euclidean: d(a,b) = 1.41, d(a,c) = 1.8 → b is a's nearest
        let w = build(
            &fc,
            WeightsMode::Distance {
                band: DistanceBand::KNearest(1),
                metric: DistanceMetric::Euclidean,
                decay_exponent: None,
            },
        );
        assert_eq!(neighbor_ids(&w, "a"), vec!["b"]);
    }

    #[test]
    fn test_decay_weights() {
        let fc = line(&["a", "b", "c"], 2.0);
        let w = build(
            &fc,
            WeightsMode::Distance {
                band: DistanceBand::Threshold(4.0),
                metric: DistanceMetric::Euclidean,
                decay_exponent: Some(1.0),
            },
        );

        let a = FeatureId::new("a");
        assert_eq!(w.weight(&a, &FeatureId::new("b")), Some(0.5));
        assert_eq!(w.weight(&a, &FeatureId::new("c")), Some(0.25));
    }

    #[test]
    fn test_zero_distance_gets_max_finite_weight() {
        // a and b coincide; c is 2.0 away from both
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new("a", Point::new(0.0, 0.0).into()));
        fc.push(Feature::new("b", Point::new(0.0, 0.0).into()));
        fc.push(Feature::new("c", Point::new(2.0, 0.0).into()));

        let w = build(
            &fc,
            WeightsMode::Distance {
                band: DistanceBand::Threshold(3.0),
                metric: DistanceMetric::Euclidean,
                decay_exponent: Some(1.0),
            },
        );

        // Finite weights present: 1/2 (a↔c, b↔c); the coincident pair gets
        // the maximum finite weight, not infinity
        let zero_pair = w.weight(&FeatureId::new("a"), &FeatureId::new("b")).unwrap();
        assert!(zero_pair.is_finite());
        assert_eq!(zero_pair, 0.5);
    }

    #[test]
    fn test_all_pairs_coincident_fall_back_to_unit_weight() {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new("a", Point::new(0.0, 0.0).into()));
        fc.push(Feature::new("b", Point::new(0.0, 0.0).into()));

        let w = build(
            &fc,
            WeightsMode::Distance {
                band: DistanceBand::Threshold(1.0),
                metric: DistanceMetric::Euclidean,
                decay_exponent: Some(2.0),
            },
        );

        assert_eq!(w.weight(&FeatureId::new("a"), &FeatureId::new("b")), Some(1.0));
    }

    #[test]
    fn test_null_geometry_named_in_error() {
        let mut fc = line(&["a", "b"], 1.0);
        fc.push(Feature::without_geometry("gone"));

        let err = WeightsMatrix::build(
            &fc,
            &WeightsParams {
                mode: WeightsMode::Distance {
                    band: DistanceBand::KNearest(1),
                    metric: DistanceMetric::Euclidean,
                    decay_exponent: None,
                },
                row_standardize: false,
                self_neighbor: false,
            },
        );

        match err {
            Err(Error::InvalidGeometry { feature, .. }) => assert_eq!(feature.as_str(), "gone"),
            other => panic!("expected InvalidGeometry, got {:?}", other),
        }
    }
}
