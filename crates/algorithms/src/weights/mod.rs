//! Spatial weights matrices
//!
//! A weights matrix is a weighted adjacency graph over a feature set: for
//! every feature, the set of its neighbors and a non-negative weight per
//! neighbor. Two construction families are supported:
//!
//! - **Contiguity**: neighbors share geometric boundary (queen/rook/bishop),
//!   optionally expanded to higher orders by repeated hops
//! - **Distance**: neighbors within a threshold distance of the feature's
//!   centroid, or its k nearest centroids, optionally weighted by inverse
//!   distance decay
//!
//! Rows may be standardized to sum to 1. The matrix is immutable once
//! built and shared read-only by the cluster engine.

mod contiguity;
mod distance;
mod kdtree;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use ecotope_core::{Error, FeatureCollection, FeatureId, Result};

/// Contiguity neighbor rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContiguityKind {
    /// Any touching relation, corner-only included
    Queen,
    /// Shared-edge touching only
    Rook,
    /// Corner-only touching
    Bishop,
}

/// Distance metric for centroid-based neighbor search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    #[inline]
    pub fn eval(&self, dx: f64, dy: f64) -> f64 {
        match self {
            DistanceMetric::Euclidean => (dx * dx + dy * dy).sqrt(),
            DistanceMetric::Manhattan => dx.abs() + dy.abs(),
        }
    }
}

/// Distance-based neighbor admission rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistanceBand {
    /// Every other feature within this distance (inclusive)
    Threshold(f64),
    /// Exactly the k nearest features; boundary ties broken by feature id
    /// ascending
    KNearest(usize),
}

/// Weights construction mode. Contiguity and distance rules are mutually
/// exclusive for the lifetime of a matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeightsMode {
    Contiguity {
        kind: ContiguityKind,
        /// Number of neighbor-expansion hops, ≥ 1
        order: usize,
        /// Weight hop-h neighbors at 1/h instead of 1
        order_decay: bool,
    },
    Distance {
        band: DistanceBand,
        metric: DistanceMetric,
        /// Optional exponent e converting distance d to weight 1/d^e.
        /// Zero-distance pairs get the maximum finite weight observed in
        /// the matrix rather than infinity.
        decay_exponent: Option<f64>,
    },
}

/// Mode tag recorded on a built matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightsKind {
    Contiguity,
    Distance,
}

/// Parameters for weights matrix construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsParams {
    pub mode: WeightsMode,
    /// Normalize every non-empty row to sum to 1 as a final pass
    pub row_standardize: bool,
    /// Include each feature in its own row at unit weight
    pub self_neighbor: bool,
}

impl Default for WeightsParams {
    fn default() -> Self {
        Self {
            mode: WeightsMode::Contiguity {
                kind: ContiguityKind::Queen,
                order: 1,
                order_decay: false,
            },
            row_standardize: false,
            self_neighbor: false,
        }
    }
}

/// Per-matrix diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct WeightsSummary {
    pub features: usize,
    pub min_neighbors: usize,
    pub max_neighbors: usize,
    pub mean_neighbors: f64,
    /// Features with an empty neighbor row
    pub islands: usize,
}

/// A weighted adjacency graph over a feature set.
///
/// Every feature of the source collection has a row, possibly empty.
/// Rows and row entries are ordered by feature id, so iteration order is
/// deterministic.
#[derive(Debug, Clone)]
pub struct WeightsMatrix {
    rows: BTreeMap<FeatureId, BTreeMap<FeatureId, f64>>,
    kind: WeightsKind,
    row_standardized: bool,
}

impl WeightsMatrix {
    /// Build a weights matrix over `features`.
    ///
    /// # Errors
    ///
    /// - `Configuration` for fewer than 2 features or duplicate ids
    /// - `InvalidParameter` for out-of-range mode parameters
    /// - `InvalidGeometry` naming the offending feature for null/empty
    ///   geometries (never silently dropped)
    pub fn build(features: &FeatureCollection, params: &WeightsParams) -> Result<Self> {
        if features.len() < 2 {
            return Err(Error::Configuration(format!(
                "weights construction needs at least 2 features, got {}",
                features.len()
            )));
        }
        Self::check_unique_ids(features)?;
        validate_mode(&params.mode, features.len())?;

        debug!(
            features = features.len(),
            mode = ?params.mode,
            "building weights matrix"
        );

        let (mut rows, kind) = match &params.mode {
            WeightsMode::Contiguity {
                kind,
                order,
                order_decay,
            } => (
                contiguity::contiguity_rows(features, *kind, *order, *order_decay)?,
                WeightsKind::Contiguity,
            ),
            WeightsMode::Distance {
                band,
                metric,
                decay_exponent,
            } => (
                distance::distance_rows(features, *band, *metric, *decay_exponent)?,
                WeightsKind::Distance,
            ),
        };

        if params.self_neighbor {
            for (id, row) in rows.iter_mut() {
                row.insert(id.clone(), 1.0);
            }
        }

        let mut matrix = Self {
            rows,
            kind,
            row_standardized: false,
        };

        if params.row_standardize {
            matrix.standardize();
        }

        Ok(matrix)
    }

    fn check_unique_ids(features: &FeatureCollection) -> Result<()> {
        let mut seen = BTreeSet::new();
        for id in features.ids() {
            if !seen.insert(id) {
                return Err(Error::Configuration(format!(
                    "duplicate feature id: {}",
                    id
                )));
            }
        }
        Ok(())
    }

    /// Final pass: scale every non-empty row to sum to 1.0. Empty rows are
    /// left empty.
    fn standardize(&mut self) {
        for row in self.rows.values_mut() {
            let sum: f64 = row.values().sum();
            if sum > 0.0 {
                for w in row.values_mut() {
                    *w /= sum;
                }
            }
        }
        self.row_standardized = true;
    }

    /// Construction mode of this matrix
    pub fn kind(&self) -> WeightsKind {
        self.kind
    }

    pub fn is_row_standardized(&self) -> bool {
        self.row_standardized
    }

    /// Number of features (rows), empty rows included
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, id: &FeatureId) -> bool {
        self.rows.contains_key(id)
    }

    /// Feature ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = &FeatureId> {
        self.rows.keys()
    }

    /// Neighbors of `id` with their weights, in ascending neighbor-id
    /// order. Empty for isolates and unknown ids.
    pub fn neighbors<'a>(&'a self, id: &FeatureId) -> impl Iterator<Item = (&'a FeatureId, f64)> + 'a {
        self.rows
            .get(id)
            .into_iter()
            .flat_map(|row| row.iter().map(|(n, w)| (n, *w)))
    }

    pub fn neighbor_count(&self, id: &FeatureId) -> usize {
        self.rows.get(id).map_or(0, |row| row.len())
    }

    /// Weight of the directed pair (from, to), if they are neighbors
    pub fn weight(&self, from: &FeatureId, to: &FeatureId) -> Option<f64> {
        self.rows.get(from).and_then(|row| row.get(to)).copied()
    }

    /// Sum of a feature's row weights (0 for isolates)
    pub fn row_sum(&self, id: &FeatureId) -> f64 {
        self.rows.get(id).map_or(0.0, |row| row.values().sum())
    }

    pub fn summary(&self) -> WeightsSummary {
        let counts: Vec<usize> = self.rows.values().map(|row| row.len()).collect();
        let total: usize = counts.iter().sum();
        WeightsSummary {
            features: counts.len(),
            min_neighbors: counts.iter().copied().min().unwrap_or(0),
            max_neighbors: counts.iter().copied().max().unwrap_or(0),
            mean_neighbors: if counts.is_empty() {
                0.0
            } else {
                total as f64 / counts.len() as f64
            },
            islands: counts.iter().filter(|&&c| c == 0).count(),
        }
    }
}

fn validate_mode(mode: &WeightsMode, n: usize) -> Result<()> {
    match mode {
        WeightsMode::Contiguity { order, .. } => {
            if *order == 0 {
                return Err(Error::InvalidParameter {
                    name: "order",
                    value: "0".into(),
                    reason: "contiguity order must be at least 1".into(),
                });
            }
        }
        WeightsMode::Distance {
            band,
            decay_exponent,
            ..
        } => {
            match band {
                DistanceBand::Threshold(d) => {
                    if !d.is_finite() || *d <= 0.0 {
                        return Err(Error::InvalidParameter {
                            name: "threshold",
                            value: d.to_string(),
                            reason: "threshold distance must be finite and positive".into(),
                        });
                    }
                }
                DistanceBand::KNearest(k) => {
                    if *k == 0 {
                        return Err(Error::InvalidParameter {
                            name: "k",
                            value: "0".into(),
                            reason: "k must be at least 1".into(),
                        });
                    }
                    if *k >= n {
                        return Err(Error::InvalidParameter {
                            name: "k",
                            value: k.to_string(),
                            reason: format!(
                                "k must be smaller than the number of features ({})",
                                n
                            ),
                        });
                    }
                }
            }
            if let Some(e) = decay_exponent {
                if !e.is_finite() || *e <= 0.0 {
                    return Err(Error::InvalidParameter {
                        name: "decay_exponent",
                        value: e.to_string(),
                        reason: "decay exponent must be finite and positive".into(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecotope_core::Feature;
    use geo_types::Point;

    fn point_grid(side: usize, spacing: f64) -> FeatureCollection {
        let mut fc = FeatureCollection::new();
        for r in 0..side {
            for c in 0..side {
                let id = format!("p{}{}", r, c);
                fc.push(Feature::new(
                    id,
                    Point::new(c as f64 * spacing, r as f64 * spacing).into(),
                ));
            }
        }
        fc
    }

    fn knn_params(k: usize) -> WeightsParams {
        WeightsParams {
            mode: WeightsMode::Distance {
                band: DistanceBand::KNearest(k),
                metric: DistanceMetric::Euclidean,
                decay_exponent: None,
            },
            row_standardize: false,
            self_neighbor: false,
        }
    }

    #[test]
    fn test_too_few_features() {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new("only", Point::new(0.0, 0.0).into()));
        let err = WeightsMatrix::build(&fc, &WeightsParams::default());
        assert!(matches!(err, Err(Error::Configuration(_))));

        let err = WeightsMatrix::build(&FeatureCollection::new(), &WeightsParams::default());
        assert!(matches!(err, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new("a", Point::new(0.0, 0.0).into()));
        fc.push(Feature::new("a", Point::new(1.0, 0.0).into()));
        let err = WeightsMatrix::build(&fc, &knn_params(1));
        assert!(matches!(err, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_invalid_parameters() {
        let fc = point_grid(2, 1.0);

        for mode in [
            WeightsMode::Contiguity {
                kind: ContiguityKind::Queen,
                order: 0,
                order_decay: false,
            },
            WeightsMode::Distance {
                band: DistanceBand::Threshold(0.0),
                metric: DistanceMetric::Euclidean,
                decay_exponent: None,
            },
            WeightsMode::Distance {
                band: DistanceBand::KNearest(0),
                metric: DistanceMetric::Euclidean,
                decay_exponent: None,
            },
            WeightsMode::Distance {
                band: DistanceBand::KNearest(4),
                metric: DistanceMetric::Euclidean,
                decay_exponent: None,
            },
            WeightsMode::Distance {
                band: DistanceBand::KNearest(1),
                metric: DistanceMetric::Euclidean,
                decay_exponent: Some(0.0),
            },
        ] {
            let params = WeightsParams {
                mode,
                row_standardize: false,
                self_neighbor: false,
            };
            assert!(
                matches!(
                    WeightsMatrix::build(&fc, &params),
                    Err(Error::InvalidParameter { .. })
                ),
                "params should be rejected: {:?}",
                params
            );
        }
    }

    #[test]
    fn test_no_self_neighbor_by_default() {
        let fc = point_grid(3, 1.0);
        let w = WeightsMatrix::build(&fc, &knn_params(2)).unwrap();

        for id in w.ids() {
            assert!(w.weight(id, id).is_none(), "{} is its own neighbor", id);
        }
    }

    #[test]
    fn test_self_neighbor_flag() {
        let fc = point_grid(3, 1.0);
        let mut params = knn_params(2);
        params.self_neighbor = true;
        let w = WeightsMatrix::build(&fc, &params).unwrap();

        for id in w.ids() {
            assert_eq!(w.weight(id, id), Some(1.0));
        }
    }

    #[test]
    fn test_row_standardization_sums_to_one() {
        let fc = point_grid(4, 1.0);
        let mut params = knn_params(3);
        params.row_standardize = true;
        let w = WeightsMatrix::build(&fc, &params).unwrap();

        assert!(w.is_row_standardized());
        for id in w.ids() {
            if w.neighbor_count(id) > 0 {
                assert!(
                    (w.row_sum(id) - 1.0).abs() < 1e-12,
                    "row {} sums to {}",
                    id,
                    w.row_sum(id)
                );
            }
        }
    }

    #[test]
    fn test_mode_tag_recorded() {
        let fc = point_grid(3, 1.0);
        let w = WeightsMatrix::build(&fc, &knn_params(2)).unwrap();
        assert_eq!(w.kind(), WeightsKind::Distance);
    }

    #[test]
    fn test_summary() {
        let fc = point_grid(3, 1.0);
        let w = WeightsMatrix::build(&fc, &knn_params(2)).unwrap();
        let s = w.summary();

        assert_eq!(s.features, 9);
        assert_eq!(s.min_neighbors, 2);
        assert_eq!(s.max_neighbors, 2);
        assert_eq!(s.islands, 0);
    }
}
