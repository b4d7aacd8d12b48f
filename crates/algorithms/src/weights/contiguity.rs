//! Contiguity-based neighbor construction
//!
//! Two features are first-order neighbors when their geometries touch:
//! queen admits any touching relation, rook requires a shared edge, bishop
//! requires corner-only contact. The DE-9IM relate matrix from the `geo`
//! crate supplies both the touch predicate and the dimension of the shared
//! boundary. Higher orders repeat neighbor expansion by breadth-first hops.

use std::collections::{BTreeMap, VecDeque};

use geo::coordinate_position::CoordPos;
use geo::dimensions::Dimensions;
use geo::{BoundingRect, HasDimensions, Relate};
use geo_types::{Geometry, Rect};

use ecotope_core::{Error, FeatureCollection, FeatureId, Result};

use super::ContiguityKind;

pub(super) fn contiguity_rows(
    features: &FeatureCollection,
    kind: ContiguityKind,
    order: usize,
    order_decay: bool,
) -> Result<BTreeMap<FeatureId, BTreeMap<FeatureId, f64>>> {
    let geoms = checked_geometries(features)?;

    // Bounding-box prefilter keeps the O(n²) relate pass tractable
    let boxes: Vec<Rect<f64>> = geoms
        .iter()
        .map(|(id, g)| {
            g.bounding_rect().ok_or_else(|| Error::InvalidGeometry {
                feature: (*id).clone(),
                reason: "geometry has no bounding rectangle".into(),
            })
        })
        .collect::<Result<_>>()?;

    let n = geoms.len();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            if !boxes_touch(&boxes[i], &boxes[j]) {
                continue;
            }
            if is_contiguous(geoms[i].1, geoms[j].1, kind) {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }

    // Expand to the requested order: hop-h features enter at weight 1,
    // or 1/h when order decay is enabled
    let mut rows: BTreeMap<FeatureId, BTreeMap<FeatureId, f64>> = BTreeMap::new();
    for (i, (id, _)) in geoms.iter().enumerate() {
        let mut row = BTreeMap::new();
        let mut visited = vec![false; n];
        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

        visited[i] = true;
        queue.push_back((i, 0));

        while let Some((at, hop)) = queue.pop_front() {
            if hop == order {
                continue;
            }
            for &next in &adjacency[at] {
                if visited[next] {
                    continue;
                }
                visited[next] = true;
                let reached_at = hop + 1;
                let weight = if order_decay {
                    1.0 / reached_at as f64
                } else {
                    1.0
                };
                row.insert(geoms[next].0.clone(), weight);
                queue.push_back((next, reached_at));
            }
        }

        rows.insert((*id).clone(), row);
    }

    Ok(rows)
}

/// Collect (id, geometry) pairs, failing on the first null or empty
/// geometry.
fn checked_geometries(
    features: &FeatureCollection,
) -> Result<Vec<(&FeatureId, &Geometry<f64>)>> {
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
            Ok((&f.id, g))
        })
        .collect()
}

fn boxes_touch(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x
        && a.max().x >= b.min().x
        && a.min().y <= b.max().y
        && a.max().y >= b.min().y
}

fn is_contiguous(a: &Geometry<f64>, b: &Geometry<f64>, kind: ContiguityKind) -> bool {
    let im = a.relate(b);
    if !im.is_touches() {
        return false;
    }
    let boundary = im.get(CoordPos::OnBoundary, CoordPos::OnBoundary);
    match kind {
        ContiguityKind::Queen => true,
        ContiguityKind::Rook => matches!(
            boundary,
            Dimensions::OneDimensional | Dimensions::TwoDimensional
        ),
        ContiguityKind::Bishop => boundary == Dimensions::ZeroDimensional,
    }
}
