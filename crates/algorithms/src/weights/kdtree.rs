//! 2D k-d tree over feature centroids
//!
//! Provides k-nearest-neighbor and radius queries for distance-based
//! weights construction, replacing O(n²) brute-force pair scans. Works in
//! either Euclidean or Manhattan metric: pruning compares the axis offset
//! to the current bound, and the per-axis offset never exceeds the true
//! distance in either metric.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use super::DistanceMetric;

/// A centroid indexed back to its position in the feature collection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexedPoint {
    pub x: f64,
    pub y: f64,
    /// Position of the owning feature in the collection
    pub item: usize,
}

/// A neighbor returned from a query
#[derive(Debug, Clone, Copy)]
pub(crate) struct Neighbor {
    pub item: usize,
    pub distance: f64,
}

#[derive(Debug)]
struct KdNode {
    /// Index into `points`
    point_idx: usize,
    /// Split dimension: 0 = x, 1 = y
    split_dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// A 2D k-d tree in a caller-chosen metric.
#[derive(Debug)]
pub(crate) struct CentroidIndex {
    nodes: Vec<KdNode>,
    points: Vec<IndexedPoint>,
    metric: DistanceMetric,
}

impl CentroidIndex {
    /// Build the index. O(n log n) using median-of-coordinate splitting.
    pub fn build(points: Vec<IndexedPoint>, metric: DistanceMetric) -> Self {
        if points.is_empty() {
            return Self {
                nodes: Vec::new(),
                points,
                metric,
            };
        }

        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        build_recursive(&points, &mut indices, 0, &mut nodes);

        Self {
            nodes,
            points,
            metric,
        }
    }

    /// The k nearest points to (qx, qy), sorted ascending by distance.
    ///
    /// Tie order at equal distance is unspecified here; callers needing a
    /// total order re-sort by (distance, id).
    pub fn nearest_k(&self, qx: f64, qy: f64, k: usize) -> Vec<Neighbor> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }

        // Bounded "max-heap" kept as a vec sorted descending by distance
        let mut heap: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, qx, qy, k, &mut heap);

        heap.sort_by(|a, b| a.0.total_cmp(&b.0));
        heap.into_iter()
            .map(|(distance, idx)| Neighbor {
                item: self.points[idx].item,
                distance,
            })
            .collect()
    }

    /// All points within `radius` of (qx, qy), inclusive, in no particular
    /// order.
    pub fn within(&self, qx: f64, qy: f64, radius: f64) -> Vec<Neighbor> {
        if self.nodes.is_empty() || radius < 0.0 {
            return Vec::new();
        }

        let mut results = Vec::new();
        self.radius_recursive(0, qx, qy, radius, &mut results);
        results
    }

    fn distance_to(&self, point_idx: usize, qx: f64, qy: f64) -> f64 {
        let p = &self.points[point_idx];
        self.metric.eval(p.x - qx, p.y - qy)
    }

    fn knn_recursive(
        &self,
        node_idx: usize,
        qx: f64,
        qy: f64,
        k: usize,
        heap: &mut Vec<(f64, usize)>,
    ) {
        let node = &self.nodes[node_idx];
        let dist = self.distance_to(node.point_idx, qx, qy);

        let bound = if heap.len() >= k { heap[0].0 } else { f64::MAX };
        if dist < bound || heap.len() < k {
            if heap.len() >= k {
                heap.remove(0);
            }
            let pos = heap
                .binary_search_by(|probe| probe.0.total_cmp(&dist).reverse())
                .unwrap_or_else(|e| e);
            heap.insert(pos, (dist, node.point_idx));
        }

        let p = &self.points[node.point_idx];
        let diff = if node.split_dim == 0 { qx - p.x } else { qy - p.y };
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.knn_recursive(child, qx, qy, k, heap);
        }

        let bound = if heap.len() >= k { heap[0].0 } else { f64::MAX };
        if diff.abs() <= bound {
            if let Some(child) = second {
                self.knn_recursive(child, qx, qy, k, heap);
            }
        }
    }

    fn radius_recursive(
        &self,
        node_idx: usize,
        qx: f64,
        qy: f64,
        radius: f64,
        results: &mut Vec<Neighbor>,
    ) {
        let node = &self.nodes[node_idx];
        let dist = self.distance_to(node.point_idx, qx, qy);

        if dist <= radius {
            results.push(Neighbor {
                item: self.points[node.point_idx].item,
                distance: dist,
            });
        }

        let p = &self.points[node.point_idx];
        let diff = if node.split_dim == 0 { qx - p.x } else { qy - p.y };

        if let Some(left) = node.left {
            if diff < 0.0 || diff.abs() <= radius {
                self.radius_recursive(left, qx, qy, radius, results);
            }
        }
        if let Some(right) = node.right {
            if diff >= 0.0 || diff.abs() <= radius {
                self.radius_recursive(right, qx, qy, radius, results);
            }
        }
    }
}

fn build_recursive(
    points: &[IndexedPoint],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let n = indices.len();
    let split_dim = (depth % 2) as u8;

    indices.sort_by(|&a, &b| {
        let va = if split_dim == 0 { points[a].x } else { points[a].y };
        let vb = if split_dim == 0 { points[b].x } else { points[b].y };
        va.total_cmp(&vb)
    });

    let median = n / 2;
    let point_idx = indices[median];

    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx,
        split_dim,
        left: None,
        right: None,
    });

    if median > 0 {
        let mut left_indices = indices[..median].to_vec();
        let left = build_recursive(points, &mut left_indices, depth + 1, nodes);
        nodes[node_idx].left = Some(left);
    }
    if median + 1 < n {
        let mut right_indices = indices[median + 1..].to_vec();
        let right = build_recursive(points, &mut right_indices, depth + 1, nodes);
        nodes[node_idx].right = Some(right);
    }

    node_idx
}
