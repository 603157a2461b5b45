//! Two-dimensional k-d tree for nearest seed point lookup
//!
//! Ties between equidistant points always resolve to the lowest point index,
//! so queries are stable regardless of tree shape.

const fn coordinate(point: &[f64; 2], axis: usize) -> f64 {
    if axis == 0 { point[0] } else { point[1] }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    point: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Static k-d tree over a fixed set of points
#[derive(Debug, Clone)]
pub struct KdTree {
    points: Vec<[f64; 2]>,
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl KdTree {
    /// Build a balanced tree by median splits on alternating axes
    pub fn build(points: Vec<[f64; 2]>) -> Self {
        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        let root = Self::build_node(&points, &mut indices, 0, &mut nodes);
        Self {
            points,
            nodes,
            root,
        }
    }

    fn build_node(
        points: &[[f64; 2]],
        indices: &mut [usize],
        depth: usize,
        nodes: &mut Vec<Node>,
    ) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }
        let axis = depth % 2;
        indices.sort_by(|&a, &b| {
            let ka = points.get(a).map_or(0.0, |p| coordinate(p, axis));
            let kb = points.get(b).map_or(0.0, |p| coordinate(p, axis));
            ka.total_cmp(&kb).then(a.cmp(&b))
        });

        let median = indices.len() / 2;
        let point = indices.get(median).copied()?;
        let slot = nodes.len();
        nodes.push(Node {
            point,
            axis,
            left: None,
            right: None,
        });

        let (lower, upper) = indices.split_at_mut(median);
        let left = Self::build_node(points, lower, depth + 1, nodes);
        let right = Self::build_node(points, upper.get_mut(1..).unwrap_or(&mut []), depth + 1, nodes);
        if let Some(node) = nodes.get_mut(slot) {
            node.left = left;
            node.right = right;
        }
        Some(slot)
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the tree indexes no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the point closest to `query`, `None` for an empty tree
    pub fn nearest(&self, query: [f64; 2]) -> Option<usize> {
        let mut best: Option<(f64, usize)> = None;
        self.search(self.root, query, &mut best);
        best.map(|(_, index)| index)
    }

    fn search(&self, node: Option<usize>, query: [f64; 2], best: &mut Option<(f64, usize)>) {
        let Some(node) = node.and_then(|n| self.nodes.get(n)) else {
            return;
        };
        let Some(point) = self.points.get(node.point) else {
            return;
        };

        let dx = point[0] - query[0];
        let dy = point[1] - query[1];
        let distance = dx.mul_add(dx, dy * dy);
        let improves = best.is_none_or(|(best_distance, best_index)| {
            distance < best_distance || (distance == best_distance && node.point < best_index)
        });
        if improves {
            *best = Some((distance, node.point));
        }

        let delta = coordinate(&query, node.axis) - coordinate(point, node.axis);
        let (near, far) = if delta < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        self.search(near, query, best);

        // Equal distances must still be visited so the lower index can win
        if best.is_none_or(|(best_distance, _)| delta * delta <= best_distance) {
            self.search(far, query, best);
        }
    }
}
