//! k-d tree over star positions for nearest-neighbor queries

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::vector::Vec3;

/// One result of a nearest-neighbor query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

#[derive(Debug, Clone)]
struct Node {
    point: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Static 3D k-d tree; node and point references are indices
#[derive(Debug, Clone)]
pub struct KdTree {
    points: Vec<Vec3>,
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl KdTree {
    pub fn new(points: &[Vec3]) -> Self {
        let mut order: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        let root = build(points, &mut order, 0, &mut nodes);
        Self {
            points: points.to_vec(),
            nodes,
            root,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The `k` nearest points to `point`, closest first
    ///
    /// `eps` relaxes subtree pruning: every returned distance is within a
    /// factor `1 + eps` of the true k-th nearest distance. `exclude` skips one
    /// index (normally the query point itself). Fewer than `k` results are
    /// returned when the tree holds too few points. Ties are ordered by index.
    pub fn nearest(&self, point: Vec3, k: usize, eps: f64, exclude: Option<usize>) -> Vec<Neighbor> {
        let k = k.min(self.points.len());
        if k == 0 {
            return Vec::new();
        }
        let mut search = Search {
            tree: self,
            query: point,
            k,
            slack: (1.0 + eps) * (1.0 + eps),
            exclude,
            heap: BinaryHeap::with_capacity(k + 1),
        };
        if let Some(root) = self.root {
            search.visit(root);
        }

        let mut found = search.heap.into_sorted_vec();
        found.truncate(k);
        found
            .into_iter()
            .map(|c| Neighbor {
                index: c.index,
                distance: c.dist_sq.sqrt(),
            })
            .collect()
    }
}

fn build(points: &[Vec3], order: &mut [usize], depth: usize, nodes: &mut Vec<Node>) -> Option<usize> {
    if order.is_empty() {
        return None;
    }
    let axis = depth % 3;
    let mid = order.len() / 2;
    order.select_nth_unstable_by(mid, |&a, &b| {
        points[a]
            .axis(axis)
            .total_cmp(&points[b].axis(axis))
            .then(a.cmp(&b))
    });

    let slot = nodes.len();
    nodes.push(Node {
        point: order[mid],
        axis,
        left: None,
        right: None,
    });

    let (lower, upper) = order.split_at_mut(mid);
    let left = build(points, lower, depth + 1, nodes);
    let right = build(points, &mut upper[1..], depth + 1, nodes);
    nodes[slot].left = left;
    nodes[slot].right = right;
    Some(slot)
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    dist_sq: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist_sq
            .total_cmp(&other.dist_sq)
            .then(self.index.cmp(&other.index))
    }
}

struct Search<'a> {
    tree: &'a KdTree,
    query: Vec3,
    k: usize,
    slack: f64,
    exclude: Option<usize>,
    heap: BinaryHeap<Candidate>,
}

impl Search<'_> {
    fn visit(&mut self, slot: usize) {
        let node = &self.tree.nodes[slot];
        let point = self.tree.points[node.point];

        if self.exclude != Some(node.point) {
            self.offer(Candidate {
                dist_sq: (point - self.query).length_sq(),
                index: node.point,
            });
        }

        let diff = self.query.axis(node.axis) - point.axis(node.axis);
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(near) = near {
            self.visit(near);
        }
        if let Some(far) = far {
            let full = self.heap.len() >= self.k;
            let worst = self.heap.peek().map_or(f64::INFINITY, |c| c.dist_sq);
            if !full || diff * diff * self.slack <= worst {
                self.visit(far);
            }
        }
    }

    fn offer(&mut self, candidate: Candidate) {
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if self.heap.peek().is_some_and(|worst| candidate < *worst) {
            self.heap.pop();
            self.heap.push(candidate);
        }
    }
}
