//! Galaxy graph: star arena plus symmetric adjacency
//!
//! Stars live in a dense array indexed `0..n`; adjacency is a parallel array of
//! sorted neighbor-id sets. All cross-references are plain indices.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::vector::Vec3;

/// A single star system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Star {
    /// Position in 3D space
    pub position: Vec3,

    /// Coarse community label, set by region detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<usize>,

    /// Fine community label, set by region detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constellation: Option<usize>,

    /// Values attached by downstream consumers (centrality scores etc.)
    ///
    /// Carried through every pipeline stage untouched.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Star {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            region: None,
            constellation: None,
            attributes: BTreeMap::new(),
        }
    }
}

/// Undirected simple graph of stars
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Galaxy {
    stars: Vec<Star>,
    edges: Vec<BTreeSet<usize>>,
}

impl Galaxy {
    /// Create a graph with one unconnected star per position
    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        let edges = vec![BTreeSet::new(); positions.len()];
        let stars = positions.into_iter().map(Star::new).collect();
        Self { stars, edges }
    }

    /// Assemble a graph from raw parts, checking every structural invariant
    pub fn from_parts(stars: Vec<Star>, edges: Vec<BTreeSet<usize>>) -> Result<Self, GraphError> {
        let galaxy = Self { stars, edges };
        galaxy.validate()?;
        Ok(galaxy)
    }

    pub fn into_parts(self) -> (Vec<Star>, Vec<BTreeSet<usize>>) {
        (self.stars, self.edges)
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    pub fn stars_mut(&mut self) -> &mut [Star] {
        &mut self.stars
    }

    pub fn star(&self, id: usize) -> &Star {
        &self.stars[id]
    }

    pub fn neighbors(&self, id: usize) -> &BTreeSet<usize> {
        &self.edges[id]
    }

    pub fn adjacency(&self) -> &[BTreeSet<usize>] {
        &self.edges
    }

    /// Snapshot of every star's position, in id order
    pub fn positions(&self) -> Vec<Vec3> {
        self.stars.iter().map(|s| s.position).collect()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// Insert the undirected edge `a`–`b` into both endpoints
    ///
    /// Self-loops are never inserted. Returns whether the edge was new.
    pub fn connect(&mut self, a: usize, b: usize) -> bool {
        if a == b {
            return false;
        }
        let inserted = self.edges[a].insert(b);
        self.edges[b].insert(a);
        inserted
    }

    /// Attach an external attribute to a star
    pub fn set_attribute(&mut self, id: usize, key: impl Into<String>, value: serde_json::Value) {
        self.stars[id].attributes.insert(key.into(), value);
    }

    /// Check finite positions, symmetry, id range and absence of self-loops
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.edges.len() != self.stars.len() {
            return Err(GraphError::LengthMismatch {
                vertices: self.stars.len(),
                adjacency: self.edges.len(),
            });
        }
        if let Some(id) = self.stars.iter().position(|s| !s.position.is_finite()) {
            return Err(GraphError::NonFinitePosition(id));
        }
        for (a, neighbors) in self.edges.iter().enumerate() {
            for &b in neighbors {
                if b >= self.stars.len() {
                    return Err(GraphError::NeighborOutOfRange {
                        vertex: a,
                        neighbor: b,
                    });
                }
                if a == b {
                    return Err(GraphError::SelfLoop(a));
                }
                if !self.edges[b].contains(&a) {
                    return Err(GraphError::Asymmetric { a, b });
                }
            }
        }
        Ok(())
    }

    /// Breadth-first traversal from vertex 0 reaches every vertex
    pub fn is_connected(&self) -> bool {
        if self.is_empty() {
            return true;
        }
        let mut seen = vec![false; self.len()];
        let mut queue = VecDeque::from([0]);
        seen[0] = true;
        let mut visited = 1;
        while let Some(v) = queue.pop_front() {
            for &n in &self.edges[v] {
                if !seen[n] {
                    seen[n] = true;
                    visited += 1;
                    queue.push_back(n);
                }
            }
        }
        visited == self.len()
    }

    /// Number of distinct region labels present
    pub fn region_count(&self) -> usize {
        self.stars
            .iter()
            .filter_map(|s| s.region)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Number of distinct constellation labels present
    pub fn constellation_count(&self) -> usize {
        self.stars
            .iter()
            .filter_map(|s| s.constellation)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Whether every star carries both hierarchy labels
    pub fn is_labeled(&self) -> bool {
        self.stars
            .iter()
            .all(|s| s.region.is_some() && s.constellation.is_some())
    }
}
