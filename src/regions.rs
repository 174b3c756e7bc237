//! Hierarchical community detection
//!
//! Stars are grouped by repeated greedy modularity optimization. Each pass
//! collapses the previous pass's communities into single weighted nodes and
//! runs a local-moving search over that smaller graph, so communities only
//! ever merge. Two passes are snapshotted: the finer one becomes the
//! constellation label and the coarser one the region label.
//!
//! Modularity of a community `C` over a weighted graph with total degree
//! `D` is `in(C) / D - (tot(C) / D)^2`, where `in(C)` sums `w(u, v)` over
//! ordered pairs with both ends in `C` (self-loops once) and `tot(C)` sums the
//! weighted degree of each member. A partition's modularity is the sum over
//! its communities.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, info, warn};

use crate::config::RegionConfig;
use crate::error::ConfigError;
use crate::graph::Galaxy;

/// Gains at or below this are treated as no improvement
const MIN_GAIN: f64 = 1e-12;

/// Weighted, symmetric graph over the communities of one coarsening pass
///
/// A base edge inside one community becomes a self-loop of weight 2 (both
/// half-edges); an edge between communities adds 1 in each direction.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityGraph {
    weights: Vec<BTreeMap<usize, f64>>,
    degrees: Vec<f64>,
    degree_sum: f64,
}

impl CommunityGraph {
    /// Collapse `galaxy` under `membership` (star id → community node in `0..count`)
    pub fn from_galaxy(galaxy: &Galaxy, membership: &[usize], count: usize) -> Self {
        let mut weights = vec![BTreeMap::new(); count];
        for (a, neighbors) in galaxy.adjacency().iter().enumerate() {
            for &b in neighbors.range(a + 1..) {
                let (ca, cb) = (membership[a], membership[b]);
                if ca == cb {
                    *weights[ca].entry(ca).or_insert(0.0) += 2.0;
                } else {
                    *weights[ca].entry(cb).or_insert(0.0) += 1.0;
                    *weights[cb].entry(ca).or_insert(0.0) += 1.0;
                }
            }
        }
        Self::from_weights(weights)
    }

    /// Build from undirected weighted edges; `(a, a, w)` adds a self-loop of weight `w`
    pub fn from_edges(count: usize, edges: &[(usize, usize, f64)]) -> Self {
        let mut weights = vec![BTreeMap::new(); count];
        for &(a, b, w) in edges {
            *weights[a].entry(b).or_insert(0.0) += w;
            if a != b {
                *weights[b].entry(a).or_insert(0.0) += w;
            }
        }
        Self::from_weights(weights)
    }

    fn from_weights(weights: Vec<BTreeMap<usize, f64>>) -> Self {
        let degrees: Vec<f64> = weights.iter().map(|w| w.values().sum()).collect();
        let degree_sum = degrees.iter().sum();
        Self {
            weights,
            degrees,
            degree_sum,
        }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Sum of every entry of the weight matrix
    pub fn degree_sum(&self) -> f64 {
        self.degree_sum
    }

    pub fn degree(&self, node: usize) -> f64 {
        self.degrees[node]
    }

    pub fn weight(&self, a: usize, b: usize) -> f64 {
        self.weights[a].get(&b).copied().unwrap_or(0.0)
    }

    /// Weighted neighbors of `node`, including a self-loop if present
    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.weights[node].iter().map(|(&n, &w)| (n, w))
    }

    fn modularity_of(&self, inner: f64, total: f64) -> f64 {
        let d = self.degree_sum;
        inner / d - (total / d) * (total / d)
    }
}

/// Modularity of one community, computed directly from the definition
pub fn community_modularity(graph: &CommunityGraph, members: &BTreeSet<usize>) -> f64 {
    if graph.degree_sum() <= 0.0 {
        return 0.0;
    }
    let mut inner = 0.0;
    let mut total = 0.0;
    for &v in members {
        for (n, w) in graph.neighbors(v) {
            if members.contains(&n) {
                inner += w;
            }
            total += w;
        }
    }
    graph.modularity_of(inner, total)
}

/// Total modularity of `assignment` (node → community id)
pub fn partition_modularity(graph: &CommunityGraph, assignment: &[usize]) -> f64 {
    let mut communities: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for (node, &community) in assignment.iter().enumerate() {
        communities.entry(community).or_default().insert(node);
    }
    communities
        .values()
        .map(|members| community_modularity(graph, members))
        .sum()
}

/// One accepted move of the local search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Move {
    pub node: usize,
    pub from: usize,
    pub to: usize,
    /// Strictly positive modularity increase
    pub gain: f64,
}

/// Result of one local-moving optimization
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Community of each node, named by one of its member nodes
    pub assignment: Vec<usize>,
    pub modularity: f64,
    pub moves: usize,
}

impl Partition {
    /// Relabel communities densely as `0..count`, in order of first member
    pub fn canonical(&self) -> (Vec<usize>, usize) {
        let mut names = BTreeMap::new();
        let labels = self
            .assignment
            .iter()
            .map(|&c| {
                let next = names.len();
                *names.entry(c).or_insert(next)
            })
            .collect();
        (labels, names.len())
    }
}

/// Cached aggregate of one community
#[derive(Debug, Clone, Copy, Default)]
struct Community {
    inner: f64,
    total: f64,
    modularity: f64,
}

/// Greedy local search: every node starts alone and moves to the neighboring
/// community with the largest strict modularity gain until nothing improves
pub fn optimize(graph: &CommunityGraph) -> Partition {
    optimize_with(graph, |_| {})
}

/// As [`optimize`], reporting every accepted move to `on_move`
///
/// The worklist is FIFO, seeded in node order. Among equal gains the
/// community with the lowest id wins.
pub fn optimize_with<F: FnMut(&Move)>(graph: &CommunityGraph, mut on_move: F) -> Partition {
    let n = graph.len();
    let mut assignment: Vec<usize> = (0..n).collect();
    if graph.degree_sum() <= 0.0 {
        return Partition {
            assignment,
            modularity: 0.0,
            moves: 0,
        };
    }

    let mut communities: Vec<Community> = (0..n)
        .map(|v| {
            let inner = graph.weight(v, v);
            let total = graph.degree(v);
            Community {
                inner,
                total,
                modularity: graph.modularity_of(inner, total),
            }
        })
        .collect();

    let mut queue: VecDeque<usize> = (0..n).collect();
    let mut queued = vec![true; n];
    let mut moves = 0;

    while let Some(v) = queue.pop_front() {
        queued[v] = false;
        let from = assignment[v];

        let mut links: BTreeMap<usize, f64> = BTreeMap::new();
        let mut self_loop = 0.0;
        for (neighbor, w) in graph.neighbors(v) {
            if neighbor == v {
                self_loop = w;
            } else {
                *links.entry(assignment[neighbor]).or_insert(0.0) += w;
            }
        }
        if links.is_empty() {
            continue;
        }

        let degree = graph.degree(v);
        let to_from = links.get(&from).copied().unwrap_or(0.0);
        let source = communities[from];
        let left_inner = source.inner - 2.0 * to_from - self_loop;
        let left_total = source.total - degree;
        let left = Community {
            inner: left_inner,
            total: left_total,
            modularity: graph.modularity_of(left_inner, left_total),
        };

        let mut best: Option<(usize, f64, Community)> = None;
        for (&target, &to_target) in &links {
            if target == from {
                continue;
            }
            let dest = communities[target];
            let joined_inner = dest.inner + 2.0 * to_target + self_loop;
            let joined_total = dest.total + degree;
            let joined_modularity = graph.modularity_of(joined_inner, joined_total);

            let gain = left.modularity + joined_modularity - source.modularity - dest.modularity;
            if gain > MIN_GAIN && best.is_none_or(|(_, best_gain, _)| gain > best_gain) {
                best = Some((
                    target,
                    gain,
                    Community {
                        inner: joined_inner,
                        total: joined_total,
                        modularity: joined_modularity,
                    },
                ));
            }
        }

        let Some((to, gain, joined)) = best else {
            continue;
        };

        assignment[v] = to;
        communities[from] = left;
        communities[to] = joined;
        moves += 1;
        on_move(&Move {
            node: v,
            from,
            to,
            gain,
        });

        for (neighbor, _) in graph.neighbors(v) {
            if neighbor != v && assignment[neighbor] != to && !queued[neighbor] {
                queued[neighbor] = true;
                queue.push_back(neighbor);
            }
        }
    }

    let mut occupied = vec![false; n];
    for &community in &assignment {
        occupied[community] = true;
    }
    let modularity = communities
        .iter()
        .zip(&occupied)
        .filter(|&(_, &live)| live)
        .map(|(c, _)| c.modularity)
        .sum();

    Partition {
        assignment,
        modularity,
        moves,
    }
}

/// Summary of one coarsening pass
#[derive(Debug, Clone, PartialEq)]
pub struct PassSummary {
    /// Community-level nodes the pass started from
    pub nodes: usize,
    /// Communities after the pass
    pub communities: usize,
    pub modularity: f64,
    pub moves: usize,
}

/// What region detection produced
#[derive(Debug, Clone, PartialEq)]
pub struct RegionReport {
    pub passes: Vec<PassSummary>,
    pub constellations: usize,
    pub regions: usize,
}

/// Assigns constellation and region labels to every star
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionDetector {
    constellation_iterations: u32,
    region_iterations: u32,
}

impl RegionDetector {
    /// Region iterations below the constellation iterations are raised to match,
    /// making both labels the same partition
    pub fn new(config: &RegionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut region_iterations = config.region_iterations;
        if region_iterations < config.constellation_iterations {
            warn!(
                constellation_iterations = config.constellation_iterations,
                region_iterations, "region iterations below constellation iterations, clamping"
            );
            region_iterations = config.constellation_iterations;
        }
        Ok(Self {
            constellation_iterations: config.constellation_iterations,
            region_iterations,
        })
    }

    pub fn constellation_iterations(&self) -> u32 {
        self.constellation_iterations
    }

    pub fn region_iterations(&self) -> u32 {
        self.region_iterations
    }

    /// Label every star of `galaxy` in place
    pub fn detect(&self, galaxy: &mut Galaxy) -> RegionReport {
        let mut membership: Vec<usize> = (0..galaxy.len()).collect();
        let mut count = galaxy.len();
        let mut passes = Vec::with_capacity(self.region_iterations as usize);

        for pass in 1..=self.region_iterations {
            let graph = CommunityGraph::from_galaxy(galaxy, &membership, count);
            let partition = optimize(&graph);
            let (labels, communities) = partition.canonical();

            for community in membership.iter_mut() {
                *community = labels[*community];
            }

            debug!(
                pass,
                nodes = count,
                communities,
                modularity = partition.modularity,
                moves = partition.moves,
                "coarsening pass"
            );
            passes.push(PassSummary {
                nodes: count,
                communities,
                modularity: partition.modularity,
                moves: partition.moves,
            });
            count = communities;

            if pass == self.constellation_iterations {
                for (star, &community) in galaxy.stars_mut().iter_mut().zip(&membership) {
                    star.constellation = Some(community);
                }
            }
            if pass == self.region_iterations {
                for (star, &community) in galaxy.stars_mut().iter_mut().zip(&membership) {
                    star.region = Some(community);
                }
            }
        }

        let report = RegionReport {
            passes,
            constellations: galaxy.constellation_count(),
            regions: galaxy.region_count(),
        };
        info!(
            constellations = report.constellations,
            regions = report.regions,
            "detected regions"
        );
        report
    }
}
