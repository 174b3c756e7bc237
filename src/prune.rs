//! Reduce a galaxy to its largest connected component

use std::collections::{BTreeSet, VecDeque};

use tracing::info;

use crate::error::GraphError;
use crate::graph::Galaxy;

/// Outcome of pruning: old-id to new-id mapping and what was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneReport {
    /// `remap[old] = Some(new)` for survivors, `None` for discarded stars
    pub remap: Vec<Option<usize>>,
    /// Number of connected components in the input
    pub components: usize,
    /// Number of stars discarded
    pub removed: usize,
}

impl PruneReport {
    /// New id of a surviving star
    pub fn new_id(&self, old: usize) -> Option<usize> {
        self.remap.get(old).copied().flatten()
    }
}

/// Label every vertex with its component, numbered in order of lowest member id
///
/// Returns the labels and the size of each component.
pub fn connected_components(galaxy: &Galaxy) -> (Vec<usize>, Vec<usize>) {
    const UNSEEN: usize = usize::MAX;
    let mut labels = vec![UNSEEN; galaxy.len()];
    let mut sizes = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..galaxy.len() {
        if labels[start] != UNSEEN {
            continue;
        }
        let component = sizes.len();
        labels[start] = component;
        queue.push_back(start);
        let mut size = 0;
        while let Some(v) = queue.pop_front() {
            size += 1;
            for &n in galaxy.neighbors(v) {
                if labels[n] == UNSEEN {
                    labels[n] = component;
                    queue.push_back(n);
                }
            }
        }
        sizes.push(size);
    }
    (labels, sizes)
}

/// Keep only the largest connected component, renumbering stars contiguously
///
/// Surviving stars keep their relative order and all their data. When two
/// components tie for largest, the one containing the lowest id wins.
pub fn prune_to_largest_component(galaxy: Galaxy) -> Result<(Galaxy, PruneReport), GraphError> {
    if galaxy.is_empty() {
        return Err(GraphError::Empty);
    }

    let (labels, sizes) = connected_components(&galaxy);
    let mut largest = 0;
    for (component, &size) in sizes.iter().enumerate() {
        if size > sizes[largest] {
            largest = component;
        }
    }
    if sizes[largest] < 2 {
        return Err(GraphError::TooSmall {
            remaining: sizes[largest],
        });
    }

    let mut remap = vec![None; galaxy.len()];
    let mut next = 0;
    for (old, &label) in labels.iter().enumerate() {
        if label == largest {
            remap[old] = Some(next);
            next += 1;
        }
    }

    let (stars, edges) = galaxy.into_parts();
    let total = stars.len();
    let mut kept_stars = Vec::with_capacity(next);
    let mut kept_edges = Vec::with_capacity(next);
    for ((old, star), neighbors) in stars.into_iter().enumerate().zip(edges) {
        if remap[old].is_none() {
            continue;
        }
        kept_stars.push(star);
        // neighbors of a survivor are in the same component
        kept_edges.push(
            neighbors
                .into_iter()
                .filter_map(|n| remap[n])
                .collect::<BTreeSet<_>>(),
        );
    }

    let pruned = Galaxy::from_parts(kept_stars, kept_edges)?;
    let report = PruneReport {
        remap,
        components: sizes.len(),
        removed: total - next,
    };
    info!(
        kept = pruned.len(),
        removed = report.removed,
        components = report.components,
        "pruned to largest component"
    );
    Ok((pruned, report))
}
