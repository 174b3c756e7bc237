//! End-to-end synthesis
//!
//! Stages run strictly in order: points, neighbor graph, pruning, regions,
//! layout. Graphs that come from elsewhere enter at [`analyze`], which still
//! prunes before labeling.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crate::config::GalaxyConfig;
use crate::error::{GraphError, Result};
use crate::generator::PointGenerator;
use crate::graph::Galaxy;
use crate::layout::{self, LayoutReport};
use crate::neighbors::NeighborGraphBuilder;
use crate::prune::{PruneReport, prune_to_largest_component};
use crate::regions::{RegionDetector, RegionReport};

/// Everything the pipeline learned while building a galaxy
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub galaxy: Galaxy,
    /// Stars drawn before pruning
    pub generated: usize,
    pub prune: PruneReport,
    pub regions: RegionReport,
    /// Present when layout iterations were requested
    pub layout: Option<LayoutReport>,
}

/// Generate a connected, labeled galaxy from `config`
///
/// Runs the layout stage too when `config.layout.iterations > 0`.
pub fn generate(config: &GalaxyConfig) -> Result<Synthesis> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let points = PointGenerator::new(&config.generator)?.generate(&mut rng);
    let generated = points.len();
    let galaxy = NeighborGraphBuilder::new(&config.neighbors)?.build(points, &mut rng);

    let (mut galaxy, prune, regions) = analyze(galaxy, config)?;

    let layout = if config.layout.iterations > 0 {
        Some(layout::layout(&mut galaxy, &config.layout)?)
    } else {
        None
    };

    info!(
        generated,
        stars = galaxy.len(),
        edges = galaxy.edge_count(),
        regions = regions.regions,
        constellations = regions.constellations,
        "galaxy synthesized"
    );
    Ok(Synthesis {
        galaxy,
        generated,
        prune,
        regions,
        layout,
    })
}

/// Prune an existing graph to one component and label it
pub fn analyze(
    galaxy: Galaxy,
    config: &GalaxyConfig,
) -> Result<(Galaxy, PruneReport, RegionReport)> {
    let detector = RegionDetector::new(&config.regions)?;
    let (mut galaxy, prune) = prune_to_largest_component(galaxy)?;
    let regions = detector.detect(&mut galaxy);
    Ok((galaxy, prune, regions))
}

/// Run the layout stage alone on a labeled galaxy
pub fn relayout(galaxy: &mut Galaxy, config: &GalaxyConfig) -> Result<LayoutReport> {
    galaxy.validate()?;
    if !galaxy.is_labeled() {
        return Err(GraphError::MissingLabels.into());
    }
    layout::layout(galaxy, &config.layout)
}
