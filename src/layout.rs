//! Force-directed layout with adaptive time steps
//!
//! Each iteration computes one force per star from a fixed snapshot of the
//! previous positions: all-pairs repulsion, attraction along edges (weakened
//! across region borders), and a global pull toward the origin and the z = 0
//! plane. Forces are evaluated in parallel; positions are only updated once
//! every force of the iteration exists.
//!
//! The global time step adapts to "swing": when forces keep their direction
//! between iterations the step grows, when they reverse it shrinks, by at most
//! 20% per iteration. Each star additionally scales the global step by its own
//! swing.

use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::{ForceModel, LayoutConfig};
use crate::error::{ConfigError, LayoutError};
use crate::graph::Galaxy;
use crate::vector::Vec3;

/// Largest relative change of the global time step in one iteration
pub const MAX_TIMESTEP_CHANGE: f64 = 0.2;

/// Squared distance floor for linear repulsion
const LINEAR_MIN_DISTANCE_SQ: f64 = 1.0;

/// Squared distance floor for cubic repulsion
const CUBIC_MIN_DISTANCE_SQ: f64 = 100.0;

/// Distance floor for inverse-square repulsion
const QUADRATIC_MIN_DISTANCE: f64 = 10.0;

/// Edges shorter than this exert no logarithmic attraction
const ATTRACTION_MIN_DISTANCE: f64 = 1.0;

/// Repulsion constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepulsionParams {
    pub model: ForceModel,
    pub linear: f64,
    pub cubic: f64,
    pub quadratic: f64,
}

/// Edge attraction constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttractionParams {
    pub model: ForceModel,
    /// Scale for edges whose endpoints lie in different regions
    pub cross_region: f64,
}

/// Origin and plane pull constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalParams {
    pub center_pull: f64,
    pub plane_pull: f64,
}

/// All force constants of one layout run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceParams {
    pub repulsion: RepulsionParams,
    pub attraction: AttractionParams,
    pub global: GlobalParams,
    pub attraction_multiplier: f64,
    pub global_multiplier: f64,
}

impl ForceParams {
    pub fn from_config(config: &LayoutConfig) -> Self {
        let attraction_multiplier = match config.model {
            ForceModel::LogLinear => config.attraction_log_multiplier,
            ForceModel::SpringCharge => config.attraction_linear_multiplier,
        };
        Self {
            repulsion: RepulsionParams {
                model: config.model,
                linear: config.repel_linear_multiplier,
                cubic: config.repel_cubic_multiplier,
                quadratic: config.repel_quadratic_multiplier,
            },
            attraction: AttractionParams {
                model: config.model,
                cross_region: config.cross_region_attraction,
            },
            global: GlobalParams {
                center_pull: config.center_pull,
                plane_pull: config.plane_pull,
            },
            attraction_multiplier,
            global_multiplier: config.global_multiplier,
        }
    }
}

/// Push on star `index` away from every other star
///
/// Distances are floored, so coincident stars yield a finite (zero) push.
pub fn repulsion(positions: &[Vec3], index: usize, params: &RepulsionParams) -> Vec3 {
    let position = positions[index];
    let mut total = Vec3::ZERO;

    for (other, &other_position) in positions.iter().enumerate() {
        if other == index {
            continue;
        }
        let displacement = position - other_position;
        let distance_sq = displacement.length_sq();

        match params.model {
            ForceModel::LogLinear => {
                let linear = params.linear / distance_sq.max(LINEAR_MIN_DISTANCE_SQ);
                let clamped = distance_sq.max(CUBIC_MIN_DISTANCE_SQ);
                let cubic = params.cubic / (clamped * clamped);
                total += displacement * (linear + cubic);
            }
            ForceModel::SpringCharge => {
                let distance = distance_sq.sqrt().max(QUADRATIC_MIN_DISTANCE);
                total += displacement * (params.quadratic / (distance * distance * distance));
            }
        }
    }
    total
}

/// Pull on star `index` toward each of its neighbors
pub fn attraction(
    positions: &[Vec3],
    regions: &[Option<usize>],
    neighbors: &BTreeSet<usize>,
    index: usize,
    params: &AttractionParams,
) -> Vec3 {
    let position = positions[index];
    let region = regions[index];
    let mut total = Vec3::ZERO;

    for &neighbor in neighbors {
        let displacement = positions[neighbor] - position;
        let strength = match params.model {
            ForceModel::LogLinear => {
                let length = displacement.length();
                if length <= ATTRACTION_MIN_DISTANCE {
                    continue;
                }
                length.ln() / length
            }
            ForceModel::SpringCharge => 1.0,
        };
        let scale = if regions[neighbor] == region {
            1.0
        } else {
            params.cross_region
        };
        total += displacement * (strength * scale);
    }
    total
}

/// Pull toward the origin plus a pull toward the z = 0 plane
pub fn global_force(position: Vec3, params: &GlobalParams) -> Vec3 {
    let center = -position.normalized() * params.center_pull;
    let plane = Vec3::new(0.0, 0.0, -position.z * params.plane_pull);
    center + plane
}

/// Cosine between two force directions, clamped to `[-1, 1]`
///
/// Zero forces have no direction and count as orthogonal.
pub fn swing_dot(previous: Vec3, current: Vec3) -> f64 {
    previous
        .normalized()
        .dot(current.normalized())
        .clamp(-1.0, 1.0)
}

/// New global time step from the average swing of all stars
///
/// The step is scaled by `1 - acos(avg_dot) / pi + tolerance`; a relative
/// change beyond [`MAX_TIMESTEP_CHANGE`] is replaced by exactly that change.
pub fn next_timestep(timestep: f64, previous: &[Vec3], current: &[Vec3], tolerance: f64) -> f64 {
    if current.is_empty() || previous.len() != current.len() {
        return timestep;
    }
    let dot_sum: f64 = previous
        .iter()
        .zip(current)
        .map(|(&p, &c)| swing_dot(p, c))
        .sum();
    let average = (dot_sum / current.len() as f64).clamp(-1.0, 1.0);

    let multiplier = 1.0 - average.acos() / PI + tolerance;
    let proposed = timestep * multiplier;

    if ((proposed - timestep) / timestep).abs() > MAX_TIMESTEP_CHANGE {
        if proposed > timestep {
            timestep * (1.0 + MAX_TIMESTEP_CHANGE)
        } else {
            timestep * (1.0 - MAX_TIMESTEP_CHANGE)
        }
    } else {
        proposed
    }
}

/// Per-star step: the global step scaled down by the star's own swing
pub fn local_timestep(global: f64, previous: Vec3, current: Vec3) -> f64 {
    global * ((swing_dot(previous, current) + 1.0) * 0.5).sqrt()
}

/// Bound on the cost of a layout run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutBudget {
    pub max_iterations: usize,
    pub time_limit: Option<Duration>,
}

impl LayoutBudget {
    pub fn iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            time_limit: None,
        }
    }

    /// Budget from `config`, rejecting time limits no [`Duration`] can hold
    pub fn from_config(config: &LayoutConfig) -> Result<Self, ConfigError> {
        let time_limit = config
            .time_limit_secs
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|_| {
                    ConfigError::invalid(
                        "time_limit_secs",
                        "must be a representable duration",
                        secs,
                    )
                })
            })
            .transpose()?;
        Ok(Self {
            max_iterations: config.iterations,
            time_limit,
        })
    }
}

/// Outcome of a layout run
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutReport {
    pub iterations_run: usize,
    /// Global time step used by each iteration
    pub timesteps: Vec<f64>,
    /// The time limit ended the run before `max_iterations`
    pub stopped_early: bool,
}

/// Iterative force simulation over a labeled galaxy
///
/// Holds its own copy of positions; [`LayoutEngine::into_positions`] hands
/// them back once the run is done.
pub struct LayoutEngine<'a> {
    adjacency: &'a [BTreeSet<usize>],
    regions: Vec<Option<usize>>,
    positions: Vec<Vec3>,
    previous_forces: Option<Vec<Vec3>>,
    params: ForceParams,
    timestep: f64,
    swing_tolerance: f64,
    progress_interval: usize,
    iteration: usize,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(galaxy: &'a Galaxy, config: &LayoutConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let n = galaxy.len().max(1);
        let progress_interval = config
            .progress_interval
            .unwrap_or_else(|| (100_000 / (n * n)).max(1));

        Ok(Self {
            adjacency: galaxy.adjacency(),
            regions: galaxy.stars().iter().map(|s| s.region).collect(),
            positions: galaxy.positions(),
            previous_forces: None,
            params: ForceParams::from_config(config),
            timestep: config.initial_timestep,
            swing_tolerance: config.swing_tolerance,
            progress_interval,
            iteration: 0,
        })
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn into_positions(self) -> Vec<Vec3> {
        self.positions
    }

    /// Global time step of the most recent iteration (initial value before any)
    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Combined force on star `index` for the current snapshot
    pub fn force_on(&self, index: usize) -> Vec3 {
        let params = &self.params;
        let repel = repulsion(&self.positions, index, &params.repulsion);
        let attract = attraction(
            &self.positions,
            &self.regions,
            &self.adjacency[index],
            index,
            &params.attraction,
        );
        let global = global_force(self.positions[index], &params.global);
        repel + attract * params.attraction_multiplier + global * params.global_multiplier
    }

    /// Run one iteration and return the global time step it used
    ///
    /// On error the positions are left as they were before the call.
    pub fn step(&mut self) -> Result<f64, LayoutError> {
        let forces: Vec<Vec3> = (0..self.positions.len())
            .into_par_iter()
            .map(|i| self.force_on(i))
            .collect();

        let timestep = match &self.previous_forces {
            Some(previous) => {
                next_timestep(self.timestep, previous, &forces, self.swing_tolerance)
            }
            None => self.timestep,
        };
        if !(timestep.is_finite() && timestep > 0.0) {
            return Err(LayoutError::DegenerateTimestep(timestep));
        }

        let mut updated = Vec::with_capacity(self.positions.len());
        for (vertex, (&position, &force)) in self.positions.iter().zip(&forces).enumerate() {
            let local = match &self.previous_forces {
                Some(previous) => local_timestep(timestep, previous[vertex], force),
                None => timestep,
            };
            let next = position + force * local;
            if !next.is_finite() {
                return Err(LayoutError::NonFinite {
                    iteration: self.iteration,
                    vertex,
                });
            }
            updated.push(next);
        }

        self.positions = updated;
        self.previous_forces = Some(forces);
        self.timestep = timestep;
        self.iteration += 1;
        Ok(timestep)
    }

    /// Iterate until the budget is spent
    ///
    /// The time limit is checked between iterations, so a run always ends on
    /// a completed position update.
    pub fn run(&mut self, budget: &LayoutBudget) -> Result<LayoutReport, LayoutError> {
        let start = Instant::now();
        let mut timesteps = Vec::with_capacity(budget.max_iterations);
        let mut stopped_early = false;

        for i in 0..budget.max_iterations {
            timesteps.push(self.step()?);

            if i % self.progress_interval == 0 {
                let elapsed = start.elapsed();
                let fraction = (i + 1) as f64 / budget.max_iterations as f64;
                let remaining = elapsed.mul_f64((1.0 - fraction) / fraction);
                info!(
                    percent = fraction * 100.0,
                    timestep = self.timestep,
                    remaining = ?remaining,
                    "layout progress"
                );
            }

            let more = i + 1 < budget.max_iterations;
            if more && budget.time_limit.is_some_and(|limit| start.elapsed() >= limit) {
                debug!(iterations = i + 1, "layout time limit reached");
                stopped_early = true;
                break;
            }
        }

        Ok(LayoutReport {
            iterations_run: timesteps.len(),
            timesteps,
            stopped_early,
        })
    }
}

/// Lay out `galaxy` in place under `config`'s iteration count and time limit
pub fn layout(galaxy: &mut Galaxy, config: &LayoutConfig) -> crate::Result<LayoutReport> {
    let mut engine = LayoutEngine::new(galaxy, config)?;
    let budget = LayoutBudget::from_config(config)?;
    let report = engine.run(&budget)?;
    let positions = engine.into_positions();

    for (star, position) in galaxy.stars_mut().iter_mut().zip(positions) {
        star.position = position;
    }
    info!(iterations = report.iterations_run, "layout finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_linear() -> ForceParams {
        ForceParams::from_config(&LayoutConfig::default())
    }

    fn spring_charge() -> ForceParams {
        ForceParams::from_config(&LayoutConfig {
            model: ForceModel::SpringCharge,
            ..LayoutConfig::default()
        })
    }

    fn labeled_pair(distance: f64, regions: [usize; 2]) -> Galaxy {
        let mut galaxy = Galaxy::from_positions(vec![Vec3::ZERO, Vec3::new(distance, 0.0, 0.0)]);
        galaxy.connect(0, 1);
        for (star, region) in galaxy.stars_mut().iter_mut().zip(regions) {
            star.region = Some(region);
            star.constellation = Some(region);
        }
        galaxy
    }

    #[test]
    fn coincident_stars_repel_finitely() {
        let positions = vec![Vec3::new(4.0, 4.0, 4.0); 2];
        for params in [log_linear(), spring_charge()] {
            let force = repulsion(&positions, 0, &params.repulsion);
            assert!(force.is_finite());
        }
    }

    #[test]
    fn near_stars_repel_with_clamped_magnitude() {
        let positions = vec![Vec3::ZERO, Vec3::new(1e-9, 0.0, 0.0)];
        let force = repulsion(&positions, 0, &log_linear().repulsion);
        assert!(force.is_finite());
        assert!(force.x < 0.0);
    }

    #[test]
    fn repulsion_points_away() {
        let positions = vec![Vec3::ZERO, Vec3::new(20.0, 0.0, 0.0)];
        let params = log_linear();
        assert!(repulsion(&positions, 0, &params.repulsion).x < 0.0);
        assert!(repulsion(&positions, 1, &params.repulsion).x > 0.0);
    }

    #[test]
    fn repulsion_decays_with_distance() {
        let params = log_linear().repulsion;
        let near = repulsion(&[Vec3::ZERO, Vec3::new(15.0, 0.0, 0.0)], 0, &params).length();
        let far = repulsion(&[Vec3::ZERO, Vec3::new(150.0, 0.0, 0.0)], 0, &params).length();
        assert!(near > far);
    }

    #[test]
    fn attraction_weaker_across_regions() {
        let params = log_linear().attraction;
        let same = labeled_pair(50.0, [0, 0]);
        let cross = labeled_pair(50.0, [0, 1]);
        let regions = |g: &Galaxy| g.stars().iter().map(|s| s.region).collect::<Vec<_>>();

        let f_same = attraction(&same.positions(), &regions(&same), same.neighbors(0), 0, &params);
        let f_cross =
            attraction(&cross.positions(), &regions(&cross), cross.neighbors(0), 0, &params);

        assert!(f_same.x > 0.0);
        assert!((f_cross.x - f_same.x * params.cross_region).abs() < 1e-12);
    }

    #[test]
    fn attraction_at_zero_distance_is_zero() {
        let galaxy = labeled_pair(0.0, [0, 0]);
        let regions = vec![Some(0), Some(0)];
        let force = attraction(
            &galaxy.positions(),
            &regions,
            galaxy.neighbors(0),
            0,
            &log_linear().attraction,
        );
        assert_eq!(force, Vec3::ZERO);
    }

    #[test]
    fn global_force_pulls_to_origin_and_plane() {
        let params = log_linear().global;
        let force = global_force(Vec3::new(10.0, 0.0, 5.0), &params);
        assert!(force.x < 0.0);
        assert!(force.z < 0.0);
        assert_eq!(global_force(Vec3::ZERO, &params), Vec3::ZERO);
    }

    #[test]
    fn steady_forces_speed_up_by_at_most_twenty_percent() {
        let forces = vec![Vec3::new(1.0, 0.0, 0.0); 4];
        let next = next_timestep(5.0, &forces, &forces, 0.2);
        assert!((next - 6.0).abs() < 1e-12);

        let next = next_timestep(5.0, &forces, &forces, 0.5);
        assert!((next - 6.0).abs() < 1e-12);
    }

    #[test]
    fn reversing_forces_clamp_to_twenty_percent_slowdown() {
        let previous = vec![Vec3::new(1.0, 0.0, 0.0); 4];
        let current = vec![Vec3::new(-1.0, 0.0, 0.0); 4];
        let next = next_timestep(5.0, &previous, &current, 0.2);
        assert!((next - 4.0).abs() < 1e-12);
    }

    #[test]
    fn small_swing_changes_are_not_clamped() {
        // orthogonal forces: multiplier = 1 - 1/2 + 0.6
        let previous = vec![Vec3::new(1.0, 0.0, 0.0)];
        let current = vec![Vec3::new(0.0, 1.0, 0.0)];
        let next = next_timestep(10.0, &previous, &current, 0.6);
        assert!((next - 11.0).abs() < 1e-9);
    }

    #[test]
    fn local_timestep_follows_own_swing() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        assert!((local_timestep(2.0, x, x) - 2.0).abs() < 1e-12);
        assert!(local_timestep(2.0, x, -x).abs() < 1e-12);
        let y = Vec3::new(0.0, 3.0, 0.0);
        assert!((local_timestep(2.0, x, y) - 2.0 * 0.5_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn first_step_uses_initial_timestep() {
        let galaxy = labeled_pair(30.0, [0, 0]);
        let config = LayoutConfig::default();
        let mut engine = LayoutEngine::new(&galaxy, &config).unwrap();
        let used = engine.step().unwrap();
        assert_eq!(used, config.initial_timestep);

        let expected: Vec<Vec3> = (0..2)
            .map(|i| {
                let engine = LayoutEngine::new(&galaxy, &config).unwrap();
                galaxy.star(i).position + engine.force_on(i) * config.initial_timestep
            })
            .collect();
        assert_eq!(engine.positions(), expected.as_slice());
    }

    #[test]
    fn updates_read_only_the_snapshot() {
        let mut galaxy = Galaxy::from_positions(vec![
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(12.0, 3.0, -2.0),
            Vec3::new(-7.0, 9.0, 0.5),
        ]);
        galaxy.connect(0, 1);
        galaxy.connect(1, 2);
        let config = LayoutConfig::default();

        let mut engine = LayoutEngine::new(&galaxy, &config).unwrap();
        let before: Vec<Vec3> = (0..3).map(|i| engine.force_on(i)).collect();
        engine.step().unwrap();

        for (i, force) in before.iter().enumerate() {
            let expected = galaxy.star(i).position + *force * config.initial_timestep;
            assert_eq!(engine.positions()[i], expected);
        }
    }

    #[test]
    fn timestep_stays_positive_and_bounded() {
        let galaxy = labeled_pair(40.0, [0, 1]);
        let config = LayoutConfig::default();
        let mut engine = LayoutEngine::new(&galaxy, &config).unwrap();
        let report = engine.run(&LayoutBudget::iterations(25)).unwrap();

        assert_eq!(report.iterations_run, 25);
        assert!(!report.stopped_early);
        let mut previous = config.initial_timestep;
        for &ts in &report.timesteps {
            assert!(ts > 0.0);
            assert!((ts - previous).abs() <= previous * MAX_TIMESTEP_CHANGE + 1e-12);
            previous = ts;
        }
    }

    #[test]
    fn zero_time_limit_stops_after_one_iteration() {
        let galaxy = labeled_pair(40.0, [0, 0]);
        let mut engine = LayoutEngine::new(&galaxy, &LayoutConfig::default()).unwrap();
        let budget = LayoutBudget {
            max_iterations: 50,
            time_limit: Some(Duration::ZERO),
        };
        let report = engine.run(&budget).unwrap();
        assert_eq!(report.iterations_run, 1);
        assert!(report.stopped_early);
        assert_eq!(engine.iteration(), 1);
    }

    #[test]
    fn negative_time_limit_is_a_config_error() {
        let mut galaxy = labeled_pair(25.0, [0, 0]);
        let before = galaxy.clone();
        let config = LayoutConfig {
            time_limit_secs: Some(-1.0),
            ..LayoutConfig::default()
        };
        assert!(matches!(
            layout(&mut galaxy, &config),
            Err(crate::Error::Config(ConfigError::Invalid {
                field: "time_limit_secs",
                ..
            }))
        ));
        assert_eq!(galaxy, before);
    }

    #[test]
    fn oversized_time_limit_is_a_config_error() {
        let mut galaxy = labeled_pair(25.0, [0, 0]);
        for secs in [1e20, f64::NAN, f64::INFINITY] {
            let config = LayoutConfig {
                time_limit_secs: Some(secs),
                ..LayoutConfig::default()
            };
            assert!(config.validate().is_err());
            assert!(LayoutBudget::from_config(&config).is_err());
            assert!(matches!(
                layout(&mut galaxy, &config),
                Err(crate::Error::Config(ConfigError::Invalid { .. }))
            ));
        }
    }

    #[test]
    fn budget_carries_time_limit() {
        let config = LayoutConfig {
            iterations: 7,
            time_limit_secs: Some(1.5),
            ..LayoutConfig::default()
        };
        let budget = LayoutBudget::from_config(&config).unwrap();
        assert_eq!(budget.max_iterations, 7);
        assert_eq!(budget.time_limit, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn layout_is_deterministic() {
        let mut a = labeled_pair(25.0, [0, 1]);
        let mut b = a.clone();
        let config = LayoutConfig {
            iterations: 10,
            ..LayoutConfig::default()
        };
        layout(&mut a, &config).unwrap();
        layout(&mut b, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn layout_keeps_labels_and_attributes() {
        let mut galaxy = labeled_pair(25.0, [3, 4]);
        galaxy.set_attribute(0, "security", serde_json::json!(0.4));
        layout(&mut galaxy, &LayoutConfig::default()).unwrap();
        assert_eq!(galaxy.star(0).region, Some(3));
        assert_eq!(galaxy.star(1).constellation, Some(4));
        assert_eq!(
            galaxy.star(0).attributes.get("security"),
            Some(&serde_json::json!(0.4))
        );
    }

    #[test]
    fn unstable_constants_are_reported() {
        let galaxy = labeled_pair(1.0, [0, 0]);
        let config = LayoutConfig {
            repel_linear_multiplier: f64::MAX,
            ..LayoutConfig::default()
        };
        let mut engine = LayoutEngine::new(&galaxy, &config).unwrap();
        let before = engine.positions().to_vec();
        let result = engine.step();
        assert!(matches!(result, Err(LayoutError::NonFinite { iteration: 0, .. })));
        assert_eq!(engine.positions(), before.as_slice());
    }
}
