//! Pipeline configuration
//!
//! Every section has defaults matching a 4000-star, six-armed galaxy, so a
//! config file only needs the values it wants to change.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest accepted `neighbors.neighbor_k`
pub const MAX_NEIGHBOR_K: usize = 1024;

/// Top-level configuration for the whole synthesis pipeline
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GalaxyConfig {
    /// Seed for every random draw in the pipeline
    pub seed: u64,
    pub generator: GeneratorConfig,
    pub neighbors: NeighborConfig,
    pub regions: RegionConfig,
    pub layout: LayoutConfig,
}

impl GalaxyConfig {
    /// Check every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generator.validate()?;
        self.neighbors.validate()?;
        self.regions.validate()?;
        self.layout.validate()
    }
}

/// Shape of the generated point cloud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Total number of stars to draw
    pub num_vertices: usize,
    /// Outer radius of the disk
    pub galaxy_radius: f64,
    /// Number of logarithmic spiral arms
    pub spiral_arm_count: u32,
    /// Larger values wind the arms less tightly
    pub spiral_tightness: f64,
    /// Vertical scale of the central bulge
    pub bulge_height: f64,
    /// Vertical scale of the disk and halo
    pub disk_height: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_vertices: 4000,
            galaxy_radius: 2000.0,
            spiral_arm_count: 6,
            spiral_tightness: 0.5,
            bulge_height: 150.0,
            disk_height: 50.0,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_vertices == 0 {
            return Err(ConfigError::invalid("num_vertices", "must be positive", 0.0));
        }
        if self.spiral_arm_count == 0 {
            return Err(ConfigError::invalid(
                "spiral_arm_count",
                "must be positive",
                0.0,
            ));
        }
        positive("galaxy_radius", self.galaxy_radius)?;
        positive("spiral_tightness", self.spiral_tightness)?;
        positive("bulge_height", self.bulge_height)?;
        positive("disk_height", self.disk_height)
    }
}

/// Nearest-neighbor query and edge retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborConfig {
    /// Neighbors examined per star, excluding the star itself
    pub neighbor_k: usize,
    /// Relative tolerance of the approximate query (0 = exact)
    pub neighbor_eps: f64,
    /// Acceptance threshold for the nearest optional candidate
    pub retention_threshold: f64,
    /// Second Beta shape parameter of the retention draw
    pub rank_beta: f64,
    /// How fast the threshold decays with distance relative to the nearest neighbor
    pub distance_falloff: f64,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self {
            neighbor_k: 20,
            neighbor_eps: 0.1,
            retention_threshold: 0.5,
            rank_beta: 2.6,
            distance_falloff: 0.25,
        }
    }
}

impl NeighborConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.neighbor_k < 2 {
            return Err(ConfigError::invalid(
                "neighbor_k",
                "must be at least 2",
                self.neighbor_k as f64,
            ));
        }
        if self.neighbor_k > MAX_NEIGHBOR_K {
            return Err(ConfigError::invalid(
                "neighbor_k",
                "must be at most 1024",
                self.neighbor_k as f64,
            ));
        }
        non_negative("neighbor_eps", self.neighbor_eps)?;
        positive("retention_threshold", self.retention_threshold)?;
        positive("rank_beta", self.rank_beta)?;
        non_negative("distance_falloff", self.distance_falloff)
    }
}

/// Community detection granularity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Coarsening pass whose partition becomes the constellation label
    pub constellation_iterations: u32,
    /// Coarsening pass whose partition becomes the region label
    pub region_iterations: u32,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            constellation_iterations: 2,
            region_iterations: 4,
        }
    }
}

impl RegionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.constellation_iterations == 0 {
            return Err(ConfigError::invalid(
                "constellation_iterations",
                "must be positive",
                0.0,
            ));
        }
        if self.region_iterations == 0 {
            return Err(ConfigError::invalid(
                "region_iterations",
                "must be positive",
                0.0,
            ));
        }
        Ok(())
    }
}

/// Force law family used by the layout engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceModel {
    /// Linear + inverse-cube repulsion, logarithmic edge attraction
    #[default]
    LogLinear,
    /// Inverse-square repulsion, linear spring attraction
    SpringCharge,
}

/// Force simulation constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Number of simulation iterations
    pub iterations: usize,
    pub model: ForceModel,
    pub repel_linear_multiplier: f64,
    pub repel_cubic_multiplier: f64,
    pub repel_quadratic_multiplier: f64,
    pub attraction_log_multiplier: f64,
    pub attraction_linear_multiplier: f64,
    /// Attraction scale for edges whose endpoints lie in different regions
    pub cross_region_attraction: f64,
    pub global_multiplier: f64,
    /// Strength of the pull toward the origin
    pub center_pull: f64,
    /// Strength of the pull toward the z = 0 plane
    pub plane_pull: f64,
    pub initial_timestep: f64,
    /// Added to the swing multiplier; above 0 lets steady motion accelerate
    pub swing_tolerance: f64,
    /// Wall-clock budget for a layout run
    pub time_limit_secs: Option<f64>,
    /// Iterations between progress log lines (derived from graph size if unset)
    pub progress_interval: Option<usize>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            iterations: 1,
            model: ForceModel::LogLinear,
            repel_linear_multiplier: 0.04,
            repel_cubic_multiplier: 50000.0,
            repel_quadratic_multiplier: 30000.0,
            attraction_log_multiplier: 0.2,
            attraction_linear_multiplier: 1.0,
            cross_region_attraction: 0.01,
            global_multiplier: 0.1,
            center_pull: 0.1,
            plane_pull: 1.0,
            initial_timestep: 5.0,
            swing_tolerance: 0.2,
            time_limit_secs: None,
            progress_interval: None,
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("repel_linear_multiplier", self.repel_linear_multiplier)?;
        non_negative("repel_cubic_multiplier", self.repel_cubic_multiplier)?;
        non_negative("repel_quadratic_multiplier", self.repel_quadratic_multiplier)?;
        non_negative("attraction_log_multiplier", self.attraction_log_multiplier)?;
        non_negative(
            "attraction_linear_multiplier",
            self.attraction_linear_multiplier,
        )?;
        non_negative("cross_region_attraction", self.cross_region_attraction)?;
        non_negative("global_multiplier", self.global_multiplier)?;
        non_negative("center_pull", self.center_pull)?;
        non_negative("plane_pull", self.plane_pull)?;
        non_negative("swing_tolerance", self.swing_tolerance)?;
        positive("initial_timestep", self.initial_timestep)?;
        if let Some(limit) = self.time_limit_secs {
            non_negative("time_limit_secs", limit)?;
            if Duration::try_from_secs_f64(limit).is_err() {
                return Err(ConfigError::invalid(
                    "time_limit_secs",
                    "must be a representable duration",
                    limit,
                ));
            }
        }
        if self.progress_interval == Some(0) {
            return Err(ConfigError::invalid(
                "progress_interval",
                "must be positive",
                0.0,
            ));
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must be positive and finite", value))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            "must be non-negative and finite",
            value,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(GalaxyConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_vertices() {
        let mut config = GalaxyConfig::default();
        config.generator.num_vertices = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "num_vertices",
                ..
            })
        ));
    }

    #[test]
    fn rejects_nan_and_negative_radius() {
        let mut config = GeneratorConfig::default();
        config.galaxy_radius = f64::NAN;
        assert!(config.validate().is_err());
        config.galaxy_radius = -1.0;
        assert!(config.validate().is_err());
        config.galaxy_radius = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_iterations() {
        let config = RegionConfig {
            constellation_iterations: 0,
            region_iterations: 3,
        };
        assert!(config.validate().is_err());

        let config = RegionConfig {
            constellation_iterations: 1,
            region_iterations: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn neighbor_k_is_bounded() {
        let mut config = NeighborConfig::default();
        config.neighbor_k = MAX_NEIGHBOR_K;
        assert!(config.validate().is_ok());
        config.neighbor_k = usize::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "neighbor_k",
                ..
            })
        ));
    }

    #[test]
    fn time_limit_must_fit_a_duration() {
        for secs in [-1.0, 1e20, f64::NAN] {
            let config = LayoutConfig {
                time_limit_secs: Some(secs),
                ..LayoutConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::Invalid {
                    field: "time_limit_secs",
                    ..
                })
            ));
        }
        let config = LayoutConfig {
            time_limit_secs: Some(0.0),
            ..LayoutConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_timestep() {
        let config = LayoutConfig {
            initial_timestep: 0.0,
            ..LayoutConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let yaml = "seed: 9\ngenerator:\n  num_vertices: 300\nlayout:\n  model: spring_charge\n";
        let config: GalaxyConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.generator.num_vertices, 300);
        assert_eq!(config.generator.galaxy_radius, 2000.0);
        assert_eq!(config.layout.model, ForceModel::SpringCharge);
        assert_eq!(config.regions, RegionConfig::default());
    }
}
