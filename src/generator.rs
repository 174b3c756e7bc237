//! Procedural star placement
//!
//! Stars are drawn from three populations: logarithmic spiral arms (65%), a
//! central bulge (20%) and a diffuse outer halo (the remainder). Each draws a
//! normalized radius from a Beta distribution, an angle, and a vertical offset
//! from a triangular distribution whose envelope shrinks toward the rim.

use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution, Triangular};
use tracing::info;

use crate::config::GeneratorConfig;
use crate::error::ConfigError;
use crate::vector::Vec3;

/// Fraction of stars placed on the spiral arms
pub const SPIRAL_FRACTION: f64 = 0.65;

/// Fraction of stars placed in the central bulge
pub const BULGE_FRACTION: f64 = 0.2;

/// Bulge stars stay within this fraction of the galaxy radius
const BULGE_RADIUS_SCALE: f64 = 0.8;

/// Halo stars stay within this fraction of the galaxy radius
const HALO_RADIUS_SCALE: f64 = 0.9;

/// Draws star positions for a configured galaxy shape
#[derive(Debug, Clone)]
pub struct PointGenerator {
    config: GeneratorConfig,
    spiral_radius: Beta<f64>,
    arm_spread: Beta<f64>,
    bulge_radius: Beta<f64>,
    halo_radius: Beta<f64>,
}

impl PointGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            spiral_radius: beta(4.0, 4.0)?,
            arm_spread: beta(4.0, 4.0)?,
            bulge_radius: beta(1.5, 4.0)?,
            halo_radius: beta(2.0, 2.0)?,
        })
    }

    /// Population sizes `(spiral, bulge, halo)`, summing to `num_vertices`
    pub fn population_sizes(&self) -> (usize, usize, usize) {
        let n = self.config.num_vertices;
        let spiral = (n as f64 * SPIRAL_FRACTION) as usize;
        let bulge = (n as f64 * BULGE_FRACTION) as usize;
        (spiral, bulge, n - spiral - bulge)
    }

    /// Draw every star position, spiral arms first, then bulge, then halo
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Vec3> {
        let (spiral, bulge, halo) = self.population_sizes();
        let mut points = Vec::with_capacity(self.config.num_vertices);

        points.extend((0..spiral).map(|_| self.spiral_star(rng)));
        points.extend((0..bulge).map(|_| self.bulge_star(rng)));
        points.extend((0..halo).map(|_| self.halo_star(rng)));

        info!(spiral, bulge, halo, "generated star positions");
        points
    }

    fn spiral_star<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        let radius_pct = self.spiral_radius.sample(rng);
        let radius = radius_pct * self.config.galaxy_radius;

        let base_angle = radius.max(f64::EPSILON).ln() / self.config.spiral_tightness;

        let arm_count = self.config.spiral_arm_count;
        let spread = self.arm_spread.sample(rng);
        let arm = rng.random_range(0..arm_count);
        let arm_angle = (spread + f64::from(arm)) * TAU / f64::from(arm_count);

        let envelope = self.config.disk_height * (1.0 - radius_pct).sqrt();
        polar(radius, base_angle + arm_angle, vertical_offset(rng, envelope))
    }

    fn bulge_star<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        let radius_pct = self.bulge_radius.sample(rng);
        let radius = radius_pct * self.config.galaxy_radius * BULGE_RADIUS_SCALE;
        let angle = rng.random_range(0.0..TAU);

        let envelope = self.config.bulge_height * 20.0 * radius_pct * (1.0 - radius_pct).powi(7);
        polar(radius, angle, vertical_offset(rng, envelope))
    }

    fn halo_star<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        let radius_pct = self.halo_radius.sample(rng);
        let radius = radius_pct * self.config.galaxy_radius * HALO_RADIUS_SCALE;
        let angle = rng.random_range(0.0..TAU);

        let envelope = self.config.disk_height * (1.0 - radius_pct).sqrt();
        polar(radius, angle, vertical_offset(rng, envelope))
    }
}

/// Generate a galaxy's star positions from a seed
pub fn generate_points(config: &GeneratorConfig, seed: u64) -> Result<Vec<Vec3>, ConfigError> {
    let generator = PointGenerator::new(config)?;
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(generator.generate(&mut rng))
}

fn beta(alpha: f64, beta: f64) -> Result<Beta<f64>, ConfigError> {
    Beta::new(alpha, beta).map_err(|_| ConfigError::invalid("beta_shape", "must be positive", alpha))
}

fn polar(radius: f64, angle: f64, z: f64) -> Vec3 {
    Vec3::new(angle.cos() * radius, angle.sin() * radius, z)
}

/// Offset in `[-envelope, envelope]`, peaked at zero
fn vertical_offset<R: Rng + ?Sized>(rng: &mut R, envelope: f64) -> f64 {
    match Triangular::new(-envelope, envelope, 0.0) {
        Ok(dist) if envelope > 0.0 => dist.sample(rng),
        _ => 0.0,
    }
}
