//! galaxygen - procedural star maps.
//!
//! Draws a spiral galaxy point cloud, connects it into a sparse neighbor
//! graph, prunes it to one connected component, groups stars into
//! constellations and regions by modularity, and relaxes the layout with a
//! force simulation.

pub mod config;
pub mod error;
pub mod generator;
pub mod graph;
pub mod io;
pub mod layout;
pub mod neighbors;
pub mod pipeline;
pub mod prune;
pub mod regions;
pub mod spatial;
pub mod vector;

pub use config::GalaxyConfig;
pub use error::{Error, Result};
pub use graph::{Galaxy, Star};
pub use vector::Vec3;
