//! Galaxy documents and configuration files
//!
//! A galaxy document stores every star (position, labels, attributes) and the
//! adjacency as `{ "stars": [...], "edges": { "<id>": [ids] } }`. JSON and
//! YAML encodings are chosen by file extension.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GalaxyConfig;
use crate::error::{GraphError, IoError};
use crate::graph::{Galaxy, Star};

/// Result type for reading and writing
pub type IoResult<T> = Result<T, IoError>;

/// On-disk encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Pick the format from a file extension
    pub fn from_extension(ext: &str) -> IoResult<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            _ => Err(IoError::UnsupportedFormat(ext.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> IoResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| IoError::UnknownExtension(path.display().to_string()))?;
        Self::from_extension(ext)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GalaxyDocument {
    stars: Vec<Star>,
    #[serde(default)]
    edges: BTreeMap<usize, Vec<usize>>,
}

impl From<&Galaxy> for GalaxyDocument {
    fn from(galaxy: &Galaxy) -> Self {
        let edges = galaxy
            .adjacency()
            .iter()
            .enumerate()
            .map(|(id, neighbors)| (id, neighbors.iter().copied().collect()))
            .collect();
        Self {
            stars: galaxy.stars().to_vec(),
            edges,
        }
    }
}

impl TryFrom<GalaxyDocument> for Galaxy {
    type Error = GraphError;

    fn try_from(document: GalaxyDocument) -> Result<Self, GraphError> {
        let n = document.stars.len();
        let mut adjacency = vec![BTreeSet::new(); n];
        for (id, neighbors) in document.edges {
            if id >= n {
                return Err(GraphError::NeighborOutOfRange {
                    vertex: id,
                    neighbor: id,
                });
            }
            adjacency[id].extend(neighbors);
        }
        Galaxy::from_parts(document.stars, adjacency)
    }
}

/// Encode a galaxy into `writer`
pub fn write_galaxy<W: Write>(galaxy: &Galaxy, writer: W, format: Format) -> IoResult<()> {
    let document = GalaxyDocument::from(galaxy);
    match format {
        Format::Json => serde_json::to_writer(writer, &document)?,
        Format::Yaml => serde_yaml::to_writer(writer, &document)?,
    }
    Ok(())
}

/// Decode and validate a galaxy from `reader`
pub fn read_galaxy<R: Read>(reader: R, format: Format) -> IoResult<Galaxy> {
    let document: GalaxyDocument = match format {
        Format::Json => serde_json::from_reader(reader)?,
        Format::Yaml => serde_yaml::from_reader(reader)?,
    };
    Ok(Galaxy::try_from(document)?)
}

/// Write a galaxy to `path`, encoding chosen by extension
pub fn save_galaxy(galaxy: &Galaxy, path: &Path) -> IoResult<()> {
    let format = Format::from_path(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    write_galaxy(galaxy, &mut writer, format)?;
    writer.flush()?;
    debug!(path = %path.display(), stars = galaxy.len(), "saved galaxy");
    Ok(())
}

/// Read a galaxy from `path`, encoding chosen by extension
pub fn load_galaxy(path: &Path) -> IoResult<Galaxy> {
    let format = Format::from_path(path)?;
    let galaxy = read_galaxy(BufReader::new(File::open(path)?), format)?;
    debug!(path = %path.display(), stars = galaxy.len(), "loaded galaxy");
    Ok(galaxy)
}

/// Read a pipeline configuration; missing sections take their defaults
pub fn load_config(path: &Path) -> IoResult<GalaxyConfig> {
    let format = Format::from_path(path)?;
    let reader = BufReader::new(File::open(path)?);
    let config = match format {
        Format::Json => serde_json::from_reader(reader)?,
        Format::Yaml => serde_yaml::from_reader(reader)?,
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vec3;
    use serde_json::json;

    fn sample() -> Galaxy {
        let mut galaxy = Galaxy::from_positions(vec![
            Vec3::new(0.1, 0.2, 0.3),
            Vec3::new(-1.0 / 3.0, 0.000125, 12345.678),
            Vec3::new(7.0, 8.0, -9.5),
        ]);
        galaxy.connect(0, 1);
        galaxy.connect(1, 2);
        for (i, star) in galaxy.stars_mut().iter_mut().enumerate() {
            star.constellation = Some(i);
            star.region = Some(0);
        }
        galaxy.set_attribute(2, "betweenness", json!(1.0));
        galaxy.set_attribute(2, "name", json!("Jita"));
        galaxy
    }

    #[test]
    fn format_from_extension_case_insensitive() {
        assert_eq!(Format::from_extension("JSON").unwrap(), Format::Json);
        assert_eq!(Format::from_extension("yml").unwrap(), Format::Yaml);
        assert!(matches!(
            Format::from_extension("pickle"),
            Err(IoError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            Format::from_path(Path::new("stars")),
            Err(IoError::UnknownExtension(_))
        ));
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let galaxy = sample();
        let mut buffer = Vec::new();
        write_galaxy(&galaxy, &mut buffer, Format::Json).unwrap();
        let back = read_galaxy(buffer.as_slice(), Format::Json).unwrap();
        assert_eq!(back, galaxy);
    }

    #[test]
    fn yaml_round_trip_is_lossless() {
        let galaxy = sample();
        let mut buffer = Vec::new();
        write_galaxy(&galaxy, &mut buffer, Format::Yaml).unwrap();
        let back = read_galaxy(buffer.as_slice(), Format::Yaml).unwrap();
        assert_eq!(back, galaxy);
    }

    #[test]
    fn document_layout() {
        let mut buffer = Vec::new();
        write_galaxy(&sample(), &mut buffer, Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();

        assert_eq!(value["stars"][0]["position"], json!([0.1, 0.2, 0.3]));
        assert_eq!(value["stars"][2]["name"], json!("Jita"));
        assert_eq!(value["edges"]["1"], json!([0, 2]));
    }

    #[test]
    fn unlabeled_stars_omit_labels() {
        let galaxy = Galaxy::from_positions(vec![Vec3::ZERO]);
        let mut buffer = Vec::new();
        write_galaxy(&galaxy, &mut buffer, Format::Json).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(!text.contains("region"));

        let back = read_galaxy(text.as_bytes(), Format::Json).unwrap();
        assert_eq!(back.star(0).region, None);
    }

    #[test]
    fn rejects_asymmetric_document() {
        let text = r#"{"stars":[{"position":[0,0,0]},{"position":[1,0,0]}],"edges":{"0":[1]}}"#;
        assert!(matches!(
            read_galaxy(text.as_bytes(), Format::Json),
            Err(IoError::Graph(GraphError::Asymmetric { a: 0, b: 1 }))
        ));
    }

    #[test]
    fn rejects_out_of_range_edge_key() {
        let text = r#"{"stars":[{"position":[0,0,0]}],"edges":{"4":[0]}}"#;
        assert!(matches!(
            read_galaxy(text.as_bytes(), Format::Json),
            Err(IoError::Graph(GraphError::NeighborOutOfRange { vertex: 4, .. }))
        ));
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("galaxy.json");
        let galaxy = sample();
        save_galaxy(&galaxy, &path).unwrap();
        assert_eq!(load_galaxy(&path).unwrap(), galaxy);
    }

    #[test]
    fn loads_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("galaxy.yaml");
        std::fs::write(&path, "seed: 7\nregions:\n  region_iterations: 6\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.regions.region_iterations, 6);
        assert_eq!(config.regions.constellation_iterations, 2);
    }

    #[test]
    fn rejects_non_finite_yaml_positions() {
        let text = "stars:\n- position: [0.0, .nan, 0.0]\n- position: [1.0, 0.0, .inf]\nedges:\n  0: [1]\n  1: [0]\n";
        assert!(matches!(
            read_galaxy(text.as_bytes(), Format::Yaml),
            Err(IoError::Graph(GraphError::NonFinitePosition(0)))
        ));
    }
}
