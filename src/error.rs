//! Error types for galaxy synthesis
//!
//! Each pipeline concern has its own error enum so callers can inspect the
//! failure kind; [`Error`] wraps them for code that drives the whole pipeline.

use thiserror::Error;

/// A configuration value was rejected before any computation started
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A numeric parameter is out of its accepted range
    #[error("invalid configuration: {field} {reason}, got {value}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
        value: f64,
    },

    /// The configuration file format is not supported
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str, value: f64) -> Self {
        Self::Invalid {
            field,
            reason,
            value,
        }
    }
}

/// The graph violates a structural invariant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// No vertices at all
    #[error("graph is empty")]
    Empty,

    /// Pruning left too few vertices to form a map
    #[error("largest connected component has {remaining} vertices, need at least 2")]
    TooSmall { remaining: usize },

    /// An edge is present in only one endpoint's neighbor set
    #[error("asymmetric edge: {b} is a neighbor of {a} but not the reverse")]
    Asymmetric { a: usize, b: usize },

    /// A vertex lists itself as a neighbor
    #[error("self-loop on vertex {0}")]
    SelfLoop(usize),

    /// A neighbor id does not name a vertex
    #[error("vertex {vertex} references missing neighbor {neighbor}")]
    NeighborOutOfRange { vertex: usize, neighbor: usize },

    /// Adjacency and vertex arrays disagree in length
    #[error("adjacency has {adjacency} entries for {vertices} vertices")]
    LengthMismatch { vertices: usize, adjacency: usize },

    /// A star's position has a NaN or infinite coordinate
    #[error("star {0} has a non-finite position")]
    NonFinitePosition(usize),

    /// Layout needs region labels on every star
    #[error("stars are missing region labels; run region detection first")]
    MissingLabels,
}

/// The force simulation produced an invalid state
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// A position became NaN or infinite
    #[error("non-finite position for vertex {vertex} at iteration {iteration}")]
    NonFinite { iteration: usize, vertex: usize },

    /// The global time step left the positive finite range
    #[error("time step degenerated to {0}")]
    DegenerateTimestep(f64),
}

/// Errors raised while reading or writing galaxy documents and config files
#[derive(Error, Debug)]
pub enum IoError {
    /// The file format is not supported
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The file extension could not be determined
    #[error("could not determine file format from path: {0}")]
    UnknownExtension(String),

    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML decoding failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The decoded document is not a valid galaxy graph
    #[error("invalid galaxy document: {0}")]
    Graph(#[from] GraphError),
}

/// Any failure from the synthesis pipeline
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::invalid("num_vertices", "must be positive", 0.0);
        insta::assert_snapshot!(err.to_string(), @"invalid configuration: num_vertices must be positive, got 0");
    }

    #[test]
    fn graph_error_display() {
        let err = GraphError::TooSmall { remaining: 1 };
        assert_eq!(
            err.to_string(),
            "largest connected component has 1 vertices, need at least 2"
        );

        let err = GraphError::Asymmetric { a: 3, b: 7 };
        insta::assert_snapshot!(err.to_string(), @"asymmetric edge: 7 is a neighbor of 3 but not the reverse");
    }

    #[test]
    fn umbrella_error_is_transparent() {
        let err: Error = LayoutError::NonFinite {
            iteration: 4,
            vertex: 12,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "non-finite position for vertex 12 at iteration 4"
        );
        assert!(matches!(err, Error::Layout(LayoutError::NonFinite { .. })));
    }
}
