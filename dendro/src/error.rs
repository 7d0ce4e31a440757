//! Error types for dendrogram computation, tree text parsing and persistence.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::node::NodeId;

/// Invalid input grid or thresholds. Reported before a build starts.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Grid rank {rank} is not supported, expected 2 or 3")]
    UnsupportedRank { rank: usize },

    #[error("Grid of shape {shape:?} needs {expected} values, got {actual}")]
    ValueCountMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("Grid of shape {shape:?} has more voxels than fit in memory")]
    ShapeTooLarge { shape: Vec<usize> },

    #[error("minimum_npix must be non-negative, got {0}")]
    NegativeMinimumNpix(i64),

    #[error("minimum_delta must be a non-negative number, got {0}")]
    InvalidMinimumDelta(f32),

    #[error("minimum_flux must not be NaN")]
    NanMinimumFlux,
}

/// Malformed tree text. Positions are byte offsets into the text.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Unbalanced parenthesis at position {position}")]
    UnbalancedParentheses { position: usize },

    #[error("Invalid node label '{found}' at position {position}")]
    InvalidLabel { position: usize, found: String },

    #[error("Duplicate node label {id} at position {position}")]
    DuplicateLabel { position: usize, id: NodeId },

    #[error("Missing delta at position {position}")]
    MissingDelta { position: usize },

    #[error("Invalid delta '{found}' at position {position}")]
    InvalidDelta { position: usize, found: String },

    #[error("Branch without children at position {position}")]
    EmptyBranch { position: usize },

    #[error("Branch with a single child at position {position}")]
    SingleChildBranch { position: usize },

    #[error("Unexpected character '{found}' at position {position}")]
    UnexpectedCharacter { position: usize, found: char },

    #[error("Unexpected end of tree text")]
    UnexpectedEnd,

    #[error("Missing ';' terminator at position {position}")]
    MissingTerminator { position: usize },

    #[error("Trailing input at position {position}")]
    TrailingInput { position: usize },
}

/// A persisted dendrogram that cannot be turned back into a tree.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Required dataset '{0}' is missing")]
    MissingDataset(&'static str),

    #[error("Invalid n_dim {0}, expected 2 or 3")]
    InvalidRank(u8),

    #[error("Dataset '{dataset}' has shape {shape:?}, expected {n_dim} axes")]
    RankMismatch {
        dataset: &'static str,
        n_dim: usize,
        shape: Vec<usize>,
    },

    #[error("Dataset '{dataset}' has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        dataset: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Dataset '{dataset}' of shape {shape:?} holds {actual} values")]
    LengthMismatch {
        dataset: &'static str,
        shape: Vec<usize>,
        actual: usize,
    },

    #[error("Invalid item type {value} at voxel {index}")]
    InvalidItemType { index: usize, value: u8 },

    #[error("Voxel {index} has owner {owner} but item type {item_type}")]
    InconsistentMaps {
        index: usize,
        owner: u32,
        item_type: u8,
    },

    #[error("Node {id} is a {expected} in the tree text but voxel {index} is marked {found}")]
    KindMismatch {
        id: NodeId,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Node {0} owns no voxels in the index map")]
    EmptyNode(NodeId),

    #[error("Index map references node {0} which is absent from the tree text")]
    UnknownOwner(NodeId),

    #[error("Failed to (de)serialize dendrogram file: {0}")]
    Serialization(#[from] common::SerdeError),
}

/// Top-level error for the crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    FileFormat(#[from] common::FileExtensionError),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Build cancelled after {processed} of {total} voxels")]
    Cancelled { processed: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
