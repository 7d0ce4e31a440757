//! Dendro - hierarchical merge trees of astronomical intensity grids.
//!
//! A dendrogram describes how bright structures in a 2D image or 3D cube nest
//! inside each other as the intensity threshold is lowered:
//! - Leaves are local maxima together with the voxels that drain into them
//! - Branches join two or more significant structures at the level where
//!   they first touch
//! - The trunk is the set of top-level structures
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use dendro::{Config, Dendrogram, Grid};
//!
//! let grid = Grid::from_2d(width, height, pixels)?;
//! let config = Config::default()
//!     .with_minimum_flux(0.1)
//!     .with_minimum_npix(10)
//!     .with_minimum_delta(0.05);
//! let dendrogram = Dendrogram::compute(grid, &config)?;
//!
//! println!("{}", dendrogram.to_newick());
//! dendrogram.save("cloud.dendro", true)?;
//! ```

pub(crate) mod builder;
mod config;
mod dendrogram;
mod error;
mod grid;
pub mod newick;
mod node;
mod persist;
mod progress;

#[cfg(test)]
mod tests;

// ============================================================================
// Input and configuration
// ============================================================================

pub use config::Config;
pub use grid::{Coord, Grid, Rank, Voxel};

// ============================================================================
// Tree
// ============================================================================

pub use dendrogram::Dendrogram;
pub use node::{
    BoundingBox, Children, FluxRange, ItemType, Node, NodeId, NodeKind, NodeStore,
};

// ============================================================================
// Build observation
// ============================================================================

pub use progress::{
    report_progress, BuildHooks, BuildProgress, ProgressCallback, DEFAULT_PROGRESS_INTERVAL,
};

// ============================================================================
// Errors
// ============================================================================

pub use error::{ConfigError, Error, FormatError, ParseError, Result};
