//! Pruning thresholds for dendrogram computation.

use crate::error::ConfigError;

/// Thresholds controlling which voxels enter the tree and which leaves
/// survive as separate structures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Voxels with a value at or below this are never assigned to a node.
    pub minimum_flux: f32,
    /// Leaves with fewer voxels are absorbed at merge time and pruned at the
    /// end if they are still roots.
    pub minimum_npix: i64,
    /// Leaves whose peak rises less than this above the merge level are
    /// absorbed; root leaves whose flux range is smaller are pruned.
    pub minimum_delta: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            minimum_flux: f32::NEG_INFINITY,
            minimum_npix: 0,
            minimum_delta: 0.0,
        }
    }
}

impl Config {
    pub fn with_minimum_flux(mut self, minimum_flux: f32) -> Self {
        self.minimum_flux = minimum_flux;
        self
    }

    pub fn with_minimum_npix(mut self, minimum_npix: i64) -> Self {
        self.minimum_npix = minimum_npix;
        self
    }

    pub fn with_minimum_delta(mut self, minimum_delta: f32) -> Self {
        self.minimum_delta = minimum_delta;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minimum_flux.is_nan() {
            return Err(ConfigError::NanMinimumFlux);
        }
        if self.minimum_npix < 0 {
            return Err(ConfigError::NegativeMinimumNpix(self.minimum_npix));
        }
        if self.minimum_delta.is_nan() || self.minimum_delta < 0.0 {
            return Err(ConfigError::InvalidMinimumDelta(self.minimum_delta));
        }
        Ok(())
    }

    /// `minimum_npix` as a voxel count. Only meaningful after `validate`.
    pub(crate) fn minimum_npix_count(&self) -> usize {
        usize::try_from(self.minimum_npix).unwrap_or(0)
    }
}
