//! Input grids of rank 2 or 3.
//!
//! Shapes follow the numpy convention used by astronomical cubes: `[ny, nx]`
//! for images and `[nz, ny, nx]` for cubes, with `x` varying fastest in the
//! flat value array. Images are stored as cubes with a single plane.

use common::Buffer3;

use crate::error::ConfigError;

/// Number of axes of the original input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rank {
    Two,
    Three,
}

impl Rank {
    pub fn from_n_dim(n_dim: usize) -> Option<Self> {
        match n_dim {
            2 => Some(Rank::Two),
            3 => Some(Rank::Three),
            _ => None,
        }
    }

    pub fn n_dim(self) -> u8 {
        match self {
            Rank::Two => 2,
            Rank::Three => 3,
        }
    }
}

/// Integer position of a voxel. `z` is always 0 for images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Coord {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }
}

/// A grid cell with its value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voxel {
    pub pos: Coord,
    pub value: f32,
}

impl Voxel {
    pub const fn new(pos: Coord, value: f32) -> Self {
        Self { pos, value }
    }
}

/// Scalar field to build a dendrogram from.
#[derive(Debug, Clone)]
pub struct Grid {
    rank: Rank,
    values: Buffer3<f32>,
}

impl Grid {
    /// Image of `width * height` values in row-major order.
    pub fn from_2d(width: usize, height: usize, values: Vec<f32>) -> Result<Self, ConfigError> {
        Self::from_shape(&[height, width], values)
    }

    /// Cube of `width * height * depth` values, plane by plane.
    pub fn from_3d(
        width: usize,
        height: usize,
        depth: usize,
        values: Vec<f32>,
    ) -> Result<Self, ConfigError> {
        Self::from_shape(&[depth, height, width], values)
    }

    /// Grid from a numpy-ordered shape (`[ny, nx]` or `[nz, ny, nx]`).
    pub fn from_shape(shape: &[usize], values: Vec<f32>) -> Result<Self, ConfigError> {
        let (rank, (width, height, depth)) = dims_from_shape(shape)
            .ok_or(ConfigError::UnsupportedRank { rank: shape.len() })?;

        let expected = voxel_count(shape).ok_or_else(|| ConfigError::ShapeTooLarge {
            shape: shape.to_vec(),
        })?;
        if values.len() != expected {
            return Err(ConfigError::ValueCountMismatch {
                shape: shape.to_vec(),
                expected,
                actual: values.len(),
            });
        }

        Ok(Self {
            rank,
            values: Buffer3::new(width, height, depth, values),
        })
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Shape in the original rank, numpy ordered.
    pub fn shape(&self) -> Vec<usize> {
        shape_of(self.rank, &self.values)
    }

    pub fn width(&self) -> usize {
        self.values.width()
    }

    pub fn height(&self) -> usize {
        self.values.height()
    }

    pub fn depth(&self) -> usize {
        self.values.depth()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, pos: Coord) -> f32 {
        *self.values.get(pos.x, pos.y, pos.z)
    }

    pub fn values(&self) -> &[f32] {
        self.values.values()
    }

    pub(crate) fn buffer(&self) -> &Buffer3<f32> {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values.into_values()
    }
}

/// Resolves a numpy-ordered shape into its rank and `(width, height, depth)`.
pub(crate) fn dims_from_shape(shape: &[usize]) -> Option<(Rank, (usize, usize, usize))> {
    match *shape {
        [ny, nx] => Some((Rank::Two, (nx, ny, 1))),
        [nz, ny, nx] => Some((Rank::Three, (nx, ny, nz))),
        _ => None,
    }
}

/// Product of the axis lengths, `None` on overflow.
pub(crate) fn voxel_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |count, &axis| count.checked_mul(axis))
}

/// Numpy-ordered shape of a buffer reported in the given rank.
fn shape_of<T>(rank: Rank, buffer: &Buffer3<T>) -> Vec<usize> {
    match rank {
        Rank::Two => vec![buffer.height(), buffer.width()],
        Rank::Three => vec![buffer.depth(), buffer.height(), buffer.width()],
    }
}
