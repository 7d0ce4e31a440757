//! Saving and loading dendrograms.
//!
//! A file is one serialized [`DendrogramFile`] whose format follows the file
//! extension (`.yaml`/`.yml`, `.json`, `.bin`/`.dendro`). It carries the rank,
//! the tree text, both per-voxel maps and optionally the raw values. Each
//! array is stored with its shape and image attributes.

#[cfg(test)]
mod tests;

use std::path::Path;

use common::{Buffer3, FileFormat};
use serde::{Deserialize, Serialize};

use crate::dendrogram::Dendrogram;
use crate::error::{Error, FormatError, Result};
use crate::grid::{dims_from_shape, voxel_count, Grid, Rank};
use crate::newick;
use crate::node::NodeStore;

const IMAGE_CLASS: &str = "IMAGE";
const IMAGE_VERSION: &str = "1.2";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ImageAttrs<T> {
    pub class: String,
    pub image_version: String,
    /// `[min, max]` ignoring NaN, `[0, 0]` for empty arrays.
    pub min_max_range: [T; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Dataset<T> {
    /// Numpy ordered.
    pub shape: Vec<usize>,
    pub attrs: ImageAttrs<T>,
    pub values: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DendrogramFile {
    pub n_dim: u8,
    pub newick: String,
    pub index_map: Dataset<u32>,
    pub item_type_map: Dataset<u8>,
    #[serde(default)]
    pub data: Option<Dataset<f32>>,
}

impl<T: Copy + Default + PartialOrd> Dataset<T> {
    fn new(shape: Vec<usize>, values: Vec<T>) -> Self {
        Self {
            shape,
            attrs: ImageAttrs {
                class: IMAGE_CLASS.to_string(),
                image_version: IMAGE_VERSION.to_string(),
                min_max_range: min_max_range(&values),
            },
            values,
        }
    }

    /// Checks the shape against `expected` and the value count against the
    /// shape, then hands back the values as a buffer.
    fn into_buffer(
        self,
        dataset: &'static str,
        expected: &[usize],
    ) -> std::result::Result<Buffer3<T>, FormatError> {
        if self.shape != expected {
            return Err(FormatError::ShapeMismatch {
                dataset,
                expected: expected.to_vec(),
                actual: self.shape,
            });
        }
        if voxel_count(&self.shape) != Some(self.values.len()) {
            return Err(FormatError::LengthMismatch {
                dataset,
                shape: self.shape,
                actual: self.values.len(),
            });
        }
        let (_, (width, height, depth)) =
            dims_from_shape(&self.shape).ok_or_else(|| FormatError::RankMismatch {
                dataset,
                n_dim: expected.len(),
                shape: self.shape.clone(),
            })?;
        Ok(Buffer3::new(width, height, depth, self.values))
    }
}

/// Smallest and largest comparable value. NaN never compares and is skipped.
fn min_max_range<T: Copy + Default + PartialOrd>(values: &[T]) -> [T; 2] {
    let mut comparable = values.iter().copied().filter(|v| v.partial_cmp(v).is_some());
    let Some(first) = comparable.next() else {
        return [T::default(); 2];
    };
    comparable.fold([first, first], |[min, max], v| {
        [
            if v < min { v } else { min },
            if v > max { v } else { max },
        ]
    })
}

impl Dendrogram {
    /// Writes the dendrogram to `path`. `include_raw_data` stores the input
    /// values too, which [`Dendrogram::load`] needs.
    pub fn save(&self, path: impl AsRef<Path>, include_raw_data: bool) -> Result<()> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)?;

        let file = self.to_file(include_raw_data);
        let bytes = common::serialize(&file, format).map_err(FormatError::from)?;
        std::fs::write(path, &bytes).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(
            path = %path.display(),
            ?format,
            nodes = self.len(),
            bytes = bytes.len(),
            include_raw_data,
            "Saved dendrogram"
        );
        Ok(())
    }

    /// Reads a dendrogram saved with its raw values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = read_file(path)?;

        let data = file
            .data
            .take()
            .ok_or(FormatError::MissingDataset("data"))?;
        rank_of(&file)?;
        let values = data.into_buffer("data", &file.index_map.shape)?;
        let grid = Grid::from_shape(&file.index_map.shape, values.into_values())?;

        Self::from_file(path, file, grid)
    }

    /// Reads a dendrogram and pairs it with `grid`, for files saved without
    /// raw values. Stored values, if any, are ignored.
    pub fn load_with_grid(path: impl AsRef<Path>, grid: Grid) -> Result<Self> {
        let path = path.as_ref();
        let file = read_file(path)?;

        let rank = rank_of(&file)?;
        if grid.rank() != rank || grid.shape() != file.index_map.shape {
            return Err(FormatError::ShapeMismatch {
                dataset: "data",
                expected: file.index_map.shape,
                actual: grid.shape(),
            }
            .into());
        }

        Self::from_file(path, file, grid)
    }

    fn to_file(&self, include_raw_data: bool) -> DendrogramFile {
        let shape = self.shape();
        DendrogramFile {
            n_dim: self.n_dim(),
            newick: self.to_newick(),
            index_map: Dataset::new(shape.clone(), self.index_map().to_vec()),
            item_type_map: Dataset::new(shape.clone(), self.item_type_map().to_vec()),
            data: include_raw_data.then(|| Dataset::new(shape, self.data().to_vec())),
        }
    }

    fn from_file(path: &Path, file: DendrogramFile, grid: Grid) -> Result<Self> {
        let shape = grid.shape();
        let index_map = file.index_map.into_buffer("index_map", &shape)?;
        let item_type_map = file.item_type_map.into_buffer("item_type_map", &shape)?;

        let skeleton = newick::decode(&file.newick)?;
        let (store, trunk) =
            NodeStore::reconstruct(&skeleton, grid.buffer(), &index_map, &item_type_map)?;

        tracing::info!(
            path = %path.display(),
            nodes = store.len(),
            trunk = trunk.len(),
            "Loaded dendrogram"
        );
        Ok(Self {
            grid,
            store,
            trunk,
            index_map,
            item_type_map,
        })
    }
}

fn read_file(path: &Path) -> Result<DendrogramFile> {
    let format = FileFormat::from_path(path)?;
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: DendrogramFile = common::deserialize(&bytes, format).map_err(FormatError::from)?;
    Ok(file)
}

/// Validated rank of a file whose index map shape must match its `n_dim`.
fn rank_of(file: &DendrogramFile) -> std::result::Result<Rank, FormatError> {
    let rank = Rank::from_n_dim(file.n_dim as usize).ok_or(FormatError::InvalidRank(file.n_dim))?;
    if file.index_map.shape.len() != file.n_dim as usize {
        return Err(FormatError::RankMismatch {
            dataset: "index_map",
            n_dim: file.n_dim as usize,
            shape: file.index_map.shape.clone(),
        });
    }
    Ok(rank)
}
