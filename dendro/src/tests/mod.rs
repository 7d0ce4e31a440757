//! End-to-end tests over whole dendrograms.


use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::grid::{Coord, Grid};
use crate::node::NodeId;
use crate::Dendrogram;

/// Image of Gaussian blobs over a noisy background.
pub(crate) fn blob_image(seed: u64, width: usize, height: usize, blobs: usize) -> Grid {
    let mut rng = StdRng::seed_from_u64(seed);
    let centers: Vec<(f32, f32, f32, f32)> = (0..blobs)
        .map(|_| {
            (
                rng.random_range(0.0..width as f32),
                rng.random_range(0.0..height as f32),
                rng.random_range(1.0f32..10.0),
                rng.random_range(1.0f32..4.0),
            )
        })
        .collect();

    let mut values = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let mut v: f32 = rng.random_range(0.0f32..0.3);
            for &(cx, cy, amplitude, sigma) in &centers {
                let r2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
                v += amplitude * (-r2 / (2.0 * sigma * sigma)).exp();
            }
            values.push(v);
        }
    }
    Grid::from_2d(width, height, values).unwrap()
}

/// Cube of uniform noise, including exact duplicates so plateaus occur.
pub(crate) fn noise_cube(seed: u64, width: usize, height: usize, depth: usize) -> Grid {
    let mut rng = StdRng::seed_from_u64(seed);
    let values = (0..width * height * depth)
        .map(|_| rng.random_range(0..20) as f32 * 0.5)
        .collect();
    Grid::from_3d(width, height, depth, values).unwrap()
}

/// Own voxel positions of a node, sorted.
pub(crate) fn sorted_positions(dendrogram: &Dendrogram, id: NodeId) -> Vec<Coord> {
    let mut positions: Vec<Coord> = dendrogram
        .node(id)
        .unwrap()
        .voxels()
        .iter()
        .map(|voxel| voxel.pos)
        .collect();
    positions.sort_unstable();
    positions
}
