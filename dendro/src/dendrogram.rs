//! The computed tree together with its input grid and per-voxel maps.

use common::Buffer3;
use rayon::prelude::*;

use crate::builder;
use crate::config::Config;
use crate::error::Result;
use crate::grid::{Coord, Grid, Rank};
use crate::newick;
use crate::node::{Node, NodeId, NodeStore};
use crate::progress::BuildHooks;

/// Merge tree of one grid.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    pub(crate) grid: Grid,
    pub(crate) store: NodeStore,
    pub(crate) trunk: Vec<NodeId>,
    pub(crate) index_map: Buffer3<u32>,
    pub(crate) item_type_map: Buffer3<u8>,
}

impl Dendrogram {
    /// Computes the tree of `grid`.
    ///
    /// # Example
    ///
    /// ```
    /// use dendro::{Config, Dendrogram, Grid};
    ///
    /// let grid = Grid::from_2d(5, 1, vec![9.0, 5.0, 2.0, 6.0, 8.0]).unwrap();
    /// let dendrogram = Dendrogram::compute(grid, &Config::default()).unwrap();
    /// assert_eq!(dendrogram.to_newick(), "((1:4.000,2:2.000)3:0.000);");
    /// ```
    pub fn compute(grid: Grid, config: &Config) -> Result<Self> {
        Self::compute_with_hooks(grid, config, &BuildHooks::default())
    }

    /// Like [`Dendrogram::compute`], reporting progress and honouring
    /// cancellation through `hooks`.
    pub fn compute_with_hooks(grid: Grid, config: &Config, hooks: &BuildHooks) -> Result<Self> {
        let output = builder::build(&grid, config, hooks)?;
        Ok(Self {
            grid,
            store: output.store,
            trunk: output.trunk,
            index_map: output.index_map,
            item_type_map: output.item_type_map,
        })
    }

    pub fn rank(&self) -> Rank {
        self.grid.rank()
    }

    pub fn n_dim(&self) -> u8 {
        self.grid.rank().n_dim()
    }

    /// Grid shape, numpy ordered.
    pub fn shape(&self) -> Vec<usize> {
        self.grid.shape()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Raw input values.
    pub fn data(&self) -> &[f32] {
        self.grid.values()
    }

    /// Root ids, ascending.
    pub fn trunk(&self) -> &[NodeId] {
        &self.trunk
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.store.node(id)
    }

    /// Live nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.store.iter()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Every live leaf, ascending.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.store.leaves()
    }

    /// Every live branch, ascending.
    pub fn branches(&self) -> Vec<NodeId> {
        self.store.branches()
    }

    pub fn pixel_count(&self, id: NodeId) -> usize {
        self.store.pixel_count(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.store.parent(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.store.children(id)
    }

    /// Owner id per voxel in raster order, 0 for unassigned.
    pub fn index_map(&self) -> &[u32] {
        self.index_map.values()
    }

    /// Item type per voxel: 0 unassigned, 1 branch, 2 leaf.
    pub fn item_type_map(&self) -> &[u8] {
        self.item_type_map.values()
    }

    /// Node owning the voxel at `pos`.
    pub fn owner_at(&self, pos: Coord) -> Option<NodeId> {
        NodeId::from_raw(*self.index_map.get(pos.x, pos.y, pos.z))
    }

    /// Tree text of the whole trunk.
    pub fn to_newick(&self) -> String {
        newick::encode(&self.store, &self.trunk)
    }

    /// Per-voxel depth map: own voxels of a node at depth `d` (roots at 0)
    /// hold `d + 1`, unassigned voxels hold 0.
    pub fn footprint_map(&self) -> Vec<u32> {
        let mut depth_of = hashbrown::HashMap::with_capacity(self.store.len());
        let mut stack: Vec<(NodeId, u32)> = self.trunk.iter().map(|&id| (id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            depth_of.insert(id, depth);
            stack.extend(self.store.children(id).iter().map(|&child| (child, depth + 1)));
        }

        self.index_map
            .values()
            .par_iter()
            .map(|&owner| match NodeId::from_raw(owner) {
                None => 0,
                Some(id) => depth_of.get(&id).map_or(0, |depth| depth + 1),
            })
            .collect()
    }
}
