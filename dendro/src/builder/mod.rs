//! Merge-tree construction.
//!
//! Voxels above `minimum_flux` are visited from brightest to faintest. Each
//! voxel either starts a new leaf, joins the single structure it touches, or
//! triggers a merge event between several structures. Merge events fold
//! insignificant leaves into their neighbours and join significant ones under
//! a new branch.
//!
//! Equal values are visited as a plateau: voxels touching existing structures
//! come first, then the plateau is flooded breadth-first, so flat regions grow
//! out of what is already there instead of seeding spurious leaves.

mod ancestors;


use std::collections::VecDeque;
use std::time::Instant;

use common::Buffer3;
use rayon::prelude::*;
use smallvec::SmallVec;

use ancestors::Ancestors;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::grid::{Coord, Grid, Voxel};
use crate::node::{ItemType, NodeId, NodeStore};
use crate::progress::BuildHooks;

/// Everything a finished build produces.
#[derive(Debug)]
pub struct BuildOutput {
    pub store: NodeStore,
    /// Roots in ascending id order.
    pub trunk: Vec<NodeId>,
    /// Owner id per voxel, 0 for unassigned.
    pub index_map: Buffer3<u32>,
    /// [`ItemType`] per voxel.
    pub item_type_map: Buffer3<u8>,
}

/// Builds the merge tree of `grid`.
pub fn build(grid: &Grid, config: &Config, hooks: &BuildHooks) -> Result<BuildOutput> {
    config.validate()?;

    let start = Instant::now();
    let values = grid.buffer();
    let order = sorted_candidates(values.values(), config.minimum_flux);
    tracing::info!(
        shape = ?grid.shape(),
        voxels = values.len(),
        above_minimum = order.len(),
        minimum_flux = config.minimum_flux,
        minimum_npix = config.minimum_npix,
        minimum_delta = config.minimum_delta,
        "Computing dendrogram"
    );

    let mut builder = TreeBuilder::new(values, config, hooks, order.len());
    builder.run(&order)?;
    let output = builder.finish();

    tracing::info!(
        nodes = output.store.len(),
        trunk = output.trunk.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Dendrogram computed"
    );
    Ok(output)
}

/// Flat indices of voxels above `minimum_flux`, brightest first. Ties are
/// broken by flat index so equal values form raster-ordered runs.
fn sorted_candidates(values: &[f32], minimum_flux: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len())
        .into_par_iter()
        .filter(|&idx| values[idx] > minimum_flux)
        .collect();
    order.par_sort_unstable_by(|&a, &b| {
        level(values[b])
            .total_cmp(&level(values[a]))
            .then_with(|| a.cmp(&b))
    });
    order
}

/// Sort key of a value. -0.0 and 0.0 share a plateau.
#[inline]
fn level(value: f32) -> f32 {
    value + 0.0
}

/// Face neighbours of a flat index: 4 for images, 6 for cubes.
fn neighbors(dims: (usize, usize, usize), idx: usize) -> SmallVec<[usize; 6]> {
    let (width, height, depth) = dims;
    let plane = width * height;
    let x = idx % width;
    let y = (idx % plane) / width;
    let z = idx / plane;

    let mut out = SmallVec::new();
    if x > 0 {
        out.push(idx - 1);
    }
    if x + 1 < width {
        out.push(idx + 1);
    }
    if y > 0 {
        out.push(idx - width);
    }
    if y + 1 < height {
        out.push(idx + width);
    }
    if z > 0 {
        out.push(idx - plane);
    }
    if z + 1 < depth {
        out.push(idx + plane);
    }
    out
}

// ============================================================================
// Agglomeration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlateauState {
    Outside,
    Pending,
    Queued,
}

struct TreeBuilder<'a> {
    values: &'a Buffer3<f32>,
    hooks: &'a BuildHooks,
    dims: (usize, usize, usize),
    minimum_npix: usize,
    minimum_delta: f32,
    store: NodeStore,
    ancestors: Ancestors,
    index_map: Buffer3<u32>,
    plateau: Vec<PlateauState>,
    queue: VecDeque<usize>,
    processed: usize,
    total: usize,
}

impl<'a> TreeBuilder<'a> {
    fn new(values: &'a Buffer3<f32>, config: &Config, hooks: &'a BuildHooks, total: usize) -> Self {
        let (width, height, depth) = (values.width(), values.height(), values.depth());
        Self {
            values,
            hooks,
            dims: (width, height, depth),
            minimum_npix: config.minimum_npix_count(),
            minimum_delta: config.minimum_delta,
            store: NodeStore::new(),
            ancestors: Ancestors::with_capacity(total),
            index_map: Buffer3::new_default(width, height, depth),
            plateau: vec![PlateauState::Outside; values.len()],
            queue: VecDeque::new(),
            processed: 0,
            total,
        }
    }

    fn run(&mut self, order: &[usize]) -> Result<()> {
        self.check_cancelled()?;

        let mut start = 0;
        while start < order.len() {
            let plateau_level = self.value(order[start]);
            let end = start
                + order[start..]
                    .iter()
                    .take_while(|&&idx| self.value(idx) == plateau_level)
                    .count();

            match &order[start..end] {
                [single] => self.step(*single)?,
                run => self.flood_plateau(run)?,
            }
            start = end;
        }

        let last_report_was_final = self.hooks.is_checkpoint(self.total) && self.total > 0;
        if !last_report_was_final {
            self.hooks.report(self.processed, self.total);
        }
        Ok(())
    }

    fn value(&self, idx: usize) -> f32 {
        level(self.values[idx])
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.hooks.is_cancelled() {
            tracing::info!(
                processed = self.processed,
                total = self.total,
                "Dendrogram build cancelled"
            );
            return Err(Error::Cancelled {
                processed: self.processed,
                total: self.total,
            });
        }
        Ok(())
    }

    /// Processes one voxel, then reports progress and honours cancellation.
    fn step(&mut self, idx: usize) -> Result<()> {
        self.add_voxel(idx);
        self.processed += 1;

        if self.hooks.is_checkpoint(self.processed) {
            tracing::debug!(
                processed = self.processed,
                total = self.total,
                nodes = self.store.len(),
                "Dendrogram build progress"
            );
            self.hooks.report(self.processed, self.total);
        }
        self.check_cancelled()
    }

    /// Visits a run of equal-valued voxels (given in raster order) so that
    /// the flat region grows from existing structures outward.
    fn flood_plateau(&mut self, run: &[usize]) -> Result<()> {
        for &idx in run {
            self.plateau[idx] = PlateauState::Pending;
        }

        for &idx in run {
            let touches_structure = neighbors(self.dims, idx)
                .into_iter()
                .any(|n| self.index_map[n] != 0);
            if touches_structure {
                self.plateau[idx] = PlateauState::Queued;
                self.queue.push_back(idx);
            }
        }

        let mut cursor = 0;
        let result = loop {
            if let Some(idx) = self.queue.pop_front() {
                if let Err(err) = self.step(idx) {
                    break Err(err);
                }
                for n in neighbors(self.dims, idx) {
                    if self.plateau[n] == PlateauState::Pending {
                        self.plateau[n] = PlateauState::Queued;
                        self.queue.push_back(n);
                    }
                }
                continue;
            }

            // Nothing reachable left: seed the next untouched voxel.
            while cursor < run.len() && self.plateau[run[cursor]] != PlateauState::Pending {
                cursor += 1;
            }
            match run.get(cursor) {
                Some(&idx) => {
                    self.plateau[idx] = PlateauState::Queued;
                    self.queue.push_back(idx);
                }
                None => break Ok(()),
            }
        };

        self.queue.clear();
        for &idx in run {
            self.plateau[idx] = PlateauState::Outside;
        }
        result
    }

    fn add_voxel(&mut self, idx: usize) {
        let (x, y, z) = self.values.coords(idx);
        let voxel = Voxel::new(Coord::new(x, y, z), self.values[idx]);

        let mut adjacent: SmallVec<[NodeId; 6]> = SmallVec::new();
        for n in neighbors(self.dims, idx) {
            if let Some(owner) = NodeId::from_raw(self.index_map[n]) {
                adjacent.push(self.ancestors.find(owner));
            }
        }
        adjacent.sort_unstable();
        adjacent.dedup();

        let owner = match adjacent.as_slice() {
            [] => {
                let id = self.store.create_leaf(voxel);
                self.ancestors.register(id);
                id
            }
            [single] => {
                self.store.append(*single, voxel);
                *single
            }
            _ => self.merge_event(voxel, &adjacent),
        };
        self.index_map[idx] = owner.get();
    }

    /// A leaf too small or too faint above `level` to stand on its own.
    fn is_absorbable(&self, id: NodeId, level: f32) -> bool {
        let node = self
            .store
            .node(id)
            .unwrap_or_else(|| panic!("representative {id} is not live"));
        node.is_leaf()
            && (node.own_pixel_count() < self.minimum_npix
                || node.flux_range().max - level < self.minimum_delta)
    }

    /// `adjacent` holds at least two distinct representatives, ascending.
    fn merge_event(&mut self, voxel: Voxel, adjacent: &[NodeId]) -> NodeId {
        let (absorbable, significant): (SmallVec<[NodeId; 6]>, SmallVec<[NodeId; 6]>) = adjacent
            .iter()
            .copied()
            .partition(|&id| self.is_absorbable(id, voxel.value));

        let owner = match significant.as_slice() {
            [] => {
                let (&reference, others) = absorbable
                    .split_first()
                    .unwrap_or_else(|| panic!("merge event without structures"));
                self.store.append(reference, voxel);
                for &leaf in others {
                    self.absorb(reference, leaf);
                }
                reference
            }
            [target] => {
                let target = *target;
                self.store.append(target, voxel);
                for &leaf in &absorbable {
                    self.absorb(target, leaf);
                }
                target
            }
            _ => {
                let branch = self.store.create_branch(&significant, voxel);
                self.ancestors.register(branch);
                for &item in &significant {
                    self.ancestors.redirect(item, branch);
                }
                for &leaf in &absorbable {
                    self.absorb(branch, leaf);
                }
                branch
            }
        };

        tracing::trace!(
            owner = owner.get(),
            absorbed = absorbable.len(),
            significant = significant.len(),
            level = voxel.value,
            "Merge event"
        );
        owner
    }

    /// Folds the leaf `from` into `into` and rewrites ownership of its voxels.
    fn absorb(&mut self, into: NodeId, from: NodeId) {
        let start = self.store.merge(into, from);
        self.ancestors.redirect(from, into);

        let node = self
            .store
            .node(into)
            .unwrap_or_else(|| panic!("merge target {into} is not live"));
        for voxel in &node.voxels()[start..] {
            let pos = voxel.pos;
            let idx = self.index_map.index(pos.x, pos.y, pos.z);
            self.index_map[idx] = into.get();
        }
    }

    // ========================================================================
    // Finalisation
    // ========================================================================

    fn finish(mut self) -> BuildOutput {
        self.prune_root_leaves();

        let trunk = self.store.roots();
        let item_type_map = self.stamp_item_types();

        if common::is_debug() {
            self.check_partition();
        }

        BuildOutput {
            store: self.store,
            trunk,
            index_map: self.index_map,
            item_type_map,
        }
    }

    /// Drops root leaves that never merged and still fail the thresholds.
    fn prune_root_leaves(&mut self) {
        let mut pruned = 0usize;
        for id in self.store.roots() {
            let fails = self.store.node(id).is_some_and(|node| {
                node.is_leaf()
                    && (node.own_pixel_count() < self.minimum_npix
                        || node.flux_range().delta() < self.minimum_delta)
            });
            if !fails {
                continue;
            }

            let node = self.store.remove(id);
            for voxel in node.voxels() {
                let pos = voxel.pos;
                *self.index_map.get_mut(pos.x, pos.y, pos.z) = 0;
            }
            pruned += 1;
        }
        tracing::debug!(pruned, "Pruned root leaves below thresholds");
    }

    fn stamp_item_types(&self) -> Buffer3<u8> {
        let mut item_types =
            Buffer3::<u8>::new_default(self.dims.0, self.dims.1, self.dims.2);
        let store = &self.store;
        item_types
            .values_mut()
            .par_iter_mut()
            .zip(self.index_map.values().par_iter())
            .for_each(|(item_type, &owner)| {
                let kind = match NodeId::from_raw(owner) {
                    None => ItemType::Unassigned,
                    Some(id) => store
                        .node(id)
                        .map(|node| node.item_type())
                        .unwrap_or_else(|| panic!("index map names dead node {id}")),
                };
                *item_type = kind.as_u8();
            });
        item_types
    }

    /// Every assigned voxel is owned by exactly the node the index map names.
    fn check_partition(&self) {
        let mut owned = 0usize;
        for node in self.store.iter() {
            for voxel in node.voxels() {
                let pos = voxel.pos;
                let owner = *self.index_map.get(pos.x, pos.y, pos.z);
                assert_eq!(
                    owner,
                    node.id().get(),
                    "voxel {pos:?} is owned by node {} but the index map says {owner}",
                    node.id()
                );
            }
            owned += node.own_pixel_count();
        }
        let assigned = self.index_map.values().iter().filter(|&&o| o != 0).count();
        assert_eq!(owned, assigned, "owned voxel count disagrees with index map");
    }
}
