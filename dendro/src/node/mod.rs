//! Tree nodes and the arena that owns them.
//!
//! Nodes never point at each other directly. Parents and children are
//! referenced by [`NodeId`] and resolved through the [`NodeStore`].

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::grid::{Coord, Voxel};

mod reconstruct;
mod store;

#[cfg(test)]
mod tests;

pub use store::NodeStore;

/// Stable node identifier. Ids start at 1; 0 marks an unassigned voxel in
/// the ownership map and is never a valid id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// Panics on 0.
    pub fn new(raw: u32) -> Self {
        Self::from_raw(raw).unwrap_or_else(|| panic!("node id 0 is reserved for unassigned voxels"))
    }

    /// Reads an ownership map entry. 0 yields `None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Children = SmallVec<[NodeId; 4]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Branch { children: Children },
}

/// Per-voxel classification stored in the item type map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ItemType {
    Unassigned = 0,
    Branch = 1,
    Leaf = 2,
}

impl ItemType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ItemType::Unassigned),
            1 => Some(ItemType::Branch),
            2 => Some(ItemType::Leaf),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ItemType::Unassigned => "unassigned",
            ItemType::Branch => "branch",
            ItemType::Leaf => "leaf",
        }
    }
}

/// Inclusive per-axis bounds of a node's own voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min: Coord,
    pub max: Coord,
}

impl BoundingBox {
    pub fn from_point(pos: Coord) -> Self {
        Self { min: pos, max: pos }
    }

    pub fn include(&mut self, pos: Coord) {
        self.min.x = self.min.x.min(pos.x);
        self.min.y = self.min.y.min(pos.y);
        self.min.z = self.min.z.min(pos.z);
        self.max.x = self.max.x.max(pos.x);
        self.max.y = self.max.y.max(pos.y);
        self.max.z = self.max.z.max(pos.z);
    }

    pub fn merge(&mut self, other: &BoundingBox) {
        self.include(other.min);
        self.include(other.max);
    }

    pub fn contains(&self, pos: Coord) -> bool {
        (self.min.x..=self.max.x).contains(&pos.x)
            && (self.min.y..=self.max.y).contains(&pos.y)
            && (self.min.z..=self.max.z).contains(&pos.z)
    }
}

/// Minimum and maximum value over a node's own voxels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluxRange {
    pub min: f32,
    pub max: f32,
}

impl FluxRange {
    pub fn from_value(value: f32) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn include(&mut self, value: f32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: &FluxRange) {
        self.include(other.min);
        self.include(other.max);
    }

    /// `max - min`, the contrast written to tree text.
    pub fn delta(&self) -> f32 {
        self.max - self.min
    }
}

/// A leaf or branch of the merge tree.
///
/// Voxels are kept in insertion order. A branch's voxels are only those added
/// to it directly, never those of its children.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    voxels: Vec<Voxel>,
    bbox: BoundingBox,
    flux: FluxRange,
    parent: Option<NodeId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind, voxel: Voxel) -> Self {
        Self {
            id,
            kind,
            voxels: vec![voxel],
            bbox: BoundingBox::from_point(voxel.pos),
            flux: FluxRange::from_value(voxel.value),
            parent: None,
        }
    }

    /// Node from a non-empty voxel set with bounds recomputed from scratch.
    pub(crate) fn from_voxels(
        id: NodeId,
        kind: NodeKind,
        voxels: Vec<Voxel>,
        parent: Option<NodeId>,
    ) -> Self {
        let (first, rest) = voxels
            .split_first()
            .unwrap_or_else(|| panic!("node {id} must own at least one voxel"));

        let mut bbox = BoundingBox::from_point(first.pos);
        let mut flux = FluxRange::from_value(first.value);
        for voxel in rest {
            bbox.include(voxel.pos);
            flux.include(voxel.value);
        }

        Self {
            id,
            kind,
            voxels,
            bbox,
            flux,
            parent,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf)
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.kind, NodeKind::Branch { .. })
    }

    pub fn item_type(&self) -> ItemType {
        match self.kind {
            NodeKind::Leaf => ItemType::Leaf,
            NodeKind::Branch { .. } => ItemType::Branch,
        }
    }

    /// Child ids in ascending order. Empty for leaves.
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Leaf => &[],
            NodeKind::Branch { children } => children,
        }
    }

    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    pub fn own_pixel_count(&self) -> usize {
        self.voxels.len()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    pub fn flux_range(&self) -> FluxRange {
        self.flux
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub(crate) fn push(&mut self, voxel: Voxel) {
        self.bbox.include(voxel.pos);
        self.flux.include(voxel.value);
        self.voxels.push(voxel);
    }

    /// Moves all voxels of `other` into `self`.
    pub(crate) fn absorb(&mut self, other: Node) {
        self.bbox.merge(&other.bbox);
        self.flux.merge(&other.flux);
        self.voxels.extend(other.voxels);
    }

    pub(crate) fn set_parent(&mut self, parent: NodeId) {
        if let Some(existing) = self.parent {
            panic!(
                "node {} already has parent {existing}, cannot attach it to {parent}",
                self.id
            );
        }
        self.parent = Some(parent);
    }
}
