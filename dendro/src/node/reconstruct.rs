//! Rebuilding a [`NodeStore`] from tree text plus the per-voxel maps.

use common::Buffer3;
use hashbrown::HashMap;

use super::{ItemType, Node, NodeId, NodeKind, NodeStore};
use crate::error::FormatError;
use crate::grid::{Coord, Voxel};
use crate::newick::{Skeleton, SkeletonNode};

/// Largest disagreement between a stored delta and the recomputed flux range
/// that is attributed to the three-decimal text format.
fn delta_tolerance(delta: f32) -> f32 {
    5e-4 + delta.abs() * f32::EPSILON * 4.0
}

impl NodeStore {
    /// Rebuilds nodes from a parsed skeleton. Voxel membership comes from
    /// `index_map`, values from `values`, and every voxel's entry in
    /// `item_types` must agree with its owner's kind in the skeleton.
    ///
    /// Returns the store and the trunk in ascending id order.
    pub fn reconstruct(
        skeleton: &Skeleton,
        values: &Buffer3<f32>,
        index_map: &Buffer3<u32>,
        item_types: &Buffer3<u8>,
    ) -> Result<(NodeStore, Vec<NodeId>), FormatError> {
        if !values.same_dimensions(index_map) {
            return Err(FormatError::ShapeMismatch {
                dataset: "data",
                expected: dims(index_map),
                actual: dims(values),
            });
        }
        if !item_types.same_dimensions(index_map) {
            return Err(FormatError::ShapeMismatch {
                dataset: "item_type_map",
                expected: dims(index_map),
                actual: dims(item_types),
            });
        }

        let mut buckets = bucket_voxels(index_map, item_types)?;
        let mut store = NodeStore::new();

        let mut stack: Vec<(&SkeletonNode, Option<NodeId>)> =
            skeleton.roots.iter().rev().map(|root| (root, None)).collect();
        while let Some((entry, parent)) = stack.pop() {
            let indices = buckets
                .remove(&entry.id)
                .ok_or(FormatError::EmptyNode(entry.id))?;

            let expected = if entry.is_branch() {
                ItemType::Branch
            } else {
                ItemType::Leaf
            };
            let mut voxels = Vec::with_capacity(indices.len());
            for index in indices {
                let found = ItemType::from_u8(item_types[index]).unwrap_or(ItemType::Unassigned);
                if found != expected {
                    return Err(FormatError::KindMismatch {
                        id: entry.id,
                        index,
                        expected: expected.name(),
                        found: found.name(),
                    });
                }
                let (x, y, z) = values.coords(index);
                voxels.push(Voxel::new(Coord::new(x, y, z), values[index]));
            }

            let kind = match &entry.children {
                Some(children) => NodeKind::Branch {
                    children: children.iter().map(|child| child.id).collect(),
                },
                None => NodeKind::Leaf,
            };
            let node = Node::from_voxels(entry.id, kind, voxels, parent);

            let delta = node.flux_range().delta();
            if (delta - entry.delta).abs() > delta_tolerance(delta) {
                tracing::warn!(
                    id = entry.id.get(),
                    stored = entry.delta,
                    recomputed = delta,
                    "Stored delta disagrees with voxel values"
                );
            }
            store.insert(node);

            for child in entry.children().iter().rev() {
                stack.push((child, Some(entry.id)));
            }
        }

        if let Some(&orphan) = buckets.keys().min() {
            return Err(FormatError::UnknownOwner(orphan));
        }

        let mut trunk: Vec<NodeId> = skeleton.roots.iter().map(|root| root.id).collect();
        trunk.sort_unstable();
        Ok((store, trunk))
    }
}

fn dims<T>(buffer: &Buffer3<T>) -> Vec<usize> {
    vec![buffer.depth(), buffer.height(), buffer.width()]
}

/// Flat voxel indices grouped by owner, in raster order.
fn bucket_voxels(
    index_map: &Buffer3<u32>,
    item_types: &Buffer3<u8>,
) -> Result<HashMap<NodeId, Vec<usize>>, FormatError> {
    let mut buckets: HashMap<NodeId, Vec<usize>> = HashMap::new();
    for (index, (&owner, &raw_type)) in index_map
        .values()
        .iter()
        .zip(item_types.values())
        .enumerate()
    {
        let item_type = ItemType::from_u8(raw_type).ok_or(FormatError::InvalidItemType {
            index,
            value: raw_type,
        })?;
        match (NodeId::from_raw(owner), item_type) {
            (None, ItemType::Unassigned) => {}
            (Some(id), ItemType::Branch | ItemType::Leaf) => {
                buckets.entry(id).or_default().push(index);
            }
            _ => {
                return Err(FormatError::InconsistentMaps {
                    index,
                    owner,
                    item_type: raw_type,
                })
            }
        }
    }
    Ok(buckets)
}
