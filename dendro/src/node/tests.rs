use common::Buffer3;

use super::*;
use crate::error::FormatError;
use crate::newick;

fn voxel(x: usize, y: usize, value: f32) -> Voxel {
    Voxel::new(Coord::new(x, y, 0), value)
}

fn id(raw: u32) -> NodeId {
    NodeId::new(raw)
}

#[test]
fn test_node_id_zero_is_unassigned() {
    assert_eq!(NodeId::from_raw(0), None);
    assert_eq!(NodeId::from_raw(7).map(NodeId::get), Some(7));
    assert_eq!(id(12).to_string(), "12");
}

#[test]
#[should_panic(expected = "reserved")]
fn test_node_id_new_rejects_zero() {
    NodeId::new(0);
}

#[test]
fn test_item_type_codes() {
    for item_type in [ItemType::Unassigned, ItemType::Branch, ItemType::Leaf] {
        assert_eq!(ItemType::from_u8(item_type.as_u8()), Some(item_type));
    }
    assert_eq!(ItemType::Leaf.as_u8(), 2);
    assert_eq!(ItemType::from_u8(3), None);
}

#[test]
fn test_bounding_box_contains_included_points() {
    let mut bbox = BoundingBox::from_point(Coord::new(3, 4, 0));
    bbox.include(Coord::new(1, 6, 2));

    assert_eq!(bbox.min, Coord::new(1, 4, 0));
    assert_eq!(bbox.max, Coord::new(3, 6, 2));
    assert!(bbox.contains(Coord::new(2, 5, 1)));
    assert!(!bbox.contains(Coord::new(0, 5, 1)));
    assert!(!bbox.contains(Coord::new(2, 7, 0)));
}

#[test]
fn test_leaf_ids_start_at_one_and_increase() {
    let mut store = NodeStore::new();
    assert_eq!(store.last_id(), 0);

    let a = store.create_leaf(voxel(0, 0, 5.0));
    let b = store.create_leaf(voxel(4, 0, 3.0));

    assert_eq!((a, b), (id(1), id(2)));
    assert_eq!(store.last_id(), 2);
    assert_eq!(store.roots(), vec![a, b]);
}

#[test]
fn test_append_extends_bounds_and_flux() {
    let mut store = NodeStore::new();
    let leaf = store.create_leaf(voxel(2, 2, 5.0));
    store.append(leaf, voxel(1, 3, 2.0));
    store.append(leaf, voxel(4, 0, 4.0));

    let bbox = store.bounding_box(leaf);
    assert_eq!(bbox.min, Coord::new(1, 0, 0));
    assert_eq!(bbox.max, Coord::new(4, 3, 0));
    assert_eq!(store.flux_range(leaf), FluxRange { min: 2.0, max: 5.0 });
    assert_eq!(store.flux_range(leaf).delta(), 3.0);
    assert_eq!(store.pixel_count(leaf), 3);
}

#[test]
fn test_merge_moves_voxels_and_retires_source() {
    let mut store = NodeStore::new();
    let a = store.create_leaf(voxel(0, 0, 9.0));
    store.append(a, voxel(1, 0, 4.0));
    let b = store.create_leaf(voxel(5, 0, 3.0));

    let offset = store.merge(a, b);

    assert_eq!(offset, 2);
    assert!(!store.contains(b));
    assert_eq!(store.len(), 1);
    assert_eq!(store.pixel_count(a), 3);
    assert_eq!(store.node(a).unwrap().voxels()[offset].pos, Coord::new(5, 0, 0));
    assert_eq!(store.flux_range(a), FluxRange { min: 3.0, max: 9.0 });

    // Retired ids are never handed out again.
    assert_eq!(store.create_leaf(voxel(7, 0, 1.0)), id(3));
}

#[test]
fn test_branch_links_children_in_order() {
    let mut store = NodeStore::new();
    let a = store.create_leaf(voxel(0, 0, 9.0));
    let b = store.create_leaf(voxel(4, 0, 8.0));
    let c = store.create_leaf(voxel(8, 0, 7.0));

    let inner = store.create_branch(&[b, a], voxel(2, 0, 3.0));
    store.append(inner, voxel(3, 0, 3.0));
    let outer = store.create_branch(&[inner, c], voxel(6, 0, 1.0));

    assert_eq!(store.children(inner), &[a, b]);
    assert_eq!(store.parent(a), Some(inner));
    assert_eq!(store.parent(inner), Some(outer));
    assert_eq!(store.roots(), vec![outer]);
    assert_eq!(store.leaves(), vec![a, b, c]);
    assert_eq!(store.branches(), vec![inner, outer]);

    assert_eq!(store.pixel_count(inner), 4);
    assert_eq!(store.pixel_count(outer), 6);
    assert_eq!(store.descendants(outer), vec![c, inner, a, b]);
    assert!(store.descendants(a).is_empty());

    let ids: Vec<NodeId> = store.iter().map(Node::id).collect();
    assert_eq!(ids, store.ids());
}

#[test]
fn test_remove_root_leaf() {
    let mut store = NodeStore::new();
    let a = store.create_leaf(voxel(0, 0, 9.0));
    let b = store.create_leaf(voxel(2, 0, 1.0));

    let removed = store.remove(b);

    assert_eq!(removed.id(), b);
    assert_eq!(store.ids(), vec![a]);
    assert_eq!(store.last_id(), 2);
}

#[test]
#[should_panic(expected = "not live")]
fn test_append_to_retired_node_panics() {
    let mut store = NodeStore::new();
    let a = store.create_leaf(voxel(0, 0, 9.0));
    let b = store.create_leaf(voxel(1, 0, 1.0));
    store.merge(a, b);
    store.append(b, voxel(2, 0, 1.0));
}

#[test]
#[should_panic(expected = "only leaves can be merged")]
fn test_merging_a_branch_panics() {
    let mut store = NodeStore::new();
    let a = store.create_leaf(voxel(0, 0, 9.0));
    let b = store.create_leaf(voxel(2, 0, 8.0));
    let branch = store.create_branch(&[a, b], voxel(1, 0, 1.0));
    let c = store.create_leaf(voxel(4, 0, 7.0));
    store.merge(c, branch);
}

#[test]
#[should_panic(expected = "already has parent")]
fn test_reparenting_a_child_panics() {
    let mut store = NodeStore::new();
    let a = store.create_leaf(voxel(0, 0, 9.0));
    let b = store.create_leaf(voxel(2, 0, 8.0));
    let c = store.create_leaf(voxel(4, 0, 7.0));
    store.create_branch(&[a, b], voxel(1, 0, 1.0));
    store.create_branch(&[a, c], voxel(3, 0, 1.0));
}

#[test]
#[should_panic(expected = "only root leaves can be removed")]
fn test_removing_a_child_panics() {
    let mut store = NodeStore::new();
    let a = store.create_leaf(voxel(0, 0, 9.0));
    let b = store.create_leaf(voxel(2, 0, 8.0));
    store.create_branch(&[a, b], voxel(1, 0, 1.0));
    store.remove(a);
}

#[test]
fn test_insert_tracks_highest_id() {
    let mut store = NodeStore::new();
    store.insert(Node::from_voxels(id(9), NodeKind::Leaf, vec![voxel(0, 0, 1.0)], None));

    assert_eq!(store.last_id(), 9);
    assert_eq!(store.create_leaf(voxel(1, 0, 2.0)), id(10));
}

/// Row `[9, 5, 2, 6, 8]` built as two leaves joined by a one-voxel branch.
fn two_peak_maps() -> (Buffer3<f32>, Buffer3<u32>, Buffer3<u8>) {
    let values = Buffer3::new(5, 1, 1, vec![9.0, 5.0, 2.0, 6.0, 8.0]);
    let index_map = Buffer3::new(5, 1, 1, vec![1, 1, 3, 2, 2]);
    let item_types = Buffer3::new(5, 1, 1, vec![2, 2, 1, 2, 2]);
    (values, index_map, item_types)
}

#[test]
fn test_reconstruct_from_tree_text_and_maps() {
    let (values, index_map, item_types) = two_peak_maps();
    let skeleton = newick::decode("((1:4.000,2:2.000)3:0.000);").unwrap();

    let (store, trunk) = NodeStore::reconstruct(&skeleton, &values, &index_map, &item_types).unwrap();

    assert_eq!(trunk, vec![id(3)]);
    assert_eq!(store.children(id(3)), &[id(1), id(2)]);
    assert_eq!(store.parent(id(2)), Some(id(3)));
    assert_eq!(store.flux_range(id(1)), FluxRange { min: 5.0, max: 9.0 });
    assert_eq!(store.pixel_count(id(3)), 5);
    assert_eq!(store.last_id(), 3);
    assert_eq!(newick::encode(&store, &trunk), "((1:4.000,2:2.000)3:0.000);");
}

#[test]
fn test_reconstruct_rejects_owner_missing_from_tree() {
    let (values, index_map, item_types) = two_peak_maps();
    let skeleton = newick::decode("(1:4.000,2:2.000);").unwrap();

    let err = NodeStore::reconstruct(&skeleton, &values, &index_map, &item_types).unwrap_err();

    assert_eq!(err.to_string(), FormatError::UnknownOwner(id(3)).to_string());
}

#[test]
fn test_reconstruct_rejects_kind_disagreement() {
    let (values, index_map, mut item_types) = two_peak_maps();
    item_types[2] = ItemType::Leaf.as_u8();
    let skeleton = newick::decode("((1:4.000,2:2.000)3:0.000);").unwrap();

    let err = NodeStore::reconstruct(&skeleton, &values, &index_map, &item_types).unwrap_err();

    assert!(
        matches!(err, FormatError::KindMismatch { index: 2, expected: "branch", found: "leaf", .. }),
        "{err:?}"
    );
}

#[test]
fn test_reconstruct_rejects_mismatched_dimensions() {
    let (_, index_map, item_types) = two_peak_maps();
    let values = Buffer3::new(4, 1, 1, vec![9.0, 5.0, 2.0, 6.0]);
    let skeleton = newick::decode("();").unwrap();

    let err = NodeStore::reconstruct(&skeleton, &values, &index_map, &item_types).unwrap_err();

    assert!(matches!(err, FormatError::ShapeMismatch { dataset: "data", .. }), "{err:?}");
}
