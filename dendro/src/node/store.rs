use hashbrown::HashMap;

use super::{BoundingBox, Children, FluxRange, Node, NodeId, NodeKind};
use crate::grid::Voxel;

/// Arena owning every node of one build.
///
/// Identifiers come from a counter local to the store, start at 1 and are
/// never reused, including after [`NodeStore::merge`] or [`NodeStore::remove`]
/// invalidates one.
#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    nodes: HashMap<NodeId, Node>,
    last_id: u32,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue_id(&mut self) -> NodeId {
        self.last_id = self
            .last_id
            .checked_add(1)
            .unwrap_or_else(|| panic!("node id space exhausted"));
        NodeId::new(self.last_id)
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes
            .get_mut(&id)
            .unwrap_or_else(|| panic!("node {id} is not live"))
    }

    fn live(&self, id: NodeId) -> &Node {
        self.nodes
            .get(&id)
            .unwrap_or_else(|| panic!("node {id} is not live"))
    }

    /// Starts a new leaf seeded with `voxel`.
    pub fn create_leaf(&mut self, voxel: Voxel) -> NodeId {
        let id = self.issue_id();
        self.nodes.insert(id, Node::new(id, NodeKind::Leaf, voxel));
        id
    }

    pub fn append(&mut self, id: NodeId, voxel: Voxel) {
        self.node_mut(id).push(voxel);
    }

    /// Moves every voxel of the root leaf `from` into `into` and invalidates
    /// `from`. Returns the offset in `into`'s voxels where the moved ones start.
    pub fn merge(&mut self, into: NodeId, from: NodeId) -> usize {
        assert_ne!(into, from, "cannot merge node {into} into itself");

        let source = self
            .nodes
            .remove(&from)
            .unwrap_or_else(|| panic!("cannot merge node {from}: it is not live"));
        assert!(
            source.is_leaf(),
            "cannot merge node {from} into {into}: only leaves can be merged"
        );
        assert!(
            source.is_root(),
            "cannot merge node {from} into {into}: it is a child of {:?}",
            source.parent
        );

        let target = self.node_mut(into);
        let start = target.voxels.len();
        target.absorb(source);
        start
    }

    /// Creates a branch over `children`, seeded with the voxel that joined them.
    pub fn create_branch(&mut self, children: &[NodeId], voxel: Voxel) -> NodeId {
        assert!(
            children.len() >= 2,
            "a branch needs at least two children, got {children:?}"
        );

        let id = self.issue_id();
        for &child in children {
            self.node_mut(child).set_parent(id);
        }

        let mut children: Children = children.iter().copied().collect();
        children.sort_unstable();
        self.nodes
            .insert(id, Node::new(id, NodeKind::Branch { children }, voxel));
        id
    }

    /// Adds a fully built node, used when reading a tree back.
    pub(crate) fn insert(&mut self, node: Node) {
        let id = node.id;
        assert!(!self.nodes.contains_key(&id), "node {id} inserted twice");
        self.last_id = self.last_id.max(id.get());
        self.nodes.insert(id, node);
    }

    /// Removes a root leaf.
    pub fn remove(&mut self, id: NodeId) -> Node {
        let node = self
            .nodes
            .remove(&id)
            .unwrap_or_else(|| panic!("cannot remove node {id}: it is not live"));
        assert!(
            node.is_leaf() && node.is_root(),
            "only root leaves can be removed, node {id} is {:?} with parent {:?}",
            node.kind,
            node.parent
        );
        node
    }

    /// Own voxels plus those of every descendant.
    pub fn pixel_count(&self, id: NodeId) -> usize {
        let mut count = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.live(current);
            count += node.own_pixel_count();
            stack.extend_from_slice(node.children());
        }
        count
    }

    pub fn bounding_box(&self, id: NodeId) -> BoundingBox {
        self.live(id).bbox
    }

    pub fn flux_range(&self, id: NodeId) -> FluxRange {
        self.live(id).flux
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.live(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.live(id).children()
    }

    /// Every descendant of `id` in depth-first pre-order, children ascending.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.live(id).children().iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.live(current).children().iter().rev());
        }
        out
    }

    /// Live ids in ascending order.
    pub fn ids(&self) -> Vec<NodeId> {
        self.sorted_ids(|_| true)
    }

    /// Nodes without a parent, ascending.
    pub fn roots(&self) -> Vec<NodeId> {
        self.sorted_ids(Node::is_root)
    }

    pub fn leaves(&self) -> Vec<NodeId> {
        self.sorted_ids(Node::is_leaf)
    }

    pub fn branches(&self) -> Vec<NodeId> {
        self.sorted_ids(Node::is_branch)
    }

    /// Live nodes in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> + '_ {
        self.ids().into_iter().map(move |id| self.live(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Highest id issued so far, 0 if none.
    pub fn last_id(&self) -> u32 {
        self.last_id
    }

    fn sorted_ids(&self, filter: impl Fn(&Node) -> bool) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|&node| filter(node))
            .map(|node| node.id)
            .collect();
        ids.sort_unstable();
        ids
    }
}
