//! Newick-style text form of a merge tree.
//!
//! A leaf is written as `id:delta`, a branch as `(child,...,child)id:delta`
//! and the trunk as `(root,...,root);`, where `delta` is the node's own flux
//! range `max - min` with three decimals.

mod parse;


pub use parse::decode;

use crate::node::{Node, NodeId, NodeStore};

/// Parsed tree text without voxel data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    pub roots: Vec<SkeletonNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonNode {
    pub id: NodeId,
    pub delta: f32,
    /// `None` for leaves. Branches always have two or more children.
    pub children: Option<Vec<SkeletonNode>>,
}

impl Drop for SkeletonNode {
    // Unlinks descendants onto a heap stack so deep trees do not overflow
    // the thread stack when dropped.
    fn drop(&mut self) {
        let mut stack = self.children.take().unwrap_or_default();
        while let Some(mut node) = stack.pop() {
            if let Some(children) = node.children.take() {
                stack.extend(children);
            }
        }
    }
}

impl SkeletonNode {
    pub fn is_branch(&self) -> bool {
        self.children.is_some()
    }

    pub fn children(&self) -> &[SkeletonNode] {
        self.children.as_deref().unwrap_or(&[])
    }
}

impl Skeleton {
    /// Ids in depth-first pre-order.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<&SkeletonNode> = self.roots.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node.id);
            stack.extend(node.children().iter().rev());
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.ids().len()
    }
}

/// Writes the subtrees rooted at `trunk` in order.
pub fn encode(store: &NodeStore, trunk: &[NodeId]) -> String {
    let mut out = String::from("(");
    let mut stack = Vec::new();
    push_items(&mut stack, trunk);

    while let Some(step) = stack.pop() {
        match step {
            Emit::Separator => out.push(','),
            Emit::Node(id) => {
                let node = live(store, id);
                if node.is_branch() {
                    out.push('(');
                    stack.push(Emit::Close(id));
                    push_items(&mut stack, node.children());
                } else {
                    push_label(&mut out, id, node.flux_range().delta());
                }
            }
            Emit::Close(id) => {
                out.push(')');
                push_label(&mut out, id, live(store, id).flux_range().delta());
            }
        }
    }

    out.push_str(");");
    out
}

/// Pending output of the encoder's explicit stack.
enum Emit {
    Node(NodeId),
    Separator,
    /// Closes a branch's child list and writes its label.
    Close(NodeId),
}

/// Pushes `ids` so they pop in order, separated by commas.
fn push_items(stack: &mut Vec<Emit>, ids: &[NodeId]) {
    for (i, &id) in ids.iter().enumerate().rev() {
        stack.push(Emit::Node(id));
        if i > 0 {
            stack.push(Emit::Separator);
        }
    }
}

fn live(store: &NodeStore, id: NodeId) -> &Node {
    store
        .node(id)
        .unwrap_or_else(|| panic!("cannot encode node {id}: it is not live"))
}

fn push_label(out: &mut String, id: NodeId, delta: f32) {
    out.push_str(&format!("{id}:{delta:.3}"));
}
