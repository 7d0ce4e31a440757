use crate::node::NodeId;

/// Maps every id issued during a build to the top-level structure that
/// currently contains it.
///
/// Union-find without rank: the representative is always the node the merge
/// step chose, so redirects go from an existing root to a specific new root.
#[derive(Debug, Default)]
pub(super) struct Ancestors {
    /// `parent[id - 1]`; a root points at itself.
    parent: Vec<u32>,
}

impl Ancestors {
    pub(super) fn with_capacity(capacity: usize) -> Self {
        Self {
            parent: Vec::with_capacity(capacity),
        }
    }

    /// Registers a freshly issued id as its own representative.
    #[inline]
    pub(super) fn register(&mut self, id: NodeId) {
        let idx = (id.get() - 1) as usize;
        if idx >= self.parent.len() {
            self.parent.resize(idx + 1, 0);
        }
        self.parent[idx] = id.get();
    }

    /// Root with iterative path compression (two-pass).
    #[inline]
    pub(super) fn find(&mut self, id: NodeId) -> NodeId {
        let mut root = id.get();
        loop {
            let parent = self.parent_of(root);
            if parent == root {
                break;
            }
            root = parent;
        }

        let mut current = id.get();
        while current != root {
            let idx = (current - 1) as usize;
            let parent = self.parent[idx];
            self.parent[idx] = root;
            current = parent;
        }

        NodeId::new(root)
    }

    /// Makes the root `from` resolve to the root `to`.
    #[inline]
    pub(super) fn redirect(&mut self, from: NodeId, to: NodeId) {
        assert_eq!(
            self.parent_of(from.get()),
            from.get(),
            "node {from} is not a representative"
        );
        assert_eq!(
            self.parent_of(to.get()),
            to.get(),
            "node {to} is not a representative"
        );
        self.parent[(from.get() - 1) as usize] = to.get();
    }

    fn parent_of(&self, id: u32) -> u32 {
        let parent = self
            .parent
            .get((id - 1) as usize)
            .copied()
            .unwrap_or(0);
        assert_ne!(parent, 0, "node {id} was never registered");
        parent
    }
}
