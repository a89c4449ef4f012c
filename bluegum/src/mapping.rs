//! Node mappings between a source and a destination tree.

use crate::tree::Tree;
use indextree::NodeId;

/// A partial one-to-one correspondence between the nodes of two trees.
///
/// Lookups are O(1) in both directions: each side is a `Vec` indexed by the
/// node's arena index. The store is filled by a matcher before edit script
/// generation and only read afterwards.
#[derive(Debug, Clone)]
pub struct MappingStore<'t> {
    src: &'t Tree,
    dst: &'t Tree,
    /// Map from source node to destination node (indexed by the source NodeId)
    src_to_dst: Vec<Option<NodeId>>,
    /// Map from destination node to source node (indexed by the destination NodeId)
    dst_to_src: Vec<Option<NodeId>>,
    /// All pairs in insertion order
    pairs: Vec<(NodeId, NodeId)>,
}

impl<'t> MappingStore<'t> {
    /// Create an empty mapping between `src` and `dst`.
    pub fn new(src: &'t Tree, dst: &'t Tree) -> Self {
        Self {
            src,
            dst,
            src_to_dst: Vec::new(),
            dst_to_src: Vec::new(),
            pairs: Vec::new(),
        }
    }

    /// The source tree.
    pub fn src(&self) -> &'t Tree {
        self.src
    }

    /// The destination tree.
    pub fn dst(&self) -> &'t Tree {
        self.dst
    }

    /// Record that `src` corresponds to `dst`.
    ///
    /// Neither node may already be mapped, and both must have the same type.
    /// Debug builds panic on a pair that breaks either rule. Release builds
    /// ignore it and keep the earlier mapping.
    #[inline]
    pub fn add_mapping(&mut self, src: NodeId, dst: NodeId) {
        debug_assert!(
            !self.has_src(src),
            "source node {} is already mapped",
            usize::from(src)
        );
        debug_assert!(
            !self.has_dst(dst),
            "destination node {} is already mapped",
            usize::from(dst)
        );
        debug_assert!(
            self.src.kind(src) == self.dst.kind(dst),
            "cannot map a {} node to a {} node",
            self.src.kind(src),
            self.dst.kind(dst)
        );
        if !self.is_mapping_allowed(src, dst) {
            return;
        }

        let src_idx = usize::from(src);
        let dst_idx = usize::from(dst);

        // Grow vectors if needed
        if src_idx >= self.src_to_dst.len() {
            self.src_to_dst.resize(src_idx + 1, None);
        }
        if dst_idx >= self.dst_to_src.len() {
            self.dst_to_src.resize(dst_idx + 1, None);
        }

        self.src_to_dst[src_idx] = Some(dst);
        self.dst_to_src[dst_idx] = Some(src);
        self.pairs.push((src, dst));
    }

    /// Map two isomorphic subtrees node by node, in pre-order.
    pub fn add_mapping_recursively(&mut self, src: NodeId, dst: NodeId) {
        debug_assert!(
            self.src.is_isomorphic(src, self.dst, dst),
            "recursive mappings need isomorphic subtrees"
        );
        let (src_tree, dst_tree) = (self.src, self.dst);
        for (s, d) in src_tree.descendants(src).zip(dst_tree.descendants(dst)) {
            self.add_mapping(s, d);
        }
    }

    /// Whether the pair could be added without breaking the store's invariants.
    pub fn is_mapping_allowed(&self, src: NodeId, dst: NodeId) -> bool {
        self.src.kind(src) == self.dst.kind(dst) && !self.has_src(src) && !self.has_dst(dst)
    }

    /// Whether a source node is mapped.
    #[inline(always)]
    pub fn has_src(&self, src: NodeId) -> bool {
        self.get_dst(src).is_some()
    }

    /// Whether a destination node is mapped.
    #[inline(always)]
    pub fn has_dst(&self, dst: NodeId) -> bool {
        self.get_src(dst).is_some()
    }

    /// The destination counterpart of a source node.
    #[inline(always)]
    pub fn get_dst(&self, src: NodeId) -> Option<NodeId> {
        self.src_to_dst.get(usize::from(src)).copied().flatten()
    }

    /// The source counterpart of a destination node.
    #[inline(always)]
    pub fn get_src(&self, dst: NodeId) -> Option<NodeId> {
        self.dst_to_src.get(usize::from(dst)).copied().flatten()
    }

    /// Whether exactly this pair is mapped.
    pub fn has(&self, src: NodeId, dst: NodeId) -> bool {
        self.get_dst(src) == Some(dst)
    }

    /// Whether no node of the source subtree rooted at `src` is mapped.
    pub fn is_src_subtree_unmapped(&self, src: NodeId) -> bool {
        self.src.descendants(src).all(|n| !self.has_src(n))
    }

    /// Whether no node of the destination subtree rooted at `dst` is mapped.
    pub fn is_dst_subtree_unmapped(&self, dst: NodeId) -> bool {
        self.dst.descendants(dst).all(|n| !self.has_dst(n))
    }

    /// All mapped pairs, in the order they were added.
    pub fn pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.pairs.iter().copied()
    }

    /// Number of mapped pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
