//! Ordered, labeled trees backed by an `indextree` arena.
//!
//! Every node carries a [`NodeType`] interned in a [`TypeRegistry`] and a
//! string label. Children are ordered; a node's position among its siblings
//! is part of the tree's meaning.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::str::FromStr;
use std::collections::VecDeque;
use std::sync::Arc;

use compact_str::CompactString;
use facet::Facet;
use indextree::{Arena, NodeEdge, NodeId};
use rapidhash::RapidHashMap;
use smallvec::SmallVec;

/// The type (kind) of a node, compared by identity.
///
/// Two `NodeType`s are equal only if they were handed out by the same
/// [`TypeRegistry`] entry. Two registries interning the same name produce
/// types that do not compare equal.
#[derive(Clone)]
pub struct NodeType(Arc<str>);

impl NodeType {
    /// The name this type was interned under.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for NodeType {}

impl Hash for NodeType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const u8 as usize).hash(state);
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeType({})", &*self.0)
    }
}

/// Interns node type names.
///
/// Cloning a registry shares every type interned so far: a source and a
/// destination tree built from clones of one registry agree on all types
/// interned before the clone.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: RapidHashMap<CompactString, NodeType>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the type registered under `name`, registering it if needed.
    pub fn intern(&mut self, name: &str) -> NodeType {
        if let Some(ty) = self.types.get(name) {
            return ty.clone();
        }
        let ty = NodeType(Arc::from(name));
        self.types.insert(CompactString::new(name), ty.clone());
        ty
    }

    /// Look up an already registered type.
    pub fn get(&self, name: &str) -> Option<NodeType> {
        self.types.get(name).cloned()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no type has been registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Payload of a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    /// The node's type
    pub kind: NodeType,
    /// The node's label, possibly empty
    pub label: CompactString,
}

impl NodeData {
    /// Create node data from a type and a label.
    pub fn new(kind: NodeType, label: impl Into<CompactString>) -> Self {
        Self {
            kind,
            label: label.into(),
        }
    }
}

/// Errors from parsing a [`NodePath`].
#[derive(Facet, Debug)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum PathError {
    /// invalid path segment "{segment}", expected a child index
    InvalidSegment {
        /// The offending segment
        segment: String,
    },
}

/// A path from a node to one of its descendants, as child indices.
///
/// Written as dotted indices: `"1.0"` is the first child of the second child.
/// The empty path designates the starting node itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(pub SmallVec<[u32; 16]>);

impl NodePath {
    /// Whether this path designates the starting node.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, idx) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", idx)?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::default());
        }
        s.split('.')
            .map(|segment| {
                segment
                    .parse::<u32>()
                    .map_err(|_| PathError::InvalidSegment {
                        segment: segment.to_string(),
                    })
            })
            .collect::<Result<SmallVec<_>, _>>()
            .map(NodePath)
    }
}

/// Insert a detached `node` as child `index` of `parent`.
///
/// `index` equal to the child count appends.
pub(crate) fn insert_at<T>(arena: &mut Arena<T>, parent: NodeId, index: usize, node: NodeId) {
    match parent.children(arena).nth(index) {
        Some(occupant) => occupant.insert_before(node, arena),
        None => parent.append(node, arena),
    }
}

/// Index of `node` among its parent's children, 0 for a root.
pub(crate) fn position_in<T>(arena: &Arena<T>, node: NodeId) -> usize {
    arena
        .get(node)
        .and_then(|n| n.parent())
        .and_then(|parent| parent.children(arena).position(|c| c == node))
        .unwrap_or(0)
}

/// An ordered, labeled tree.
///
/// The tree owns all of its nodes and the type registry they draw from.
#[derive(Debug, Clone)]
pub struct Tree {
    pub(crate) arena: Arena<NodeData>,
    root: NodeId,
    types: TypeRegistry,
}

impl Tree {
    /// Create a tree with a single root node.
    pub fn new(types: TypeRegistry, kind: NodeType, label: impl Into<CompactString>) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeData::new(kind, label));
        Self { arena, root, types }
    }

    pub(crate) fn from_parts(types: TypeRegistry, arena: Arena<NodeData>, root: NodeId) -> Self {
        Self { arena, root, types }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The type registry shared by this tree's nodes.
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Mutable access to the type registry, to intern new types.
    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    /// Whether `node` is a live node of this tree.
    pub fn contains(&self, node: NodeId) -> bool {
        self.arena.get(node).is_some_and(|n| !n.is_removed())
            && node.ancestors(&self.arena).last() == Some(self.root)
    }

    /// Data of a node.
    ///
    /// # Panics
    ///
    /// Panics if `node` was not issued by this tree.
    pub fn get(&self, node: NodeId) -> &NodeData {
        self.arena[node].get()
    }

    /// Type of a node.
    pub fn kind(&self, node: NodeId) -> &NodeType {
        &self.get(node).kind
    }

    /// Label of a node.
    pub fn label(&self, node: NodeId) -> &str {
        &self.get(node).label
    }

    /// Replace the label of a node.
    pub fn set_label(&mut self, node: NodeId, label: impl Into<CompactString>) {
        self.arena[node].get_mut().label = label.into();
    }

    /// Number of nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.size(self.root)
    }

    /// Append a new child under `parent` and return it.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        kind: NodeType,
        label: impl Into<CompactString>,
    ) -> NodeId {
        let node = self.arena.new_node(NodeData::new(kind, label));
        parent.append(node, &mut self.arena);
        node
    }

    /// Insert a new child as child `index` of `parent` and return it.
    ///
    /// # Panics
    ///
    /// Panics if `index` is greater than the number of children.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        kind: NodeType,
        label: impl Into<CompactString>,
    ) -> NodeId {
        let count = self.child_count(parent);
        assert!(
            index <= count,
            "child index {index} out of bounds for {count} children"
        );
        let node = self.arena.new_node(NodeData::new(kind, label));
        insert_at(&mut self.arena, parent, index, node);
        node
    }

    /// Remove child `index` of `parent` along with its subtree.
    ///
    /// Returns the id the removed child had, or `None` if there is no such child.
    pub fn remove_child(&mut self, parent: NodeId, index: usize) -> Option<NodeId> {
        let child = self.child(parent, index)?;
        child.remove_subtree(&mut self.arena);
        Some(child)
    }

    /// Parent of a node, `None` for the root.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena[node].parent()
    }

    /// Children of a node, in order.
    pub fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        node.children(&self.arena)
    }

    /// Child at ordinal `index`.
    pub fn child(&self, node: NodeId, index: usize) -> Option<NodeId> {
        node.children(&self.arena).nth(index)
    }

    /// Number of children of a node.
    pub fn child_count(&self, node: NodeId) -> usize {
        node.children(&self.arena).count()
    }

    /// Index of a node among its siblings (0 for the root).
    pub fn position(&self, node: NodeId) -> usize {
        position_in(&self.arena, node)
    }

    /// Whether the node is the root of this tree.
    pub fn is_root(&self, node: NodeId) -> bool {
        node == self.root
    }

    /// Whether the node has no children.
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.arena[node].first_child().is_none()
    }

    /// Follow `path` from `node`.
    pub fn child_at(&self, node: NodeId, path: &NodePath) -> Option<NodeId> {
        path.0
            .iter()
            .try_fold(node, |current, &idx| self.child(current, idx as usize))
    }

    /// Follow `path` from the root.
    pub fn resolve(&self, path: &NodePath) -> Option<NodeId> {
        self.child_at(self.root, path)
    }

    /// Path from the root to `node`.
    pub fn path_of(&self, node: NodeId) -> NodePath {
        let mut path: SmallVec<[u32; 16]> = node
            .ancestors(&self.arena)
            .take_while(|&n| n != self.root)
            .map(|n| self.position(n) as u32)
            .collect();
        path.reverse();
        NodePath(path)
    }

    /// Ancestors of a node, nearest first, excluding the node itself.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        node.ancestors(&self.arena).skip(1)
    }

    /// The node and all its descendants, in pre-order.
    pub fn descendants(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        node.descendants(&self.arena)
    }

    /// All nodes in breadth-first order, starting from the root.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        BreadthFirst::new(&self.arena, self.root)
    }

    /// All nodes in pre-order.
    pub fn pre_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.root.descendants(&self.arena)
    }

    /// All nodes in post-order (children before parents).
    pub fn post_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        post_order_in(&self.arena, self.root)
    }

    /// Number of nodes in the subtree rooted at `node`.
    pub fn size(&self, node: NodeId) -> usize {
        node.descendants(&self.arena).count()
    }

    /// Height of the subtree rooted at `node`; a leaf has height 1.
    pub fn height(&self, node: NodeId) -> usize {
        let mut heights: RapidHashMap<NodeId, usize> = RapidHashMap::default();
        for n in post_order_in(&self.arena, node) {
            let h = 1 + n
                .children(&self.arena)
                .map(|c| heights.get(&c).copied().unwrap_or(0))
                .max()
                .unwrap_or(0);
            heights.insert(n, h);
        }
        heights.get(&node).copied().unwrap_or(1)
    }

    /// Number of ancestors of `node`; the root has depth 0.
    pub fn depth(&self, node: NodeId) -> usize {
        self.ancestors(node).count()
    }

    /// Copy the subtree rooted at `node` into a new tree with fresh node ids.
    ///
    /// The copy shares this tree's type registry.
    pub fn deep_copy(&self, node: NodeId) -> Tree {
        let mut arena = Arena::with_capacity(self.size(node));
        let copies = self.copy_subtree_into(node, &mut arena, |_, data| data.clone());
        let root = copies[0].1;
        Tree::from_parts(self.types.clone(), arena, root)
    }

    /// Copy the subtree rooted at `node` into `arena`, converting each node's data
    /// with `make`.
    ///
    /// Returns `(original, copy)` pairs in pre-order; the first pair is the
    /// subtree root, whose copy is left detached.
    pub(crate) fn copy_subtree_into<T>(
        &self,
        node: NodeId,
        arena: &mut Arena<T>,
        mut make: impl FnMut(NodeId, &NodeData) -> T,
    ) -> Vec<(NodeId, NodeId)> {
        let mut copies = Vec::new();
        let mut stack = vec![(node, None::<NodeId>)];
        while let Some((original, parent)) = stack.pop() {
            let copy = arena.new_node(make(original, self.get(original)));
            if let Some(parent) = parent {
                parent.append(copy, arena);
            }
            copies.push((original, copy));
            let children: SmallVec<[NodeId; 8]> = self.children(original).collect();
            stack.extend(children.into_iter().rev().map(|c| (c, Some(copy))));
        }
        copies
    }

    /// Whether the subtree at `a` has the same shape, types and labels as the
    /// subtree at `b` in `other`.
    pub fn is_isomorphic(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        let mut stack = vec![(a, b)];
        while let Some((a, b)) = stack.pop() {
            if self.get(a) != other.get(b) || self.child_count(a) != other.child_count(b) {
                return false;
            }
            stack.extend(self.children(a).zip(other.children(b)));
        }
        true
    }

    /// Whether the two trees are isomorphic from their roots.
    pub fn isomorphic_to(&self, other: &Tree) -> bool {
        self.is_isomorphic(self.root, other, other.root)
    }

    /// Render the subtree at `node` as `(type:label child ...)`.
    pub fn to_sexpr(&self, node: NodeId) -> String {
        let mut out = String::new();
        for edge in node.traverse(&self.arena) {
            match edge {
                NodeEdge::Start(n) => {
                    if n != node {
                        out.push(' ');
                    }
                    let data = self.get(n);
                    out.push('(');
                    out.push_str(data.kind.name());
                    if !data.label.is_empty() {
                        out.push(':');
                        out.push_str(&data.label);
                    }
                }
                NodeEdge::End(_) => out.push(')'),
            }
        }
        out
    }
}

/// Post-order traversal of the subtree rooted at `node`.
pub(crate) fn post_order_in<T>(arena: &Arena<T>, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    node.traverse(arena).filter_map(|edge| match edge {
        NodeEdge::End(n) => Some(n),
        NodeEdge::Start(_) => None,
    })
}

/// Breadth-first traversal over an arena.
struct BreadthFirst<'a, T> {
    arena: &'a Arena<T>,
    queue: VecDeque<NodeId>,
}

impl<'a, T> BreadthFirst<'a, T> {
    fn new(arena: &'a Arena<T>, root: NodeId) -> Self {
        Self {
            arena,
            queue: VecDeque::from([root]),
        }
    }
}

impl<T> Iterator for BreadthFirst<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.queue.pop_front()?;
        self.queue.extend(node.children(self.arena));
        Some(node)
    }
}
