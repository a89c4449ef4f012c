//! Edit actions produced by the generator.

use core::fmt;

use compact_str::CompactString;
use indextree::NodeId;

use crate::tree::{NodeData, Tree};

/// A node referenced by an action.
///
/// Actions name nodes that exist in the source tree, or nodes that an earlier
/// `Insert`/`TreeInsert` of the same script introduced. The latter are named by
/// their destination counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// A node of the source tree
    Src(NodeId),
    /// A node introduced by the script, named by its destination node
    Dst(NodeId),
}

impl NodeRef {
    /// The data of the referenced node, read from the tree it belongs to.
    pub fn resolve<'a>(self, src: &'a Tree, dst: &'a Tree) -> &'a NodeData {
        match self {
            NodeRef::Src(id) => src.get(id),
            NodeRef::Dst(id) => dst.get(id),
        }
    }

    /// The bare node id, without its side.
    pub fn id(self) -> NodeId {
        match self {
            NodeRef::Src(id) | NodeRef::Dst(id) => id,
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Src(id) => write!(f, "a:{}", usize::from(*id)),
            NodeRef::Dst(id) => write!(f, "b:{}", usize::from(*id)),
        }
    }
}

/// Discriminant of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// See [`Action::Insert`]
    Insert,
    /// See [`Action::TreeInsert`]
    TreeInsert,
    /// See [`Action::Update`]
    Update,
    /// See [`Action::Move`]
    Move,
    /// See [`Action::TreeDelete`]
    TreeDelete,
    /// See [`Action::Delete`]
    Delete,
}

/// An edit action in a script transforming the source tree into the
/// destination tree.
///
/// Positions are child indices in the tree as it is right before the action
/// runs. For `Move`, the position is counted after the moved node has been
/// detached from its old parent.
#[derive(Clone, PartialEq, Eq)]
pub enum Action {
    /// Insert a single new node, without its children.
    Insert {
        /// The new node in the destination tree
        node: NodeId,
        /// Parent to insert under
        parent: NodeRef,
        /// Position among siblings (0-indexed)
        position: usize,
    },

    /// Insert a whole new subtree.
    TreeInsert {
        /// Root of the new subtree in the destination tree
        node: NodeId,
        /// Parent to insert under, `None` when the subtree becomes the root
        parent: Option<NodeRef>,
        /// Position among siblings (0-indexed)
        position: usize,
    },

    /// Change the label of a node.
    Update {
        /// The node in the source tree
        node: NodeId,
        /// The new label
        value: CompactString,
    },

    /// Move a node, with its subtree, to a new location.
    Move {
        /// The node in the source tree
        node: NodeId,
        /// New parent
        parent: NodeRef,
        /// New position among siblings
        position: usize,
    },

    /// Delete a whole subtree.
    TreeDelete {
        /// Root of the subtree in the source tree
        node: NodeId,
    },

    /// Delete a single, childless node.
    Delete {
        /// The node in the source tree
        node: NodeId,
    },
}

impl Action {
    /// Which variant this is.
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Insert { .. } => ActionKind::Insert,
            Action::TreeInsert { .. } => ActionKind::TreeInsert,
            Action::Update { .. } => ActionKind::Update,
            Action::Move { .. } => ActionKind::Move,
            Action::TreeDelete { .. } => ActionKind::TreeDelete,
            Action::Delete { .. } => ActionKind::Delete,
        }
    }

    /// Short name of the variant.
    pub fn name(&self) -> &'static str {
        match self.kind() {
            ActionKind::Insert => "insert-node",
            ActionKind::TreeInsert => "insert-tree",
            ActionKind::Update => "update-node",
            ActionKind::Move => "move-tree",
            ActionKind::TreeDelete => "delete-tree",
            ActionKind::Delete => "delete-node",
        }
    }

    /// The node the action is about.
    pub fn node(&self) -> NodeRef {
        match self {
            Action::Insert { node, .. } | Action::TreeInsert { node, .. } => NodeRef::Dst(*node),
            Action::Update { node, .. }
            | Action::Move { node, .. }
            | Action::TreeDelete { node }
            | Action::Delete { node } => NodeRef::Src(*node),
        }
    }

    /// Target parent, for inserts and moves.
    pub fn parent(&self) -> Option<NodeRef> {
        match self {
            Action::Insert { parent, .. } | Action::Move { parent, .. } => Some(*parent),
            Action::TreeInsert { parent, .. } => *parent,
            _ => None,
        }
    }

    /// Target position, for inserts and moves.
    pub fn position(&self) -> Option<usize> {
        match self {
            Action::Insert { position, .. }
            | Action::TreeInsert { position, .. }
            | Action::Move { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// New label, for updates.
    pub fn value(&self) -> Option<&str> {
        match self {
            Action::Update { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Insert {
                node,
                parent,
                position,
            } => write!(
                f,
                "Insert(b:{} @{} under {})",
                usize::from(*node),
                position,
                parent
            ),
            Action::TreeInsert {
                node,
                parent: Some(parent),
                position,
            } => write!(
                f,
                "TreeInsert(b:{} @{} under {})",
                usize::from(*node),
                position,
                parent
            ),
            Action::TreeInsert {
                node, parent: None, ..
            } => write!(f, "TreeInsert(b:{} as root)", usize::from(*node)),
            Action::Update { node, value } => {
                write!(f, "Update(a:{} → {:?})", usize::from(*node), value.as_str())
            }
            Action::Move {
                node,
                parent,
                position,
            } => write!(
                f,
                "Move(a:{} @{} under {})",
                usize::from(*node),
                position,
                parent
            ),
            Action::TreeDelete { node } => write!(f, "TreeDelete(a:{})", usize::from(*node)),
            Action::Delete { node } => write!(f, "Delete(a:{})", usize::from(*node)),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reuse Display implementation for Debug
        fmt::Display::fmt(self, f)
    }
}
