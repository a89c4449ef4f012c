//! Replaying an action list on a copy of the source tree.

use facet::Facet;
use indextree::{Arena, NodeId};
use rapidhash::RapidHashMap;

use crate::action::{Action, NodeRef};
use crate::debug;
use crate::tree::{NodeData, Tree, insert_at};

/// Errors that can occur while replaying actions.
#[derive(Facet, Debug)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum ApplyError {
    /// node {node} does not exist at this point of the script
    UnknownNode {
        /// The missing node
        node: String,
    },

    /// position {position} out of bounds for {len} children
    PositionOutOfBounds {
        /// The requested position
        position: usize,
        /// Number of children the parent has
        len: usize,
    },

    /// cannot delete node {node}: it still has children
    NodeHasChildren {
        /// The node that was to be deleted
        node: String,
    },

    /// cannot insert a root: the tree already has one
    RootAlreadyPresent,

    /// the script leaves the tree without a root
    NoRoot,

    /// cannot move node {node} under its own subtree
    MoveIntoDescendant {
        /// The node that was to be moved
        node: String,
    },
}

/// Apply `actions` in order to a copy of `src` and return the result.
///
/// Nodes introduced by the script are read from `dst`, which must be the tree
/// the actions were generated against.
pub fn apply_actions(src: &Tree, dst: &Tree, actions: &[Action]) -> Result<Tree, ApplyError> {
    debug!(actions = actions.len(), "apply_actions start");
    let mut replay = Replay::new(src, dst);
    for action in actions {
        replay.apply(action)?;
    }
    let root = replay.root.ok_or(ApplyError::NoRoot)?;
    Ok(Tree::from_parts(src.types().clone(), replay.arena, root))
}

struct Replay<'t> {
    dst: &'t Tree,
    arena: Arena<NodeData>,
    root: Option<NodeId>,
    /// Live nodes, by the reference actions use for them
    live: RapidHashMap<NodeRef, NodeId>,
    /// Reverse of `live`
    refs: RapidHashMap<NodeId, NodeRef>,
}

impl<'t> Replay<'t> {
    fn new(src: &Tree, dst: &'t Tree) -> Self {
        let mut replay = Self {
            dst,
            arena: src.arena.clone(),
            root: Some(src.root()),
            live: RapidHashMap::default(),
            refs: RapidHashMap::default(),
        };
        // The arena clone keeps node ids, so source references map to themselves.
        for n in src.pre_order() {
            replay.track(NodeRef::Src(n), n);
        }
        replay
    }

    fn track(&mut self, r: NodeRef, n: NodeId) {
        self.live.insert(r, n);
        self.refs.insert(n, r);
    }

    fn resolve(&self, r: NodeRef) -> Result<NodeId, ApplyError> {
        self.live
            .get(&r)
            .copied()
            .ok_or_else(|| ApplyError::UnknownNode {
                node: r.to_string(),
            })
    }

    /// `moving` is left out of the count: it is detached before reinsertion.
    fn check_position(
        &self,
        parent: NodeId,
        position: usize,
        moving: Option<NodeId>,
    ) -> Result<(), ApplyError> {
        let len = parent
            .children(&self.arena)
            .filter(|&c| Some(c) != moving)
            .count();
        if position > len {
            return Err(ApplyError::PositionOutOfBounds { position, len });
        }
        Ok(())
    }

    /// Stop tracking every node of the subtree at `node` and free it.
    fn forget_subtree(&mut self, node: NodeId) {
        for n in node.descendants(&self.arena) {
            if let Some(r) = self.refs.remove(&n) {
                self.live.remove(&r);
            }
        }
        if self.root == Some(node) {
            self.root = None;
        }
        node.remove_subtree(&mut self.arena);
    }

    fn apply(&mut self, action: &Action) -> Result<(), ApplyError> {
        match action {
            Action::Insert {
                node,
                parent,
                position,
            } => {
                let parent = self.resolve(*parent)?;
                self.check_position(parent, *position, None)?;
                let n = self.arena.new_node(self.dst.get(*node).clone());
                insert_at(&mut self.arena, parent, *position, n);
                self.track(NodeRef::Dst(*node), n);
            }
            Action::TreeInsert {
                node,
                parent,
                position,
            } => {
                let parent = match parent {
                    Some(p) => {
                        let p = self.resolve(*p)?;
                        self.check_position(p, *position, None)?;
                        Some(p)
                    }
                    None if self.root.is_some() => return Err(ApplyError::RootAlreadyPresent),
                    None => None,
                };
                let copies = self
                    .dst
                    .copy_subtree_into(*node, &mut self.arena, |_, data| data.clone());
                let top = copies[0].1;
                for (d, copy) in copies {
                    self.track(NodeRef::Dst(d), copy);
                }
                match parent {
                    Some(p) => insert_at(&mut self.arena, p, *position, top),
                    None => self.root = Some(top),
                }
            }
            Action::Update { node, value } => {
                let n = self.resolve(NodeRef::Src(*node))?;
                self.arena[n].get_mut().label = value.clone();
            }
            Action::Move {
                node,
                parent,
                position,
            } => {
                let n = self.resolve(NodeRef::Src(*node))?;
                let p = self.resolve(*parent)?;
                if p.ancestors(&self.arena).any(|a| a == n) {
                    return Err(ApplyError::MoveIntoDescendant {
                        node: action.node().to_string(),
                    });
                }
                self.check_position(p, *position, Some(n))?;
                n.detach(&mut self.arena);
                insert_at(&mut self.arena, p, *position, n);
            }
            Action::TreeDelete { node } => {
                let n = self.resolve(NodeRef::Src(*node))?;
                self.forget_subtree(n);
            }
            Action::Delete { node } => {
                let n = self.resolve(NodeRef::Src(*node))?;
                if self.arena[n].first_child().is_some() {
                    return Err(ApplyError::NodeHasChildren {
                        node: action.node().to_string(),
                    });
                }
                self.forget_subtree(n);
            }
        }
        Ok(())
    }
}
