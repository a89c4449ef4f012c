//! Edit script generation from a mapping between two trees.
//!
//! The generator replays its own decisions on a private working copy of the
//! source tree, so every position it emits is valid for the tree as it is at
//! that point of the script. Phases:
//!
//! 1. **Root**: a destination root not mapped to the source root turns the
//!    whole script into a tree replace.
//! 2. **Alignment**: destination nodes are visited breadth-first. Unmapped
//!    nodes are inserted, mapped nodes are updated and moved under the
//!    counterpart of their destination parent. Siblings are kept in order with
//!    a longest common subsequence over mapped children.
//! 3. **Deletion**: working copy nodes with no counterpart are removed in
//!    post-order, whole subtrees at once where possible.

use compact_str::CompactString;
use indextree::{Arena, NodeId};
use rapidhash::{RapidHashMap, RapidHashSet};

use crate::action::{Action, NodeRef};
use crate::mapping::MappingStore;
use crate::tree::{insert_at, position_in, post_order_in};
use crate::{debug, trace};

/// Configuration for edit script generation.
#[derive(Debug, Clone, Default)]
pub struct GeneratorConfig {
    /// Leave `Move` and `Update` actions out of the script.
    ///
    /// Inserts and deletes are still emitted as usual, so the script only
    /// describes what was added and removed.
    pub suppress_moves_and_updates: bool,
}

/// Generate the actions turning `mappings.src()` into `mappings.dst()`.
pub fn generate_actions(mappings: &MappingStore<'_>, config: &GeneratorConfig) -> Vec<Action> {
    ActionGenerator::new(mappings).generate(config)
}

/// A node of the working copy.
#[derive(Debug, Clone)]
struct WorkingNode {
    label: CompactString,
    /// The source node it was copied from, or the destination node it was
    /// inserted for.
    origin: NodeRef,
}

/// Wrapper for collecting actions with automatic tracing.
struct Actions {
    inner: Vec<Action>,
}

impl Actions {
    fn new() -> Self {
        Self { inner: Vec::new() }
    }

    fn push(&mut self, action: Action) {
        debug!(%action, "emit");
        self.inner.push(action);
    }

    fn into_inner(self) -> Vec<Action> {
        self.inner
    }
}

/// Computes the edit script for one mapping.
///
/// A generator runs once: [`generate`](Self::generate) consumes it.
pub struct ActionGenerator<'m, 't> {
    mappings: &'m MappingStore<'t>,
    arena: Arena<WorkingNode>,
    root: NodeId,
    /// Working copy node for each source node
    src_to_w: RapidHashMap<NodeId, NodeId>,
    /// Destination counterpart of each working copy node that has one
    w_to_dst: RapidHashMap<NodeId, NodeId>,
    /// Working copy counterpart of each destination node that has one
    dst_to_w: RapidHashMap<NodeId, NodeId>,
    /// Destination nodes whose working copy counterpart is at its final place
    /// relative to its siblings
    dst_in_order: RapidHashSet<NodeId>,
    actions: Actions,
}

impl<'m, 't> ActionGenerator<'m, 't> {
    /// Prepare a generator, copying the source tree into a working copy.
    pub fn new(mappings: &'m MappingStore<'t>) -> Self {
        let src = mappings.src();
        let mut arena = Arena::with_capacity(src.node_count());
        let copies = src.copy_subtree_into(src.root(), &mut arena, |id, data| WorkingNode {
            label: data.label.clone(),
            origin: NodeRef::Src(id),
        });
        let root = copies[0].1;

        let mut src_to_w = RapidHashMap::default();
        let mut w_to_dst = RapidHashMap::default();
        let mut dst_to_w = RapidHashMap::default();
        for (s, w) in copies {
            src_to_w.insert(s, w);
            if let Some(d) = mappings.get_dst(s) {
                w_to_dst.insert(w, d);
                dst_to_w.insert(d, w);
            }
        }

        Self {
            mappings,
            arena,
            root,
            src_to_w,
            w_to_dst,
            dst_to_w,
            dst_in_order: RapidHashSet::default(),
            actions: Actions::new(),
        }
    }

    /// Run the algorithm and return the actions, in application order.
    pub fn generate(mut self, config: &GeneratorConfig) -> Vec<Action> {
        let src = self.mappings.src();
        let dst = self.mappings.dst();
        debug!(
            nodes_src = src.node_count(),
            nodes_dst = dst.node_count(),
            mapped = self.mappings.len(),
            "generate start"
        );

        if self.mappings.get_src(dst.root()) != Some(src.root()) {
            debug!("roots are not mapped to each other, replacing the whole tree");
            self.actions.push(Action::TreeDelete { node: src.root() });
            self.actions.push(Action::TreeInsert {
                node: dst.root(),
                parent: None,
                position: 0,
            });
            return self.actions.into_inner();
        }

        self.update_label(self.root, src.root(), dst.root(), config);
        self.dst_in_order.insert(dst.root());
        self.align_children(self.root, dst.root(), config);

        // Destination nodes copied along with an inserted subtree
        let mut materialized: RapidHashSet<NodeId> = RapidHashSet::default();

        for x in dst.iter() {
            if materialized.contains(&x) {
                continue;
            }
            let Some(y) = dst.parent(x) else {
                continue;
            };
            let z = self.dst_to_w[&y];

            let w = match self.mappings.get_src(x) {
                None if dst.is_leaf(x) || !self.mappings.is_dst_subtree_unmapped(x) => {
                    let k = self.find_pos(x);
                    let w = self.arena.new_node(WorkingNode {
                        label: dst.get(x).label.clone(),
                        origin: NodeRef::Dst(x),
                    });
                    insert_at(&mut self.arena, z, k, w);
                    self.link(w, x);
                    self.actions.push(Action::Insert {
                        node: x,
                        parent: self.origin(z),
                        position: k,
                    });
                    w
                }
                None => {
                    let k = self.find_pos(x);
                    let copies = dst.copy_subtree_into(x, &mut self.arena, |id, data| WorkingNode {
                        label: data.label.clone(),
                        origin: NodeRef::Dst(id),
                    });
                    let w = copies[0].1;
                    for (d, copy) in copies {
                        self.link(copy, d);
                        if d != x {
                            materialized.insert(d);
                        }
                    }
                    insert_at(&mut self.arena, z, k, w);
                    self.actions.push(Action::TreeInsert {
                        node: x,
                        parent: Some(self.origin(z)),
                        position: k,
                    });
                    // The copy already has the destination's shape.
                    self.dst_in_order.insert(x);
                    continue;
                }
                Some(s) => {
                    let w = self.src_to_w[&s];
                    self.update_label(w, s, x, config);
                    if self.arena[w].parent() != Some(z) {
                        w.detach(&mut self.arena);
                        let k = self.find_pos(x);
                        insert_at(&mut self.arena, z, k, w);
                        if !config.suppress_moves_and_updates {
                            self.actions.push(Action::Move {
                                node: s,
                                parent: self.origin(z),
                                position: k,
                            });
                        }
                    }
                    w
                }
            };

            self.dst_in_order.insert(x);
            self.align_children(w, x, config);
        }

        self.delete_unmapped();

        debug!(total_actions = self.actions.inner.len(), "generate done");
        self.actions.into_inner()
    }

    /// Give `w`, the copy of source node `s`, the label of its counterpart `x`.
    fn update_label(&mut self, w: NodeId, s: NodeId, x: NodeId, config: &GeneratorConfig) {
        let label = &self.mappings.dst().get(x).label;
        if self.arena[w].get().label == *label {
            return;
        }
        self.arena[w].get_mut().label = label.clone();
        if !config.suppress_moves_and_updates {
            self.actions.push(Action::Update {
                node: s,
                value: label.clone(),
            });
        }
    }

    /// Record that working copy node `w` stands for destination node `d`.
    fn link(&mut self, w: NodeId, d: NodeId) {
        self.w_to_dst.insert(w, d);
        self.dst_to_w.insert(d, w);
    }

    fn origin(&self, w: NodeId) -> NodeRef {
        self.arena[w].get().origin
    }

    /// Order the children of `w` that already belong under it like the
    /// children of its counterpart `x`, moving as few of them as possible.
    fn align_children(&mut self, w: NodeId, x: NodeId, config: &GeneratorConfig) {
        let dst = self.mappings.dst();
        for c in dst.children(x) {
            self.dst_in_order.remove(&c);
        }

        let s1: Vec<NodeId> = w
            .children(&self.arena)
            .filter(|a| {
                self.w_to_dst
                    .get(a)
                    .is_some_and(|&d| dst.parent(d) == Some(x))
            })
            .collect();
        let s2: Vec<NodeId> = dst
            .children(x)
            .filter(|b| {
                self.dst_to_w
                    .get(b)
                    .is_some_and(|&a| self.arena[a].parent() == Some(w))
            })
            .collect();
        if s1.is_empty() && s2.is_empty() {
            return;
        }

        let common = lcs(&s1, &s2, |a, b| self.w_to_dst.get(&a) == Some(&b));
        trace!(
            w = usize::from(w),
            x = usize::from(x),
            candidates = s2.len(),
            in_order = common.len(),
            "align children"
        );
        let kept: RapidHashSet<NodeId> = common.iter().map(|&(_, b)| b).collect();
        self.dst_in_order.extend(kept.iter().copied());

        for b in s2 {
            if kept.contains(&b) {
                continue;
            }
            let a = self.dst_to_w[&b];
            a.detach(&mut self.arena);
            let k = self.find_pos(b);
            insert_at(&mut self.arena, w, k, a);
            if !config.suppress_moves_and_updates
                && let NodeRef::Src(s) = self.origin(a)
            {
                self.actions.push(Action::Move {
                    node: s,
                    parent: self.origin(w),
                    position: k,
                });
            }
            self.dst_in_order.insert(b);
        }
    }

    /// Where the counterpart of destination node `x` goes among the working
    /// copy children: right after the counterpart of the rightmost sibling
    /// before `x` that is already in order, or first.
    fn find_pos(&self, x: NodeId) -> usize {
        let dst = self.mappings.dst();
        let Some(y) = dst.parent(x) else {
            return 0;
        };
        let v = dst
            .children(y)
            .take_while(|&c| c != x)
            .filter(|c| self.dst_in_order.contains(c))
            .last();
        let pos = match v {
            None => 0,
            Some(v) => position_in(&self.arena, self.dst_to_w[&v]) + 1,
        };
        trace!(x = usize::from(x), pos, "find_pos");
        pos
    }

    /// Remove every working copy node that has no destination counterpart.
    fn delete_unmapped(&mut self) {
        let src = self.mappings.src();

        // Source subtrees with no mapped node at all and at least one child go
        // away in one action.
        let mut unmapped_subtree: RapidHashSet<NodeId> = RapidHashSet::default();
        for s in src.post_order() {
            if !self.mappings.has_src(s) && src.children(s).all(|c| unmapped_subtree.contains(&c)) {
                unmapped_subtree.insert(s);
            }
        }
        let collapses = |s: NodeId| unmapped_subtree.contains(&s) && !src.is_leaf(s);

        let order: Vec<NodeId> = post_order_in(&self.arena, self.root).collect();
        for w in order {
            if self.w_to_dst.contains_key(&w) {
                continue;
            }
            let NodeRef::Src(s) = self.origin(w) else {
                continue;
            };
            if src.parent(s).is_some_and(collapses) {
                continue;
            }
            if collapses(s) {
                self.actions.push(Action::TreeDelete { node: s });
                w.remove_subtree(&mut self.arena);
            } else {
                self.actions.push(Action::Delete { node: s });
                w.remove(&mut self.arena);
            }
        }
    }
}

/// Longest common subsequence of `a` and `b` under `eq`, as index-aligned
/// pairs in order.
fn lcs<A: Copy, B: Copy>(a: &[A], b: &[B], eq: impl Fn(A, B) -> bool) -> Vec<(A, B)> {
    let (n, m) = (a.len(), b.len());
    // table[i][j] = LCS length of a[i..] and b[j..]
    let mut table = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i][j] = if eq(a[i], b[j]) {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(table[0][0] as usize);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if eq(a[i], b[j]) {
            out.push((a[i], b[j]));
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::tree::{Tree, TypeRegistry};
    use facet_testhelpers::test;

    fn mapping_from_pairs<'t>(
        src: &'t Tree,
        dst: &'t Tree,
        pairs: impl IntoIterator<Item = (NodeId, NodeId)>,
    ) -> MappingStore<'t> {
        let mut mappings = MappingStore::new(src, dst);
        for (s, d) in pairs {
            mappings.add_mapping(s, d);
        }
        mappings
    }

    fn tree(types: &mut TypeRegistry, root: &str) -> Tree {
        let ty = types.intern("n");
        Tree::new(types.clone(), ty, root)
    }

    fn add(tree: &mut Tree, parent: NodeId, label: &str) -> NodeId {
        let ty = tree.types_mut().intern("n");
        tree.add_child(parent, ty, label)
    }

    fn kinds(actions: &[Action]) -> Vec<ActionKind> {
        actions.iter().map(Action::kind).collect()
    }

    #[test]
    fn test_identical_trees_need_no_actions() {
        let mut types = TypeRegistry::new();
        let mut src = tree(&mut types, "r");
        let sr = src.root();
        let a = add(&mut src, sr, "a");
        add(&mut src, a, "a1");
        add(&mut src, sr, "b");
        let dst = src.clone();

        let mut ms = MappingStore::new(&src, &dst);
        ms.add_mapping_recursively(src.root(), dst.root());

        let actions = generate_actions(&ms, &GeneratorConfig::default());
        assert!(actions.is_empty(), "expected no actions, got {actions:?}");
    }

    #[test]
    fn test_single_node_trees() {
        let mut types = TypeRegistry::new();
        let src = tree(&mut types, "x");
        let dst = tree(&mut types, "y");
        let ms = mapping_from_pairs(&src, &dst, [(src.root(), dst.root())]);

        let actions = generate_actions(&ms, &GeneratorConfig::default());
        assert_eq!(
            actions,
            vec![Action::Update {
                node: src.root(),
                value: "y".into()
            }]
        );
    }

    #[test]
    fn test_unmapped_root_is_replaced() {
        let mut types = TypeRegistry::new();
        let mut src = tree(&mut types, "x");
        let sr = src.root();
        add(&mut src, sr, "child");
        let dst = tree(&mut types, "y");
        let ms = MappingStore::new(&src, &dst);

        let actions = generate_actions(&ms, &GeneratorConfig::default());
        assert_eq!(
            actions,
            vec![
                Action::TreeDelete { node: src.root() },
                Action::TreeInsert {
                    node: dst.root(),
                    parent: None,
                    position: 0
                }
            ]
        );
    }

    #[test]
    fn test_swapped_siblings_move_once() {
        let mut types = TypeRegistry::new();
        let mut src = tree(&mut types, "r");
        let sr = src.root();
        let s_a = add(&mut src, sr, "a");
        let s_b = add(&mut src, sr, "b");
        let s_c = add(&mut src, sr, "c");

        let mut dst = tree(&mut types, "r");
        let dr = dst.root();
        let d_c = add(&mut dst, dr, "c");
        let d_a = add(&mut dst, dr, "a");
        let d_b = add(&mut dst, dr, "b");

        let ms = mapping_from_pairs(
            &src,
            &dst,
            [(sr, dr), (s_a, d_a), (s_b, d_b), (s_c, d_c)],
        );
        let actions = generate_actions(&ms, &GeneratorConfig::default());
        assert_eq!(
            actions,
            vec![Action::Move {
                node: s_c,
                parent: NodeRef::Src(sr),
                position: 0
            }],
            "a and b keep their relative order, only c moves"
        );
    }

    #[test]
    fn test_unmapped_leaves_are_single_actions() {
        let mut types = TypeRegistry::new();
        let mut src = tree(&mut types, "r");
        let sr = src.root();
        let s_gone = add(&mut src, sr, "gone");

        let mut dst = tree(&mut types, "r");
        let dr = dst.root();
        let d_new = add(&mut dst, dr, "new");

        let ms = mapping_from_pairs(&src, &dst, [(sr, dr)]);
        let actions = generate_actions(&ms, &GeneratorConfig::default());
        assert_eq!(
            actions,
            vec![
                Action::Insert {
                    node: d_new,
                    parent: NodeRef::Src(sr),
                    position: 0
                },
                Action::Delete { node: s_gone },
            ]
        );
    }

    #[test]
    fn test_unmapped_subtrees_collapse() {
        let mut types = TypeRegistry::new();
        let mut src = tree(&mut types, "r");
        let sr = src.root();
        let s_old = add(&mut src, sr, "old");
        let s_mid = add(&mut src, s_old, "mid");
        add(&mut src, s_mid, "leaf");

        let mut dst = tree(&mut types, "r");
        let dr = dst.root();
        let d_new = add(&mut dst, dr, "new");
        let d_inner = add(&mut dst, d_new, "inner");
        add(&mut dst, d_inner, "leaf");

        let ms = mapping_from_pairs(&src, &dst, [(sr, dr)]);
        let actions = generate_actions(&ms, &GeneratorConfig::default());
        assert_eq!(
            kinds(&actions),
            vec![ActionKind::TreeInsert, ActionKind::TreeDelete],
            "got {actions:?}"
        );
        assert_eq!(actions[0].node(), NodeRef::Dst(d_new));
        assert_eq!(actions[1].node(), NodeRef::Src(s_old));
    }

    #[test]
    fn test_partially_mapped_parent_is_deleted_node_by_node() {
        // r[p[q, m]] -> r[m]: p still holds a mapped node, so it is not a
        // candidate for a subtree delete.
        let mut types = TypeRegistry::new();
        let mut src = tree(&mut types, "r");
        let sr = src.root();
        let s_p = add(&mut src, sr, "p");
        let s_q = add(&mut src, s_p, "q");
        let s_m = add(&mut src, s_p, "m");

        let mut dst = tree(&mut types, "r");
        let dr = dst.root();
        let d_m = add(&mut dst, dr, "m");

        let ms = mapping_from_pairs(&src, &dst, [(sr, dr), (s_m, d_m)]);
        let actions = generate_actions(&ms, &GeneratorConfig::default());
        assert_eq!(
            actions,
            vec![
                Action::Move {
                    node: s_m,
                    parent: NodeRef::Src(sr),
                    position: 0
                },
                Action::Delete { node: s_q },
                Action::Delete { node: s_p },
            ]
        );
    }

    #[test]
    fn test_suppression_keeps_inserts_and_deletes() {
        let mut types = TypeRegistry::new();
        let mut src = tree(&mut types, "r");
        let sr = src.root();
        let s_a = add(&mut src, sr, "a");
        let s_b = add(&mut src, sr, "b");
        add(&mut src, sr, "gone");

        let mut dst = tree(&mut types, "r");
        let dr = dst.root();
        let d_b = add(&mut dst, dr, "B");
        let d_a = add(&mut dst, dr, "a");
        add(&mut dst, dr, "new");

        let ms = mapping_from_pairs(&src, &dst, [(sr, dr), (s_a, d_a), (s_b, d_b)]);

        let full = generate_actions(&ms, &GeneratorConfig::default());
        let quiet = generate_actions(
            &ms,
            &GeneratorConfig {
                suppress_moves_and_updates: true,
            },
        );

        assert!(full.iter().any(|a| a.kind() == ActionKind::Update));
        assert!(full.iter().any(|a| a.kind() == ActionKind::Move));
        assert!(
            quiet
                .iter()
                .all(|a| !matches!(a.kind(), ActionKind::Move | ActionKind::Update)),
            "suppressed run emitted {quiet:?}"
        );

        let others = |actions: &[Action]| {
            actions
                .iter()
                .filter(|a| !matches!(a.kind(), ActionKind::Move | ActionKind::Update))
                .cloned()
                .collect::<Vec<_>>()
        };
        assert_eq!(others(&full), others(&quiet));
    }

    #[test]
    fn test_mapped_root_label_is_updated() {
        let mut types = TypeRegistry::new();
        let mut src = tree(&mut types, "old");
        let sr = src.root();
        let s_c = add(&mut src, sr, "c");

        let mut dst = tree(&mut types, "new");
        let dr = dst.root();
        let d_c = add(&mut dst, dr, "c");

        let ms = mapping_from_pairs(&src, &dst, [(sr, dr), (s_c, d_c)]);
        let actions = generate_actions(&ms, &GeneratorConfig::default());
        assert_eq!(
            actions,
            vec![Action::Update {
                node: sr,
                value: "new".into(),
            }]
        );

        let replayed = crate::apply_actions(&src, &dst, &actions).unwrap();
        assert!(
            replayed.isomorphic_to(&dst),
            "replay gave {}",
            replayed.to_sexpr(replayed.root())
        );

        let quiet = generate_actions(
            &ms,
            &GeneratorConfig {
                suppress_moves_and_updates: true,
            },
        );
        assert!(quiet.is_empty(), "suppressed run emitted {quiet:?}");
    }

    #[test]
    fn test_conflicting_mapping_is_ignored_in_release() {
        if cfg!(debug_assertions) {
            return;
        }
        let mut types = TypeRegistry::new();
        let mut src = tree(&mut types, "r");
        let sr = src.root();
        let s_a = add(&mut src, sr, "a");

        let mut dst = tree(&mut types, "r");
        let dr = dst.root();
        let d_a = add(&mut dst, dr, "a");
        add(&mut dst, d_a, "a1");
        let d_b = add(&mut dst, dr, "b");

        // The second pair re-maps `s_a` and must not leave `d_a` orphaned.
        let ms = mapping_from_pairs(&src, &dst, [(sr, dr), (s_a, d_a), (s_a, d_b)]);
        assert_eq!(ms.get_src(d_a), Some(s_a));
        assert_eq!(ms.get_src(d_b), None);

        let actions = generate_actions(&ms, &GeneratorConfig::default());
        assert_eq!(kinds(&actions), vec![ActionKind::Insert, ActionKind::Insert]);
        let replayed = crate::apply_actions(&src, &dst, &actions).unwrap();
        assert!(replayed.isomorphic_to(&dst));
    }

    #[test]
    fn test_lcs_prefers_longest_run() {
        let a = [1, 2, 3, 4, 5];
        let b = [2, 4, 1, 5];
        let pairs = lcs(&a, &b, |x, y| x == y);
        assert_eq!(pairs, vec![(2, 2), (4, 4), (5, 5)]);
        assert!(lcs(&a, &[] as &[i32], |x, y| x == y).is_empty());
    }
}
