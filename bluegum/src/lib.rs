//! # Bluegum
//!
//! Edit script generation for ordered, labeled trees.
//!
//! Given a source tree, a destination tree and a mapping between their nodes
//! (as produced by a GumTree-style matcher), bluegum computes the list of
//! actions that turns the source into the destination: `Insert`,
//! `TreeInsert`, `Update`, `Move`, `TreeDelete` and `Delete`.
//!
//! ## Algorithm Overview
//!
//! Generation follows Chawathe et al. (1996) as refined by GumTree
//! (Falleri et al., ASE 2014):
//!
//! 1. **Root handling**: roots that do not correspond turn into a tree replace
//! 2. **Breadth-first alignment**: inserts, updates and moves, with children
//!    kept in order through a longest common subsequence
//! 3. **Post-order deletion**: unmapped nodes go, whole subtrees at once
//!
//! Every decision is simulated on a private working copy of the source, so
//! positions in the script are valid at the point they are applied.
//!
//! ## Usage
//!
//! ```
//! use bluegum::{GeneratorConfig, MappingStore, Tree, TypeRegistry, apply_actions, generate_actions};
//!
//! let mut types = TypeRegistry::new();
//! let leaf = types.intern("leaf");
//!
//! let mut src = Tree::new(types.clone(), leaf.clone(), "root");
//! let old = src.add_child(src.root(), leaf.clone(), "old");
//!
//! let mut dst = Tree::new(types, leaf.clone(), "root");
//! let new = dst.add_child(dst.root(), leaf, "new");
//!
//! let mut mappings = MappingStore::new(&src, &dst);
//! mappings.add_mapping(src.root(), dst.root());
//! mappings.add_mapping(old, new);
//!
//! let actions = generate_actions(&mappings, &GeneratorConfig::default());
//! assert_eq!(actions.len(), 1); // a single Update
//!
//! let replayed = apply_actions(&src, &dst, &actions).unwrap();
//! assert!(replayed.isomorphic_to(&dst));
//! ```

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

pub use indextree;

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

/// Edit actions
pub mod action;
/// Replaying actions on a tree
pub mod apply;
/// Edit script generation
pub mod generator;
/// Node mappings between two trees
pub mod mapping;
/// Ordered labeled trees
pub mod tree;

pub use action::{Action, ActionKind, NodeRef};
pub use apply::{ApplyError, apply_actions};
pub use generator::{ActionGenerator, GeneratorConfig, generate_actions};
pub use mapping::MappingStore;
pub use tree::{NodeData, NodePath, NodeType, PathError, Tree, TypeRegistry};
