use std::collections::HashMap;

use bluegum::{
    GeneratorConfig, MappingStore, Tree, TypeRegistry, apply_actions, generate_actions,
    indextree::NodeId,
};
use divan::{Bencher, black_box};

fn main() {
    divan::main();
}

const FANOUT: u64 = 6;

/// Build a complete tree, recording each node under a key that identifies its
/// logical position. With `edited`, some child lists are rotated and some
/// labels changed.
fn build(
    tree: &mut Tree,
    parent: NodeId,
    key: u64,
    depth: usize,
    edited: bool,
    out: &mut HashMap<u64, NodeId>,
) {
    if depth == 0 {
        return;
    }
    let kind = tree.types_mut().intern("node");
    let shift = if edited && key % 3 == 0 { 1 } else { 0 };
    for i in 0..FANOUT {
        let logical = (i + shift) % FANOUT;
        let child_key = key * (FANOUT + 1) + logical + 1;
        let label = if edited && child_key % 7 == 0 {
            format!("changed{child_key}")
        } else {
            format!("n{child_key}")
        };
        let child = tree.add_child(parent, kind.clone(), label);
        out.insert(child_key, child);
        build(tree, child, child_key, depth - 1, edited, out);
    }
}

fn tree_pair(depth: usize) -> (Tree, Tree, Vec<(NodeId, NodeId)>) {
    let mut types = TypeRegistry::new();
    let kind = types.intern("node");

    let mut src = Tree::new(types.clone(), kind.clone(), "root");
    let mut src_keys = HashMap::new();
    let root = src.root();
    build(&mut src, root, 0, depth, false, &mut src_keys);

    let mut dst = Tree::new(types, kind, "root");
    let mut dst_keys = HashMap::new();
    let root = dst.root();
    build(&mut dst, root, 0, depth, true, &mut dst_keys);

    // Every eleventh node is left out, to get inserts and deletes.
    let mut pairs = vec![(src.root(), dst.root())];
    pairs.extend(
        src_keys
            .iter()
            .filter(|(key, _)| *key % 11 != 0)
            .map(|(key, &s)| (s, dst_keys[key])),
    );
    (src, dst, pairs)
}

fn store<'t>(src: &'t Tree, dst: &'t Tree, pairs: &[(NodeId, NodeId)]) -> MappingStore<'t> {
    let mut ms = MappingStore::new(src, dst);
    for &(s, d) in pairs {
        ms.add_mapping(s, d);
    }
    ms
}

#[divan::bench(args = [2, 3, 4, 5])]
fn generate(bencher: Bencher, depth: usize) {
    let (src, dst, pairs) = tree_pair(depth);
    let ms = store(&src, &dst, &pairs);
    let config = GeneratorConfig::default();
    bencher.bench_local(|| black_box(generate_actions(black_box(&ms), &config)));
}

#[divan::bench(args = [2, 3, 4, 5])]
fn generate_without_moves(bencher: Bencher, depth: usize) {
    let (src, dst, pairs) = tree_pair(depth);
    let ms = store(&src, &dst, &pairs);
    let config = GeneratorConfig {
        suppress_moves_and_updates: true,
    };
    bencher.bench_local(|| black_box(generate_actions(black_box(&ms), &config)));
}

#[divan::bench(args = [2, 3, 4, 5])]
fn generate_and_replay(bencher: Bencher, depth: usize) {
    let (src, dst, pairs) = tree_pair(depth);
    let ms = store(&src, &dst, &pairs);
    let config = GeneratorConfig::default();
    bencher.bench_local(|| {
        let actions = generate_actions(black_box(&ms), &config);
        black_box(apply_actions(&src, &dst, &actions).unwrap())
    });
}
