/* A conservative upper bound on logic depth, used to size the level
variables and the big-M of the depth-aware model.

The bound is a greedy per-node depth (min over cuts of max leaf depth plus
the cut's step) with generous slack on top. A back-edge met during the DFS
yields the sentinel `max(node_count, 1)` instead of recursing; the CP model
itself rejects cyclic covers, the bound only has to stay finite.
*/

use super::*;

use crate::catalog::Node;
use rustc_hash::{FxHashMap, FxHashSet};

pub fn depth_upper_bound(catalog: &Catalog) -> u64 {
    let node_map: FxHashMap<&str, &Node> = catalog
        .nodes
        .iter()
        .map(|nd| (nd.name.as_str(), nd))
        .collect();
    let sentinel = catalog.nodes.len().max(1) as u64;

    let mut memo = FxHashMap::default();
    let mut visiting = FxHashSet::default();
    let base = catalog
        .roots()
        .iter()
        .map(|root| depth(root, &node_map, &mut memo, &mut visiting, sentinel))
        .max()
        .unwrap_or(sentinel);

    // Slack so an "upper bound" that undershoots cannot make the model
    // spuriously infeasible.
    (base + 10).max((3 * base + 1) / 2).max(sentinel)
}

fn depth<'a>(
    name: &str,
    node_map: &FxHashMap<&'a str, &'a Node>,
    memo: &mut FxHashMap<&'a str, u64>,
    visiting: &mut FxHashSet<&'a str>,
    sentinel: u64,
) -> u64 {
    if let Some(&d) = memo.get(name) {
        return d;
    }
    // Names outside the catalog are primary inputs or constants.
    let Some((&name, &node)) = node_map.get_key_value(name) else {
        return 0;
    };
    if visiting.contains(name) {
        return sentinel;
    }

    visiting.insert(name);
    let mut best: Option<u64> = None;
    for cut in &node.cuts {
        // Self-cuts are skipped to stay consistent with model construction.
        if cut.is_self_cut(name) {
            continue;
        }
        let mut leaf_depth = 0;
        for leaf in &cut.leaves {
            if leaf == name {
                continue;
            }
            leaf_depth = leaf_depth.max(depth(leaf, node_map, memo, visiting, sentinel));
        }
        let cut_depth = leaf_depth + cut.depth_cost.max(1);
        best = Some(best.map_or(cut_depth, |b| b.min(cut_depth)));
    }
    visiting.remove(name);

    let d = best.unwrap_or(0);
    memo.insert(name, d);
    d
}
