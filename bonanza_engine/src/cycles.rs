use indexmap::IndexSet;

use crate::key::NodeKey;

/// Detects a cycle reachable from `start` by walking the engine's parked
/// request-set graph: `waiting_on(key)` returns the keys `key` is
/// currently parked on (its most recent restart's outstanding
/// dependencies), or `None` if `key` isn't currently parked.
///
/// Ports `dice::cycles::CycleDetector`'s `IndexSet`-based walk, adapted
/// from "cycle in the current call chain" to "cycle in the global
/// parked-key graph": legacy `dice` threads an immutable detector through
/// recursive `compute` calls because a cycle can only be a live call
/// stack there. This engine parks a key and resumes it as an independent
/// task rather than recursing, so there is no call stack to thread --
/// cycles can only be found by walking the table of who is parked on
/// whom, which is what this does.
pub(crate) fn detect_cycle(
    start: &NodeKey,
    waiting_on: impl Fn(&NodeKey) -> Option<Vec<NodeKey>>,
) -> Option<Vec<NodeKey>> {
    let mut path: IndexSet<NodeKey> = IndexSet::new();
    path.insert(start.clone());
    if walk(start, start, &waiting_on, &mut path) {
        Some(path.into_iter().collect())
    } else {
        None
    }
}

fn walk(
    start: &NodeKey,
    node: &NodeKey,
    waiting_on: &impl Fn(&NodeKey) -> Option<Vec<NodeKey>>,
    path: &mut IndexSet<NodeKey>,
) -> bool {
    let Some(deps) = waiting_on(node) else {
        return false;
    };
    for dep in deps {
        if dep == *start {
            return true;
        }
        if path.contains(&dep) {
            continue;
        }
        path.insert(dep.clone());
        if walk(start, &dep, waiting_on, path) {
            return true;
        }
        path.pop();
    }
    false
}
