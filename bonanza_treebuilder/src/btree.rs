use std::cmp::Ordering;

use bonanza_reference::Reference;

use crate::chunker::Chunker;
use crate::chunker::ChunkerFactory;
use crate::error::TreeBuilderError;

/// A flushed group's parent-level entry: its leftmost key and a
/// reference to the object holding the group (spec §4.5 "On flush, the
/// chunker emits a parent node with the first-key and a reference to
/// the created object").
#[derive(Clone, Debug)]
pub struct ParentEntry<K> {
    pub first_key: K,
    pub reference: Reference,
}

/// Builds one level of a B-tree: buffers `items` in order, asking
/// `chunker` after each append whether to flush the current group. On
/// flush, `flush` encodes the buffered group into an object and returns
/// its reference; `key_of` extracts the group's leftmost key for the
/// parent entry.
pub fn build_level<T, K>(
    items: impl IntoIterator<Item = T>,
    chunker: &mut impl Chunker<T>,
    key_of: impl Fn(&T) -> K,
    mut flush: impl FnMut(&[T]) -> Reference,
) -> Vec<ParentEntry<K>> {
    let mut parents = Vec::new();
    let mut group: Vec<T> = Vec::new();

    for item in items {
        group.push(item);
        if chunker.should_flush(&group) {
            let first_key = key_of(&group[0]);
            let reference = flush(&group);
            parents.push(ParentEntry { first_key, reference });
            group.clear();
        }
    }
    if !group.is_empty() {
        let first_key = key_of(&group[0]);
        let reference = flush(&group);
        parents.push(ParentEntry { first_key, reference });
    }
    parents
}

/// The outcome of building a full B-tree: the root object's reference
/// and the tree's height (1 = leaves flushed directly into a single
/// root object, with no intermediate parent levels).
pub struct BTree<K> {
    pub root: Reference,
    pub height: u32,
    /// Set only when the tree has more than one root-level entry after
    /// exhausting parent levels without ever converging to a single
    /// root -- shouldn't happen for a well-formed chunker (every level
    /// eventually flushes to one object given enough parent levels),
    /// kept here so callers can assert on it in tests rather than the
    /// builder silently picking an arbitrary root.
    pub unresolved_roots: Vec<ParentEntry<K>>,
}

/// Builds a complete B-tree bottom-up: flushes `leaves` into level-0
/// objects via `leaf_chunker_factory`/`flush_leaves`, then repeatedly
/// flushes each level's parent entries into the next level via
/// `parent_chunker_factory`/`flush_parents`, until exactly one entry
/// remains (the root) or the level stops shrinking.
///
/// `leaves` must be non-empty; an empty B-tree has no object to serve
/// as a root, and callers (the Merkle directory builder chief among
/// them) always have at least one entry to store.
pub fn build_btree<L, K: Clone>(
    leaves: Vec<L>,
    leaf_chunker_factory: &impl ChunkerFactory<L>,
    key_of_leaf: impl Fn(&L) -> K,
    mut flush_leaves: impl FnMut(&[L]) -> Reference,
    parent_chunker_factory: &impl ChunkerFactory<ParentEntry<K>>,
    mut flush_parents: impl FnMut(&[ParentEntry<K>]) -> Reference,
) -> BTree<K> {
    let mut level = build_level(
        leaves,
        &mut leaf_chunker_factory.new_chunker(),
        key_of_leaf,
        &mut flush_leaves,
    );
    let mut height = 1;

    loop {
        if level.len() <= 1 {
            return match level.into_iter().next() {
                Some(entry) => BTree {
                    root: entry.reference,
                    height,
                    unresolved_roots: Vec::new(),
                },
                None => panic!("build_btree requires at least one leaf"),
            };
        }

        let previous_len = level.len();
        let next = build_level(
            level,
            &mut parent_chunker_factory.new_chunker(),
            |entry: &ParentEntry<K>| entry.first_key.clone(),
            &mut flush_parents,
        );
        height += 1;

        if next.len() >= previous_len {
            // The parent chunker didn't make progress (e.g. max_items
            // == 1 with no content-defined boundary ever firing);
            // rather than loop forever, surface what's left.
            return BTree {
                root: next[0].reference.clone(),
                height,
                unresolved_roots: next,
            };
        }
        level = next;
    }
}

/// Walks a B-tree from `root` to find the entry matching a caller-owned
/// target. `reader` loads and parses the object at a reference into a
/// node view `N`; `cmp` inspects that view and returns the comparison
/// result against the search target together with an optional child
/// reference to descend into (spec §4.5 "B-tree search").
///
/// Per spec: `Ordering::Equal` with no child reference means the
/// current node is the answer; a present child reference means descend
/// into it regardless of ordering (a well-formed tree only returns one
/// when the ordering indicates the target falls under that child).
pub fn find<N>(
    root: Reference,
    reader: impl Fn(&Reference) -> Result<N, TreeBuilderError>,
    mut cmp: impl FnMut(&N) -> (Ordering, Option<Reference>),
) -> Result<Option<Reference>, TreeBuilderError> {
    let mut current = root;
    loop {
        let node = reader(&current)?;
        let (ordering, child) = cmp(&node);
        match child {
            Some(child_ref) => current = child_ref,
            None => return Ok((ordering == Ordering::Equal).then_some(current)),
        }
    }
}
