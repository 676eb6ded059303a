use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use fnv::FnvHasher;

/// Decides when a B-tree level should flush its current group of
/// buffered items into a new object (spec §4.5 "Each level has a
/// chunker that decides when to flush a group into an object").
/// Stateful per group: `should_flush` is called once per appended item
/// and must reset its own internal counters when it returns `true`.
pub trait Chunker<T> {
    fn should_flush(&mut self, group: &[T]) -> bool;
}

/// Builds a fresh [`Chunker`] per B-tree level, so each level can use an
/// independent policy (spec §4.5: "Chunkers are factories").
pub trait ChunkerFactory<T> {
    type Chunker: Chunker<T>;
    fn new_chunker(&self) -> Self::Chunker;
}

/// Byte-size bounds for a [`ProllyChunker`] (spec.md Open Questions,
/// resolved in `SPEC_FULL.md`: minimum one item per object, target 4096
/// encoded bytes per node object via a content-defined boundary).
#[derive(Clone, Debug)]
pub struct ChunkerParams {
    pub target_object_bytes: usize,
    pub max_object_bytes: usize,
}

impl Default for ChunkerParams {
    fn default() -> Self {
        ChunkerParams {
            target_object_bytes: 4096,
            max_object_bytes: 1 << 20,
        }
    }
}

/// Content-defined ("prolly tree"-style) chunking: flushes at an item
/// whose hash falls on a boundary determined by the accumulated encoded
/// size of the current group, subject to a hard max-size bound. Sizing
/// the boundary probability on bytes rather than item count keeps node
/// objects close to a target encoded size regardless of how large
/// individual items are.
///
/// The boundary test depends only on the most recently appended item's
/// hash, not on group position, so inserting or removing items near the
/// start of a sequence doesn't perturb chunk boundaries far from the
/// edit -- the property that makes content-defined chunking worthwhile
/// over fixed-size chunking.
pub struct ProllyChunker<T> {
    max_object_bytes: usize,
    target_object_bytes: u64,
    size_of: Arc<dyn Fn(&T) -> usize + Send + Sync>,
    accumulated_bytes: usize,
}

impl<T: Hash> Chunker<T> for ProllyChunker<T> {
    fn should_flush(&mut self, group: &[T]) -> bool {
        let last = group
            .last()
            .expect("should_flush is only called after at least one push");
        self.accumulated_bytes += (self.size_of)(last);

        if self.accumulated_bytes >= self.max_object_bytes {
            self.accumulated_bytes = 0;
            return true;
        }

        let mut hasher = FnvHasher::default();
        last.hash(&mut hasher);
        let is_boundary = hasher.finish() % self.target_object_bytes == 0;
        if is_boundary {
            self.accumulated_bytes = 0;
        }
        is_boundary
    }
}

/// Builds a [`ProllyChunker`] with shared bounds and a size function for
/// every level of a B-tree.
pub struct ProllyChunkerFactory<T> {
    pub params: ChunkerParams,
    pub size_of: Arc<dyn Fn(&T) -> usize + Send + Sync>,
}

impl<T> ProllyChunkerFactory<T> {
    pub fn new(params: ChunkerParams, size_of: Arc<dyn Fn(&T) -> usize + Send + Sync>) -> Self {
        ProllyChunkerFactory { params, size_of }
    }
}

impl<T: Hash> ChunkerFactory<T> for ProllyChunkerFactory<T> {
    type Chunker = ProllyChunker<T>;

    fn new_chunker(&self) -> ProllyChunker<T> {
        ProllyChunker {
            max_object_bytes: self.params.max_object_bytes,
            target_object_bytes: self.params.target_object_bytes.max(1) as u64,
            size_of: self.size_of.clone(),
            accumulated_bytes: 0,
        }
    }
}
