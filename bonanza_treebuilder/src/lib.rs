//! Shared building blocks for every Merkle-shaped structure (spec §4.5,
//! used by both §2.5's B-tree and §2.6's Merkle file/directory builder):
//! the size-budget inlined-vs-external decision, and a generic,
//! pluggable-chunker content-defined B-tree builder/lookup.

mod btree;
mod chunker;
mod error;
mod inline;

pub use btree::build_btree;
pub use btree::build_level;
pub use btree::find;
pub use btree::BTree;
pub use btree::ParentEntry;
pub use chunker::Chunker;
pub use chunker::ChunkerFactory;
pub use chunker::ProllyChunker;
pub use chunker::ProllyChunkerFactory;
pub use error::TreeBuilderError;
pub use inline::build_inlined_tree;
pub use inline::InlineCandidate;
pub use inline::InlineDecision;
