//! Merkle File/Directory Builder (spec §2.6): content-defined file
//! chunking, directory assembly with a per-subdirectory inline-vs-
//! external decision, and symlink relativization against a bounded
//! escapement budget. Built atop `bonanza_treebuilder`'s generic
//! inlined-tree and B-tree machinery.

mod chunk;
mod directory;
mod error;
mod parse;
mod symlink;

pub use chunk::build_merkle_file;
pub use chunk::chunk_bytes;
pub use chunk::FilePart;
pub use chunk::MerkleFile;
pub use directory::build_directory;
pub use directory::BuiltDirectory;
pub use directory::DirectoryEntryInput;
pub use directory::DirectoryNode;
pub use error::MerkleError;
pub use parse::parse_directory;
pub use parse::ParsedEntry;
pub use parse::SubdirectorySource;
pub use symlink::relativize_symlink;
