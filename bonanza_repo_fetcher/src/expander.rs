use bonanza_reference::Reference;

use crate::error::RepoFetcherError;

/// One entry of an unmodified directory, as read back off storage. The
/// embedder (a `bonanza_computer`-level glue crate, which alone has both
/// a storage client and `bonanza_merkle`'s wire-format decoder) is
/// responsible for actually parsing a directory's `Contents` payload --
/// this crate only needs the resulting shape, not how it got there.
pub enum ExpandedEntry {
    /// An unmodified file; `reference` is its `MerkleFile` reference.
    File(Reference),
    /// An unmodified zero-byte file. A `MerkleFile::Empty` never gets a
    /// stored object of its own, so there is no reference to carry.
    EmptyFile,
    /// An unmodified, already-relativized symlink target.
    Symlink(String),
    /// An unmodified subdirectory stored as its own object, not yet
    /// itself expanded.
    Directory(Reference),
    /// An unmodified subdirectory that was embedded inline in its
    /// parent's payload rather than stored separately (spec §3/§4.4's
    /// inline-vs-external decision). It never got a reference of its
    /// own, so there is nothing further to fetch: its entries are
    /// already known and are carried here directly, already expanded.
    InlineDirectory(Vec<(String, ExpandedEntry)>),
}

/// Lazily expands a directory reference into its named entries (spec
/// §4.8: "on first mutation the directory is lazily expanded from the
/// reference"). Implemented by the embedder over its object store
/// client plus `bonanza_merkle`'s directory wire format.
pub trait DirectoryExpander: Send + Sync {
    fn expand(&self, reference: &Reference) -> Result<Vec<(String, ExpandedEntry)>, RepoFetcherError>;
}
