use std::collections::HashMap;

use bonanza_reference::Reference;

use crate::error::RepoFetcherError;
use crate::expander::DirectoryExpander;
use crate::expander::ExpandedEntry;
use crate::scratch::ScratchSlice;

/// Where a virtual file's bytes currently live (spec §4.8: "Files
/// record either an unmodified-storage contents reference or a slice of
/// a local scratch file into which patched/written bytes were
/// appended").
#[derive(Clone, Debug)]
pub enum FileState {
    Reference(Reference),
    /// An unmodified zero-byte file (`bonanza_merkle::MerkleFile::Empty`).
    Empty,
    Scratch(ScratchSlice),
}

/// One named entry of a loaded directory.
pub enum Entry {
    File(FileState),
    /// Already repo-relative (produced by [`crate::symlink::relativize`]
    /// before being stored here).
    Symlink(String),
    Directory(MutableDirectory),
}

/// Converts one expanded entry into its loaded form, recursing through
/// [`ExpandedEntry::InlineDirectory`] since an inline subdirectory never
/// gets its own reference to lazily expand later -- its entries are
/// already fully known and must be loaded eagerly, right along with the
/// parent that carried them.
fn build_entry(entry: ExpandedEntry) -> Entry {
    match entry {
        ExpandedEntry::File(reference) => Entry::File(FileState::Reference(reference)),
        ExpandedEntry::EmptyFile => Entry::File(FileState::Empty),
        ExpandedEntry::Symlink(target) => Entry::Symlink(target),
        ExpandedEntry::Directory(reference) => Entry::Directory(MutableDirectory::from_reference(reference)),
        ExpandedEntry::InlineDirectory(entries) => {
            let map = entries.into_iter().map(|(name, entry)| (name, build_entry(entry))).collect();
            Entry::Directory(MutableDirectory::from_loaded(map))
        }
    }
}

enum DirectoryState {
    /// Unmodified; nothing has looked inside this directory yet (spec
    /// §4.8: "a pointer to an unmodified storage reference").
    Unexpanded(Reference),
    /// Loaded, possibly with local mutations on top of whatever was
    /// originally at each entry.
    Loaded(HashMap<String, Entry>),
}

/// A directory in the change-tracking virtual filesystem (spec §4.8).
/// Starts out as either a bare reference or an empty in-memory map;
/// expands lazily from the reference the first time any operation needs
/// to see or change its contents.
pub struct MutableDirectory {
    state: DirectoryState,
}

impl MutableDirectory {
    pub fn from_reference(reference: Reference) -> Self {
        MutableDirectory { state: DirectoryState::Unexpanded(reference) }
    }

    pub fn empty() -> Self {
        MutableDirectory { state: DirectoryState::Loaded(HashMap::new()) }
    }

    fn from_loaded(map: HashMap<String, Entry>) -> Self {
        MutableDirectory { state: DirectoryState::Loaded(map) }
    }

    /// Forces expansion (spec §4.8: "on first mutation the directory is
    /// lazily expanded from the reference") and returns the loaded map.
    /// A no-op once already loaded.
    fn ensure_loaded(&mut self, expander: &dyn DirectoryExpander) -> Result<&mut HashMap<String, Entry>, RepoFetcherError> {
        if let DirectoryState::Unexpanded(reference) = &self.state {
            let expanded = expander.expand(reference)?;
            let mut map = HashMap::with_capacity(expanded.len());
            for (name, entry) in expanded {
                map.insert(name, build_entry(entry));
            }
            self.state = DirectoryState::Loaded(map);
        }
        match &mut self.state {
            DirectoryState::Loaded(map) => Ok(map),
            DirectoryState::Unexpanded(_) => unreachable!("just expanded above"),
        }
    }

    pub fn entries(&mut self, expander: &dyn DirectoryExpander) -> Result<&HashMap<String, Entry>, RepoFetcherError> {
        self.ensure_loaded(expander).map(|map| &*map)
    }

    pub fn get(&mut self, expander: &dyn DirectoryExpander, name: &str) -> Result<Option<&Entry>, RepoFetcherError> {
        Ok(self.ensure_loaded(expander)?.get(name))
    }

    pub fn set_file(&mut self, expander: &dyn DirectoryExpander, name: impl Into<String>, slice: ScratchSlice) -> Result<(), RepoFetcherError> {
        self.ensure_loaded(expander)?.insert(name.into(), Entry::File(FileState::Scratch(slice)));
        Ok(())
    }

    pub fn set_symlink(&mut self, expander: &dyn DirectoryExpander, name: impl Into<String>, relativized_target: impl Into<String>) -> Result<(), RepoFetcherError> {
        self.ensure_loaded(expander)?.insert(name.into(), Entry::Symlink(relativized_target.into()));
        Ok(())
    }

    pub fn remove(&mut self, expander: &dyn DirectoryExpander, name: &str) -> Result<(), RepoFetcherError> {
        self.ensure_loaded(expander)?.remove(name);
        Ok(())
    }

    /// Walks `components` from this directory, creating empty
    /// subdirectories along the way when `create_missing` is set and a
    /// component doesn't exist yet. Fails if an intermediate component
    /// names a file or symlink rather than a directory.
    pub fn walk_mut<'a>(
        &'a mut self,
        expander: &dyn DirectoryExpander,
        components: &[&str],
        create_missing: bool,
    ) -> Result<&'a mut MutableDirectory, RepoFetcherError> {
        let mut current = self;
        for component in components {
            let map = current.ensure_loaded(expander)?;
            if !map.contains_key(*component) {
                if create_missing {
                    map.insert((*component).to_string(), Entry::Directory(MutableDirectory::empty()));
                } else {
                    return Err(RepoFetcherError::NotFound(component.to_string()));
                }
            }
            current = match map.get_mut(*component).expect("just inserted or confirmed present") {
                Entry::Directory(dir) => dir,
                _ => return Err(RepoFetcherError::InvalidArgument(format!("`{component}` is not a directory"))),
            };
        }
        Ok(current)
    }
}
