use bonanza_reference::Reference;

use crate::directory::MutableDirectory;
use crate::error::RepoFetcherError;
use crate::expander::DirectoryExpander;
use crate::scratch::ScratchFile;

fn split_path(path: &str) -> Result<(Vec<&str>, &str), RepoFetcherError> {
    let mut components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    let name = components.pop().ok_or_else(|| RepoFetcherError::InvalidArgument(format!("empty path `{path}`")))?;
    Ok((components, name))
}

/// One `moduleOrRepositoryContext`'s worth of state (spec §4.8, §5): a
/// mutable directory tree rooted at either an unmodified reference or
/// empty, backed by exactly one [`ScratchFile`] for every byte any
/// operation in this context writes or patches.
pub struct RepositoryContext {
    root: MutableDirectory,
    scratch: ScratchFile,
}

impl RepositoryContext {
    pub fn new(root: Reference) -> Result<Self, RepoFetcherError> {
        Ok(RepositoryContext { root: MutableDirectory::from_reference(root), scratch: ScratchFile::new()? })
    }

    pub fn empty() -> Result<Self, RepoFetcherError> {
        Ok(RepositoryContext { root: MutableDirectory::empty(), scratch: ScratchFile::new()? })
    }

    pub fn root(&mut self) -> &mut MutableDirectory {
        &mut self.root
    }

    pub fn scratch(&mut self) -> &mut ScratchFile {
        &mut self.scratch
    }

    /// Writes `bytes` as a new scratch-backed file at `path`, creating
    /// any missing intermediate directories.
    pub fn write_file(&mut self, expander: &dyn DirectoryExpander, path: &str, bytes: &[u8]) -> Result<(), RepoFetcherError> {
        let slice = self.scratch.append(bytes)?;
        let (parents, name) = split_path(path)?;
        let dir = self.root.walk_mut(expander, &parents, true)?;
        dir.set_file(expander, name, slice)
    }

    /// Records a symlink at `path` pointing at `target`, relativizing
    /// and bounds-checking it first (spec §4.8: "Symlink relativization
    /// rewrites absolute or over-escaping symlinks into repo-relative
    /// form or rejects them").
    pub fn make_symlink(&mut self, expander: &dyn DirectoryExpander, path: &str, target: &str) -> Result<(), RepoFetcherError> {
        let (parents, name) = split_path(path)?;
        let (relativized, _escapement) = bonanza_merkle::relativize_symlink(target, parents.len() as u32)
            .map_err(|err| RepoFetcherError::InvalidArgument(err.to_string()))?;
        let dir = self.root.walk_mut(expander, &parents, true)?;
        dir.set_symlink(expander, name, relativized)
    }

    pub fn remove(&mut self, expander: &dyn DirectoryExpander, path: &str) -> Result<(), RepoFetcherError> {
        let (parents, name) = split_path(path)?;
        let dir = self.root.walk_mut(expander, &parents, false)?;
        dir.remove(expander, name)
    }

    /// Releases this context's scratch file (spec §5: "closed on
    /// context release"). Equivalent to letting `self` drop; spelled
    /// out as its own method so the release point is visible at call
    /// sites that manage contexts explicitly.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use bonanza_reference::Contents;
    use bonanza_reference::ObjectFormat;

    use super::*;
    use crate::directory::Entry;
    use crate::directory::FileState;
    use crate::expander::ExpandedEntry;

    struct NeverExpand;
    impl DirectoryExpander for NeverExpand {
        fn expand(&self, _reference: &Reference) -> Result<Vec<(String, ExpandedEntry)>, RepoFetcherError> {
            panic!("an empty context should never need expansion")
        }
    }

    fn leaf_reference(payload: &[u8]) -> Reference {
        Contents::new(&ObjectFormat::default(), Vec::new(), payload.to_vec()).unwrap().reference().clone()
    }

    #[test]
    fn write_file_creates_intermediate_directories_and_records_a_scratch_slice() {
        let mut ctx = RepositoryContext::empty().unwrap();
        ctx.write_file(&NeverExpand, "a/b/c.txt", b"hello").unwrap();

        let dir = ctx.root().walk_mut(&NeverExpand, &["a", "b"], false).unwrap();
        match dir.get(&NeverExpand, "c.txt").unwrap() {
            Some(Entry::File(FileState::Scratch(slice))) => assert_eq!(slice.len, 5),
            other => panic!("expected a scratch-backed file, got entry present = {}", other.is_some()),
        }
        assert_eq!(ctx.scratch().len(), 5);
    }

    #[test]
    fn make_symlink_relativizes_against_the_target_path_depth() {
        let mut ctx = RepositoryContext::empty().unwrap();
        ctx.make_symlink(&NeverExpand, "a/b/link", "../sibling").unwrap();
        let dir = ctx.root().walk_mut(&NeverExpand, &["a", "b"], false).unwrap();
        match dir.get(&NeverExpand, "link").unwrap() {
            Some(Entry::Symlink(target)) => assert_eq!(target, "../sibling"),
            other => panic!("expected a symlink, got entry present = {}", other.is_some()),
        }
    }

    #[test]
    fn make_symlink_rejects_targets_that_escape_the_tree() {
        let mut ctx = RepositoryContext::empty().unwrap();
        let err = ctx.make_symlink(&NeverExpand, "link", "../outside").unwrap_err();
        assert!(matches!(err, RepoFetcherError::InvalidArgument(_)));
    }

    #[test]
    fn remove_deletes_an_existing_entry() {
        let mut ctx = RepositoryContext::empty().unwrap();
        ctx.write_file(&NeverExpand, "a.txt", b"x").unwrap();
        ctx.remove(&NeverExpand, "a.txt").unwrap();
        assert!(ctx.root().get(&NeverExpand, "a.txt").unwrap().is_none());
    }

    #[test]
    fn new_starts_unexpanded_until_touched() {
        let reference = leaf_reference(b"root");
        let ctx = RepositoryContext::new(reference);
        assert!(ctx.is_ok());
    }
}
