use bonanza_merkle::parse_directory;
use bonanza_merkle::MerkleFile;
use bonanza_merkle::ParsedEntry;
use bonanza_merkle::SubdirectorySource;
use bonanza_reference::ObjectFormat;
use bonanza_reference::Reference;
use bonanza_repo_fetcher::DirectoryExpander;
use bonanza_repo_fetcher::ExpandedEntry;
use bonanza_repo_fetcher::RepoFetcherError;

use bonanza_storage::ObjectStoreClient;

/// Bridges `bonanza_storage`'s async object store client with
/// `bonanza_repo_fetcher`'s synchronous expansion contract (spec §4.8:
/// directories expand lazily from storage, fetched and decoded on first
/// touch). The only client this crate adds on top of the two it wires
/// together: everything else here is translation.
///
/// `bonanza_repo_fetcher::DirectoryExpander::expand` is `fn`, not
/// `async fn` -- the virtual filesystem's mutation API
/// (`RepositoryContext::write_file` and friends) is synchronous all the
/// way through, matching a repository-rule/module-extension evaluation
/// thread that has no executor of its own to await on. `block_on` is the
/// documented simplification (see `DESIGN.md`): it assumes `expand` is
/// never called from inside an already-running Tokio reactor thread,
/// which holds for this crate's own call sites (a dedicated blocking
/// evaluation thread per repository fetch) but would deadlock if an
/// embedder called it from an async context instead.
pub struct StorageDirectoryExpander<C: ObjectStoreClient> {
    client: C,
    namespace: String,
    format: ObjectFormat,
}

impl<C: ObjectStoreClient> StorageDirectoryExpander<C> {
    pub fn new(client: C, namespace: impl Into<String>, format: ObjectFormat) -> Self {
        StorageDirectoryExpander { client, namespace, format }
    }
}

impl<C: ObjectStoreClient> DirectoryExpander for StorageDirectoryExpander<C> {
    fn expand(&self, reference: &Reference) -> Result<Vec<(String, ExpandedEntry)>, RepoFetcherError> {
        let contents = futures::executor::block_on(self.client.download_object(&self.namespace, reference))
            .map_err(|err| RepoFetcherError::Internal(err.to_string()))?;

        let entries =
            parse_directory(&contents, &self.format).map_err(|err| RepoFetcherError::Internal(err.to_string()))?;
        convert_entries(entries, &self.format)
    }
}

/// Converts parsed directory entries into the shape
/// `bonanza_repo_fetcher` loads directly. Recurses into
/// [`SubdirectorySource::Inline`]: an inline subdirectory was never
/// given its own reference, so there's nothing to lazily defer --
/// its own entries have to be parsed and converted right here instead
/// of waiting for a later `expand` call that could never locate it.
fn convert_entries(
    parsed: Vec<(String, ParsedEntry)>,
    format: &ObjectFormat,
) -> Result<Vec<(String, ExpandedEntry)>, RepoFetcherError> {
    parsed
        .into_iter()
        .map(|(name, entry)| {
            let expanded = match entry {
                ParsedEntry::File(MerkleFile::Empty) => ExpandedEntry::EmptyFile,
                ParsedEntry::File(MerkleFile::Chunk(reference)) => ExpandedEntry::File(reference),
                ParsedEntry::File(MerkleFile::ContentsList { reference, .. }) => ExpandedEntry::File(reference),
                ParsedEntry::Symlink { target, .. } => ExpandedEntry::Symlink(target),
                ParsedEntry::Subdirectory(SubdirectorySource::External(reference)) => {
                    ExpandedEntry::Directory(reference)
                }
                ParsedEntry::Subdirectory(SubdirectorySource::Inline(inline_contents)) => {
                    let nested = parse_directory(&inline_contents, format)
                        .map_err(|err| RepoFetcherError::Internal(err.to_string()))?;
                    ExpandedEntry::InlineDirectory(convert_entries(nested, format)?)
                }
            };
            Ok((name, expanded))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bonanza_merkle::build_directory;
    use bonanza_merkle::DirectoryEntryInput;
    use bonanza_merkle::DirectoryNode;
    use bonanza_reference::Contents;
    use bonanza_storage::Lease;
    use bonanza_storage::ResolvedTag;
    use bonanza_storage::StorageError;
    use bonanza_storage::UploadOutcome;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    struct MapStore {
        objects: Mutex<HashMap<Vec<u8>, Contents>>,
    }

    impl MapStore {
        fn new() -> Self {
            MapStore { objects: Mutex::new(HashMap::new()) }
        }

        fn insert(&self, contents: Contents) {
            self.objects.lock().unwrap().insert(contents.reference().to_bytes(), contents);
        }
    }

    #[async_trait]
    impl ObjectStoreClient for MapStore {
        async fn download_object(&self, _namespace: &str, reference: &Reference) -> Result<Contents, StorageError> {
            self.objects
                .lock()
                .unwrap()
                .get(&reference.to_bytes())
                .cloned()
                .ok_or_else(|| StorageError::NotFound(format!("{:?}", reference.hash_bytes())))
        }

        async fn upload_object(
            &self,
            _namespace: &str,
            reference: &Reference,
            _contents: Option<&Contents>,
            _child_leases: &[Option<Lease>],
            _want_contents_if_incomplete: bool,
        ) -> Result<UploadOutcome, StorageError> {
            Ok(UploadOutcome::Complete { lease: Lease::new(reference.to_bytes()) })
        }

        async fn resolve_tag(&self, _namespace: &str, _tag: &str) -> Result<Option<ResolvedTag>, StorageError> {
            Ok(None)
        }

        async fn update_tag(
            &self,
            _namespace: &str,
            _tag: &str,
            _reference: &Reference,
            _lease: &Lease,
            _overwrite: bool,
        ) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[test]
    fn expands_a_stored_directory_into_its_named_entries() {
        let format = ObjectFormat::default();
        let store = MapStore::new();

        let mut node = DirectoryNode::new();
        node.push("empty.txt", DirectoryEntryInput::File(bonanza_merkle::MerkleFile::Empty));
        let chunk = Contents::new(&format, Vec::new(), b"hello".to_vec()).unwrap();
        let chunk_ref = chunk.reference().clone();
        store.insert(chunk.clone());
        node.push("greeting.txt", DirectoryEntryInput::File(bonanza_merkle::MerkleFile::Chunk(chunk_ref.clone())));

        let mut subdir = DirectoryNode::new();
        // One level deep so the `..` target has a non-zero escapement
        // budget to climb within (the root sits at depth 0).
        subdir.push("link", DirectoryEntryInput::Symlink("../sibling".to_string()));
        node.push("subdir", DirectoryEntryInput::Subdirectory(subdir));

        let built = build_directory(node, &format, &mut |c| {
            let r = c.reference().clone();
            store.insert(c);
            r
        })
        .unwrap();

        let expander = StorageDirectoryExpander::new(store, "ns", format);
        let entries = expander.expand(&built.reference).unwrap();

        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["greeting.txt", "empty.txt", "subdir"]);

        let mut subdir_entries = None;
        for (name, entry) in entries {
            match (name.as_str(), entry) {
                ("empty.txt", ExpandedEntry::EmptyFile) => (),
                ("greeting.txt", ExpandedEntry::File(r)) => assert_eq!(r, chunk_ref),
                ("subdir", ExpandedEntry::Directory(r)) => {
                    subdir_entries = Some(expander.expand(&r).unwrap())
                }
                ("subdir", ExpandedEntry::InlineDirectory(inner)) => subdir_entries = Some(inner),
                (name, other) => panic!("unexpected entry {name:?}: {other:?}"),
            }
        }

        let subdir_entries = subdir_entries.unwrap();
        assert_eq!(subdir_entries.len(), 1);
        match &subdir_entries[0] {
            (name, ExpandedEntry::Symlink(target)) => {
                assert_eq!(name, "link");
                assert_eq!(target, "../sibling");
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }
}
