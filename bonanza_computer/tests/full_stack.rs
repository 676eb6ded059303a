//! Exercises the crates this workspace builds around together, rather
//! than in isolation: a directory tree is assembled with
//! `bonanza_merkle`, pushed through `bonanza_storage::upload_tree` into
//! an in-memory store double, and then read back lazily through
//! `bonanza_repo_fetcher::RepositoryContext` via
//! `bonanza_computer::StorageDirectoryExpander` -- the same path a real
//! repository-rule evaluation would take from "nothing local yet" to
//! "file contents in hand" (spec §4.8).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bonanza_computer::StorageDirectoryExpander;
use bonanza_merkle::build_directory;
use bonanza_merkle::DirectoryEntryInput;
use bonanza_merkle::DirectoryNode;
use bonanza_merkle::MerkleFile;
use bonanza_patcher::CreatedObject;
use bonanza_patcher::ReferenceMetadata;
use bonanza_reference::Contents;
use bonanza_reference::ObjectFormat;
use bonanza_reference::Reference;
use bonanza_repo_fetcher::DirectoryExpander;
use bonanza_repo_fetcher::Entry;
use bonanza_repo_fetcher::FileState;
use bonanza_repo_fetcher::RepositoryContext;
use bonanza_storage::upload_tree;
use bonanza_storage::Lease;
use bonanza_storage::ObjectStoreClient;
use bonanza_storage::ResolvedTag;
use bonanza_storage::StorageError;
use bonanza_storage::UploadOutcome;
use tokio::sync::Semaphore;

/// A store double that actually retains uploaded bytes, unlike
/// `bonanza_storage::upload`'s own `FakeStore` (which only tracks
/// presence) -- this crate is the first one that needs `download_object`
/// to return something real.
struct MapStore {
    objects: Mutex<HashMap<Vec<u8>, Contents>>,
}

impl MapStore {
    fn new() -> Self {
        MapStore { objects: Mutex::new(HashMap::new()) }
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
        contents: Option<&Contents>,
        _child_leases: &[Option<Lease>],
        _want_contents_if_incomplete: bool,
    ) -> Result<UploadOutcome, StorageError> {
        let key = reference.to_bytes();
        if self.objects.lock().unwrap().contains_key(&key) {
            return Ok(UploadOutcome::Complete { lease: Lease::new(key) });
        }
        match contents {
            None => Ok(UploadOutcome::Missing),
            Some(contents) => {
                self.objects.lock().unwrap().insert(key.clone(), contents.clone());
                Ok(UploadOutcome::Complete { lease: Lease::new(key) })
            }
        }
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

/// Turns the flat map a `build_directory` call's `store` closure
/// collects into the recursive `ReferenceMetadata` tree
/// `bonanza_storage::upload_tree` walks. A real build pipeline would
/// keep this shape from the start; tests build it after the fact since
/// `build_directory`'s own contract only hands back a flat store.
fn metadata_for(reference: &Reference, built: &HashMap<Vec<u8>, Contents>) -> ReferenceMetadata {
    let contents = built.get(&reference.to_bytes()).expect("every stored reference is in the map").clone();
    let children = contents
        .outgoing_references()
        .iter()
        .map(|child| metadata_for(child, built))
        .collect();
    ReferenceMetadata::Created(CreatedObject { contents, children })
}

fn build_sample_tree(format: &ObjectFormat) -> (Reference, HashMap<Vec<u8>, Contents>) {
    let mut built = HashMap::new();

    let mut root = DirectoryNode::new();
    root.push("empty.txt", DirectoryEntryInput::File(MerkleFile::Empty));

    let mut subdir = DirectoryNode::new();
    subdir.push("link", DirectoryEntryInput::Symlink("../outside".to_string()));
    root.push("sub", DirectoryEntryInput::Subdirectory(subdir));

    let built_directory = build_directory(root, format, &mut |contents| {
        let reference = contents.reference().clone();
        built.insert(reference.to_bytes(), contents);
        reference
    })
    .unwrap();

    (built_directory.reference, built)
}

#[tokio::test]
async fn a_directory_round_trips_through_upload_and_lazy_expansion() {
    let format = ObjectFormat::default();
    let (root_reference, built) = build_sample_tree(&format);

    let store = MapStore::new();
    let metadata = metadata_for(&root_reference, &built);
    let semaphore = Semaphore::new(4);
    upload_tree(&store, "ns", &root_reference, metadata, &semaphore).await.unwrap();

    let expander = StorageDirectoryExpander::new(store, "ns", format);
    let mut context = RepositoryContext::new(root_reference).unwrap();

    let entry = context.root().get(&expander, "empty.txt").unwrap();
    assert!(matches!(entry, Some(Entry::File(FileState::Empty))));

    let entry = context.root().get(&expander, "sub").unwrap();
    assert!(matches!(entry, Some(Entry::Directory(_))));
}

#[tokio::test]
async fn writes_on_top_of_a_lazily_expanded_tree_are_purely_local() {
    let format = ObjectFormat::default();
    let (root_reference, built) = build_sample_tree(&format);

    let store = MapStore::new();
    let metadata = metadata_for(&root_reference, &built);
    let semaphore = Semaphore::new(4);
    upload_tree(&store, "ns", &root_reference, metadata, &semaphore).await.unwrap();

    let expander = StorageDirectoryExpander::new(store, "ns", format);
    let mut context = RepositoryContext::new(root_reference).unwrap();

    context.write_file(&expander, "new.txt", b"hello from a repository rule").unwrap();
    let entry = context.root().get(&expander, "new.txt").unwrap();
    assert!(matches!(entry, Some(Entry::File(FileState::Scratch(_)))));

    // The original, unmodified entry is still reachable after the
    // directory has expanded to service the write above.
    let entry = context.root().get(&expander, "empty.txt").unwrap();
    assert!(matches!(entry, Some(Entry::File(FileState::Empty))));
}

#[tokio::test]
async fn a_missing_reference_surfaces_as_a_repo_fetcher_error_not_a_panic() {
    let format = ObjectFormat::default();
    let dangling = Contents::new(&format, Vec::new(), b"never uploaded".to_vec()).unwrap().reference().clone();

    let store = MapStore::new();
    let expander = StorageDirectoryExpander::new(store, "ns", format);
    let mut context = RepositoryContext::new(dangling).unwrap();

    let err = context.root().get(&expander, "anything").unwrap_err();
    assert!(matches!(err, bonanza_repo_fetcher::RepoFetcherError::Internal(_)));
}
