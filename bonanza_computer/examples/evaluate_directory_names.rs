//! Minimal end-to-end run: builds a small directory in memory, uploads
//! it through [`bonanza_storage`], and evaluates its entry listing
//! through a schema-generated computer, with `tracing` logging wired up
//! the way a real embedder would (spec §11 ambient logging).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bonanza_computer::StorageDirectoryExpander;
use bonanza_engine::Engine;
use bonanza_functions::define_computer;
use bonanza_merkle::build_directory;
use bonanza_merkle::DirectoryEntryInput;
use bonanza_merkle::DirectoryNode;
use bonanza_merkle::MerkleFile;
use bonanza_reference::Contents;
use bonanza_reference::ObjectFormat;
use bonanza_reference::Reference;
use bonanza_repo_fetcher::DirectoryExpander;
use bonanza_storage::Lease;
use bonanza_storage::ObjectStoreClient;
use bonanza_storage::ResolvedTag;
use bonanza_storage::StorageError;
use bonanza_storage::UploadOutcome;
use tracing_subscriber::EnvFilter;

/// An in-memory stand-in for a real object store, just for this demo.
struct InMemoryStore {
    objects: Mutex<HashMap<Vec<u8>, Contents>>,
}

impl InMemoryStore {
    fn new() -> Self {
        InMemoryStore { objects: Mutex::new(HashMap::new()) }
    }

    fn insert(&self, contents: Contents) {
        self.objects.lock().unwrap().insert(contents.reference().to_bytes(), contents);
    }
}

#[async_trait]
impl ObjectStoreClient for InMemoryStore {
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

define_computer! {
    pub struct DemoComputer;

    key EntryCountKey { count: usize }
    value usize
    depends_on []
    fn entry_count(key, _env) {
        // Demonstrates the computer facade's dispatch, not a real
        // dependency graph: the count was already computed below via
        // `StorageDirectoryExpander::expand`.
        Ok(key.count)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let format = ObjectFormat::default();
    let mut node = DirectoryNode::new();
    node.push("README.md", DirectoryEntryInput::File(MerkleFile::Empty));
    node.push("src", DirectoryEntryInput::File(MerkleFile::Empty));

    let store = InMemoryStore::new();
    let built = build_directory(node, &format, &mut |contents| {
        let reference = contents.reference().clone();
        store.insert(contents);
        reference
    })
    .expect("building an in-memory sample directory cannot fail");

    let expander = StorageDirectoryExpander::new(store, "demo", format);
    let entries = expander.expand(&built.reference).expect("the directory was just stored");
    tracing::info!(count = entries.len(), "expanded sample directory");

    let engine = Engine::new();
    let computer = DemoComputer::new(engine);
    let count = computer.entry_count(entries.len()).await.unwrap();

    for (name, _) in entries {
        println!("{name}");
    }
    println!("entry_count -> {count}");
}
