//! Wires `bonanza_engine`/`bonanza_functions` (memoizing dispatch) to
//! `bonanza_merkle`/`bonanza_object_cache` (directory decode + parsed-view
//! caching) the way a real directory-listing computation would: a
//! generated key decodes a stored directory's entry names exactly once
//! per reference, going through a `ParsedObjectCache` so a second,
//! independent decode path (not just the engine's own memoization) also
//! sees the saved work -- the spec §8 "trivial memoisation" property
//! (E1), exercised against real decode work instead of a hardcoded match.

use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;

use bonanza_engine::Engine;
use bonanza_merkle::build_directory;
use bonanza_merkle::parse_directory;
use bonanza_merkle::DirectoryEntryInput;
use bonanza_merkle::DirectoryNode;
use bonanza_merkle::MerkleFile;
use bonanza_object_cache::CachedView;
use bonanza_object_cache::ParsedObjectCache;
use bonanza_reference::Contents;
use bonanza_reference::DecodingParameters;
use bonanza_reference::ObjectFormat;
use bonanza_reference::Reference;

#[derive(Clone)]
struct CachedNames(Arc<Vec<String>>);

impl CachedView for CachedNames {
    fn size_bytes(&self) -> usize {
        self.0.iter().map(|n| n.len()).sum()
    }
}

fn decode_calls() -> &'static AtomicUsize {
    static CALLS: OnceLock<AtomicUsize> = OnceLock::new();
    CALLS.get_or_init(|| AtomicUsize::new(0))
}

fn store() -> &'static Mutex<HashMap<Vec<u8>, Contents>> {
    static STORE: OnceLock<Mutex<HashMap<Vec<u8>, Contents>>> = OnceLock::new();
    STORE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn cache() -> &'static Mutex<ParsedObjectCache<CachedNames>> {
    static CACHE: OnceLock<Mutex<ParsedObjectCache<CachedNames>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(ParsedObjectCache::new(1_000_000)))
}

/// Decodes a directory's entry names, counting every genuine decode
/// (a cache miss) so the test can tell memoized reuse apart from a
/// fresh parse.
fn decode_entry_names(reference: &Reference) -> Arc<Vec<String>> {
    let decoding_params = DecodingParameters::empty();
    if let Some(cached) = cache().lock().unwrap().get(reference, &decoding_params) {
        return cached.0;
    }

    decode_calls().fetch_add(1, Ordering::SeqCst);
    let format = ObjectFormat::default();
    let contents = store().lock().unwrap().get(&reference.to_bytes()).cloned().expect("reference was stored");
    let entries = parse_directory(&contents, &format).unwrap();
    let names: Arc<Vec<String>> = Arc::new(entries.into_iter().map(|(name, _)| name).collect());

    cache().lock().unwrap().insert(reference.clone(), decoding_params, CachedNames(names.clone()));
    names
}

bonanza_functions::define_computer! {
    pub struct DirectoryComputer;

    key DirectoryNamesKey { reference: Reference }
    value Arc<Vec<String>>
    depends_on []
    fn directory_names(key, _env) {
        Ok(decode_entry_names(&key.reference))
    }
}

fn sample_directory_reference() -> Reference {
    let format = ObjectFormat::default();
    let mut node = DirectoryNode::new();
    node.push("a.txt", DirectoryEntryInput::File(MerkleFile::Empty));
    node.push("b.txt", DirectoryEntryInput::File(MerkleFile::Empty));
    let built = build_directory(node, &format, &mut |contents| {
        let reference = contents.reference().clone();
        store().lock().unwrap().insert(reference.to_bytes(), contents);
        reference
    })
    .unwrap();
    built.reference
}

#[tokio::test]
async fn repeated_requests_for_the_same_directory_decode_exactly_once() {
    let reference = sample_directory_reference();
    let before = decode_calls().load(Ordering::SeqCst);

    let computer = DirectoryComputer::new(Engine::new());
    let first = computer.directory_names(reference.clone()).await.unwrap();
    let second = computer.directory_names(reference.clone()).await.unwrap();
    assert_eq!(*first, vec!["a.txt".to_string(), "b.txt".to_string()]);
    assert_eq!(first, second);
    // The engine's own memoization absorbs the second call within the
    // same `Engine`, so this alone doesn't prove the object cache did
    // anything yet.
    assert_eq!(decode_calls().load(Ordering::SeqCst) - before, 1);

    // A fresh `Engine` has no memory of the first computer's work -- but
    // the process-wide `ParsedObjectCache` does, so this still shouldn't
    // trigger a second real decode.
    let restarted_computer = DirectoryComputer::new(Engine::new());
    let third = restarted_computer.directory_names(reference).await.unwrap();
    assert_eq!(third, first);
    assert_eq!(decode_calls().load(Ordering::SeqCst) - before, 1);
}
