use std::hash::Hasher;
use std::sync::Arc;

use async_trait::async_trait;
use bonanza_reference::Contents;
use bonanza_reference::Reference;
use fnv::FnvHasher;

use crate::client::ObjectStoreClient;
use crate::client::ResolvedTag;
use crate::client::UploadOutcome;
use crate::error::StorageError;
use crate::lease::Lease;

/// Maps a reference to one of N backing shards. Must be stable over a
/// reference's raw bytes: the same reference always picks the same
/// shard across process restarts and across clients (spec §4.3).
pub trait Picker: Send + Sync {
    fn pick(&self, reference: &Reference, shard_count: usize) -> usize;
}

/// The default picker: hashes a reference's stable byte encoding with
/// FNV and reduces modulo the shard count, the same hashing family
/// `bonanza_patcher` uses for its own build-time map.
#[derive(Default)]
pub struct FnvPicker;

impl Picker for FnvPicker {
    fn pick(&self, reference: &Reference, shard_count: usize) -> usize {
        let mut hasher = FnvHasher::default();
        hasher.write(&reference.to_bytes());
        (hasher.finish() % shard_count as u64) as usize
    }
}

/// A decorator that routes every call through a [`Picker`] to one of N
/// named backing clients, wrapping any shard error with the shard's name
/// for diagnostics (spec §4.3 "Sharding").
pub struct ShardedClient {
    shards: Vec<(String, Arc<dyn ObjectStoreClient>)>,
    picker: Box<dyn Picker>,
}

impl ShardedClient {
    pub fn new(shards: Vec<(String, Arc<dyn ObjectStoreClient>)>, picker: Box<dyn Picker>) -> Self {
        assert!(!shards.is_empty(), "a sharded client needs at least one backing shard");
        ShardedClient { shards, picker }
    }

    fn shard_for(&self, reference: &Reference) -> &(String, Arc<dyn ObjectStoreClient>) {
        let index = self.picker.pick(reference, self.shards.len());
        &self.shards[index]
    }
}

#[async_trait]
impl ObjectStoreClient for ShardedClient {
    async fn download_object(&self, namespace: &str, reference: &Reference) -> Result<Contents, StorageError> {
        let (name, shard) = self.shard_for(reference);
        shard
            .download_object(namespace, reference)
            .await
            .map_err(|e| e.on_shard(name.clone()))
    }

    async fn upload_object(
        &self,
        namespace: &str,
        reference: &Reference,
        contents: Option<&Contents>,
        child_leases: &[Option<Lease>],
        want_contents_if_incomplete: bool,
    ) -> Result<UploadOutcome, StorageError> {
        let (name, shard) = self.shard_for(reference);
        shard
            .upload_object(namespace, reference, contents, child_leases, want_contents_if_incomplete)
            .await
            .map_err(|e| e.on_shard(name.clone()))
    }

    async fn resolve_tag(&self, namespace: &str, tag: &str) -> Result<Option<ResolvedTag>, StorageError> {
        // Tags aren't references; route by tag string hash instead so
        // lookups for the same tag always land on the same shard.
        let mut hasher = FnvHasher::default();
        hasher.write(tag.as_bytes());
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        let (name, shard) = &self.shards[index];
        shard
            .resolve_tag(namespace, tag)
            .await
            .map_err(|e| e.on_shard(name.clone()))
    }

    async fn update_tag(
        &self,
        namespace: &str,
        tag: &str,
        reference: &Reference,
        lease: &Lease,
        overwrite: bool,
    ) -> Result<(), StorageError> {
        let mut hasher = FnvHasher::default();
        hasher.write(tag.as_bytes());
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        let (name, shard) = &self.shards[index];
        shard
            .update_tag(namespace, tag, reference, lease, overwrite)
            .await
            .map_err(|e| e.on_shard(name.clone()))
    }
}
