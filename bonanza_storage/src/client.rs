use async_trait::async_trait;
use bonanza_reference::Contents;
use bonanza_reference::Reference;

use crate::error::StorageError;
use crate::lease::Lease;

/// Outcome of [`ObjectStoreClient::upload_object`] (spec §4.3).
#[derive(Clone, Debug)]
pub enum UploadOutcome {
    /// The server has durably stored this object and its whole DAG.
    Complete { lease: Lease },
    /// The server is missing some children; `want_children` is a mask
    /// (one entry per outgoing-reference slot, in order) of which ones
    /// need lease evidence before a retry can succeed.
    Incomplete { want_children: Vec<bool> },
    /// The server doesn't know this reference at all; the caller must
    /// resend with `contents` populated.
    Missing,
}

impl UploadOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, UploadOutcome::Complete { .. })
    }
}

/// Outcome of [`ObjectStoreClient::resolve_tag`]: `complete` means the
/// resolved reference's entire DAG is known present, not just the root
/// object.
#[derive(Clone, Debug)]
pub struct ResolvedTag {
    pub reference: Reference,
    pub complete: bool,
}

/// The store/tag-store contract a client speaks against (spec §4.3, §6
/// "External Interfaces"). Modelled on a small RPC surface; a concrete
/// implementation might be a `tonic` gRPC stub, an in-memory test
/// double, or (as [`crate::sharding::ShardedClient`] does) a decorator
/// over other implementations of this trait.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn download_object(&self, namespace: &str, reference: &Reference) -> Result<Contents, StorageError>;

    /// `child_leases` lines up positionally with `reference`'s outgoing
    /// references; `None` at a position means no lease evidence is held
    /// for that child yet. `contents` is `None` when the caller believes
    /// the server already has the object and is only checking; it must
    /// be `Some` whenever the previous attempt returned `Missing`.
    async fn upload_object(
        &self,
        namespace: &str,
        reference: &Reference,
        contents: Option<&Contents>,
        child_leases: &[Option<Lease>],
        want_contents_if_incomplete: bool,
    ) -> Result<UploadOutcome, StorageError>;

    async fn resolve_tag(&self, namespace: &str, tag: &str) -> Result<Option<ResolvedTag>, StorageError>;

    async fn update_tag(
        &self,
        namespace: &str,
        tag: &str,
        reference: &Reference,
        lease: &Lease,
        overwrite: bool,
    ) -> Result<(), StorageError>;
}
