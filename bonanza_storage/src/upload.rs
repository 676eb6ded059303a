use bonanza_patcher::ReferenceMetadata;
use bonanza_reference::Reference;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::client::ObjectStoreClient;
use crate::client::UploadOutcome;
use crate::error::StorageError;
use crate::lease::Lease;

/// Walks a [`ReferenceMetadata`] tree and uploads it bottom-up as needed,
/// following spec §4.3's two-phase protocol: try the dedup-only call
/// first, and only materialize + send contents (recursing into children
/// to collect their leases first) when the server reports the object
/// incomplete or missing. `concurrency` gates how many `upload_object`
/// calls may be in flight at once, the same "don't saturate the
/// executor" pattern `buck2_common::io::fs` uses its read/read_dir
/// semaphores for.
pub async fn upload_tree(
    client: &dyn ObjectStoreClient,
    namespace: &str,
    reference: &Reference,
    metadata: ReferenceMetadata,
    concurrency: &Semaphore,
) -> Result<Lease, StorageError> {
    upload_tree_inner(client, namespace, reference.clone(), metadata, concurrency).await
}

fn upload_tree_inner<'a>(
    client: &'a dyn ObjectStoreClient,
    namespace: &'a str,
    reference: Reference,
    metadata: ReferenceMetadata,
    concurrency: &'a Semaphore,
) -> BoxFuture<'a, Result<Lease, StorageError>> {
    async move {
        let outcome = call_upload(client, namespace, &reference, None, &[], false, concurrency).await?;
        if let UploadOutcome::Complete { lease } = outcome {
            debug!(reference = ?reference.hash_bytes(), "object already present, skipping upload");
            metadata.discard();
            return Ok(lease);
        }

        let (contents, children) = metadata.get_contents().ok_or_else(|| {
            StorageError::Internal(format!(
                "reference {:?} was claimed already-present but the store reports it absent",
                reference.hash_bytes()
            ))
        })?;

        let mut child_leases: Vec<Option<Lease>> = Vec::with_capacity(children.len());
        for (child_metadata, child_reference) in children.into_iter().zip(contents.outgoing_references().iter()) {
            let lease = upload_tree_inner(client, namespace, child_reference.clone(), child_metadata, concurrency)
                .await?;
            child_leases.push(Some(lease));
        }

        let outcome =
            call_upload(client, namespace, &reference, Some(&contents), &child_leases, false, concurrency).await?;
        match outcome {
            UploadOutcome::Complete { lease } => Ok(lease),
            UploadOutcome::Incomplete { .. } => Err(StorageError::Storage(format!(
                "server still reports {:?} incomplete after every child was uploaded",
                reference.hash_bytes()
            ))),
            UploadOutcome::Missing => Err(StorageError::Storage(format!(
                "server reported {:?} missing immediately after its contents were sent",
                reference.hash_bytes()
            ))),
        }
    }
    .boxed()
}

async fn call_upload(
    client: &dyn ObjectStoreClient,
    namespace: &str,
    reference: &Reference,
    contents: Option<&bonanza_reference::Contents>,
    child_leases: &[Option<Lease>],
    want_contents_if_incomplete: bool,
    concurrency: &Semaphore,
) -> Result<UploadOutcome, StorageError> {
    let _permit = concurrency
        .acquire()
        .await
        .map_err(|_| StorageError::Internal("upload concurrency semaphore closed".to_string()))?;
    client
        .upload_object(namespace, reference, contents, child_leases, want_contents_if_incomplete)
        .await
}
