use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dupe::Dupe;

/// Opaque token proving an object (and, for the root of an upload walk,
/// its entire DAG) is durably present in the store (spec §4.3, GLOSSARY
/// "Lease"). Bytes are meaningless to the client; only the server that
/// issued them can interpret them on a later `upload_object` call.
#[derive(Clone, Dupe, Debug, Eq, PartialEq)]
pub struct Lease(Arc<[u8]>);

impl Lease {
    pub fn new(bytes: Vec<u8>) -> Self {
        Lease(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn size_bytes(&self) -> usize {
        self.0.len()
    }
}

/// Tracks the largest lease size seen so far, so the marshaller can
/// pre-size allocations for requests carrying many child leases instead
/// of growing a `Vec` one push at a time (spec §4.3: "a cached
/// `max_lease_size`").
#[derive(Default)]
pub struct MaxLeaseSize(AtomicUsize);

impl MaxLeaseSize {
    pub fn new() -> Self {
        MaxLeaseSize(AtomicUsize::new(0))
    }

    pub fn observe(&self, lease: &Lease) {
        self.0.fetch_max(lease.size_bytes(), Ordering::Relaxed);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}
