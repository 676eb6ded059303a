use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dupe::Dupe;

/// Sentinel meaning "not yet resolved" (spec §3).
pub const UNRESOLVED: u32 = 0;
/// Sentinel meaning "permanently invalid" (spec §3).
pub const INVALID: u32 = u32::MAX;

/// A shared index cell embedded at a placeholder position inside an
/// in-flight structured message (spec §3 "Reference Message Patcher").
///
/// Starts at [`UNRESOLVED`]; `ReferenceMessagePatcher::sort_and_set_references`
/// rewrites it to the 1-based position of its reference in the finished
/// object's outgoing-references list, or to [`INVALID`] if the source
/// placeholder it was cloned from was already invalid.
#[derive(Clone, Dupe, Debug)]
pub struct Placeholder(Arc<AtomicU32>);

impl Placeholder {
    pub(crate) fn new() -> Self {
        Placeholder(Arc::new(AtomicU32::new(UNRESOLVED)))
    }

    pub(crate) fn invalid() -> Self {
        Placeholder(Arc::new(AtomicU32::new(INVALID)))
    }

    pub(crate) fn set(&self, index: u32) {
        self.0.store(index, Ordering::SeqCst);
    }

    /// The current raw index: `0` if unresolved, `u32::MAX` if invalid,
    /// else the 1-based index into the owning object's outgoing references.
    pub fn index(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_invalid(&self) -> bool {
        self.index() == INVALID
    }

    pub fn is_unresolved(&self) -> bool {
        self.index() == UNRESOLVED
    }
}
