use std::sync::Arc;

use allocative::Allocative;
use dupe::Dupe;

use crate::reference::Reference;

/// An ordered, cheaply-shareable list of a [`crate::Contents`] object's
/// outgoing references, stored sorted by reference order so that
/// deduplication (spec §3) is intrinsic to construction.
#[derive(Clone, Dupe, Debug, Allocative)]
pub struct OutgoingReferences(Arc<[Reference]>);

impl OutgoingReferences {
    /// Constructs from a list already produced in sorted, deduplicated
    /// order (e.g. by `ReferenceMessagePatcher::sort_and_set_references`).
    pub fn new(references: Vec<Reference>) -> Self {
        debug_assert!(
            references.windows(2).all(|w| w[0] < w[1]),
            "outgoing references must be sorted and deduplicated"
        );
        OutgoingReferences(references.into())
    }

    pub fn empty() -> Self {
        OutgoingReferences(Arc::from(&[][..]))
    }

    pub fn degree(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, index: usize) -> Option<&Reference> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.0.iter()
    }

    /// Detaches a single reference out of this shared list by cloning the
    /// handle (references are cheap `Arc`-backed `Dupe` values).
    pub fn detach(&self, index: usize) -> Option<Reference> {
        self.0.get(index).map(|r| r.dupe())
    }
}

impl<'a> IntoIterator for &'a OutgoingReferences {
    type Item = &'a Reference;
    type IntoIter = std::slice::Iter<'a, Reference>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
