use bonanza_reference::Contents;

/// Freeform per-reference baggage a [`crate::ReferenceMessagePatcher`]
/// carries (spec §3 "Reference Metadata"). A tagged sum type, per the
/// design note in spec.md §9 ("Reference metadata as sum type").
pub enum ReferenceMetadata {
    /// Owns not-yet-uploaded contents and the metadata of its own
    /// children, recursively.
    Created(CreatedObject),
    /// A claim that this reference is already present in storage; there
    /// is nothing local to discard or upload.
    Existing,
    /// A closure able to recompute the object on demand, used when the
    /// backing bytes live in a spill file rather than in memory.
    Deferred(DeferredObject),
}

pub struct CreatedObject {
    pub contents: Contents,
    pub children: Vec<ReferenceMetadata>,
}

pub struct DeferredObject {
    recompute: Box<dyn FnOnce() -> (Contents, Vec<ReferenceMetadata>) + Send>,
}

impl DeferredObject {
    pub fn new(
        recompute: impl FnOnce() -> (Contents, Vec<ReferenceMetadata>) + Send + 'static,
    ) -> Self {
        DeferredObject {
            recompute: Box::new(recompute),
        }
    }
}

impl ReferenceMetadata {
    /// `get_contents` of spec.md §9's common metadata contract. `Existing`
    /// metadata has nothing local to hand back; callers must treat that as
    /// "ask the store, this should already be there".
    pub fn get_contents(self) -> Option<(Contents, Vec<ReferenceMetadata>)> {
        match self {
            ReferenceMetadata::Created(created) => Some((created.contents, created.children)),
            ReferenceMetadata::Deferred(deferred) => Some((deferred.recompute)()),
            ReferenceMetadata::Existing => None,
        }
    }

    /// Releases resources (open spill files, retained memory) eagerly so
    /// that deduplication losers don't linger, per spec §3.
    pub fn discard(self) {
        match self {
            ReferenceMetadata::Created(created) => {
                for child in created.children {
                    child.discard();
                }
            }
            ReferenceMetadata::Deferred(_) | ReferenceMetadata::Existing => {}
        }
    }
}
