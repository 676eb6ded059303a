use bonanza_reference::OutgoingReferences;
use bonanza_reference::Reference;
use dupe::Dupe;
use fnv::FnvHashMap;

use crate::metadata::ReferenceMetadata;
use crate::placeholder::Placeholder;
use crate::placeholder::INVALID;
use crate::placeholder::UNRESOLVED;

struct Entry {
    metadata: ReferenceMetadata,
    /// Every in-flight placeholder that currently points at this
    /// reference's eventual position (spec §3 invariant: "every
    /// placeholder in an in-flight message points into exactly one
    /// patcher's index cell").
    placeholders: Vec<Placeholder>,
}

/// Build-time registry mapping `LocalReference`s to the index cells
/// embedded in an in-flight structured message (spec §3/§4.2).
#[derive(Default)]
pub struct ReferenceMessagePatcher {
    entries: FnvHashMap<Reference, Entry>,
}

impl ReferenceMessagePatcher {
    pub fn new() -> Self {
        ReferenceMessagePatcher {
            entries: FnvHashMap::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Allocates a new placeholder pre-set to [`crate::placeholder::UNRESOLVED`]
    /// and links it to `local_ref`. If `local_ref` is already registered,
    /// `metadata` is discarded (it loses the dedup race) and the new
    /// placeholder is appended to the existing entry's index-cell list.
    pub fn add_reference(
        &mut self,
        local_ref: Reference,
        metadata: ReferenceMetadata,
    ) -> Placeholder {
        let placeholder = Placeholder::new();
        match self.entries.entry(local_ref) {
            std::collections::hash_map::Entry::Occupied(mut occupied) => {
                metadata.discard();
                occupied.get_mut().placeholders.push(placeholder.dupe());
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(Entry {
                    metadata,
                    placeholders: vec![placeholder.dupe()],
                });
            }
        }
        placeholder
    }

    /// Unions `other` into `self`, deduplicating metadata via `discard` on
    /// the losers. The smaller map is merged into the larger for O(n) best
    /// case; `other` is left empty.
    pub fn merge(&mut self, other: &mut ReferenceMessagePatcher) {
        if self.entries.len() < other.entries.len() {
            std::mem::swap(&mut self.entries, &mut other.entries);
        }
        for (reference, incoming) in other.entries.drain() {
            match self.entries.entry(reference) {
                std::collections::hash_map::Entry::Occupied(mut occupied) => {
                    incoming.metadata.discard();
                    occupied
                        .get_mut()
                        .placeholders
                        .extend(incoming.placeholders);
                }
                std::collections::hash_map::Entry::Vacant(vacant) => {
                    vacant.insert(incoming);
                }
            }
        }
    }

    /// Clones a single placeholder from an already-finalized source
    /// message whose raw index refers into `source_outgoing`. Out of
    /// bounds, zero, or otherwise invalid indices resolve to the
    /// permanently-invalid sentinel instead of being registered.
    pub fn add_from_existing_single(
        &mut self,
        raw_index: u32,
        source_outgoing: &OutgoingReferences,
        create_metadata: impl FnOnce(&Reference) -> ReferenceMetadata,
    ) -> Placeholder {
        match resolve(raw_index, source_outgoing) {
            Some(reference) => {
                let metadata = create_metadata(&reference);
                self.add_reference(reference, metadata)
            }
            None => Placeholder::invalid(),
        }
    }

    /// Clones a `ReferenceSet` (a sorted, deduplicated index array) from an
    /// already-finalized source message. Walks the indices in order;
    /// indices must be strictly increasing (the set's own sortedness
    /// invariant). The first invalid or non-monotonic index truncates the
    /// set there: everything from that point on is dropped, per spec §4.2.
    pub fn add_from_existing_reference_set(
        &mut self,
        raw_indices: &[u32],
        source_outgoing: &OutgoingReferences,
        mut create_metadata: impl FnMut(&Reference) -> ReferenceMetadata,
    ) -> Vec<Placeholder> {
        let mut out = Vec::with_capacity(raw_indices.len());
        let mut previous: Option<u32> = None;
        for &raw_index in raw_indices {
            let monotonic_ok = previous.map_or(true, |prev| raw_index > prev);
            if !monotonic_ok {
                break;
            }
            match resolve(raw_index, source_outgoing) {
                Some(reference) => {
                    let metadata = create_metadata(&reference);
                    out.push(self.add_reference(reference, metadata));
                    previous = Some(raw_index);
                }
                None => break,
            }
        }
        out
    }

    /// `1 + max height` across every reference currently registered, or
    /// `0` if empty (spec §8 testable property 6).
    pub fn height(&self) -> u8 {
        self.entries
            .keys()
            .map(|r| r.height() as u32 + 1)
            .max()
            .map(|h| h.min(u8::MAX as u32) as u8)
            .unwrap_or(0)
    }

    /// Sum of registered references' payload sizes, used for
    /// inline-vs-external size-budget decisions (spec §4.4/§4.5).
    pub fn references_size_bytes(&self) -> u64 {
        self.entries.keys().map(|r| r.payload_size_bytes()).sum()
    }

    /// Produces the sorted outgoing-references list for the finished
    /// object, rewrites every placeholder's cell to the 1-based position
    /// of its reference in that list, and returns the per-reference
    /// metadata in the same order. Empties the patcher (spec §3).
    pub fn sort_and_set_references(&mut self) -> (Vec<Reference>, Vec<ReferenceMetadata>) {
        let mut entries: Vec<(Reference, Entry)> = self.entries.drain().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut references = Vec::with_capacity(entries.len());
        let mut metadata = Vec::with_capacity(entries.len());
        for (index, (reference, entry)) in entries.into_iter().enumerate() {
            let one_based = (index + 1) as u32;
            for placeholder in &entry.placeholders {
                placeholder.set(one_based);
            }
            references.push(reference);
            metadata.push(entry.metadata);
        }
        (references, metadata)
    }

    /// Discards all metadata and empties the map.
    pub fn discard(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.metadata.discard();
        }
    }
}

impl Drop for ReferenceMessagePatcher {
    fn drop(&mut self) {
        self.discard();
    }
}

fn resolve(raw_index: u32, source_outgoing: &OutgoingReferences) -> Option<Reference> {
    if raw_index == UNRESOLVED || raw_index == INVALID {
        return None;
    }
    source_outgoing
        .get(raw_index as usize - 1)
        .map(|r| r.dupe())
}
