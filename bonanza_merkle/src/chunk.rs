use std::cell::RefCell;
use std::hash::Hasher;
use std::sync::Arc;

use bonanza_reference::Contents;
use bonanza_reference::ObjectFormat;
use bonanza_reference::Reference;
use bonanza_treebuilder::build_btree;
use bonanza_treebuilder::ChunkerParams;
use bonanza_treebuilder::ParentEntry;
use bonanza_treebuilder::ProllyChunkerFactory;
use fnv::FnvHasher;

use crate::error::MerkleError;

/// A Merkle File per spec §3: either the empty file, a single chunk, or
/// an ordered list of child file parts (height ≥ 1, recursively built
/// with [`bonanza_treebuilder::build_btree`] when the part list itself
/// doesn't fit in one object).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MerkleFile {
    Empty,
    Chunk(Reference),
    ContentsList { reference: Reference, height: u32 },
}

/// One leaf of a file's contents-list B-tree: a chunk's cumulative
/// end-byte offset and its stored reference.
#[derive(Clone, Debug)]
pub struct FilePart {
    pub end_offset: u64,
    pub reference: Reference,
}

/// Splits `data` into content-defined chunks using a rolling FNV hash
/// over each byte, so edits near the start of a file don't perturb
/// chunk boundaries far from the edit (the same property
/// `bonanza_treebuilder`'s chunker trades on for B-tree nodes, applied
/// here one level down at the raw byte stream).
pub fn chunk_bytes<'a>(data: &'a [u8], params: &ChunkerParams) -> Vec<&'a [u8]> {
    if data.is_empty() {
        return Vec::new();
    }
    let target = (params.target_object_bytes.max(1)) as u64;
    let max = params.max_object_bytes.max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut hasher = FnvHasher::default();
    for (i, byte) in data.iter().enumerate() {
        hasher.write_u8(*byte);
        let size = i - start + 1;
        let at_boundary = size >= max || hasher.finish() % target == 0;
        if at_boundary {
            chunks.push(&data[start..=i]);
            start = i + 1;
            hasher = FnvHasher::default();
        }
    }
    if start < data.len() {
        chunks.push(&data[start..]);
    }
    chunks
}

fn encode_file_part(part: &FilePart, index: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    out.extend_from_slice(&part.end_offset.to_le_bytes());
    out.extend_from_slice(&index.to_le_bytes());
    out
}

type Store<'a> = RefCell<&'a mut dyn FnMut(Contents) -> Reference>;

fn flush_leaf_parts(group: &[FilePart], format: &ObjectFormat, store: &Store<'_>) -> Reference {
    let mut patcher = bonanza_patcher::ReferenceMessagePatcher::new();
    let placeholders: Vec<_> = group
        .iter()
        .map(|part| {
            patcher.add_reference(part.reference.clone(), bonanza_patcher::ReferenceMetadata::Existing)
        })
        .collect();
    let (outgoing, _metadata) = patcher.sort_and_set_references();

    let mut payload = Vec::new();
    for (part, placeholder) in group.iter().zip(&placeholders) {
        payload.extend_from_slice(&encode_file_part(part, placeholder.index()));
    }
    let contents = Contents::new(format, outgoing, payload).expect("file part group fits format");
    (*store.borrow_mut())(contents)
}

fn flush_parent_parts(group: &[ParentEntry<u64>], format: &ObjectFormat, store: &Store<'_>) -> Reference {
    let mut patcher = bonanza_patcher::ReferenceMessagePatcher::new();
    let placeholders: Vec<_> = group
        .iter()
        .map(|entry| {
            patcher.add_reference(entry.reference.clone(), bonanza_patcher::ReferenceMetadata::Existing)
        })
        .collect();
    let (outgoing, _metadata) = patcher.sort_and_set_references();

    let mut payload = Vec::new();
    for (entry, placeholder) in group.iter().zip(&placeholders) {
        payload.extend_from_slice(&entry.first_key.to_le_bytes());
        payload.extend_from_slice(&placeholder.index().to_le_bytes());
    }
    let contents = Contents::new(format, outgoing, payload).expect("parent group fits format");
    (*store.borrow_mut())(contents)
}

/// Builds a Merkle File from raw bytes: chunks the content, stores each
/// chunk, and assembles the contents-list levels above it when more
/// than one chunk results (spec §3 "Merkle File", §4.5's tree builder
/// for the contents-list levels).
pub fn build_merkle_file(
    data: &[u8],
    params: &ChunkerParams,
    format: &ObjectFormat,
    store: &mut dyn FnMut(Contents) -> Reference,
) -> Result<MerkleFile, MerkleError> {
    if data.is_empty() {
        return Ok(MerkleFile::Empty);
    }

    let chunks = chunk_bytes(data, params);
    if chunks.len() == 1 {
        let contents = Contents::new(format, Vec::new(), chunks[0].to_vec())?;
        return Ok(MerkleFile::Chunk(store(contents)));
    }

    let mut end_offset = 0u64;
    let parts: Vec<FilePart> = chunks
        .iter()
        .map(|chunk| {
            end_offset += chunk.len() as u64;
            let contents = Contents::new(format, Vec::new(), chunk.to_vec())
                .expect("a single chunk always fits the format it was chunked for");
            FilePart { end_offset, reference: store(contents) }
        })
        .collect();

    // Matches the exact per-entry encoding `flush_leaf_parts`/
    // `flush_parent_parts` write below: an 8-byte offset/key plus a
    // 4-byte outgoing-reference index.
    const ENCODED_ENTRY_BYTES: usize = 12;
    let leaf_factory = ProllyChunkerFactory::new(
        params.clone(),
        Arc::new(|_: &FilePart| ENCODED_ENTRY_BYTES),
    );
    let parent_factory = ProllyChunkerFactory::new(
        params.clone(),
        Arc::new(|_: &ParentEntry<u64>| ENCODED_ENTRY_BYTES),
    );

    let store_cell: Store<'_> = RefCell::new(store);
    let tree = build_btree(
        parts,
        &leaf_factory,
        |part: &FilePart| part.end_offset,
        |group| flush_leaf_parts(group, format, &store_cell),
        &parent_factory,
        |group| flush_parent_parts(group, format, &store_cell),
    );

    Ok(MerkleFile::ContentsList { reference: tree.root, height: tree.height })
}
