use bonanza_patcher::Placeholder;
use bonanza_patcher::ReferenceMessagePatcher;
use bonanza_patcher::ReferenceMetadata;
use bonanza_reference::Contents;
use bonanza_reference::ObjectFormat;
use bonanza_reference::Reference;
use bonanza_treebuilder::build_inlined_tree;
use bonanza_treebuilder::InlineCandidate;

use crate::chunk::MerkleFile;
use crate::error::MerkleError;
use crate::symlink::relativize_symlink;

/// Estimated encoded size of a 4-byte outgoing-reference index slot,
/// used as the "external message" size estimate fed to
/// [`build_inlined_tree`] for a subdirectory candidate.
const REFERENCE_PLACEHOLDER_BYTES: usize = 4;

/// A filesystem entry queued into a [`DirectoryNode`] before names are
/// sorted and the inline-vs-external decision over subdirectories has
/// run (spec §3 "Merkle Directory").
pub enum DirectoryEntryInput {
    File(MerkleFile),
    /// Raw, not-yet-relativized symlink target.
    Symlink(String),
    Subdirectory(DirectoryNode),
}

/// An unfinalized directory: an unordered bag of named entries, built
/// bottom-up. Call [`build_directory`] on the tree's root to assemble
/// every level's stored object and apply the inline-vs-external
/// decision over each level's subdirectories.
#[derive(Default)]
pub struct DirectoryNode {
    entries: Vec<(String, DirectoryEntryInput)>,
}

impl DirectoryNode {
    pub fn new() -> Self {
        DirectoryNode::default()
    }

    pub fn push(&mut self, name: impl Into<String>, entry: DirectoryEntryInput) {
        self.entries.push((name.into(), entry));
    }
}

/// The outcome of finalizing a [`DirectoryNode`]: the stored reference
/// for this directory level and its `maximum_symlink_escapement` bound.
pub struct BuiltDirectory {
    pub reference: Reference,
    pub maximum_symlink_escapement: u32,
}

enum ResolvedEntry {
    File(MerkleFile),
    Symlink { target: String, escapement: u32 },
    Subdirectory { contents: Contents, escapement: u32 },
}

/// A candidate for [`build_inlined_tree`] spanning every kind of
/// directory entry, not just subdirectories: files and symlinks have no
/// external form (`external_size_bytes` is `None`, so they are always
/// forced inline), but they still need to count toward the message's
/// total estimated size, or the budget decision would only ever see the
/// subdirectories' share of the payload.
struct EntryCandidate {
    entry_index: usize,
    inline_encoded_len: usize,
    is_subdirectory: bool,
}

impl InlineCandidate for EntryCandidate {
    fn inline_size_bytes(&self) -> usize {
        self.inline_encoded_len
    }
    fn external_size_bytes(&self) -> Option<usize> {
        self.is_subdirectory.then_some(REFERENCE_PLACEHOLDER_BYTES)
    }
}

/// Builds every level of a directory tree, storing the root (and every
/// externalized subdirectory) via `store`.
pub fn build_directory(
    node: DirectoryNode,
    format: &ObjectFormat,
    store: &mut dyn FnMut(Contents) -> Reference,
) -> Result<BuiltDirectory, MerkleError> {
    let (contents, maximum_symlink_escapement) = build_directory_contents(node, 0, format, store)?;
    let reference = store(contents);
    Ok(BuiltDirectory { reference, maximum_symlink_escapement })
}

/// Recursively resolves `node` into a finalized (but not necessarily
/// stored) [`Contents`] message plus its `maximum_symlink_escapement`
/// bound. The caller decides whether to store the result (external) or
/// embed its bytes directly in an ancestor's payload (inline).
fn build_directory_contents(
    node: DirectoryNode,
    depth: u32,
    format: &ObjectFormat,
    store: &mut dyn FnMut(Contents) -> Reference,
) -> Result<(Contents, u32), MerkleError> {
    let mut resolved: Vec<(String, ResolvedEntry)> = Vec::with_capacity(node.entries.len());
    for (name, input) in node.entries {
        let entry = match input {
            DirectoryEntryInput::File(file) => ResolvedEntry::File(file),
            DirectoryEntryInput::Symlink(target) => {
                let (relativized, escapement) = relativize_symlink(&target, depth)?;
                ResolvedEntry::Symlink { target: relativized, escapement }
            }
            DirectoryEntryInput::Subdirectory(child) => {
                let (contents, escapement) =
                    build_directory_contents(child, depth + 1, format, store)?;
                ResolvedEntry::Subdirectory { contents, escapement }
            }
        };
        resolved.push((name, entry));
    }
    resolved.sort_by(|(a, _), (b, _)| a.cmp(b));

    let maximum_symlink_escapement = resolved
        .iter()
        .map(|(_, entry)| match entry {
            ResolvedEntry::Symlink { escapement, .. } => *escapement,
            ResolvedEntry::Subdirectory { escapement, .. } => *escapement,
            ResolvedEntry::File(_) => 0,
        })
        .max()
        .unwrap_or(0);

    let mut subdir_blobs: std::collections::HashMap<usize, Vec<u8>> = std::collections::HashMap::new();
    let candidates: Vec<EntryCandidate> = resolved
        .iter()
        .enumerate()
        .map(|(entry_index, (name, entry))| match entry {
            ResolvedEntry::Subdirectory { contents, escapement } => {
                let blob = encode_inline_subdirectory(contents, *escapement);
                let len = blob.len();
                subdir_blobs.insert(entry_index, blob);
                EntryCandidate { entry_index, inline_encoded_len: len, is_subdirectory: true }
            }
            ResolvedEntry::File(_) => EntryCandidate {
                entry_index,
                inline_encoded_len: name.len() + 5,
                is_subdirectory: false,
            },
            ResolvedEntry::Symlink { target, .. } => EntryCandidate {
                entry_index,
                inline_encoded_len: name.len() + target.len() + 9,
                is_subdirectory: false,
            },
        })
        .collect();
    let decision = build_inlined_tree(candidates, format.max_object_size_bytes);
    let externalized: std::collections::HashSet<usize> = decision
        .externalized
        .into_iter()
        .filter(|c| c.is_subdirectory)
        .map(|c| c.entry_index)
        .collect();

    let mut patcher = ReferenceMessagePatcher::new();
    let mut payload = Vec::new();
    let mut patches: Vec<(usize, Placeholder)> = Vec::new();

    write_varint(&mut payload, resolved.len() as u64);
    for (index, (name, entry)) in resolved.into_iter().enumerate() {
        write_varint(&mut payload, name.len() as u64);
        payload.extend_from_slice(name.as_bytes());

        match entry {
            ResolvedEntry::File(MerkleFile::Empty) => payload.push(0),
            ResolvedEntry::File(MerkleFile::Chunk(reference)) => {
                payload.push(1);
                queue_reference_slot(&mut payload, &mut patches, &mut patcher, reference);
            }
            ResolvedEntry::File(MerkleFile::ContentsList { reference, height }) => {
                payload.push(2);
                queue_reference_slot(&mut payload, &mut patches, &mut patcher, reference);
                write_u32(&mut payload, height);
            }
            ResolvedEntry::Symlink { target, escapement } => {
                payload.push(3);
                write_u32(&mut payload, escapement);
                write_varint(&mut payload, target.len() as u64);
                payload.extend_from_slice(target.as_bytes());
            }
            ResolvedEntry::Subdirectory { contents, .. } => {
                if externalized.contains(&index) {
                    payload.push(4);
                    let reference = store(contents);
                    queue_reference_slot(&mut payload, &mut patches, &mut patcher, reference);
                } else {
                    payload.push(5);
                    let blob = &subdir_blobs[&index];
                    write_varint(&mut payload, blob.len() as u64);
                    payload.extend_from_slice(blob);
                }
            }
        }
    }

    let (outgoing, _metadata) = patcher.sort_and_set_references();
    for (offset, placeholder) in patches {
        let bytes = placeholder.index().to_le_bytes();
        payload[offset..offset + 4].copy_from_slice(&bytes);
    }

    let contents = Contents::new(format, outgoing, payload)?;
    Ok((contents, maximum_symlink_escapement))
}

/// Self-contained wire form of a not-yet-stored subdirectory: its own
/// `maximum_symlink_escapement`, outgoing references (by raw byte
/// layout, not a patcher-assigned index, since this blob never becomes
/// an independently addressed object), and payload. Used both to size a
/// subdirectory candidate for [`build_inlined_tree`] and, if it wins
/// inlining, as the literal bytes embedded in the parent's payload.
fn encode_inline_subdirectory(contents: &Contents, escapement: u32) -> Vec<u8> {
    let mut out = Vec::new();
    write_u32(&mut out, escapement);
    write_varint(&mut out, contents.outgoing_references().degree() as u64);
    for reference in contents.outgoing_references().iter() {
        let bytes = reference.to_bytes();
        write_varint(&mut out, bytes.len() as u64);
        out.extend_from_slice(&bytes);
    }
    write_varint(&mut out, contents.payload().len() as u64);
    out.extend_from_slice(contents.payload());
    out
}

/// Registers `reference` in `patcher`, writes a 4-byte placeholder slot
/// into `payload` at its current end, and records `(offset, placeholder)`
/// so the slot can be patched with the placeholder's resolved index once
/// `sort_and_set_references` has run over the whole message.
fn queue_reference_slot(
    payload: &mut Vec<u8>,
    patches: &mut Vec<(usize, Placeholder)>,
    patcher: &mut ReferenceMessagePatcher,
    reference: Reference,
) {
    let placeholder = patcher.add_reference(reference, ReferenceMetadata::Existing);
    let offset = payload.len();
    write_u32(payload, 0);
    patches.push((offset, placeholder));
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> ObjectFormat {
        ObjectFormat::default()
    }

    fn leaf_file(format: &ObjectFormat, store: &mut dyn FnMut(Contents) -> Reference, payload: &[u8]) -> MerkleFile {
        let contents = Contents::new(format, Vec::new(), payload.to_vec()).unwrap();
        MerkleFile::Chunk(store(contents))
    }

    #[test]
    fn flat_directory_with_a_file_and_a_symlink() {
        let format = format();
        let mut stored = Vec::new();
        let mut store = |c: Contents| {
            let r = c.reference().clone();
            stored.push(c);
            r
        };

        let mut root = DirectoryNode::new();
        let file = leaf_file(&format, &mut store, b"hello");
        root.push("a.txt", DirectoryEntryInput::File(file));
        root.push("link", DirectoryEntryInput::Symlink("a.txt".to_string()));

        let built = build_directory(root, &format, &mut store).unwrap();
        assert_eq!(built.maximum_symlink_escapement, 0);
        // the file object plus the directory object itself.
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn symlink_escapement_propagates_up_from_a_subdirectory() {
        let format = format();
        let mut stored = Vec::new();
        let mut store = |c: Contents| {
            let r = c.reference().clone();
            stored.push(c);
            r
        };

        let mut child = DirectoryNode::new();
        child.push("up", DirectoryEntryInput::Symlink("../sibling".to_string()));

        let mut root = DirectoryNode::new();
        root.push("child", DirectoryEntryInput::Subdirectory(child));

        let built = build_directory(root, &format, &mut store).unwrap();
        assert_eq!(built.maximum_symlink_escapement, 1);
    }

    #[test]
    fn small_subdirectory_stays_inline_under_a_generous_budget() {
        let format = ObjectFormat { max_object_size_bytes: 4 * 1024 * 1024, ..format() };
        let mut stored = Vec::new();
        let mut store = |c: Contents| {
            let r = c.reference().clone();
            stored.push(c);
            r
        };

        let mut child = DirectoryNode::new();
        let file = leaf_file(&format, &mut store, b"x");
        child.push("x.txt", DirectoryEntryInput::File(file));

        let mut root = DirectoryNode::new();
        root.push("child", DirectoryEntryInput::Subdirectory(child));

        build_directory(root, &format, &mut store).unwrap();
        // "child" was inlined, so only the leaf file and the root
        // directory ever became standalone objects.
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn oversized_subdirectory_is_externalized() {
        // A budget too small for the child's own payload forces the
        // root to store the subdirectory separately and hold a
        // reference to it instead.
        let format = ObjectFormat { max_object_size_bytes: 32, ..format() };
        let mut stored = Vec::new();
        let mut store = |c: Contents| {
            let r = c.reference().clone();
            stored.push(c);
            r
        };

        let mut child = DirectoryNode::new();
        let file = leaf_file(&format, &mut store, b"some file content bytes");
        child.push("x.txt", DirectoryEntryInput::File(file));

        let mut root = DirectoryNode::new();
        root.push("child", DirectoryEntryInput::Subdirectory(child));

        build_directory(root, &format, &mut store).unwrap();
        // leaf file + externalized child directory + root directory.
        assert_eq!(stored.len(), 3);
    }
}
