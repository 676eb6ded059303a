use bonanza_reference::Contents;
use bonanza_reference::ObjectFormat;
use bonanza_reference::Reference;

use crate::chunk::MerkleFile;
use crate::error::MerkleError;

/// One named entry of a parsed directory, the inverse of
/// [`crate::directory::DirectoryEntryInput`] (spec §8's round-trip
/// testable property: "parse into patcher via add_from_existing restores
/// an isomorphic message"). A subdirectory that was stored inline never
/// got its own [`Reference`], so its payload is handed back as a fully
/// reconstructed [`Contents`] the caller can recurse into directly
/// instead of fetching anything further.
#[derive(Debug)]
pub enum ParsedEntry {
    File(MerkleFile),
    /// Already-relativized target plus its recorded escapement bound.
    Symlink { target: String, escapement: u32 },
    Subdirectory(SubdirectorySource),
}

#[derive(Debug)]
pub enum SubdirectorySource {
    External(Reference),
    Inline(Contents),
}

/// Parses a directory object's payload back into its named entries,
/// reversing `bonanza_merkle::directory::build_directory`'s wire format
/// (spec §6: "Reference byte layout... stable; feeds the hash equality
/// invariant"). Reference-carrying tags (file chunk/contents-list,
/// external subdirectory) store a 1-based index into `contents`'s own
/// outgoing references, exactly as `ReferenceMessagePatcher` assigns it.
pub fn parse_directory(contents: &Contents, format: &ObjectFormat) -> Result<Vec<(String, ParsedEntry)>, MerkleError> {
    let payload = contents.payload();
    let mut cursor = 0usize;
    let count = read_varint(payload, &mut cursor)? as usize;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let name_len = read_varint(payload, &mut cursor)? as usize;
        let name_bytes = take_slice(payload, &mut cursor, name_len)?;
        let name = std::str::from_utf8(name_bytes)
            .map_err(|e| MerkleError::MalformedDirectory(format!("non-utf8 entry name: {e}")))?
            .to_string();

        let tag = take_byte(payload, &mut cursor)?;
        let entry = match tag {
            0 => ParsedEntry::File(MerkleFile::Empty),
            1 => {
                let reference = read_reference_slot(payload, &mut cursor, contents)?;
                ParsedEntry::File(MerkleFile::Chunk(reference))
            }
            2 => {
                let reference = read_reference_slot(payload, &mut cursor, contents)?;
                let height = read_u32(payload, &mut cursor)?;
                ParsedEntry::File(MerkleFile::ContentsList { reference, height })
            }
            3 => {
                let escapement = read_u32(payload, &mut cursor)?;
                let target_len = read_varint(payload, &mut cursor)? as usize;
                let target_bytes = take_slice(payload, &mut cursor, target_len)?;
                let target = std::str::from_utf8(target_bytes)
                    .map_err(|e| MerkleError::MalformedDirectory(format!("non-utf8 symlink target: {e}")))?
                    .to_string();
                ParsedEntry::Symlink { target, escapement }
            }
            4 => {
                let reference = read_reference_slot(payload, &mut cursor, contents)?;
                ParsedEntry::Subdirectory(SubdirectorySource::External(reference))
            }
            5 => {
                let blob_len = read_varint(payload, &mut cursor)? as usize;
                let blob = take_slice(payload, &mut cursor, blob_len)?;
                let inline_contents = parse_inline_subdirectory(blob, format)?;
                ParsedEntry::Subdirectory(SubdirectorySource::Inline(inline_contents))
            }
            other => return Err(MerkleError::MalformedDirectory(format!("unknown directory entry tag {other}"))),
        };
        entries.push((name, entry));
    }
    Ok(entries)
}

/// Reverses `directory::encode_inline_subdirectory`: an inline
/// subdirectory's escapement is discarded here (the parent already
/// recorded it in its own `ParsedEntry::Subdirectory` bookkeeping is the
/// caller's job, not this function's -- the escapement byte itself is
/// consumed but not returned, matching how `build_directory_contents`
/// only reads it back out of the blob's own header when deciding a
/// parent's maximum, which a caller re-derives by recursing).
fn parse_inline_subdirectory(blob: &[u8], _format: &ObjectFormat) -> Result<Contents, MerkleError> {
    let mut cursor = 0usize;
    let _escapement = read_u32(blob, &mut cursor)?;
    let degree = read_varint(blob, &mut cursor)? as usize;
    let mut outgoing = Vec::with_capacity(degree);
    for _ in 0..degree {
        let len = read_varint(blob, &mut cursor)? as usize;
        let bytes = take_slice(blob, &mut cursor, len)?;
        outgoing.push(Reference::from_bytes(bytes).map_err(MerkleError::Reference)?);
    }
    let payload_len = read_varint(blob, &mut cursor)? as usize;
    let payload = take_slice(blob, &mut cursor, payload_len)?.to_vec();
    let format = ObjectFormat::default();
    Contents::new(&format, outgoing, payload).map_err(MerkleError::Reference)
}

fn read_reference_slot(payload: &[u8], cursor: &mut usize, contents: &Contents) -> Result<Reference, MerkleError> {
    let index = read_u32(payload, cursor)?;
    if index == 0 {
        return Err(MerkleError::MalformedDirectory("reference slot was never resolved".to_string()));
    }
    contents
        .outgoing_references()
        .get(index as usize - 1)
        .cloned()
        .ok_or_else(|| MerkleError::MalformedDirectory(format!("reference slot index {index} is out of range")))
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32, MerkleError> {
    let slice = take_slice(bytes, cursor, 4)?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(slice);
    Ok(u32::from_le_bytes(buf))
}

fn read_varint(bytes: &[u8], cursor: &mut usize) -> Result<u64, MerkleError> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = take_byte(bytes, cursor)?;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 64 {
            return Err(MerkleError::MalformedDirectory("varint too long".to_string()));
        }
    }
}

fn take_byte(bytes: &[u8], cursor: &mut usize) -> Result<u8, MerkleError> {
    let byte = *bytes
        .get(*cursor)
        .ok_or_else(|| MerkleError::MalformedDirectory("unexpected end of input".to_string()))?;
    *cursor += 1;
    Ok(byte)
}

fn take_slice<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8], MerkleError> {
    let end = *cursor + len;
    let slice = bytes
        .get(*cursor..end)
        .ok_or_else(|| MerkleError::MalformedDirectory("unexpected end of input".to_string()))?;
    *cursor = end;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use bonanza_reference::Contents;
    use bonanza_reference::ObjectFormat;

    use super::*;
    use crate::directory::build_directory;
    use crate::directory::DirectoryEntryInput;
    use crate::directory::DirectoryNode;

    #[test]
    fn parses_back_every_entry_kind_build_directory_wrote() {
        let format = ObjectFormat::default();
        let mut node = DirectoryNode::new();
        node.push("empty.txt", DirectoryEntryInput::File(MerkleFile::Empty));
        let chunk_ref = Contents::new(&format, Vec::new(), b"payload".to_vec()).unwrap().reference().clone();
        node.push("chunk.txt", DirectoryEntryInput::File(MerkleFile::Chunk(chunk_ref.clone())));

        let mut child = DirectoryNode::new();
        child.push("inner.txt", DirectoryEntryInput::File(MerkleFile::Chunk(chunk_ref.clone())));
        // One level deep so a `..` target has a non-zero escapement
        // budget to climb within (`build_directory` resolves the root
        // at depth 0).
        child.push("link", DirectoryEntryInput::Symlink("../sibling".to_string()));
        node.push("subdir", DirectoryEntryInput::Subdirectory(child));

        let mut stored = Vec::new();
        let built = build_directory(node, &format, &mut |c| {
            let r = c.reference().clone();
            stored.push(c);
            r
        })
        .unwrap();

        let root_contents = stored.iter().find(|c| c.reference() == &built.reference).unwrap();
        let entries = parse_directory(root_contents, &format).unwrap();
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["chunk.txt", "empty.txt", "subdir"]);

        let mut subdir_source = None;
        for (name, entry) in &entries {
            match (name.as_str(), entry) {
                ("empty.txt", ParsedEntry::File(MerkleFile::Empty)) => (),
                ("chunk.txt", ParsedEntry::File(MerkleFile::Chunk(r))) => assert_eq!(r, &chunk_ref),
                ("subdir", ParsedEntry::Subdirectory(source)) => subdir_source = Some(source),
                other => panic!("unexpected entry {other:?}"),
            }
        }

        let subdir_contents = match subdir_source.unwrap() {
            SubdirectorySource::Inline(contents) => contents,
            SubdirectorySource::External(r) => stored.iter().find(|c| c.reference() == r).unwrap(),
        };
        let subdir_entries = parse_directory(subdir_contents, &format).unwrap();
        let link = subdir_entries.iter().find(|(n, _)| n == "link").unwrap();
        match &link.1 {
            ParsedEntry::Symlink { target, escapement } => {
                assert_eq!(target, "../sibling");
                assert_eq!(*escapement, 1);
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn rejects_truncated_directory_payloads() {
        let format = ObjectFormat::default();
        let contents = Contents::new(&format, Vec::new(), vec![5]).unwrap();
        assert!(parse_directory(&contents, &format).is_err());
    }
}
