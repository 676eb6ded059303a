use std::cmp::Ordering;
use std::sync::Arc;

use allocative::Allocative;
use dupe::Dupe;
use sha2::Digest;
use sha2::Sha256;

use crate::error::ReferenceError;
use crate::outgoing::OutgoingReferences;

/// Hash function tagged into the reference's stable byte layout (spec §6).
#[derive(Clone, Copy, Dupe, Debug, Eq, PartialEq, Hash, Allocative)]
pub enum HashAlgorithm {
    Sha256,
}

impl HashAlgorithm {
    fn tag(self) -> u8 {
        match self {
            HashAlgorithm::Sha256 => 0,
        }
    }

    fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
        }
    }

    fn digest(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha256 => Sha256::digest(bytes).to_vec(),
        }
    }
}

/// Per-object decoding material (e.g. an encrypting encoder's nonce).
///
/// Sibling to a [`Reference`]: required to decode the object but, per
/// spec §3, not part of the hash and not part of reference equality.
#[derive(Clone, Dupe, Debug, Eq, PartialEq, Hash, Allocative)]
pub struct DecodingParameters(Arc<[u8]>);

impl DecodingParameters {
    pub fn new(bytes: Vec<u8>) -> Self {
        DecodingParameters(bytes.into())
    }

    pub fn empty() -> Self {
        DecodingParameters(Arc::from(&[][..]))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Per-format limits enforced at [`Contents::new`] (spec §4.1).
#[derive(Clone, Copy, Debug)]
pub struct ObjectFormat {
    pub hash_algorithm: HashAlgorithm,
    pub max_object_size_bytes: usize,
    pub max_degree: usize,
}

impl Default for ObjectFormat {
    fn default() -> Self {
        ObjectFormat {
            hash_algorithm: HashAlgorithm::Sha256,
            // Matches the ~4 MiB object size budgets used elsewhere in the
            // Buck2/RE ecosystem for a single CAS blob.
            max_object_size_bytes: 4 * 1024 * 1024,
            max_degree: 1 << 16,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Allocative)]
struct ReferenceHeader {
    hash_algorithm: HashAlgorithm,
    hash: Arc<[u8]>,
    payload_size_bytes: u64,
    height: u8,
    degree: u32,
    max_parents_total_size_bytes: u64,
}

/// An immutable handle uniquely identifying an [`Contents`] object (spec §3).
///
/// `Eq`/`Ord`/`Hash` are defined over the raw header bytes only;
/// [`DecodingParameters`] ride alongside but are not part of a reference's
/// identity.
#[derive(Clone, Dupe, Debug, Eq, Allocative)]
pub struct Reference(Arc<ReferenceHeader>);

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl std::hash::Hash for Reference {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl PartialOrd for Reference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Reference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl Reference {
    pub fn height(&self) -> u8 {
        self.0.height
    }

    pub fn degree(&self) -> u32 {
        self.0.degree
    }

    pub fn payload_size_bytes(&self) -> u64 {
        self.0.payload_size_bytes
    }

    pub fn max_parents_total_size_bytes(&self) -> u64 {
        self.0.max_parents_total_size_bytes
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.0.hash_algorithm
    }

    pub fn hash_bytes(&self) -> &[u8] {
        &self.0.hash
    }

    /// Stable byte layout from spec §6: hash-algo tag, hash bytes, payload
    /// size (varint), height (u8), degree (varint), parents-budget
    /// (varint). The decoding-parameters blob is *not* included: it rides
    /// alongside a reference, not inside it.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.0.hash.len() + 1 + 5 + 5 + 10);
        out.push(self.0.hash_algorithm.tag());
        out.extend_from_slice(&self.0.hash);
        write_varint(&mut out, self.0.payload_size_bytes);
        out.push(self.0.height);
        write_varint(&mut out, self.0.degree as u64);
        write_varint(&mut out, self.0.max_parents_total_size_bytes);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReferenceError> {
        let mut cursor = bytes;
        let tag = take_u8(&mut cursor)?;
        let hash_algorithm = match tag {
            0 => HashAlgorithm::Sha256,
            other => {
                return Err(ReferenceError::Malformed(format!(
                    "unknown hash algorithm tag {other}"
                )));
            }
        };
        let digest_len = hash_algorithm.digest_len();
        if cursor.len() < digest_len {
            return Err(ReferenceError::Malformed("truncated hash".to_string()));
        }
        let hash: Arc<[u8]> = Arc::from(&cursor[..digest_len]);
        cursor = &cursor[digest_len..];
        let payload_size_bytes = read_varint(&mut cursor)?;
        let height = take_u8(&mut cursor)?;
        let degree = read_varint(&mut cursor)? as u32;
        let max_parents_total_size_bytes = read_varint(&mut cursor)?;
        Ok(Reference(Arc::new(ReferenceHeader {
            hash_algorithm,
            hash,
            payload_size_bytes,
            height,
            degree,
            max_parents_total_size_bytes,
        })))
    }
}

/// An immutable tuple of (payload bytes, ordered outgoing references),
/// keyed by its [`Reference`] (spec §3).
#[derive(Clone, Dupe, Debug, Allocative)]
pub struct Contents {
    reference: Reference,
    payload: Arc<[u8]>,
    outgoing: OutgoingReferences,
}

impl Contents {
    /// Builds contents from already-sorted, already-deduplicated outgoing
    /// references (the shape the patcher hands back from
    /// `sort_and_set_references`) and computes the corresponding
    /// reference. Fails per §4.1 on oversized payload, over-degree, or
    /// height overflow.
    pub fn new(
        format: &ObjectFormat,
        outgoing: Vec<Reference>,
        payload: Vec<u8>,
    ) -> Result<Self, ReferenceError> {
        if payload.len() > format.max_object_size_bytes {
            return Err(ReferenceError::PayloadTooLarge {
                actual: payload.len(),
                max: format.max_object_size_bytes,
            });
        }
        if outgoing.len() > format.max_degree {
            return Err(ReferenceError::TooManyReferences {
                actual: outgoing.len(),
                max: format.max_degree,
            });
        }

        let max_child_height = outgoing.iter().map(|r| r.height() as u64).max();
        let height = match max_child_height {
            None => 0u8,
            Some(h) => {
                let computed = h + 1;
                u8::try_from(computed)
                    .map_err(|_| ReferenceError::HeightOverflow { computed })?
            }
        };

        let max_parents_total_size_bytes = outgoing
            .iter()
            .map(|r| r.max_parents_total_size_bytes())
            .sum::<u64>()
            + payload.len() as u64;

        let mut hash_input =
            Vec::with_capacity(payload.len() + outgoing.len() * 64 + 8);
        hash_input.extend_from_slice(&(outgoing.len() as u64).to_le_bytes());
        for r in &outgoing {
            hash_input.extend_from_slice(&r.to_bytes());
        }
        hash_input.extend_from_slice(&payload);
        let hash = format.hash_algorithm.digest(&hash_input);

        let reference = Reference(Arc::new(ReferenceHeader {
            hash_algorithm: format.hash_algorithm,
            hash: Arc::from(hash),
            payload_size_bytes: payload.len() as u64,
            height,
            degree: outgoing.len() as u32,
            max_parents_total_size_bytes,
        }));

        Ok(Contents {
            reference,
            payload: Arc::from(payload),
            outgoing: OutgoingReferences::new(outgoing),
        })
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn outgoing_references(&self) -> &OutgoingReferences {
        &self.outgoing
    }

    pub fn outgoing_reference(&self, index: usize) -> Option<&Reference> {
        self.outgoing.get(index)
    }
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

fn read_varint(cursor: &mut &[u8]) -> Result<u64, ReferenceError> {
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = take_u8(cursor)?;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 64 {
            return Err(ReferenceError::Malformed("varint too long".to_string()));
        }
    }
}

fn take_u8(cursor: &mut &[u8]) -> Result<u8, ReferenceError> {
    let (first, rest) = cursor
        .split_first()
        .ok_or_else(|| ReferenceError::Malformed("unexpected end of input".to_string()))?;
    *cursor = rest;
    Ok(*first)
}
