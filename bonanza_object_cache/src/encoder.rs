use std::hash::Hasher;

use bonanza_reference::DecodingParameters;
use fnv::FnvHasher;
use rand::RngCore;

use crate::error::ObjectCacheError;

/// One stage of the storage encoder chain (spec §4.4): `raw -> compressed
/// -> encrypted -> storage`. Each stage owns its own fixed-size
/// per-object decoding material (e.g. a random nonce), which rides
/// alongside the reference rather than inside the hashed payload.
pub trait Encoder: Send + Sync {
    fn encode(&self, bytes: &[u8]) -> (Vec<u8>, DecodingParameters);
    fn decode(&self, bytes: &[u8], decoding_params: &DecodingParameters) -> Result<Vec<u8>, ObjectCacheError>;

    /// Fixed per-object size of this stage's decoding parameters, used to
    /// pre-size the chain's concatenated parameters blob.
    fn decoding_parameters_size_bytes(&self) -> usize;
}

/// Identity stage: no compression, no encryption, empty decoding params.
/// Useful as the sole stage of a chain over already-small payloads.
pub struct IdentityEncoder;

impl Encoder for IdentityEncoder {
    fn encode(&self, bytes: &[u8]) -> (Vec<u8>, DecodingParameters) {
        (bytes.to_vec(), DecodingParameters::empty())
    }

    fn decode(&self, bytes: &[u8], _decoding_params: &DecodingParameters) -> Result<Vec<u8>, ObjectCacheError> {
        Ok(bytes.to_vec())
    }

    fn decoding_parameters_size_bytes(&self) -> usize {
        0
    }
}

/// Zstd compression stage (teacher workspace's own `zstd` dependency,
/// used by its materializers for on-disk blob compression). Carries no
/// per-object decoding parameters: the frame is self-describing.
pub struct ZstdEncoder {
    pub level: i32,
}

impl ZstdEncoder {
    pub fn new(level: i32) -> Self {
        ZstdEncoder { level }
    }
}

impl Default for ZstdEncoder {
    fn default() -> Self {
        ZstdEncoder::new(3)
    }
}

impl Encoder for ZstdEncoder {
    fn encode(&self, bytes: &[u8]) -> (Vec<u8>, DecodingParameters) {
        let compressed = zstd::bulk::compress(bytes, self.level).expect("in-memory zstd compression cannot fail");
        (compressed, DecodingParameters::empty())
    }

    fn decode(&self, bytes: &[u8], _decoding_params: &DecodingParameters) -> Result<Vec<u8>, ObjectCacheError> {
        // `bulk::decompress` needs an upper bound; storage payloads are
        // already capped by `ObjectFormat::max_object_size_bytes`
        // upstream, so a generous fixed ceiling here just avoids an
        // unbounded allocation on corrupt input.
        const MAX_DECOMPRESSED_BYTES: usize = 256 * 1024 * 1024;
        zstd::bulk::decompress(bytes, MAX_DECOMPRESSED_BYTES).map_err(|e| ObjectCacheError::Decode(e.to_string()))
    }

    fn decoding_parameters_size_bytes(&self) -> usize {
        0
    }
}

/// A keystream-XOR stage keyed by a fixed secret plus a fresh random
/// per-object nonce carried as that object's decoding parameters. The
/// keystream itself is expanded by chaining FNV over `(key, nonce, block
/// index)`, the same rolling-hash technique this workspace already uses
/// for content-defined chunking and shard picking; it exists to exercise
/// the "encrypted" stage of spec §4.4's encoder chain, not to be a
/// production cipher.
pub struct XorStreamEncoder {
    key: Vec<u8>,
    nonce_len: usize,
}

impl XorStreamEncoder {
    pub fn new(key: Vec<u8>, nonce_len: usize) -> Self {
        XorStreamEncoder { key, nonce_len }
    }

    fn keystream(&self, nonce: &[u8], len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        let mut block: u64 = 0;
        while out.len() < len {
            let mut hasher = FnvHasher::default();
            hasher.write(&self.key);
            hasher.write(nonce);
            hasher.write_u64(block);
            let digest = hasher.finish().to_le_bytes();
            out.extend_from_slice(&digest);
            block += 1;
        }
        out.truncate(len);
        out
    }
}

impl Encoder for XorStreamEncoder {
    fn encode(&self, bytes: &[u8]) -> (Vec<u8>, DecodingParameters) {
        let mut nonce = vec![0u8; self.nonce_len];
        rand::thread_rng().fill_bytes(&mut nonce);
        let stream = self.keystream(&nonce, bytes.len());
        let cipher: Vec<u8> = bytes.iter().zip(&stream).map(|(b, k)| b ^ k).collect();
        (cipher, DecodingParameters::new(nonce))
    }

    fn decode(&self, bytes: &[u8], decoding_params: &DecodingParameters) -> Result<Vec<u8>, ObjectCacheError> {
        if decoding_params.as_bytes().len() != self.nonce_len {
            return Err(ObjectCacheError::TruncatedDecodingParameters {
                expected: self.nonce_len,
                actual: decoding_params.as_bytes().len(),
            });
        }
        let stream = self.keystream(decoding_params.as_bytes(), bytes.len());
        Ok(bytes.iter().zip(&stream).map(|(b, k)| b ^ k).collect())
    }

    fn decoding_parameters_size_bytes(&self) -> usize {
        self.nonce_len
    }
}
