use bonanza_reference::DecodingParameters;

use crate::encoder::Encoder;
use crate::error::ObjectCacheError;

/// An ordered `raw -> compressed -> encrypted -> storage` pipeline (spec
/// §4.4). `encode` runs stages left to right; `decode` runs them right to
/// left. Each stage's decoding parameters are concatenated in stage
/// order so the chain's combined parameters blob can be split back apart
/// deterministically (every stage reports a fixed
/// `decoding_parameters_size_bytes`).
pub struct EncoderChain {
    stages: Vec<Box<dyn Encoder>>,
}

impl EncoderChain {
    pub fn new(stages: Vec<Box<dyn Encoder>>) -> Self {
        EncoderChain { stages }
    }

    pub fn decoding_parameters_size_bytes(&self) -> usize {
        self.stages.iter().map(|s| s.decoding_parameters_size_bytes()).sum()
    }

    pub fn encode(&self, bytes: &[u8]) -> (Vec<u8>, DecodingParameters) {
        let mut current = bytes.to_vec();
        let mut params = Vec::with_capacity(self.decoding_parameters_size_bytes());
        for stage in &self.stages {
            let (encoded, stage_params) = stage.encode(&current);
            current = encoded;
            params.extend_from_slice(stage_params.as_bytes());
        }
        (current, DecodingParameters::new(params))
    }

    pub fn decode(&self, bytes: &[u8], decoding_params: &DecodingParameters) -> Result<Vec<u8>, ObjectCacheError> {
        let all_params = decoding_params.as_bytes();
        let mut offsets = Vec::with_capacity(self.stages.len());
        let mut cursor = 0usize;
        for stage in &self.stages {
            let size = stage.decoding_parameters_size_bytes();
            if cursor + size > all_params.len() {
                return Err(ObjectCacheError::TruncatedDecodingParameters {
                    expected: cursor + size,
                    actual: all_params.len(),
                });
            }
            offsets.push((cursor, size));
            cursor += size;
        }

        let mut current = bytes.to_vec();
        for (stage, (offset, size)) in self.stages.iter().zip(offsets).rev() {
            let stage_params = DecodingParameters::new(all_params[offset..offset + size].to_vec());
            current = stage.decode(&current, &stage_params)?;
        }
        Ok(current)
    }
}
