use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum ObjectCacheError {
    #[error("truncated decoding parameters: expected {expected} bytes, got {actual}")]
    TruncatedDecodingParameters { expected: usize, actual: usize },

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("malformed message: {0}")]
    Malformed(String),
}
