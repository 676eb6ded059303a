use thiserror::Error;

/// Failure modes of §4.1 object construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("payload of {actual} bytes exceeds the maximum object size of {max} bytes")]
    PayloadTooLarge { actual: usize, max: usize },

    #[error("object has {actual} outgoing references, more than the format maximum of {max}")]
    TooManyReferences { actual: usize, max: usize },

    #[error("height {computed} of a child reference overflows the u8 height field")]
    HeightOverflow { computed: u64 },

    #[error("reference byte encoding is truncated or malformed: {0}")]
    Malformed(String),
}
