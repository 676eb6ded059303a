use thiserror::Error;

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("invalid symlink target {target:?}: escapes {allowed} parent level(s)")]
    SymlinkEscapesBudget { target: String, allowed: u32 },

    #[error("invalid symlink target {0:?}: absolute targets are not permitted")]
    AbsoluteSymlinkTarget(String),

    #[error(transparent)]
    Reference(#[from] bonanza_reference::ReferenceError),

    #[error("malformed directory payload: {0}")]
    MalformedDirectory(String),
}
