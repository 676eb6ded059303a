use thiserror::Error;

#[derive(Debug, Error)]
pub enum TreeBuilderError {
    #[error("failed to read or parse tree node: {0}")]
    Read(String),
}
