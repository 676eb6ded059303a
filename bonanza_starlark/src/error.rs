use thiserror::Error;

/// Errors this crate's own plumbing raises, distinct from whatever
/// `anyhow::Error` a Starlark evaluation itself fails with (spec §4.6
/// "Interplay with Starlark").
#[derive(Clone, Debug, Error)]
pub enum StarlarkBridgeError {
    /// A Starlark value used a shape [`crate::value_codec`] doesn't
    /// round-trip to stored structured data (e.g. a non-string dict key,
    /// a function value, a float `NaN`/`inf`).
    #[error("value cannot be encoded as stored structured data: {0}")]
    UnencodableValue(String),

    /// The encoded byte form is truncated or carries an unknown tag.
    #[error("malformed encoded value: {0}")]
    MalformedEncoding(String),

    /// A builtin was called under a thread with no [`crate::context::EngineExtra`]
    /// installed.
    #[error("no engine context installed on this Starlark thread")]
    NoContextInstalled,

    #[error("unknown dependency function `{0}`")]
    UnknownFunction(String),
}
