use thiserror::Error;

use crate::key::NodeKey;

/// Errors the engine itself produces or propagates (spec §4.6 "error
/// handling"). Ports the shape of `dice::DiceError`/`DiceErrorImpl`.
///
/// [`EngineError::MissingDependency`] is the sentinel a [`crate::Key::compute`]
/// body returns (via `Environment::get`) when one of its dependencies
/// hasn't settled yet; it never escapes the engine to an external caller
/// of [`crate::Engine::evaluate`] -- the engine catches it, waits for the
/// outstanding request-set to settle, and re-runs `compute` from scratch.
#[derive(Clone, Debug, Error)]
pub enum EngineError {
    /// Internal restart sentinel. See the type-level doc above.
    #[error("missing dependency")]
    MissingDependency,

    /// A dependency cycle was detected while computing `trigger`.
    /// `cyclic_keys` lists the keys that participate in the cycle, in
    /// the order the cycle-detector walked them.
    #[error(
        "cyclic computation detected computing `{trigger}`: {}",
        format_cycle(cyclic_keys)
    )]
    Cycle {
        trigger: NodeKey,
        cyclic_keys: Vec<NodeKey>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("computation cancelled")]
    Cancelled,

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

fn format_cycle(cyclic_keys: &[NodeKey]) -> String {
    cyclic_keys
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl EngineError {
    pub fn is_missing_dependency(&self) -> bool {
        matches!(self, EngineError::MissingDependency)
    }
}
