//! Mocks specific keys of a generated computer (spec §12 testing DSL),
//! the same shape `dice::testing::DiceBuilder::mock_and_return` gives
//! `dice` callers (`dice/dice/src/lib.rs`): build an [`Engine`] with a
//! handful of keys pre-seeded, then construct the real generated
//! computer struct on top of it so everything *not* mocked still runs
//! for real.

use std::sync::Arc;

use bonanza_engine::Engine;
use bonanza_engine::Key;

/// Builds an [`Engine`] with some keys already answered, for unit tests
/// that want to exercise one function in a schema without standing up
/// its whole dependency graph.
pub struct ComputerBuilder {
    engine: Arc<Engine>,
}

impl ComputerBuilder {
    pub fn new() -> Self {
        ComputerBuilder { engine: Engine::new() }
    }

    /// Mocks `key` so evaluating it returns `value` without ever running
    /// `key.compute`.
    pub fn mock_and_return<K: Key>(self, key: K, value: K::Value) -> Self {
        self.engine.seed(key, value);
        self
    }

    /// The engine to hand to a generated computer's `::new`.
    pub fn build(self) -> Arc<Engine> {
        self.engine
    }
}

impl Default for ComputerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
