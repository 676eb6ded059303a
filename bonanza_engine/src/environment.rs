use std::sync::Arc;

use dupe::Dupe;
use parking_lot::Mutex;

use crate::engine::Engine;
use crate::engine::Peek;
use crate::error::EngineError;
use crate::key::Key;
use crate::key::NodeKey;

/// The dependency-reading handle a [`Key::compute`] body is given. Every
/// `get` call is a potential dependency edge: a successful read is
/// recorded in the read-set (for introspection, spec §12), a miss is
/// recorded in the request-set the engine uses to know what to wait on
/// before re-running `compute` (spec §4.6).
///
/// Ports the dependency-capture role of `dice::opaque::OpaqueValue` and
/// `dice::legacy::incremental::dep_trackers`, collapsed into a single
/// non-versioned read/request set since this engine has no per-build
/// version history to record against.
pub struct Environment {
    engine: Arc<Engine>,
    owner: NodeKey,
    read_set: Mutex<Vec<NodeKey>>,
    request_set: Mutex<Vec<NodeKey>>,
}

impl Environment {
    pub(crate) fn new(engine: Arc<Engine>, owner: NodeKey) -> Self {
        Environment {
            engine,
            owner,
            read_set: Mutex::new(Vec::new()),
            request_set: Mutex::new(Vec::new()),
        }
    }

    /// Reads `key`'s value if it's already settled. If `key` has never
    /// been requested before, schedules it in the background. Returns
    /// `Err(EngineError::MissingDependency)` if the value isn't ready
    /// yet -- the caller (a `Key::compute` body) is expected to
    /// propagate this (typically via `?`) once it has recorded every
    /// dependency it can make progress on; the engine will re-invoke
    /// `compute` once every recorded dependency has settled.
    pub fn get<K: Key>(&self, key: &K) -> Result<K::Value, EngineError> {
        let node_key = NodeKey::new(key.clone());

        if node_key == self.owner {
            // A key can never observe its own value while it is the one
            // computing it: recorded as a self-edge so `detect_cycle`
            // catches a key that depends on itself.
            self.request_set.lock().push(node_key);
            return Err(EngineError::MissingDependency);
        }

        self.engine.ensure_scheduled(node_key.clone(), key.clone());
        match self.engine.peek(&node_key) {
            Peek::Ready(value) => {
                self.read_set.lock().push(node_key);
                Ok(value
                    .downcast_ref::<K::Value>()
                    .expect("NodeKey identity guarantees the stored value matches K::Value")
                    .dupe())
            }
            Peek::Failed(err) => Err(err),
            Peek::Unset => {
                self.request_set.lock().push(node_key);
                Err(EngineError::MissingDependency)
            }
        }
    }

    /// The key currently being computed through this environment.
    pub fn owner(&self) -> &NodeKey {
        &self.owner
    }

    /// Every dependency successfully read so far through this
    /// environment (spec §12 introspection).
    pub fn read_set(&self) -> Vec<NodeKey> {
        self.read_set.lock().clone()
    }

    pub(crate) fn take_request_set(&self) -> Vec<NodeKey> {
        std::mem::take(&mut self.request_set.lock())
    }
}
