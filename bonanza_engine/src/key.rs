use std::any::Any;
use std::any::TypeId;
use std::fmt;
use std::fmt::Debug;
use std::fmt::Display;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use allocative::Allocative;
use async_trait::async_trait;
use dupe::Dupe;
use gazebo::cmp::PartialEqAny;

use crate::environment::Environment;
use crate::error::EngineError;

/// A registered computation, indexed by a typed key (spec §3 "Value",
/// §4.6/§4.7). Implementors describe one node of the dependency DAG: how
/// to compute it given an [`Environment`] through which it reads its own
/// dependencies.
#[async_trait]
pub trait Key: Allocative + Clone + Debug + Display + Eq + Hash + Send + Sync + 'static {
    /// `Dupe` (not `Clone`) deliberately: a computed value is shared by
    /// every caller that reads it out of the memoization table, so it
    /// must already be cheap to duplicate (an `Arc`, a `Copy` scalar, a
    /// `gazebo`/`dupe` wrapper), matching how `dice` values are held.
    type Value: Dupe + Send + Sync + 'static;

    async fn compute(&self, env: &Environment) -> Result<Self::Value, EngineError>;

    /// Value-level equality, used by callers that want to dedupe
    /// successful computations by content across restarts (spec §5's
    /// "storage references produced for the same input key across
    /// restarts must be byte-identical"). The engine itself never calls
    /// this; a restart always re-runs `compute`.
    fn equality(x: &Self::Value, y: &Self::Value) -> bool;
}

/// Object-safe sibling of [`Key`], implemented for every `K: Key` so a
/// `NodeKey` can carry `K`'s identity without the engine being generic
/// over it. Ports `dice::impls::key::DiceKeyDyn`.
trait ErasedKey: Allocative + Send + Sync + 'static {
    fn eq_any(&self) -> PartialEqAny;
    fn hash_value(&self, state: &mut dyn Hasher);
    fn as_any(&self) -> &dyn Any;
    fn type_id_of(&self) -> TypeId;
    fn fmt_display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
    fn fmt_debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<K: Key> ErasedKey for K {
    fn eq_any(&self) -> PartialEqAny {
        PartialEqAny::new(self)
    }

    fn hash_value(&self, mut state: &mut dyn Hasher) {
        Hash::hash(self, &mut state)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_id_of(&self) -> TypeId {
        TypeId::of::<K>()
    }

    fn fmt_display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }

    fn fmt_debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

/// A type-erased handle to a requested [`Key`]. Used as the memoization
/// table's hash key and as the node identity threaded through cycle
/// detection (ports `dice::impls::key::DiceKeyDyn` and
/// `dice::cycles::RequestedKey`, merged into a single handle since this
/// engine has no separate key-index arena).
#[derive(Clone, Dupe, Allocative)]
pub struct NodeKey(Arc<dyn ErasedKey>);

impl NodeKey {
    pub fn new<K: Key>(key: K) -> Self {
        NodeKey(Arc::new(key))
    }

    /// Recovers the concrete key if `self` was built from a `K`.
    pub fn downcast<K: Key>(&self) -> Option<&K> {
        if self.0.type_id_of() == TypeId::of::<K>() {
            self.0.as_any().downcast_ref::<K>()
        } else {
            None
        }
    }
}

impl PartialEq for NodeKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_any() == other.0.eq_any()
    }
}

impl Eq for NodeKey {}

impl Hash for NodeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_value(state)
    }
}

impl Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt_debug(f)
    }
}

impl Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt_display(f)
    }
}
