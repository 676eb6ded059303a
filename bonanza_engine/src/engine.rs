use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use dupe::Dupe;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::cycles;
use crate::environment::Environment;
use crate::error::EngineError;
use crate::key::Key;
use crate::key::NodeKey;
use crate::task::SharedTask;

/// One key's slot in the memoization table. The externally-observable
/// state is exactly the four states spec §4.6 names: `Pending`,
/// `Computing`, `Ready`, `Failed`. A key parked mid-`Computing` waiting
/// for its request-set to settle is *not* a fifth state: the same owner
/// resumes it, so the slot never leaves `Computing` until that owner
/// finishes. What that owner is currently waiting on lives in
/// [`Engine::waiting_on`], consulted only by cycle detection.
enum SlotState {
    Pending,
    Computing,
    Ready(Arc<dyn Any + Send + Sync>),
    Failed(EngineError),
}

struct Slot {
    notify: Notify,
    state: Mutex<SlotState>,
}

impl Slot {
    fn new() -> Self {
        Slot {
            notify: Notify::new(),
            state: Mutex::new(SlotState::Pending),
        }
    }
}

/// Counts of memoization-table entries by state (spec §12 introspection).
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub pending: usize,
    pub computing: usize,
    pub ready: usize,
    pub failed: usize,
}

pub(crate) enum Peek {
    Ready(Arc<dyn Any + Send + Sync>),
    Failed(EngineError),
    Unset,
}

/// The keyed, memoizing, restart-on-missing-dependency evaluation engine
/// (spec §2.7/§4.6). Ports the overall shape of `dice::DiceComputations`
/// plus `dice::legacy::incremental`'s node-state machine, simplified per
/// `DESIGN.md`: no `VersionNumber`/`CellHistory`, since spec.md's model
/// is a single evaluation rather than incremental recomputation across
/// builds.
pub struct Engine {
    table: DashMap<NodeKey, Arc<Slot>>,
    /// For each key currently parked awaiting a request-set, the keys it
    /// is waiting on. Populated on every restart, cleared once the key
    /// resumes; read only by [`cycles::detect_cycle`].
    waiting_on: DashMap<NodeKey, Vec<NodeKey>>,
}

impl Engine {
    pub fn new() -> Arc<Engine> {
        Arc::new(Engine {
            table: DashMap::new(),
            waiting_on: DashMap::new(),
        })
    }

    /// Computes `key`, or returns the memoized value/error if this key
    /// has already been (or is already being) computed.
    pub async fn evaluate<K: Key>(self: &Arc<Engine>, key: K) -> Result<K::Value, EngineError> {
        let node_key = NodeKey::new(key.clone());
        let erased = self.compute_key(node_key, key).await?;
        Ok(erased
            .downcast_ref::<K::Value>()
            .expect("NodeKey identity guarantees the stored value matches K::Value")
            .dupe())
    }

    /// The number of keys currently present in the memoization table,
    /// regardless of state (spec §12 introspection).
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Directly installs `value` as `key`'s result without ever running
    /// `key.compute` (spec §12 testing DSL, ported from
    /// `dice::testing::DiceBuilder::mock_and_return`). Any waiter already
    /// parked on `key` is woken; a key seeded twice simply overwrites the
    /// previous value.
    pub fn seed<K: Key>(self: &Arc<Engine>, key: K, value: K::Value) {
        let node_key = NodeKey::new(key);
        let slot = self.slot_for(&node_key);
        let erased: Arc<dyn Any + Send + Sync> = Arc::new(value);
        *slot.state.lock() = SlotState::Ready(erased);
        slot.notify.notify_waiters();
    }

    /// Counts of keys by state (spec §12 introspection, ported from
    /// `dice::Dice::metrics`/`Metrics::collect`).
    pub fn metrics(&self) -> Metrics {
        let mut metrics = Metrics::default();
        for entry in self.table.iter() {
            match &*entry.value().state.lock() {
                SlotState::Pending => metrics.pending += 1,
                SlotState::Computing => metrics.computing += 1,
                SlotState::Ready(_) => metrics.ready += 1,
                SlotState::Failed(_) => metrics.failed += 1,
            }
        }
        metrics
    }

    /// A Graphviz `digraph` of the current memoization table: one node
    /// per key (labelled with its state), one edge per still-outstanding
    /// `waiting_on` relationship. Ported from `dice`'s
    /// `serialize_tsv`/`serialize_serde` graph dumps (`dice/src/lib.rs`),
    /// simplified to a single debugging format since nothing here
    /// consumes the dump programmatically.
    pub fn dump_dot(&self) -> String {
        let mut out = String::from("digraph engine {\n");
        for entry in self.table.iter() {
            let state = match &*entry.value().state.lock() {
                SlotState::Pending => "pending",
                SlotState::Computing => "computing",
                SlotState::Ready(_) => "ready",
                SlotState::Failed(_) => "failed",
            };
            out.push_str(&format!("  {:?} [label={:?}];\n", entry.key().to_string(), format!("{} ({})", entry.key(), state)));
        }
        for entry in self.waiting_on.iter() {
            for dep in entry.value() {
                out.push_str(&format!("  {:?} -> {:?};\n", entry.key().to_string(), dep.to_string()));
            }
        }
        out.push_str("}\n");
        out
    }

    pub(crate) fn ensure_scheduled<K: Key>(self: &Arc<Engine>, node_key: NodeKey, key: K) {
        let slot = self.slot_for(&node_key);
        let mut state = slot.state.lock();
        if matches!(*state, SlotState::Pending) {
            *state = SlotState::Computing;
            drop(state);
            let engine = self.dupe();
            tokio::spawn(async move {
                let _ = engine.compute_key(node_key, key).await;
            });
        }
    }

    pub(crate) fn peek(&self, node_key: &NodeKey) -> Peek {
        match self.table.get(node_key) {
            None => Peek::Unset,
            Some(slot) => match &*slot.state.lock() {
                SlotState::Ready(v) => Peek::Ready(v.clone()),
                SlotState::Failed(e) => Peek::Failed(e.clone()),
                SlotState::Pending | SlotState::Computing => Peek::Unset,
            },
        }
    }

    fn slot_for(&self, node_key: &NodeKey) -> Arc<Slot> {
        self.table
            .entry(node_key.clone())
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone()
    }

    async fn compute_key<K: Key>(
        self: &Arc<Engine>,
        node_key: NodeKey,
        key: K,
    ) -> Result<Arc<dyn Any + Send + Sync>, EngineError> {
        let slot = self.slot_for(&node_key);
        let became_owner = {
            let mut state = slot.state.lock();
            match &*state {
                SlotState::Ready(v) => return Ok(v.clone()),
                SlotState::Failed(e) => return Err(e.clone()),
                SlotState::Computing => false,
                SlotState::Pending => {
                    *state = SlotState::Computing;
                    true
                }
            }
        };

        if became_owner {
            // Spawned, not run inline: a caller that drops its own
            // `evaluate` future while waiting below must not stop the
            // computation for any other waiter parked on the same key
            // (spec §8.5). See `task::SharedTask`.
            let engine = self.dupe();
            let spawned_node_key = node_key.clone();
            let spawned_slot = slot.clone();
            let _task = SharedTask::spawn(async move {
                let _ = engine.run_owned(spawned_node_key, key, spawned_slot).await;
            });
        }

        loop {
            self.wait_for_settled(&slot).await;
            let state = slot.state.lock();
            match &*state {
                SlotState::Ready(v) => return Ok(v.clone()),
                SlotState::Failed(e) => return Err(e.clone()),
                SlotState::Pending | SlotState::Computing => {}
            }
        }
    }

    /// Runs `key.compute` to completion, restarting it as many times as
    /// it reports a missing dependency. Only ever called by the task
    /// that won the `Pending -> Computing` race for `node_key`; no other
    /// task will observe or mutate `slot` while this runs except via
    /// `Notify`.
    async fn run_owned<K: Key>(
        self: &Arc<Engine>,
        node_key: NodeKey,
        key: K,
        slot: Arc<Slot>,
    ) -> Result<Arc<dyn Any + Send + Sync>, EngineError> {
        self.waiting_on.remove(&node_key);
        loop {
            let env = Environment::new(self.dupe(), node_key.clone());
            match key.compute(&env).await {
                Ok(value) => {
                    let erased: Arc<dyn Any + Send + Sync> = Arc::new(value);
                    *slot.state.lock() = SlotState::Ready(erased.clone());
                    slot.notify.notify_waiters();
                    return Ok(erased);
                }
                Err(EngineError::MissingDependency) => {
                    let parked_on = env.take_request_set();
                    self.waiting_on.insert(node_key.clone(), parked_on.clone());

                    if let Some(cycle) =
                        cycles::detect_cycle(&node_key, |k| self.waiting_on.get(k).map(|r| r.clone()))
                    {
                        self.fail_cycle(&cycle);
                    }
                    if let SlotState::Failed(e) = &*slot.state.lock() {
                        return Err(e.clone());
                    }

                    for dep in &parked_on {
                        self.wait_for_key_settled(dep).await;
                    }
                    self.waiting_on.remove(&node_key);
                }
                Err(other) => {
                    self.waiting_on.remove(&node_key);
                    *slot.state.lock() = SlotState::Failed(other.clone());
                    slot.notify.notify_waiters();
                    return Err(other);
                }
            }
        }
    }

    /// Marks every key in a detected cycle `Failed`, waking anyone
    /// parked waiting on them. Ports the "a detected cycle fails all
    /// participating keys" behaviour spec.md's E3 scenario names.
    fn fail_cycle(&self, cyclic_keys: &[NodeKey]) {
        let trigger = cyclic_keys[0].clone();
        for k in cyclic_keys {
            if let Some(slot) = self.table.get(k) {
                let mut state = slot.state.lock();
                if !matches!(&*state, SlotState::Ready(_) | SlotState::Failed(_)) {
                    *state = SlotState::Failed(EngineError::Cycle {
                        trigger: trigger.dupe(),
                        cyclic_keys: cyclic_keys.to_vec(),
                    });
                }
                drop(state);
                slot.notify.notify_waiters();
            }
            self.waiting_on.remove(k);
        }
    }

    async fn wait_for_settled(&self, slot: &Arc<Slot>) {
        loop {
            let notified = slot.notify.notified();
            match &*slot.state.lock() {
                SlotState::Ready(_) | SlotState::Failed(_) => return,
                SlotState::Pending | SlotState::Computing => {}
            }
            notified.await;
        }
    }

    async fn wait_for_key_settled(&self, node_key: &NodeKey) {
        let slot = self.slot_for(node_key);
        self.wait_for_settled(&slot).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use allocative::Allocative;
    use async_trait::async_trait;
    use assert_matches::assert_matches;

    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Hash, Allocative)]
    struct Double(i32);
    impl std::fmt::Display for Double {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "Double({})", self.0)
        }
    }
    #[async_trait]
    impl Key for Double {
        type Value = i32;
        async fn compute(&self, _env: &Environment) -> Result<i32, EngineError> {
            Ok(self.0 * 2)
        }
        fn equality(x: &i32, y: &i32) -> bool {
            x == y
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, Hash, Allocative)]
    struct Leaf(i32);
    impl std::fmt::Display for Leaf {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "Leaf({})", self.0)
        }
    }
    static LEAF_EVALS: AtomicUsize = AtomicUsize::new(0);
    #[async_trait]
    impl Key for Leaf {
        type Value = i32;
        async fn compute(&self, _env: &Environment) -> Result<i32, EngineError> {
            LEAF_EVALS.fetch_add(1, Ordering::SeqCst);
            Ok(self.0)
        }
        fn equality(x: &i32, y: &i32) -> bool {
            x == y
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, Hash, Allocative)]
    struct SumOfLeaves(Vec<i32>);
    impl std::fmt::Display for SumOfLeaves {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "SumOfLeaves({:?})", self.0)
        }
    }
    #[async_trait]
    impl Key for SumOfLeaves {
        type Value = i32;
        async fn compute(&self, env: &Environment) -> Result<i32, EngineError> {
            let mut total = 0;
            let mut any_missing = false;
            for n in &self.0 {
                match env.get(&Leaf(*n)) {
                    Ok(v) => total += v,
                    Err(EngineError::MissingDependency) => any_missing = true,
                    Err(e) => return Err(e),
                }
            }
            if any_missing {
                return Err(EngineError::MissingDependency);
            }
            Ok(total)
        }
        fn equality(x: &i32, y: &i32) -> bool {
            x == y
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, Hash, Allocative)]
    struct SelfCycle;
    impl std::fmt::Display for SelfCycle {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "SelfCycle")
        }
    }
    #[async_trait]
    impl Key for SelfCycle {
        type Value = ();
        async fn compute(&self, env: &Environment) -> Result<(), EngineError> {
            env.get(&SelfCycle)?;
            Ok(())
        }
        fn equality(_x: &(), _y: &()) -> bool {
            true
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, Hash, Allocative)]
    struct CycleA;
    impl std::fmt::Display for CycleA {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "CycleA")
        }
    }
    #[async_trait]
    impl Key for CycleA {
        type Value = ();
        async fn compute(&self, env: &Environment) -> Result<(), EngineError> {
            env.get(&CycleB)?;
            Ok(())
        }
        fn equality(_x: &(), _y: &()) -> bool {
            true
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, Hash, Allocative)]
    struct CycleB;
    impl std::fmt::Display for CycleB {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "CycleB")
        }
    }
    #[async_trait]
    impl Key for CycleB {
        type Value = ();
        async fn compute(&self, env: &Environment) -> Result<(), EngineError> {
            env.get(&CycleA)?;
            Ok(())
        }
        fn equality(_x: &(), _y: &()) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn e1_trivial_memoisation() {
        let engine = Engine::new();
        let a = engine.evaluate(Double(21)).await.unwrap();
        let b = engine.evaluate(Double(21)).await.unwrap();
        assert_eq!(a, 42);
        assert_eq!(b, 42);
        assert_eq!(engine.len(), 1);
    }

    #[tokio::test]
    async fn e2_missing_dependency_restart_recomputes_once_deps_are_ready() {
        LEAF_EVALS.store(0, Ordering::SeqCst);
        let engine = Engine::new();
        let total = engine
            .evaluate(SumOfLeaves(vec![1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(total, 6);
        // Each leaf is only ever actually evaluated once, even though
        // SumOfLeaves itself restarts while its dependencies resolve.
        assert_eq!(LEAF_EVALS.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn e3_self_cycle_fails_with_cycle_error() {
        let engine = Engine::new();
        let result = engine.evaluate(SelfCycle).await;
        assert_matches!(result, Err(EngineError::Cycle { .. }));
    }

    #[tokio::test]
    async fn e3_two_key_cycle_fails_both_keys() {
        let engine = Engine::new();
        let result = engine.evaluate(CycleA).await;
        assert_matches!(result, Err(EngineError::Cycle { .. }));

        // The second key also observes Failed(Cycle), not a hang.
        let result_b = engine.evaluate(CycleB).await;
        assert_matches!(result_b, Err(EngineError::Cycle { .. }));
    }

    #[tokio::test]
    async fn metrics_count_ready_and_failed_entries() {
        let engine = Engine::new();
        engine.evaluate(Double(1)).await.unwrap();
        let _ = engine.evaluate(SelfCycle).await;

        let metrics = engine.metrics();
        assert_eq!(metrics.ready, 1);
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.pending, 0);
        assert_eq!(metrics.computing, 0);
    }

    #[tokio::test]
    async fn seeded_keys_are_returned_without_running_compute() {
        static SEEDED_EVALS: AtomicUsize = AtomicUsize::new(0);
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Allocative)]
        struct NeverRun;
        impl std::fmt::Display for NeverRun {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "NeverRun")
            }
        }
        #[async_trait]
        impl Key for NeverRun {
            type Value = i32;
            async fn compute(&self, _env: &Environment) -> Result<i32, EngineError> {
                SEEDED_EVALS.fetch_add(1, Ordering::SeqCst);
                Ok(0)
            }
            fn equality(x: &i32, y: &i32) -> bool {
                x == y
            }
        }

        let engine = Engine::new();
        engine.seed(NeverRun, 99);
        let value = engine.evaluate(NeverRun).await.unwrap();
        assert_eq!(value, 99);
        assert_eq!(SEEDED_EVALS.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dump_dot_includes_every_table_entry() {
        let engine = Engine::new();
        engine.evaluate(Double(5)).await.unwrap();
        let dot = engine.dump_dot();
        assert!(dot.starts_with("digraph engine {\n"));
        assert!(dot.contains("Double(5)"));
    }

    #[tokio::test]
    async fn concurrent_requests_for_the_same_key_share_one_computation() {
        LEAF_EVALS.store(0, Ordering::SeqCst);
        let engine = Engine::new();
        let (a, b) = tokio::join!(engine.evaluate(Leaf(7)), engine.evaluate(Leaf(7)));
        assert_eq!(a.unwrap(), 7);
        assert_eq!(b.unwrap(), 7);
        assert_eq!(LEAF_EVALS.load(Ordering::SeqCst), 1);
    }
}
