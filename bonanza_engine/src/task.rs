use std::future::Future;

use tokio::task::JoinHandle;

/// The unit of work a key's computation runs as, detached from whichever
/// caller happened to trigger it (spec §8.5 "evaluation is independent
/// of scheduling/thread count"). Ports the shape of
/// `dice::future_handle::WeakDiceFutureHandle`: the handle is pure
/// bookkeeping, never polled for its result. A caller that drops its own
/// `evaluate` future while waiting does not cancel the computation --
/// dropping a [`JoinHandle`] without calling `abort` only detaches it,
/// it does not stop the task -- so any other waiter parked on the same
/// key still observes the result once it lands in the slot.
pub(crate) struct SharedTask {
    // Never joined or aborted: dropping it only detaches, it does not
    // stop the task. See the type doc.
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

impl SharedTask {
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        SharedTask { handle: tokio::spawn(future) }
    }
}
