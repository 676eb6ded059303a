//! Scheduler worker-stickiness is out of scope (spec.md §1 Non-goals,
//! `SPEC_FULL.md` §13): this crate only defines the seam an embedder's
//! scheduler plugs into, free to ignore it entirely.

use std::time::Duration;

/// Picks which of `candidates` should run the next unit of work, given
/// each candidate's past observed latencies. Implementations are free to
/// ignore `past_latencies` altogether and pick round-robin, the first
/// candidate, or anything else -- the engine itself (spec §4.6) never
/// calls this; nothing here is on the path of a single `evaluate`.
pub trait SchedulerClient: Send + Sync {
    fn pick_worker(&self, candidates: &[String], past_latencies: &[Vec<Duration>]) -> String;
}

/// Always picks the first candidate, ignoring `past_latencies`
/// entirely. The simplest conforming implementation; a real embedder
/// would weigh `past_latencies` to keep a worker "sticky" for a given
/// key's recomputations.
pub struct FirstCandidateScheduler;

impl SchedulerClient for FirstCandidateScheduler {
    fn pick_worker(&self, candidates: &[String], _past_latencies: &[Vec<Duration>]) -> String {
        candidates.first().cloned().expect("at least one candidate")
    }
}
