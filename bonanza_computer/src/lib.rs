//! Glue crate (spec §4's whole pipeline, tied together): wires
//! `bonanza_engine`'s keyed evaluator and `bonanza_functions`' generated
//! dispatch atop `bonanza_merkle`'s directory/file builder,
//! `bonanza_storage`'s object store client, `bonanza_object_cache`'s
//! parsed-object cache, and `bonanza_repo_fetcher`'s change-tracking
//! filesystem. Nothing here is itself a spec module; it only
//! instantiates the type parameters the other crates leave generic
//! (`DirectoryExpander`, `ObjectStoreClient`) with concrete
//! storage-backed implementations.

mod config;
mod expander;
mod scheduler;

pub use config::BonanzaConfig;
pub use expander::StorageDirectoryExpander;
pub use scheduler::FirstCandidateScheduler;
pub use scheduler::SchedulerClient;
