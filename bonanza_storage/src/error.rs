use thiserror::Error;

/// Errors this crate's client contract and upload walker produce (spec §7
/// "Storage" and "NotFound" variants). Ports the shape of
/// `bonanza_engine::EngineError`'s taxonomy, scoped to the store.
#[derive(Clone, Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("storage error on shard {shard}: {source}")]
    Shard {
        shard: String,
        #[source]
        source: Box<StorageError>,
    },

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl StorageError {
    pub fn on_shard(self, shard: impl Into<String>) -> Self {
        StorageError::Shard { shard: shard.into(), source: Box::new(self) }
    }
}
