//! Object Store Client (spec §4.3, §6): the two-phase DAG upload
//! protocol, a sharding decorator, and the lease type the protocol
//! hands back.

mod client;
mod error;
mod lease;
mod sharding;
mod upload;

pub use client::ObjectStoreClient;
pub use client::ResolvedTag;
pub use client::UploadOutcome;
pub use error::StorageError;
pub use lease::Lease;
pub use lease::MaxLeaseSize;
pub use sharding::FnvPicker;
pub use sharding::Picker;
pub use sharding::ShardedClient;
pub use upload::upload_tree;
