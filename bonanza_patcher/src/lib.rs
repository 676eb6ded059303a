//! Build-time bookkeeping that assigns indices to references embedded in
//! in-flight structured payloads, per spec §3/§4.2.

mod metadata;
mod patcher;
mod placeholder;

pub use metadata::CreatedObject;
pub use metadata::DeferredObject;
pub use metadata::ReferenceMetadata;
pub use patcher::ReferenceMessagePatcher;
pub use placeholder::Placeholder;
pub use placeholder::INVALID;
pub use placeholder::UNRESOLVED;
