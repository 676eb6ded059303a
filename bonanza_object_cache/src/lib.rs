//! Parsed Object Cache & Encoders (spec §4.4): a compose-able
//! `raw -> compressed -> encrypted -> storage` encoder chain, a
//! decode-then-parse contract over it, and a bounded-size LRU cache of
//! the resulting typed views.

mod cache;
mod encoder;
mod encoder_chain;
mod error;
mod parser;

pub use cache::CachedView;
pub use cache::ParsedObjectCache;
pub use encoder::Encoder;
pub use encoder::IdentityEncoder;
pub use encoder::XorStreamEncoder;
pub use encoder::ZstdEncoder;
pub use encoder_chain::EncoderChain;
pub use error::ObjectCacheError;
pub use parser::ChainedParser;
pub use parser::MessageParser;
