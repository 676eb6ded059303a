//! Starlark Integration (spec §2.9/§4.6 "Interplay with Starlark"):
//! thread/evaluator construction, the engine-backed `get_dependency`
//! global, and a storage-safe value encode/decode. Deliberately silent
//! on the concrete BUILD-file language surface (spec §1 non-goal
//! "defining the surface Starlark language") -- every schema-specific
//! function lives in a `bonanza_functions`-generated `Computer`, which
//! hands this crate a [`DependencyResolver`] rather than being depended
//! on by it.

mod context;
mod error;
mod eval;
mod globals;
mod resolver;
mod value_codec;

pub use context::is_missing_dependency;
pub use context::EngineExtra;
pub use context::ExtraContext;
pub use context::MissingDependencySignal;
pub use error::StarlarkBridgeError;
pub use eval::bonanza_globals;
pub use eval::evaluate_module;
pub use eval::ModuleOutcome;
pub use globals::register_engine_globals;
pub use resolver::DependencyResolver;
pub use resolver::StaticResolver;
pub use value_codec::from_encoded;
pub use value_codec::read_encoded;
pub use value_codec::to_encoded;
pub use value_codec::write_encoded;
pub use value_codec::EncodedValue;
