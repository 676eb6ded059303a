use crate::error::StarlarkBridgeError;
use crate::value_codec::EncodedValue;

/// The engine-side half of spec §4.6's "Interplay with Starlark":
/// resolves one named dependency function's value for a given key,
/// looking it up (or scheduling it) through `bonanza_engine`'s
/// memoization table. Implemented once per embedding `Computer` (the
/// concrete struct `bonanza_functions::define_computer!` generates),
/// since each computer's set of functions -- and the typed `Key`s behind
/// them -- is only known at that crate's compile time, not here.
///
/// A resolver call corresponds exactly to one `Environment::get` call:
/// `Ok(None)` is the "unset" sentinel spec §4.6 describes (the caller
/// must abort the Starlark evaluation by raising
/// [`StarlarkBridgeError`]'s non-catchable sibling,
/// [`crate::context::MissingDependencySignal`]), `Ok(Some(value))` is a
/// settled read, `Err` is any other engine failure.
pub trait DependencyResolver: Send + Sync {
    /// Resolves `function`'s value for `key`, or `Ok(None)` if it hasn't
    /// settled yet.
    fn resolve(&self, function: &str, key: &EncodedValue) -> Result<Option<EncodedValue>, StarlarkBridgeError>;
}

/// A resolver over a fixed, statically-known set of functions, useful
/// for tests and for embedders with no dynamic registry.
pub struct StaticResolver<F> {
    lookup: F,
}

impl<F> StaticResolver<F>
where
    F: Fn(&str, &EncodedValue) -> Result<Option<EncodedValue>, StarlarkBridgeError> + Send + Sync,
{
    pub fn new(lookup: F) -> Self {
        StaticResolver { lookup }
    }
}

impl<F> DependencyResolver for StaticResolver<F>
where
    F: Fn(&str, &EncodedValue) -> Result<Option<EncodedValue>, StarlarkBridgeError> + Send + Sync,
{
    fn resolve(&self, function: &str, key: &EncodedValue) -> Result<Option<EncodedValue>, StarlarkBridgeError> {
        (self.lookup)(function, key)
    }
}
