use starlark::environment::GlobalsBuilder;
use starlark::eval::Evaluator;
use starlark::starlark_module;
use starlark::values::Value;

use crate::context::EngineExtra;
use crate::context::MissingDependencySignal;
use crate::error::StarlarkBridgeError;
use crate::value_codec;

/// Recovers the [`EngineExtra`] installed on this evaluation's thread,
/// the same "reach outside the Starlark value universe" step
/// `ModuleInternals::attr_coercion_context` and friends perform in the
/// teacher, just generalised to any extra type via a downcast instead of
/// a single concrete struct field.
fn current_extra<'v, 'a>(eval: &Evaluator<'v, 'a>) -> anyhow::Result<&'a EngineExtra<'a>> {
    eval.extra
        .and_then(|extra| extra.downcast_ref::<EngineExtra<'a>>())
        .ok_or_else(|| StarlarkBridgeError::NoContextInstalled.into())
}

/// Registers the builtins this crate contributes to every Starlark
/// global environment (spec §4.6/§2.9): a single `get_dependency`
/// function bridging Starlark-level dependency reads into the engine.
/// Grounded in the teacher's `register_sha256` (same `#[starlark_module]`
/// / `GlobalsBuilder` registration shape); this crate has no counterpart
/// to `sha256`'s pure, context-free body, since every function it
/// contributes needs the thread's installed context.
#[starlark_module]
pub fn register_engine_globals(builder: &mut GlobalsBuilder) {
    /// Requests `function`'s value for `key` from the engine. Returns
    /// the decoded value if it has already settled; otherwise aborts
    /// this Starlark evaluation with the non-catchable
    /// missing-dependency signal (spec §4.6's "Interplay with
    /// Starlark").
    fn get_dependency<'v>(function: &str, key: Value<'v>, eval: &mut Evaluator<'v, '_>) -> anyhow::Result<Value<'v>> {
        let extra = current_extra(eval)?;
        let encoded_key = value_codec::to_encoded(key)?;
        match extra.get_dependency(function, &encoded_key)? {
            Some(value) => Ok(value_codec::from_encoded(&value, eval.heap())),
            None => Err(MissingDependencySignal { function: function.to_string() }.into()),
        }
    }
}
