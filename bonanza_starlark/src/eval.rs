use starlark::environment::Globals;
use starlark::environment::GlobalsBuilder;
use starlark::environment::Module;
use starlark::eval::Evaluator;
use starlark::syntax::AstModule;
use starlark::syntax::Dialect;

use crate::context::is_missing_dependency;
use crate::context::EngineExtra;
use crate::globals::register_engine_globals;
use crate::resolver::DependencyResolver;

/// The outcome of evaluating one Starlark module against a
/// [`DependencyResolver`] (spec §4.6's "Interplay with Starlark").
pub enum ModuleOutcome {
    /// The module ran to completion. `read_set` lists every dependency
    /// it successfully read, in read order (spec §12).
    Complete { read_set: Vec<(String, crate::value_codec::EncodedValue)> },
    /// The module aborted on an unset dependency read; the engine
    /// should re-run this evaluation once every entry the caller has
    /// already recorded as requested has settled.
    MissingDependency { function: String },
}

/// Builds the global environment every Bonanza Starlark evaluation gets:
/// the language's own builtins plus [`register_engine_globals`].
pub fn bonanza_globals() -> Globals {
    GlobalsBuilder::extended().with(register_engine_globals).build()
}

/// Parses and evaluates `source` as one Starlark module (spec §4.6),
/// threading `resolver` through as this thread's [`EngineExtra`]. Per
/// spec §1's non-goal "defining the surface Starlark language", the
/// dialect is the language's standard one, unmodified.
pub fn evaluate_module(name: &str, source: &str, globals: &Globals, resolver: &dyn DependencyResolver) -> anyhow::Result<ModuleOutcome> {
    let ast = AstModule::parse(name, source.to_owned(), &Dialect::Standard)?;
    let module = Module::new();
    let extra = EngineExtra::new(resolver);

    let mut eval = Evaluator::new(&module);
    eval.extra = Some(&extra);

    match eval.eval_module(ast, globals) {
        Ok(_) => Ok(ModuleOutcome::Complete { read_set: extra.read_set() }),
        Err(err) => {
            if is_missing_dependency(&err) {
                let function = missing_dependency_function(&err).unwrap_or_default();
                Ok(ModuleOutcome::MissingDependency { function })
            } else {
                Err(err)
            }
        }
    }
}

fn missing_dependency_function(err: &anyhow::Error) -> Option<String> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<crate::context::MissingDependencySignal>())
        .map(|signal| signal.function.clone())
}
