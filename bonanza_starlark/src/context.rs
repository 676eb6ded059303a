use std::cell::RefCell;
use std::fmt;

use crate::resolver::DependencyResolver;
use crate::value_codec::EncodedValue;

/// Marks a type installable as a Starlark evaluator's `extra` state and
/// names what evaluating a module through it ultimately produces.
/// Mirrors the role of the teacher's own `buck2_interpreter::extra::ExtraContext`
/// (see `ModuleInternals`'s `impl ExtraContext for ModuleInternals`),
/// which this crate has no counterpart import for since the concrete
/// evaluation result here is just the engine-level read-set, not a
/// target graph.
pub trait ExtraContext {
    type EvalResult;
}

/// Thread-local evaluation state installed on a Starlark `Evaluator` via
/// its `extra` slot (spec §4.6 "Starlark-level code invokes
/// `env.Get<K>Value` via thread locals"). Ports the role of
/// `ModuleInternals` in the teacher: the one place built-in functions
/// reach to get at anything outside the Starlark value universe.
pub struct EngineExtra<'a> {
    resolver: &'a dyn DependencyResolver,
    /// Every `(function, key)` pair this evaluation has successfully
    /// read, for the same introspection purpose `Environment::read_set`
    /// serves at the Rust layer (spec §12). A single Starlark module
    /// evaluation runs on one thread, so `RefCell` (not a lock) is
    /// enough -- the same tradeoff `ModuleInternals` makes for its own
    /// interior-mutable fields.
    read_set: RefCell<Vec<(String, EncodedValue)>>,
}

impl<'a> EngineExtra<'a> {
    pub fn new(resolver: &'a dyn DependencyResolver) -> Self {
        EngineExtra { resolver, read_set: RefCell::new(Vec::new()) }
    }

    /// Looks up `function(key)`. On a settled read, records it in the
    /// read-set and returns the value. On "unset", returns `None` --
    /// callers raise [`MissingDependencySignal`] to abort the
    /// evaluation, the same role `Environment::get`'s
    /// `Err(EngineError::MissingDependency)` plays at the Rust layer.
    pub fn get_dependency(&self, function: &str, key: &EncodedValue) -> anyhow::Result<Option<EncodedValue>> {
        match self.resolver.resolve(function, key)? {
            Some(value) => {
                self.read_set.borrow_mut().push((function.to_string(), key.clone()));
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn read_set(&self) -> Vec<(String, EncodedValue)> {
        self.read_set.borrow().clone()
    }
}

impl ExtraContext for EngineExtra<'_> {
    type EvalResult = ();
}

/// The "non-catchable runtime error" spec §4.6 requires: raised by a
/// dependency-reading builtin on an unset read, propagated through
/// Starlark's `anyhow::Error` channel unchanged, and recognised by
/// [`crate::eval::evaluate_module`] by downcasting the returned error
/// rather than by any ordinary Starlark `fail()`/exception mechanism --
/// Starlark code cannot `catch` it because nothing in the evaluated
/// program can construct or match this type.
#[derive(Debug)]
pub struct MissingDependencySignal {
    pub function: String,
}

impl fmt::Display for MissingDependencySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing dependency: {}", self.function)
    }
}

impl std::error::Error for MissingDependencySignal {}

/// True if `err`'s root cause is a [`MissingDependencySignal`] raised by
/// this crate's own builtins, as opposed to any other Starlark
/// evaluation failure.
pub fn is_missing_dependency(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.downcast_ref::<MissingDependencySignal>().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;

    #[test]
    fn get_dependency_records_the_read_set_only_on_a_settled_read() {
        let resolver = StaticResolver::new(|function, _key| match function {
            "ready" => Ok(Some(EncodedValue::Int(1))),
            "pending" => Ok(None),
            other => panic!("unexpected function {other}"),
        });
        let extra = EngineExtra::new(&resolver);

        assert_eq!(extra.get_dependency("ready", &EncodedValue::None).unwrap(), Some(EncodedValue::Int(1)));
        assert_eq!(extra.get_dependency("pending", &EncodedValue::None).unwrap(), None);

        let read_set = extra.read_set();
        assert_eq!(read_set.len(), 1);
        assert_eq!(read_set[0].0, "ready");
    }

    #[test]
    fn missing_dependency_signal_is_detected_through_an_error_chain() {
        let inner: anyhow::Error = MissingDependencySignal { function: "line_count".to_string() }.into();
        let wrapped = inner.context("while evaluating a rule");
        assert!(is_missing_dependency(&wrapped));

        let unrelated = anyhow::anyhow!("some other failure");
        assert!(!is_missing_dependency(&unrelated));
    }
}
