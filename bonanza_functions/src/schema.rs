/// One entry of a `define_computer!`-generated function schema (spec
/// §4.7): a function's name and the set of other functions it is
/// statically declared to depend on. Purely descriptive -- the engine
/// does not enforce that a function only calls `env.get` for keys
/// listed here, but `bonanza_computer`'s dependency-graph tooling uses
/// this to render and sanity-check the computer's shape without having
/// to execute it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FunctionSchema {
    pub name: &'static str,
    pub depends_on: &'static [&'static str],
}
