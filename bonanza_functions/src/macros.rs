/// Mechanically produces a `Computer` facade from a declarative function
/// schema (spec §4.7). For each function it declares:
///
/// - the function's key type (one field per listed argument), with the
///   `bonanza_engine::Key` impl wired up (`Display` via `Debug`,
///   structural `equality`);
/// - a method on the generated computer struct that builds the key and
///   calls `engine.evaluate` on it;
/// - an entry in the computer's `schema()` table recording the
///   function's declared `depends_on` set.
///
/// This reproduces, mechanically, the hand-written
/// `Key`-struct-plus-`HasXComputation`-trait pattern `dice`'s own
/// top-level documentation shows as the idiomatic way to register a
/// computation; the schema adds the static dependency declaration spec
/// §4.7 asks for, which plain `dice` usage leaves implicit in the body.
///
/// Every function body receives two bindings (named by the caller): the
/// key (`&KeyType`, to read its fields) and the environment (`&Environment`,
/// to request dependencies). It must return `Result<Value, EngineError>`.
///
/// Crates that invoke this macro must depend directly on `allocative`,
/// `async_trait`, and `bonanza_engine`: the expansion references them by
/// absolute path rather than through `$crate`, since the generated key
/// types belong to the invoking crate, not to `bonanza_functions`.
#[macro_export]
macro_rules! define_computer {
    (
        $vis:vis struct $computer:ident;
        $(
            key $key:ident { $($field:ident : $field_ty:ty),* $(,)? }
            value $value:ty
            depends_on [ $($dep:ident),* $(,)? ]
            fn $fn_name:ident ( $key_arg:ident, $env_arg:ident ) $body:block
        )*
    ) => {
        $(
            #[derive(Clone, Debug, PartialEq, Eq, Hash, ::allocative::Allocative)]
            $vis struct $key { $(pub $field: $field_ty),* }

            impl ::std::fmt::Display for $key {
                fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                    ::std::write!(f, "{:?}", self)
                }
            }

            #[::async_trait::async_trait]
            impl ::bonanza_engine::Key for $key {
                type Value = $value;

                async fn compute(
                    &self,
                    env: &::bonanza_engine::Environment,
                ) -> ::std::result::Result<$value, ::bonanza_engine::EngineError> {
                    let $key_arg = self;
                    let $env_arg = env;
                    $body
                }

                fn equality(x: &$value, y: &$value) -> bool {
                    x == y
                }
            }
        )*

        $vis struct $computer {
            engine: ::std::sync::Arc<::bonanza_engine::Engine>,
        }

        impl $computer {
            pub fn new(engine: ::std::sync::Arc<::bonanza_engine::Engine>) -> Self {
                $computer { engine }
            }

            /// The statically declared function schema (spec §4.7).
            pub fn schema() -> &'static [$crate::FunctionSchema] {
                &[
                    $(
                        $crate::FunctionSchema {
                            name: ::std::stringify!($fn_name),
                            depends_on: &[$(::std::stringify!($dep)),*],
                        },
                    )*
                ]
            }

            $(
                pub async fn $fn_name(
                    &self,
                    $($field: $field_ty),*
                ) -> ::std::result::Result<$value, ::bonanza_engine::EngineError> {
                    self.engine.evaluate($key { $($field),* }).await
                }
            )*
        }
    };
}
