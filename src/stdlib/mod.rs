//! Standard-library primitives registered into a root scope (`spec.md`
//! §4.5).
//!
//! One file per concern, mirroring `ouros::modules`'s per-module layout —
//! the difference being these primitives are flat bindings in the root
//! scope rather than attributes of an importable module object, since SLIP
//! has no import system of its own (`spec.md` Non-goals).

use crate::function::NativeFunction;
use crate::scope::{self, ScopeRef};
use crate::value::Value;

pub(crate) mod arithmetic;
pub(crate) mod concurrency;
pub(crate) mod containers;
pub(crate) mod control_flow;
pub(crate) mod effects;
pub(crate) mod introspection;
pub(crate) mod metaprog;
pub(crate) mod objects;

/// Registers every mandatory stdlib primitive into `root`
/// (`spec.md` §4.5).
pub(crate) fn install(root: &ScopeRef) {
    arithmetic::install(root);
    concurrency::install(root);
    containers::install(root);
    control_flow::install(root);
    effects::install(root);
    introspection::install(root);
    metaprog::install(root);
    objects::install(root);
}

pub(crate) fn bind_native(scope: &ScopeRef, name: &'static str, min_arity: usize, variadic: bool, func: crate::function::NativeFn) {
    scope::set_local(
        scope,
        name,
        Value::Native(std::rc::Rc::new(NativeFunction {
            name,
            min_arity,
            variadic,
            func,
        })),
    );
}
