//! `if`/`while`/`foreach`/`fn`/`do`/`with-log` (`spec.md` §4.3, §4.5).
//!
//! These are reserved special-form heads, not scope bindings: unlike the
//! rest of the stdlib they need access to their arguments' raw, unevaluated
//! `Term`s (a loop body must not run before the loop decides to run it), so
//! `eval_expr` recognizes and dispatches them directly rather than looking
//! them up as callables. There is nothing to register here; the module
//! exists so callers of every `<name>::install` are uniform.

use crate::scope::ScopeRef;

pub(crate) fn install(_root: &ScopeRef) {}
