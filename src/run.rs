//! Public `Runner` API: run a semantic AST to completion, publish the
//! top-level `outcome` binding and `stderr` effect (`spec.md` §7).
//!
//! Grounded on `ouros::run::Runner`: a small owning wrapper around the
//! evaluator that takes host-level `Object` inputs and returns host-level
//! `Object` outputs, so embedders never touch `ScopeRef`/`Value` directly.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::CodeData;
use crate::capability::CapabilitySet;
use crate::error::SlipError;
use crate::eval::{self, Evaluator};
use crate::object::Object;
use crate::resource::{ResourceLimits, ResourceTracker};
use crate::scope::{self, ScopeRef};
use crate::tracer::Tracer;
use crate::value::Value;

/// One top-level run's outcome, mirrored into the root scope's `outcome`
/// binding after evaluation finishes (`spec.md` §7).
#[derive(Debug, Clone)]
pub struct Outcome {
    pub ok: bool,
    pub value: Object,
    pub error: Option<String>,
}

/// Owns a parsed `Code` value and runs it against a fresh root scope.
pub struct Runner {
    code: Rc<CodeData>,
    capabilities: CapabilitySet,
    limits: ResourceLimits,
    tracer: Box<dyn Tracer>,
}

impl Runner {
    pub fn new(code: Rc<CodeData>) -> Self {
        Self {
            code,
            capabilities: CapabilitySet::default(),
            limits: ResourceLimits::default(),
            tracer: Box::new(crate::tracer::NoopTracer),
        }
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_resource_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_tracer(mut self, tracer: Box<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Runs the code with `inputs` bound into the root scope before
    /// evaluation starts, equivalent to the `run-with` primitive
    /// (`spec.md` §4.5).
    pub fn run_with(self, inputs: IndexMap<String, Object>) -> Outcome {
        let root = scope::new_scope();
        crate::stdlib::install(&root);
        for (name, obj) in inputs {
            scope::set_local(&root, &name, obj.into_value());
        }
        self.run_in(root)
    }

    pub fn run(self) -> Outcome {
        let root = scope::new_scope();
        crate::stdlib::install(&root);
        self.run_in(root)
    }

    fn run_in(self, root: ScopeRef) -> Outcome {
        let mut evaluator = Evaluator::new()
            .with_tracer(self.tracer)
            .with_resources(ResourceTracker::new(self.limits))
            .with_capabilities(self.capabilities);

        let outcome = match eval::eval_code(&mut evaluator, &self.code, &root) {
            Ok(value) => {
                let value = eval::unwrap_return(value);
                Outcome {
                    ok: true,
                    value: Object::from_value(&value),
                    error: None,
                }
            }
            Err(err) => {
                evaluator.tracer.on_effect("stderr", &err.formatted());
                Outcome {
                    ok: false,
                    value: Object::Null,
                    error: Some(err.formatted()),
                }
            }
        };
        publish_outcome(&root, &outcome);
        outcome
    }
}

/// Binds the run's `{status, value}` shape into the root scope's `outcome`
/// key, in the format the `do`/`with-log` primitives also produce
/// (`spec.md` §7).
fn publish_outcome(root: &ScopeRef, outcome: &Outcome) {
    let mut map = IndexMap::new();
    map.insert("status".to_owned(), Value::str(if outcome.ok { "ok" } else { "err" }));
    map.insert("value".to_owned(), outcome.value.clone().into_value());
    if let Some(err) = &outcome.error {
        map.insert("error".to_owned(), Value::str(err.clone()));
    }
    scope::set_local(root, "outcome", Value::dict(map));
}

/// Wraps a `do [...]`-style body evaluation, capturing any error as an
/// `{status: "error", value, error}` dict rather than propagating it
/// (`spec.md` §4.5 `do`, `with-log`).
pub(crate) fn run_capturing(evaluator: &mut Evaluator, code: &Rc<CodeData>, scope: &ScopeRef) -> Value {
    match eval::eval_code(evaluator, code, scope) {
        Ok(value) => {
            let mut map = IndexMap::new();
            map.insert("status".to_owned(), Value::str("ok"));
            map.insert("value".to_owned(), eval::unwrap_return(value));
            Value::dict(map)
        }
        Err(err) => error_outcome(evaluator, &err),
    }
}

fn error_outcome(evaluator: &mut Evaluator, err: &SlipError) -> Value {
    evaluator.tracer.on_effect("stderr", &err.formatted());
    let mut map = IndexMap::new();
    map.insert("status".to_owned(), Value::str("err"));
    map.insert("value".to_owned(), Value::Null);
    map.insert("error".to_owned(), Value::str(err.formatted()));
    Value::dict(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{PathAst, PathKind, Segment, Term};

    #[test]
    fn successful_run_publishes_ok_outcome() {
        let code = CodeData::new(vec![vec![Term::Int(42)]]);
        let outcome = Runner::new(code).run();
        assert!(outcome.ok);
        assert_eq!(outcome.value, Object::Int(42));
    }

    #[test]
    fn run_with_binds_inputs_before_evaluating() {
        let path = PathAst::new(PathKind::Get, vec![Segment::Name("x".to_owned())]);
        let code = CodeData::new(vec![vec![Term::Path(Rc::new(path))]]);
        let mut inputs = IndexMap::new();
        inputs.insert("x".to_owned(), Object::Int(7));
        let outcome = Runner::new(code).run_with(inputs);
        assert!(outcome.ok);
        assert_eq!(outcome.value, Object::Int(7));
    }
}
