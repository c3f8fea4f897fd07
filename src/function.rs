//! Function values: `SlipFunction`, `GenericFunction`, native primitives
//! (`spec.md` §3, §4.4).

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{CodeData, Expr, SigAst, Term};
use crate::error::EvalResult;
use crate::eval::{self, Evaluator};
use crate::scope::ScopeRef;
use crate::value::Value;

/// `fn {a, b} [ ... ]` may declare parameters either as a typed `Sig` or as
/// a bare `Code` of parameter names (`spec.md` §3 Function).
#[derive(Debug, Clone)]
pub(crate) enum ParamSpec {
    Sig(Rc<SigAst>),
    Names(Vec<String>),
}

impl ParamSpec {
    pub fn arity(&self) -> (usize, bool) {
        match self {
            Self::Sig(sig) => (sig.positional.len() + sig.keywords.len(), sig.rest.is_some()),
            Self::Names(names) => (names.len(), false),
        }
    }
}

/// One `|example { a: 2, b: 3 -> 5 }` attached to a function.
#[derive(Debug, Clone)]
pub(crate) struct Example {
    pub bindings: Vec<(String, Expr)>,
    pub result: Expr,
}

/// `meta` bag fields relevant to dispatch and introspection
/// (`spec.md` §3 Function, §4.4).
#[derive(Debug, Clone, Default)]
pub(crate) struct FunctionMeta {
    /// The typed `Sig` used for dispatch tiering, either authored directly
    /// or synthesized from `examples` (`spec.md` §4.4 "Example-driven
    /// synthesis").
    pub type_sig: Option<Rc<SigAst>>,
    pub examples: Vec<Example>,
    pub guards: Vec<Expr>,
}

/// A single compiled method (`spec.md` §3 SlipFunction).
#[derive(Debug, Clone)]
pub(crate) struct SlipFunction {
    pub name: Option<String>,
    pub closure: ScopeRef,
    pub params: ParamSpec,
    pub body: Rc<CodeData>,
    pub meta: FunctionMeta,
}

/// An ordered bundle of methods sharing a name, dispatched by arity/type/
/// guard (`spec.md` §3 GenericFunction, §4.4).
#[derive(Debug)]
pub(crate) struct GenericFunction {
    pub name: Option<String>,
    pub methods: RefCell<Vec<Rc<SlipFunction>>>,
    pub examples: RefCell<Vec<Example>>,
}

impl GenericFunction {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            methods: RefCell::new(Vec::new()),
            examples: RefCell::new(Vec::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum FunctionValue {
    Slip(Rc<SlipFunction>),
    Generic(Rc<GenericFunction>),
}

impl FunctionValue {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Slip(f) => f.name.as_deref(),
            Self::Generic(g) => g.name.as_deref(),
        }
    }

    /// True if at least one method accepts zero arguments without being
    /// variadic (`spec.md` §4.3 "Auto-invocation of zero-arity callables").
    pub fn has_zero_arity_method(&self) -> bool {
        match self {
            Self::Slip(f) => matches!(f.params.arity(), (0, false)),
            Self::Generic(g) => g
                .methods
                .borrow()
                .iter()
                .any(|m| matches!(m.params.arity(), (0, false))),
        }
    }
}

pub(crate) type NativeFn = fn(&mut Evaluator, &ScopeRef, Vec<Value>) -> EvalResult<Value>;

/// A Rust-implemented standard-library primitive, callable the same way a
/// `SlipFunction` is (`spec.md` §4.5).
pub(crate) struct NativeFunction {
    pub name: &'static str,
    pub min_arity: usize,
    pub variadic: bool,
    pub func: NativeFn,
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction").field("name", &self.name).finish()
    }
}

impl NativeFunction {
    pub fn has_zero_arity(&self) -> bool {
        self.min_arity == 0 && !self.variadic
    }
}

/// Merges `new_method` into the `GenericFunction` named `name` found (or
/// created) in `scope`, per `spec.md` §4.3 "Function binding".
pub(crate) fn merge_into_generic(existing: Option<Value>, name: &str, new_method: Rc<SlipFunction>) -> Rc<GenericFunction> {
    let generic = match existing {
        Some(Value::Function(FunctionValue::Generic(g))) => g,
        _ => Rc::new(GenericFunction::new(Some(name.to_owned()))),
    };
    generic.methods.borrow_mut().push(new_method);
    generic
}

/// `spec.md` §4.4 "Example-driven synthesis": when `method` carries
/// `meta.examples` and no typed Sig, derives one typed clone per example by
/// evaluating each sample binding (in the method's closure, falling back to
/// `call_scope` if the closure doesn't resolve it) and inferring its
/// primitive name. Returns nothing for an already-typed or example-less
/// method.
pub(crate) fn synthesize_examples(evaluator: &mut Evaluator, method: &Rc<SlipFunction>, call_scope: &ScopeRef) -> EvalResult<Vec<Rc<SlipFunction>>> {
    if method.meta.type_sig.is_some() || method.meta.examples.is_empty() {
        return Ok(Vec::new());
    }
    let mut clones = Vec::with_capacity(method.meta.examples.len());
    for example in &method.meta.examples {
        let mut keywords = Vec::with_capacity(example.bindings.len());
        for (name, sample_expr) in &example.bindings {
            let sample = match eval::eval_expr(evaluator, sample_expr, &method.closure) {
                Ok(v) => v,
                Err(_) => eval::eval_expr(evaluator, sample_expr, call_scope)?,
            };
            keywords.push((name.clone(), vec![Term::Opaque(Value::str(sample.primitive_name()))]));
        }
        let sig = Rc::new(SigAst {
            positional: Vec::new(),
            keywords,
            rest: None,
            return_annotation: None,
        });
        let mut clone = (**method).clone();
        clone.meta.type_sig = Some(sig);
        clones.push(Rc::new(clone));
    }
    Ok(clones)
}

/// Two typed Sigs count as "the same signature" for example-merging if they
/// name the same keyword parameters, in order, with the same inferred
/// primitive-name annotations (`spec.md` §4.4 "Example-driven synthesis").
fn sig_signature_eq(a: &SigAst, b: &SigAst) -> bool {
    a.positional == b.positional
        && a.rest == b.rest
        && a.keywords.len() == b.keywords.len()
        && a.keywords
            .iter()
            .zip(&b.keywords)
            .all(|((name_a, expr_a), (name_b, expr_b))| name_a == name_b && opaque_primitive_name(expr_a) == opaque_primitive_name(expr_b))
}

fn opaque_primitive_name(expr: &Expr) -> Option<Rc<str>> {
    match expr.as_slice() {
        [Term::Opaque(Value::Str(s))] => Some(Rc::clone(s)),
        _ => None,
    }
}

/// Merges synthesized typed clones into `generic`: a clone whose Sig
/// matches an existing method's Sig folds its examples into that method
/// instead of adding a duplicate (`spec.md` §4.4 "Example-driven
/// synthesis").
pub(crate) fn merge_examples_into_generic(generic: &Rc<GenericFunction>, clones: Vec<Rc<SlipFunction>>) {
    let mut methods = generic.methods.borrow_mut();
    for clone in clones {
        let clone_sig = clone.meta.type_sig.as_ref().expect("synthesize_examples always tags a Sig");
        let existing = methods.iter().position(|m| m.meta.type_sig.as_ref().is_some_and(|s| sig_signature_eq(s, clone_sig)));
        match existing {
            Some(idx) => {
                let mut merged = (*methods[idx]).clone();
                merged.meta.examples.extend(clone.meta.examples.iter().cloned());
                methods[idx] = Rc::new(merged);
            }
            None => methods.push(clone),
        }
    }
}
