//! Multi-method dispatch: arity tiering, guard evaluation, annotation
//! coverage scoring, `core-<name>` fallback (`spec.md` §4.4).
//!
//! Grounded on `slip_interpreter.py`'s `_annotation_applicability_and_coverage`
//! scoring family: each candidate method is scored for *applicability*
//! (would it even accept these arguments) and *coverage* (how specifically
//! it was written for this shape of argument), and the most specific
//! applicable, guard-satisfying method wins; remaining ties are an error.

use std::rc::Rc;

use crate::ast::SigAst;
use crate::error::{EvalResult, SlipError};
use crate::eval::{self, Evaluator};
use crate::function::{GenericFunction, SlipFunction};
use crate::scope::{self, ScopeRef};
use crate::value::Value;

/// What `select_method` resolved a call to: a method clause ready to bind
/// and run, or a `core-<name>` callable to fall back to when every tier
/// came up empty (`spec.md` §4.4 step 8).
pub(crate) enum Selected {
    Method(Rc<SlipFunction>),
    Fallback(Value),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Score {
    guarded: bool,
    coverage: f64,
    detail: usize,
    family: usize,
}

impl Score {
    /// `spec.md` §4.4 step 7 tie-break order: coverage, then guarded-over-
    /// unguarded, then detail count, then family size.
    fn better_than(&self, other: &Score) -> bool {
        if self.coverage != other.coverage {
            return self.coverage > other.coverage;
        }
        if self.guarded != other.guarded {
            return self.guarded;
        }
        if self.detail != other.detail {
            return self.detail > other.detail;
        }
        self.family > other.family
    }

    fn ties_with(&self, other: &Score) -> bool {
        self.coverage == other.coverage && self.guarded == other.guarded && self.detail == other.detail && self.family == other.family
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tier {
    Exact,
    Variadic,
    Untyped,
}

fn sig_is_typed(sig: &SigAst) -> bool {
    !(sig.positional.is_empty() && sig.keywords.is_empty() && sig.rest.is_none())
}

/// `spec.md` §4.4 step 1: exact (typed Sig, no rest, `len == N`), variadic
/// (typed Sig with rest, `N >= base arity`), untyped (no Sig or empty Sig,
/// gated on the method's own binding arity instead).
fn method_tier(method: &SlipFunction, arg_count: usize) -> Option<Tier> {
    match &method.meta.type_sig {
        Some(sig) if sig_is_typed(sig) => {
            let base = sig.positional.len() + sig.keywords.len();
            if sig.rest.is_some() {
                (arg_count >= base).then_some(Tier::Variadic)
            } else {
                (arg_count == base).then_some(Tier::Exact)
            }
        }
        _ => {
            let (count, variadic) = method.params.arity();
            let ok = if variadic { arg_count >= count } else { arg_count == count };
            ok.then_some(Tier::Untyped)
        }
    }
}

/// Picks the best-matching method from `generic` for `args`, or a
/// `core-<name>` fallback if no method qualifies (`spec.md` §4.4).
pub(crate) fn select_method(evaluator: &mut Evaluator, call_scope: &ScopeRef, generic: &GenericFunction, args: &[Value]) -> EvalResult<Selected> {
    let methods: Vec<Rc<SlipFunction>> = generic.methods.borrow().clone();

    for tier in [Tier::Exact, Tier::Variadic, Tier::Untyped] {
        let pairs: Vec<(Rc<SlipFunction>, Vec<Value>)> = methods
            .iter()
            .filter(|m| method_tier(m, args.len()) == Some(tier))
            .map(|m| (Rc::clone(m), args.to_vec()))
            .collect();
        if pairs.is_empty() {
            continue;
        }
        let scored = score_all(evaluator, &pairs)?;
        if let Some(method) = pick_best(generic, scored)? {
            return Ok(Selected::Method(method));
        }
    }

    // `spec.md` §4.4 step 5: a typed exact method with more parameters than
    // the call supplied args still qualifies if the extra trailing args are
    // dropped.
    let lenient_pairs: Vec<(Rc<SlipFunction>, Vec<Value>)> = methods
        .iter()
        .filter_map(|m| {
            let sig = m.meta.type_sig.as_ref()?;
            if !sig_is_typed(sig) || sig.rest.is_some() {
                return None;
            }
            let base = sig.positional.len() + sig.keywords.len();
            (base < args.len()).then(|| (Rc::clone(m), args[..base].to_vec()))
        })
        .collect();
    if !lenient_pairs.is_empty() {
        let scored = score_all(evaluator, &lenient_pairs)?;
        if let Some(method) = pick_best(generic, scored)? {
            return Ok(Selected::Method(method));
        }
    }

    fallback_by_name(call_scope, generic)
}

fn score_all(evaluator: &mut Evaluator, pairs: &[(Rc<SlipFunction>, Vec<Value>)]) -> EvalResult<Vec<(Score, Rc<SlipFunction>)>> {
    let mut scored = Vec::new();
    for (method, args) in pairs {
        let guarded = !method.meta.guards.is_empty();
        if guarded && !guards_pass(evaluator, method, args)? {
            continue;
        }
        let score = score_candidate(evaluator, method, args, guarded)?;
        scored.push((score, Rc::clone(method)));
    }
    Ok(scored)
}

fn pick_best(generic: &GenericFunction, scored: Vec<(Score, Rc<SlipFunction>)>) -> EvalResult<Option<Rc<SlipFunction>>> {
    let mut best: Option<(Score, Rc<SlipFunction>)> = None;
    let mut tie = false;
    for (score, method) in scored {
        match &best {
            None => best = Some((score, method)),
            Some((best_score, _)) => {
                if score.better_than(best_score) {
                    best = Some((score, method));
                    tie = false;
                } else if score.ties_with(best_score) {
                    tie = true;
                }
            }
        }
    }
    let Some((_, method)) = best else {
        return Ok(None);
    };
    if tie {
        return Err(SlipError::ambiguous_method_call(generic.name.as_deref().unwrap_or("<anonymous>")));
    }
    Ok(Some(method))
}

/// `spec.md` §4.4 step 8: a `GenericFunction` with a name falls back to a
/// `core-<name>` binding visible at the call site when no tier produced a
/// candidate.
fn fallback_by_name(call_scope: &ScopeRef, generic: &GenericFunction) -> EvalResult<Selected> {
    if let Some(name) = &generic.name {
        if let Some(callee) = scope::try_get(call_scope, &format!("core-{name}")) {
            return Ok(Selected::Fallback(callee));
        }
    }
    Err(SlipError::no_matching_method(generic.name.as_deref().unwrap_or("<anonymous>")))
}

/// `spec.md` §4.4 step 3: a method is a candidate only if every recorded
/// guard expression evaluates truthy with the call's arguments bound by
/// parameter/Sig name in a child of the method's closure.
fn guards_pass(evaluator: &mut Evaluator, method: &SlipFunction, args: &[Value]) -> EvalResult<bool> {
    if method.meta.guards.is_empty() {
        return Ok(true);
    }
    let guard_scope = scope::new_scope_with_parent(Rc::clone(&method.closure));
    bind_args_for_guard(method, args, &guard_scope);
    for guard in &method.meta.guards {
        if !eval::eval_expr(evaluator, guard, &guard_scope)?.is_truthy() {
            return Ok(false);
        }
    }
    Ok(true)
}

fn bind_args_for_guard(method: &SlipFunction, args: &[Value], scope: &ScopeRef) {
    if let Some(sig) = &method.meta.type_sig {
        bind_sig_names(sig, args, scope);
        return;
    }
    match &method.params {
        crate::function::ParamSpec::Names(names) => {
            for (i, name) in names.iter().enumerate() {
                scope::set_local(scope, name, args.get(i).cloned().unwrap_or(Value::Null));
            }
        }
        crate::function::ParamSpec::Sig(sig) => bind_sig_names(sig, args, scope),
    }
}

fn bind_sig_names(sig: &SigAst, args: &[Value], scope: &ScopeRef) {
    let mut idx = 0;
    for name in &sig.positional {
        scope::set_local(scope, name, args.get(idx).cloned().unwrap_or(Value::Null));
        idx += 1;
    }
    for (name, _annotation) in &sig.keywords {
        scope::set_local(scope, name, args.get(idx).cloned().unwrap_or(Value::Null));
        idx += 1;
    }
    if let Some(rest) = &sig.rest {
        let remaining = args.get(idx..).map(<[Value]>::to_vec).unwrap_or_default();
        scope::set_local(scope, rest, Value::list(remaining));
    }
}

/// `spec.md` §4.4 step 6: sums each argument's coverage of its keyword
/// annotation (positional-named slots carry no annotation and contribute
/// nothing). Guarded status, detail, and family-size accumulate alongside
/// coverage for the tie-break in `Score::better_than`.
fn score_candidate(evaluator: &mut Evaluator, method: &SlipFunction, args: &[Value], guarded: bool) -> EvalResult<Score> {
    let mut coverage = 0.0;
    let mut detail = 0;
    let mut family = 0;
    if let Some(sig) = &method.meta.type_sig {
        for (i, arg) in args.iter().enumerate() {
            if i < sig.positional.len() {
                continue;
            }
            let Some((_, expr)) = sig.keywords.get(i - sig.positional.len()) else {
                continue;
            };
            let annotation = eval::eval_expr(evaluator, expr, &method.closure)?;
            let (c, d, f) = annotation_coverage(&annotation, arg);
            coverage += c;
            detail += d;
            family += f;
        }
    }
    Ok(Score { guarded, coverage, detail, family })
}

/// Matches one evaluated annotation value against an argument's runtime
/// value, returning `(coverage, detail, family-size)` (`spec.md` §4.4 step
/// 6): a primitive name is an exact `primitive_name()` match; a Scope
/// annotation checks the argument's family against the target's identity; a
/// Sig annotation acts as a union over its positional names; `('and', [...])`
/// / `('union', [...])` combine nested annotations.
fn annotation_coverage(annotation: &Value, arg: &Value) -> (f64, usize, usize) {
    match annotation {
        Value::Str(name) => {
            if arg.primitive_name() == &**name {
                (1.0, 1, 1)
            } else {
                (0.0, 1, 1)
            }
        }
        Value::Scope(target) => {
            let Value::Scope(arg_scope) = arg else {
                return (0.0, 1, 1);
            };
            let arg_family = scope::family(arg_scope);
            let size = arg_family.len().max(1);
            if arg_family.contains(&scope::scope_id(target)) {
                (1.0, size, size)
            } else {
                (0.0, size, size)
            }
        }
        Value::Sig(sig) => {
            let size = sig.positional.len().max(1);
            let matched = sig.positional.iter().any(|name| arg.primitive_name() == name.as_str());
            (if matched { 1.0 } else { 0.0 }, sig.positional.len(), size)
        }
        Value::List(items) => {
            let snapshot = items.borrow().clone();
            match snapshot.as_slice() {
                [Value::Str(tag), Value::List(branches)] if &**tag == "and" => {
                    let branches = branches.borrow().clone();
                    let mut coverage = 0.0;
                    let mut detail = 0;
                    let mut family = 0;
                    let mut all_matched = true;
                    for branch in &branches {
                        let (c, d, f) = annotation_coverage(branch, arg);
                        if c <= 0.0 {
                            all_matched = false;
                        }
                        coverage += c;
                        detail += d;
                        family += f;
                    }
                    if all_matched {
                        (coverage, detail, family)
                    } else {
                        (0.0, detail, family)
                    }
                }
                [Value::Str(tag), Value::List(branches)] if &**tag == "union" => {
                    let branches = branches.borrow().clone();
                    branches
                        .iter()
                        .map(|b| annotation_coverage(b, arg))
                        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap())
                        .unwrap_or((0.0, 0, 0))
                }
                _ => (0.0, 0, 0),
            }
        }
        _ => (0.0, 0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{FunctionMeta, ParamSpec};

    fn make_method(arity: usize, type_sig: Option<Rc<SigAst>>) -> Rc<SlipFunction> {
        Rc::new(SlipFunction {
            name: Some("greet".to_owned()),
            closure: scope::new_scope(),
            params: ParamSpec::Names((0..arity).map(|i| format!("a{i}")).collect()),
            body: crate::ast::CodeData::new(vec![]),
            meta: FunctionMeta {
                type_sig,
                examples: vec![],
                guards: vec![],
            },
        })
    }

    fn typed_sig(keywords: Vec<(&str, Value)>) -> Rc<SigAst> {
        Rc::new(SigAst {
            positional: vec![],
            keywords: keywords
                .into_iter()
                .map(|(name, literal)| (name.to_owned(), vec![crate::ast::Term::Opaque(literal)]))
                .collect(),
            rest: None,
            return_annotation: None,
        })
    }

    #[test]
    fn arity_mismatch_is_excluded() {
        let mut evaluator = Evaluator::new();
        let call_scope = scope::new_scope();
        let generic = GenericFunction::new(Some("greet".to_owned()));
        generic.methods.borrow_mut().push(make_method(1, None));
        generic.methods.borrow_mut().push(make_method(2, None));
        let Selected::Method(chosen) = select_method(&mut evaluator, &call_scope, &generic, &[Value::Int(1), Value::Int(2)]).unwrap() else {
            panic!("expected a method, not a fallback");
        };
        assert_eq!(chosen.params.arity().0, 2);
    }

    #[test]
    fn typed_sig_outranks_untyped_method_of_same_arity() {
        let mut evaluator = Evaluator::new();
        let call_scope = scope::new_scope();
        let generic = GenericFunction::new(Some("greet".to_owned()));
        generic.methods.borrow_mut().push(make_method(1, None));
        let sig = typed_sig(vec![("a0", Value::str("string"))]);
        generic.methods.borrow_mut().push(make_method(1, Some(sig)));
        let Selected::Method(chosen) = select_method(&mut evaluator, &call_scope, &generic, &[Value::str("hi")]).unwrap() else {
            panic!("expected a method, not a fallback");
        };
        assert!(chosen.meta.type_sig.is_some());
    }

    #[test]
    fn unsatisfied_guard_excludes_a_candidate() {
        let mut evaluator = Evaluator::new();
        let call_scope = scope::new_scope();
        let generic = GenericFunction::new(Some("greet".to_owned()));
        let guarded = Rc::new(SlipFunction {
            name: Some("greet".to_owned()),
            closure: scope::new_scope(),
            params: ParamSpec::Names(vec!["n".to_owned()]),
            body: crate::ast::CodeData::new(vec![]),
            meta: FunctionMeta {
                type_sig: None,
                examples: vec![],
                guards: vec![vec![crate::ast::Term::Opaque(Value::Bool(false))]],
            },
        });
        generic.methods.borrow_mut().push(guarded);
        generic.methods.borrow_mut().push(make_method(1, None));
        let Selected::Method(chosen) = select_method(&mut evaluator, &call_scope, &generic, &[Value::Int(1)]).unwrap() else {
            panic!("expected a method, not a fallback");
        };
        assert!(chosen.meta.guards.is_empty());
    }

    #[test]
    fn no_candidate_falls_back_to_core_name_binding() {
        let mut evaluator = Evaluator::new();
        let call_scope = scope::new_scope();
        scope::set_local(&call_scope, "core-greet", Value::Int(42));
        let generic = GenericFunction::new(Some("greet".to_owned()));
        generic.methods.borrow_mut().push(make_method(1, None));
        let Selected::Fallback(value) = select_method(&mut evaluator, &call_scope, &generic, &[]).unwrap() else {
            panic!("expected a fallback");
        };
        assert_eq!(value, Value::Int(42));
    }
}
