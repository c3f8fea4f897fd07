//! Metaprogramming, example-driven dispatch helpers, higher-order list
//! operations, and scalar/string utilities (`spec.md` §4.4, §4.5).

use std::rc::Rc;

use crate::ast::{CodeData, PathKind, Segment, SigAst, Term};
use crate::error::{EvalResult, SlipError};
use crate::eval::{self, Evaluator};
use crate::function::{Example, FunctionMeta, FunctionValue, ParamSpec, SlipFunction};
use crate::scope::{self, ScopeRef};
use crate::value::Value;

pub(crate) fn install(root: &ScopeRef) {
    super::bind_native(root, "run", 1, false, run);
    super::bind_native(root, "run-with", 2, false, run_with);
    super::bind_native(root, "inject", 1, false, identity_marker);
    super::bind_native(root, "splice", 1, false, identity_marker);
    super::bind_native(root, "import", 2, false, import);
    super::bind_native(root, "get-body", 1, false, get_body);
    super::bind_native(root, "example", 2, false, example);
    super::bind_native(root, "guard", 2, false, guard);
    super::bind_native(root, "test", 2, false, test);
    super::bind_native(root, "test-all", 1, false, test_all);

    super::bind_native(root, "map", 2, false, map);
    super::bind_native(root, "filter", 2, false, filter);
    super::bind_native(root, "reduce", 2, true, reduce);
    super::bind_native(root, "zip", 2, false, zip);
    super::bind_native(root, "partial", 1, true, partial);
    super::bind_native(root, "compose", 2, false, compose);
    super::bind_native(root, "call", 2, false, call);
    super::bind_native(root, "sort", 1, true, sort);
    super::bind_native(root, "range", 2, true, range);
    super::bind_native(root, "to-path", 1, false, to_path);
    super::bind_native(root, "join", 2, false, join);
    super::bind_native(root, "split", 2, false, split);
    super::bind_native(root, "replace", 3, false, replace);
    super::bind_native(root, "indent", 2, false, indent);
}

fn as_code(value: &Value, what: &str) -> EvalResult<Rc<CodeData>> {
    match value {
        Value::Code(c) => Ok(Rc::clone(c)),
        other => Err(SlipError::type_error(format!("{what} expects a Code argument, got {other}"))),
    }
}

fn as_slip_function(value: &Value, what: &str) -> EvalResult<Rc<SlipFunction>> {
    match value {
        Value::Function(FunctionValue::Slip(f)) => Ok(Rc::clone(f)),
        other => Err(SlipError::type_error(format!("{what} expects a plain function, got {other}"))),
    }
}

/// `run [ ... ]`: evaluates a Code value against the calling scope
/// (`spec.md` §4.5).
fn run(evaluator: &mut Evaluator, scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let code = as_code(&args[0], "run")?;
    eval::eval_code(evaluator, &code, scope)
}

/// `run-with [ ... ] target`: evaluates a Code value with `target` as the
/// lexical scope for its bindings (`spec.md` §4.5, §9 "current-scope inside
/// a run-with body"). `current-scope` still reports whatever scope a native
/// call inside the body actually runs with, i.e. `target` — preserving the
/// reference implementation's caller-reflecting quirk noted in `spec.md` §9
/// would require a separate dynamic-scope channel this evaluator does not
/// carry.
fn run_with(evaluator: &mut Evaluator, _scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let code = as_code(&args[0], "run-with")?;
    let Value::Scope(target) = &args[1] else {
        return Err(SlipError::type_error("run-with expects a scope as its second argument"));
    };
    eval::eval_code(evaluator, &code, target)
}

/// Identity fallback for `inject`/`splice` invoked as ordinary calls rather
/// than encountered as template-expansion term markers (`spec.md` §4.3
/// handles the marker form directly; this binding exists only so the name
/// resolves when called directly, e.g. from a host).
fn identity_marker(_e: &mut Evaluator, _s: &ScopeRef, mut args: Vec<Value>) -> EvalResult<Value> {
    Ok(args.pop().unwrap_or(Value::Null))
}

/// `import key [ ... ]`: evaluates the Code once per distinct key and caches
/// the result, so re-importing the same key returns the same value without
/// re-running side effects (`spec.md` §4.5).
fn import(evaluator: &mut Evaluator, scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let key = match &args[0] {
        Value::Path(p) => p.pformat(),
        Value::Str(s) | Value::IString(s) => s.to_string(),
        other => return Err(SlipError::type_error(format!("import expects a path or string key, got {other}"))),
    };
    if let Some(cached) = evaluator.import_cache.get(&key) {
        return Ok(cached.clone());
    }
    let code = as_code(&args[1], "import")?;
    let module_scope = scope::new_scope_with_parent(Rc::clone(scope));
    let value = eval::eval_code(evaluator, &code, &module_scope)?;
    evaluator.import_cache.insert(key, value.clone());
    Ok(value)
}

fn get_body(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let f = as_slip_function(&args[0], "get-body")?;
    Ok(Value::Code(Rc::clone(&f.body)))
}

/// `fn {...} [...] |example { a: 2, b: 3 -> 5 }`: the Transformer renders an
/// example block as a Code whose leading expressions are `SetPath`
/// assignments (the sample bindings) and whose final expression is the bare
/// expected result (`spec.md` §4.4 "Example-driven synthesis").
fn split_example_code(code: &Rc<CodeData>) -> EvalResult<Example> {
    let mut bindings = Vec::new();
    let mut result = None;
    for expr in &code.exprs {
        match expr.first() {
            Some(Term::Path(p)) if !p.literal && p.kind == PathKind::Set => {
                if let [Segment::Name(name)] = p.segments.as_slice() {
                    bindings.push((name.clone(), expr[1..].to_vec()));
                    continue;
                }
                return Err(SlipError::type_error("example bindings must assign a bare name"));
            }
            _ => result = Some(expr.clone()),
        }
    }
    let result = result.ok_or_else(|| SlipError::type_error("example block has no result expression"))?;
    Ok(Example { bindings, result })
}

fn example(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let f = as_slip_function(&args[0], "example")?;
    let code = as_code(&args[1], "example")?;
    let parsed = split_example_code(&code)?;
    let mut updated = (*f).clone();
    updated.meta.examples.push(parsed);
    Ok(Value::Function(FunctionValue::Slip(Rc::new(updated))))
}

fn guard(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let f = as_slip_function(&args[0], "guard")?;
    let code = as_code(&args[1], "guard")?;
    let mut updated = (*f).clone();
    updated.meta.guards.extend(code.exprs.iter().cloned());
    Ok(Value::Function(FunctionValue::Slip(Rc::new(updated))))
}

/// `test "name" [ ... ]`: runs a body, reporting whether it ran to
/// completion without raising (`spec.md` §4.5).
fn test(evaluator: &mut Evaluator, scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let name = args[0].to_string();
    let code = as_code(&args[1], "test")?;
    let child = scope::new_scope_with_parent(Rc::clone(scope));
    let mut map = indexmap::IndexMap::new();
    map.insert("name".to_owned(), Value::str(name));
    match eval::eval_code(evaluator, &code, &child) {
        Ok(value) => {
            map.insert("status".to_owned(), Value::str("ok"));
            map.insert("value".to_owned(), value);
        }
        Err(err) => {
            map.insert("status".to_owned(), Value::str("err"));
            map.insert("value".to_owned(), Value::str(err.to_string()));
        }
    }
    Ok(Value::dict(map))
}

/// `test-all #[ test1, test2, ... ]`: summarizes a list of `test` results.
fn test_all(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::List(results) = &args[0] else {
        return Err(SlipError::type_error("test-all expects a list of test results"));
    };
    let results = results.borrow();
    let total = results.len() as i64;
    let passed = results
        .iter()
        .filter(|r| matches!(r, Value::Dict(d) if matches!(d.borrow().get("status"), Some(Value::Str(s)) if s.as_ref() == "ok")))
        .count() as i64;
    let mut map = indexmap::IndexMap::new();
    map.insert("total".to_owned(), Value::Int(total));
    map.insert("passed".to_owned(), Value::Int(passed));
    map.insert("failed".to_owned(), Value::Int(total - passed));
    Ok(Value::dict(map))
}

fn call_each(evaluator: &mut Evaluator, scope: &ScopeRef, callee: &Value, arg: Value) -> EvalResult<Value> {
    eval::call_value(evaluator, scope, callee.clone(), vec![arg])
}

fn map(evaluator: &mut Evaluator, scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::List(items) = &args[0] else {
        return Err(SlipError::type_error("map expects a list as its first argument"));
    };
    let items = items.borrow().clone();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(call_each(evaluator, scope, &args[1], item)?);
    }
    Ok(Value::list(out))
}

fn filter(evaluator: &mut Evaluator, scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::List(items) = &args[0] else {
        return Err(SlipError::type_error("filter expects a list as its first argument"));
    };
    let items = items.borrow().clone();
    let mut out = Vec::new();
    for item in items {
        if call_each(evaluator, scope, &args[1], item.clone())?.is_truthy() {
            out.push(item);
        }
    }
    Ok(Value::list(out))
}

/// `reduce list fn` (seeds from the first element) or `reduce list fn init`.
fn reduce(evaluator: &mut Evaluator, scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::List(items) = &args[0] else {
        return Err(SlipError::type_error("reduce expects a list as its first argument"));
    };
    let items = items.borrow().clone();
    let mut it = items.into_iter();
    let mut acc = match args.get(2) {
        Some(init) => init.clone(),
        None => it.next().ok_or_else(|| SlipError::runtime("reduce on an empty list with no initial value"))?,
    };
    for item in it {
        acc = eval::call_value(evaluator, scope, args[1].clone(), vec![acc, item])?;
    }
    Ok(acc)
}

fn zip(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (Value::List(a), Value::List(b)) = (&args[0], &args[1]) else {
        return Err(SlipError::type_error("zip expects two lists"));
    };
    let a = a.borrow();
    let b = b.borrow();
    let paired = a.iter().zip(b.iter()).map(|(x, y)| Value::list(vec![x.clone(), y.clone()])).collect();
    Ok(Value::list(paired))
}

fn name_path(name: &str) -> Term {
    Term::Path(Rc::new(crate::ast::PathAst::new(PathKind::Get, vec![Segment::Name(name.to_owned())])))
}

/// `partial fn bound...`: returns a new function that, called with
/// additional arguments, invokes `fn` with `bound` followed by those
/// arguments (`spec.md` §4.5). Built the same way the evaluator itself
/// builds calls: a synthesized one-expression body referencing the target
/// and bound values by closure-local name, with a `Splice` term forwarding
/// whatever lands in the variadic `rest` parameter.
fn partial(_e: &mut Evaluator, scope: &ScopeRef, mut args: Vec<Value>) -> EvalResult<Value> {
    if args.is_empty() {
        return Err(SlipError::type_error("partial expects at least a target function"));
    }
    let target = args.remove(0);
    let closure = scope::new_scope_with_parent(Rc::clone(scope));
    scope::set_local(&closure, "__partial_target", target);
    let mut call_expr = vec![name_path("__partial_target")];
    for (i, bound) in args.into_iter().enumerate() {
        let name = format!("__partial_bound_{i}");
        scope::set_local(&closure, &name, bound);
        call_expr.push(name_path(&name));
    }
    call_expr.push(Term::Splice(Box::new(vec![name_path("rest")])));
    let body = CodeData::new(vec![call_expr]);
    let sig = SigAst {
        positional: Vec::new(),
        keywords: Vec::new(),
        rest: Some("rest".to_owned()),
        return_annotation: None,
    };
    Ok(Value::Function(FunctionValue::Slip(Rc::new(SlipFunction {
        name: None,
        closure,
        params: ParamSpec::Sig(Rc::new(sig)),
        body,
        meta: FunctionMeta::default(),
    }))))
}

/// `compose f g`: returns a function computing `f(g(...args))`
/// (`spec.md` §4.5).
fn compose(_e: &mut Evaluator, scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let closure = scope::new_scope_with_parent(Rc::clone(scope));
    scope::set_local(&closure, "__compose_f", args[0].clone());
    scope::set_local(&closure, "__compose_g", args[1].clone());
    let inner_call = vec![name_path("__compose_g"), Term::Splice(Box::new(vec![name_path("rest")]))];
    let outer_call = vec![name_path("__compose_f"), Term::Group(vec![inner_call])];
    let body = CodeData::new(vec![outer_call]);
    let sig = SigAst {
        positional: Vec::new(),
        keywords: Vec::new(),
        rest: Some("rest".to_owned()),
        return_annotation: None,
    };
    Ok(Value::Function(FunctionValue::Slip(Rc::new(SlipFunction {
        name: None,
        closure,
        params: ParamSpec::Sig(Rc::new(sig)),
        body,
        meta: FunctionMeta::default(),
    }))))
}

/// `call fn #[args...]`: applies `fn` to an explicit argument list
/// (`spec.md` §4.5).
fn call(evaluator: &mut Evaluator, scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::List(call_args) = &args[1] else {
        return Err(SlipError::type_error("call expects a list of arguments as its second argument"));
    };
    let call_args = call_args.borrow().clone();
    eval::call_value(evaluator, scope, args[0].clone(), call_args)
}

fn numeric_cmp(a: &Value, b: &Value) -> EvalResult<std::cmp::Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => Ok(x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal)),
        (Value::Int(x), Value::Float(y)) => Ok((*x as f64).partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal)),
        (Value::Float(x), Value::Int(y)) => Ok(x.partial_cmp(&(*y as f64)).unwrap_or(std::cmp::Ordering::Equal)),
        (Value::Str(x), Value::Str(y)) | (Value::IString(x), Value::IString(y)) => Ok(x.cmp(y)),
        _ => Err(SlipError::type_error(format!("cannot compare {a} and {b}"))),
    }
}

/// `sort list` (natural ordering) or `sort list fn` where `fn a b` returns
/// truthy when `a` belongs before `b` (`spec.md` §4.5).
fn sort(evaluator: &mut Evaluator, scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::List(items) = &args[0] else {
        return Err(SlipError::type_error("sort expects a list"));
    };
    let mut out = items.borrow().clone();
    if let Some(less_than) = args.get(1).cloned() {
        let mut err = None;
        out.sort_by(|a, b| {
            if err.is_some() {
                return std::cmp::Ordering::Equal;
            }
            match eval::call_value(evaluator, scope, less_than.clone(), vec![a.clone(), b.clone()]) {
                Ok(v) if v.is_truthy() => std::cmp::Ordering::Less,
                Ok(_) => std::cmp::Ordering::Greater,
                Err(e) => {
                    err = Some(e);
                    std::cmp::Ordering::Equal
                }
            }
        });
        if let Some(e) = err {
            return Err(e);
        }
    } else {
        let mut err = None;
        out.sort_by(|a, b| {
            numeric_cmp(a, b).unwrap_or_else(|e| {
                err = Some(e);
                std::cmp::Ordering::Equal
            })
        });
        if let Some(e) = err {
            return Err(e);
        }
    }
    Ok(Value::list(out))
}

fn as_f64(v: &Value) -> EvalResult<f64> {
    match v {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(SlipError::type_error(format!("{other} is not a number"))),
    }
}

/// `range start end` or `range start end step` (`spec.md` §4.5). Produces
/// `Int`s when every argument is an `Int`, else `Float`s.
fn range(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let all_ints = args.iter().all(|v| matches!(v, Value::Int(_)));
    let start = as_f64(&args[0])?;
    let end = as_f64(&args[1])?;
    let step = match args.get(2) {
        Some(v) => as_f64(v)?,
        None => 1.0,
    };
    if step == 0.0 {
        return Err(SlipError::runtime("range step must not be zero"));
    }
    let mut out = Vec::new();
    let mut cur = start;
    while (step > 0.0 && cur < end) || (step < 0.0 && cur > end) {
        out.push(if all_ints { Value::Int(cur as i64) } else { Value::Float(cur) });
        cur += step;
    }
    Ok(Value::list(out))
}

/// `to-path "a.b.c"`: builds a dotted GetPath literal (`spec.md` §4.5).
fn to_path(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (Value::Str(s) | Value::IString(s)) = &args[0] else {
        return Err(SlipError::type_error("to-path expects a string"));
    };
    let segments = s.split('.').map(|part| Segment::Name(part.to_owned())).collect();
    let mut path = crate::ast::PathAst::new(PathKind::Get, segments);
    path.literal = true;
    Ok(Value::Path(Rc::new(path)))
}

fn join(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::List(items) = &args[0] else {
        return Err(SlipError::type_error("join expects a list as its first argument"));
    };
    let sep = args[1].to_string();
    let joined = items.borrow().iter().map(ToString::to_string).collect::<Vec<_>>().join(&sep);
    Ok(Value::str(joined))
}

fn split(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (Value::Str(s) | Value::IString(s)) = &args[0] else {
        return Err(SlipError::type_error("split expects a string as its first argument"));
    };
    let sep = args[1].to_string();
    let parts = if sep.is_empty() {
        s.chars().map(|c| Value::str(c.to_string())).collect()
    } else {
        s.split(sep.as_str()).map(Value::str).collect()
    };
    Ok(Value::list(parts))
}

fn replace(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (Value::Str(s) | Value::IString(s)) = &args[0] else {
        return Err(SlipError::type_error("replace expects a string as its first argument"));
    };
    let from = args[1].to_string();
    let to = args[2].to_string();
    Ok(Value::str(s.replace(from.as_str(), &to)))
}

fn indent(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (Value::Str(s) | Value::IString(s)) = &args[0] else {
        return Err(SlipError::type_error("indent expects a string as its first argument"));
    };
    let Value::Int(n) = args[1] else {
        return Err(SlipError::type_error("indent expects an int width as its second argument"));
    };
    let pad = " ".repeat(n.max(0) as usize);
    let indented = s.lines().map(|line| format!("{pad}{line}")).collect::<Vec<_>>().join("\n");
    Ok(Value::str(indented))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_scope_depth_one() -> ScopeRef {
        scope::new_scope()
    }

    fn add_fn(evaluator: &mut Evaluator, _scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
        let _ = evaluator;
        let (Value::Int(a), Value::Int(b)) = (&args[0], &args[1]) else {
            panic!("expected two ints");
        };
        Ok(Value::Int(a + b))
    }

    #[test]
    fn map_applies_a_native_function_across_a_list() {
        let mut evaluator = Evaluator::new();
        let scope = native_scope_depth_one();
        let double = Value::Native(Rc::new(crate::function::NativeFunction {
            name: "double",
            min_arity: 1,
            variadic: false,
            func: |_e, _s, args| Ok(Value::Int(match args[0] {
                Value::Int(i) => i * 2,
                _ => unreachable!(),
            })),
        }));
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let result = map(&mut evaluator, &scope, vec![list, double]).unwrap();
        assert_eq!(result, Value::list(vec![Value::Int(2), Value::Int(4), Value::Int(6)]));
    }

    #[test]
    fn reduce_without_init_seeds_from_the_first_element() {
        let mut evaluator = Evaluator::new();
        let scope = native_scope_depth_one();
        let adder = Value::Native(Rc::new(crate::function::NativeFunction {
            name: "add",
            min_arity: 2,
            variadic: false,
            func: add_fn,
        }));
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let result = reduce(&mut evaluator, &scope, vec![list, adder]).unwrap();
        assert_eq!(result, Value::Int(6));
    }

    #[test]
    fn range_with_a_negative_step_counts_down() {
        let mut evaluator = Evaluator::new();
        let scope = native_scope_depth_one();
        let result = range(&mut evaluator, &scope, vec![Value::Int(3), Value::Int(0), Value::Int(-1)]).unwrap();
        assert_eq!(result, Value::list(vec![Value::Int(3), Value::Int(2), Value::Int(1)]));
    }

    #[test]
    fn partial_forwards_bound_args_then_call_time_args() {
        let mut evaluator = Evaluator::new();
        let scope = native_scope_depth_one();
        let adder = Value::Native(Rc::new(crate::function::NativeFunction {
            name: "add",
            min_arity: 2,
            variadic: false,
            func: add_fn,
        }));
        let partially = partial(&mut evaluator, &scope, vec![adder, Value::Int(10)]).unwrap();
        let Value::Function(FunctionValue::Slip(f)) = &partially else {
            panic!("expected a SlipFunction");
        };
        let result = eval::call_value(&mut evaluator, &scope, Value::Function(FunctionValue::Slip(Rc::clone(f))), vec![Value::Int(5)]).unwrap();
        assert_eq!(result, Value::Int(15));
    }
}
