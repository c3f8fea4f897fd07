//! List/dict/string primitives (`spec.md` §4.5).

use crate::error::{EvalResult, SlipError};
use crate::eval::Evaluator;
use crate::scope::ScopeRef;
use crate::value::Value;

pub(crate) fn install(root: &ScopeRef) {
    super::bind_native(root, "length", 1, false, length);
    super::bind_native(root, "push", 2, false, push);
    super::bind_native(root, "pop", 1, false, pop);
    super::bind_native(root, "keys", 1, false, keys);
    super::bind_native(root, "values", 1, false, values);
    super::bind_native(root, "contains?", 2, false, contains);
    super::bind_native(root, "first", 1, false, first);
    super::bind_native(root, "last", 1, false, last);
    super::bind_native(root, "concat", 2, false, concat);
    super::bind_native(root, "reverse", 1, false, reverse);
}

pub(crate) fn length(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Int(match &args[0] {
        Value::List(l) => l.borrow().len() as i64,
        Value::Dict(d) => d.borrow().len() as i64,
        Value::Str(s) | Value::IString(s) => s.chars().count() as i64,
        Value::Bytes(b) => b.len() as i64,
        other => return Err(SlipError::type_error(format!("{other} has no length"))),
    }))
}

fn push(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::List(l) = &args[0] else {
        return Err(SlipError::type_error("push expects a list as its first argument"));
    };
    l.borrow_mut().push(args[1].clone());
    Ok(args[0].clone())
}

fn pop(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::List(l) = &args[0] else {
        return Err(SlipError::type_error("pop expects a list"));
    };
    l.borrow_mut().pop().ok_or_else(|| SlipError::runtime("pop on an empty list"))
}

fn keys(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    match &args[0] {
        Value::Dict(d) => Ok(Value::list(d.borrow().keys().map(Value::str).collect())),
        Value::Scope(s) => Ok(Value::list(crate::scope::own_keys(s).into_iter().map(Value::str).collect())),
        other => Err(SlipError::type_error(format!("{other} has no keys"))),
    }
}

fn values(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    match &args[0] {
        Value::Dict(d) => Ok(Value::list(d.borrow().values().cloned().collect())),
        Value::Scope(s) => Ok(Value::list(crate::scope::own_values(s))),
        other => Err(SlipError::type_error(format!("{other} has no values"))),
    }
}

fn contains(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(match &args[0] {
        Value::List(l) => l.borrow().iter().any(|v| Value::slip_eq(v, &args[1])),
        Value::Dict(d) => match &args[1] {
            Value::Str(k) | Value::IString(k) => d.borrow().contains_key(k.as_ref()),
            _ => false,
        },
        Value::Str(s) | Value::IString(s) => match &args[1] {
            Value::Str(needle) | Value::IString(needle) => s.contains(needle.as_ref()),
            _ => false,
        },
        other => return Err(SlipError::type_error(format!("{other} does not support contains?"))),
    }))
}

fn first(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::List(l) = &args[0] else {
        return Err(SlipError::type_error("first expects a list"));
    };
    l.borrow().first().cloned().ok_or_else(|| SlipError::runtime("first on an empty list"))
}

fn last(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::List(l) = &args[0] else {
        return Err(SlipError::type_error("last expects a list"));
    };
    l.borrow().last().cloned().ok_or_else(|| SlipError::runtime("last on an empty list"))
}

fn concat(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    match (&args[0], &args[1]) {
        (Value::List(a), Value::List(b)) => {
            let mut out = a.borrow().clone();
            out.extend(b.borrow().iter().cloned());
            Ok(Value::list(out))
        }
        (Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{a}{b}"))),
        _ => Err(SlipError::type_error("concat expects two lists or two strings")),
    }
}

fn reverse(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::List(l) = &args[0] else {
        return Err(SlipError::type_error("reverse expects a list"));
    };
    let mut out = l.borrow().clone();
    out.reverse();
    Ok(Value::list(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope;

    #[test]
    fn push_mutates_the_shared_list_in_place() {
        let mut evaluator = Evaluator::new();
        let root = scope::new_scope();
        let list = Value::list(vec![Value::Int(1)]);
        push(&mut evaluator, &root, vec![list.clone(), Value::Int(2)]).unwrap();
        let Value::List(l) = &list else { unreachable!() };
        assert_eq!(l.borrow().len(), 2);
    }
}
