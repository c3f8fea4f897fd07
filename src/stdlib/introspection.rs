//! Type predicates and scalar conversions (`spec.md` §4.5).

use std::rc::Rc;

use crate::error::{EvalResult, SlipError};
use crate::eval::Evaluator;
use crate::scope::{self, ScopeRef};
use crate::value::Value;

pub(crate) fn install(root: &ScopeRef) {
    super::bind_native(root, "type-of", 1, false, type_of);
    super::bind_native(root, "is-number?", 1, false, is_number);
    super::bind_native(root, "is-string?", 1, false, is_string);
    super::bind_native(root, "is-boolean?", 1, false, is_boolean);
    super::bind_native(root, "is-none?", 1, false, is_none);
    super::bind_native(root, "is-path?", 1, false, is_path);
    super::bind_native(root, "is-list?", 1, false, is_list);
    super::bind_native(root, "is-dict?", 1, false, is_dict);
    super::bind_native(root, "is-scope?", 1, false, is_scope);
    super::bind_native(root, "is-code?", 1, false, is_code);
    super::bind_native(root, "is-a?", 2, false, is_a);
    super::bind_native(root, "has-key?", 2, false, has_key);
    super::bind_native(root, "len", 1, false, len);
    super::bind_native(root, "copy", 1, false, copy);
    super::bind_native(root, "clone", 1, false, copy);
    super::bind_native(root, "to-int", 1, false, to_int);
    super::bind_native(root, "to-float", 1, false, to_float);
    super::bind_native(root, "to-str", 1, false, to_str);
}

fn type_of(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::str(args[0].primitive_name()))
}

fn is_number(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Int(_) | Value::BigInt(_) | Value::Float(_))))
}

fn is_string(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Str(_) | Value::IString(_))))
}

fn is_boolean(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Bool(_))))
}

fn is_none(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Null)))
}

fn is_path(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Path(_))))
}

fn is_list(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::List(_))))
}

fn is_dict(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Dict(_))))
}

fn is_scope(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Scope(_))))
}

fn is_code(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Code(_))))
}

/// `value is-a? Prototype`: true if `Prototype` appears in `value`'s scope
/// family set, or if `value`'s primitive type name matches a bare string
/// (`spec.md` §4.1 "Family set", §4.5).
fn is_a(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let matched = match (&args[0], &args[1]) {
        (Value::Scope(value_scope), Value::Scope(prototype)) => {
            let family = scope::family(value_scope);
            std::rc::Rc::ptr_eq(value_scope, prototype) || family.contains(&prototype.borrow().id)
        }
        (value, Value::Str(name) | Value::IString(name)) => value.primitive_name() == name.as_ref(),
        _ => false,
    };
    Ok(Value::Bool(matched))
}

fn has_key(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(match (&args[0], &args[1]) {
        (Value::Dict(d), Value::Str(k) | Value::IString(k)) => d.borrow().contains_key(k.as_ref()),
        (Value::Scope(s), Value::Str(k) | Value::IString(k)) => scope::try_get(s, k).is_some(),
        _ => false,
    }))
}

fn len(evaluator: &mut Evaluator, scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    super::containers::length(evaluator, scope, args)
}

fn copy(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(match &args[0] {
        Value::List(l) => Value::list(l.borrow().clone()),
        Value::Dict(d) => Value::dict(d.borrow().clone()),
        other => other.clone(),
    })
}

fn to_int(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Int(match &args[0] {
        Value::Int(i) => *i,
        Value::Float(f) => *f as i64,
        Value::Bool(b) => i64::from(*b),
        Value::Str(s) | Value::IString(s) => s.trim().parse().map_err(|_| SlipError::type_error(format!("cannot convert {s:?} to an int")))?,
        other => return Err(SlipError::type_error(format!("{other} cannot be converted to an int"))),
    }))
}

fn to_float(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Float(match &args[0] {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Str(s) | Value::IString(s) => s.trim().parse().map_err(|_| SlipError::type_error(format!("cannot convert {s:?} to a float")))?,
        other => return Err(SlipError::type_error(format!("{other} cannot be converted to a float"))),
    }))
}

fn to_str(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::str(args[0].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_a_matches_a_scope_somewhere_in_the_prototype_chain() {
        let mut evaluator = Evaluator::new();
        let scope = scope::new_scope();
        let character = scope::new_scope();
        let player = scope::new_scope();
        scope::inherit(&player, Rc::clone(&character)).unwrap();
        let result = is_a(&mut evaluator, &scope, vec![Value::Scope(player), Value::Scope(character)]).unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn type_of_reports_the_primitive_name() {
        let mut evaluator = Evaluator::new();
        let scope = scope::new_scope();
        let result = type_of(&mut evaluator, &scope, vec![Value::Int(1)]).unwrap();
        assert_eq!(result, Value::str("int"));
    }
}
