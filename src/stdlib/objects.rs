//! Container constructors and prototype-chain primitives (`spec.md` §4.1,
//! §4.5).

use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{EvalResult, SlipError};
use crate::eval::{self, Evaluator};
use crate::scope::{self, ScopeRef};
use crate::value::Value;

const SCHEMA_BINDING: &str = "Schema";

pub(crate) fn install(root: &ScopeRef) {
    scope::set_local(root, SCHEMA_BINDING, Value::Scope(scope::new_scope()));
    super::bind_native(root, "list", 1, false, list_ctor);
    super::bind_native(root, "dict", 1, false, dict_ctor);
    super::bind_native(root, "scope", 1, false, scope_ctor);
    super::bind_native(root, "schema", 1, false, schema_ctor);
    super::bind_native(root, "is-schema?", 1, false, is_schema);
    super::bind_native(root, "new-scope", 0, false, new_scope_ctor);
    super::bind_native(root, "inherit", 2, false, inherit_ctor);
    super::bind_native(root, "mixin", 2, false, mixin_ctor);
    super::bind_native(root, "create", 0, true, create);
    super::bind_native(root, "with", 2, false, with_block);
    super::bind_native(root, "current-scope", 0, false, current_scope);
}

fn as_code(value: &Value, what: &str) -> EvalResult<Rc<crate::ast::CodeData>> {
    match value {
        Value::Code(c) => Ok(Rc::clone(c)),
        other => Err(SlipError::type_error(format!("{what} expects a Code argument, got {other}"))),
    }
}

/// `list [ ... ]`: evaluates each of the Code's top-level expressions and
/// collects the results into a list (`spec.md` §4.5).
fn list_ctor(evaluator: &mut Evaluator, scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let code = as_code(&args[0], "list")?;
    let child = scope::new_scope_with_parent(Rc::clone(scope));
    let mut items = Vec::with_capacity(code.exprs.len());
    for expr in &code.exprs {
        items.push(eval::eval_expr(evaluator, expr, &child)?);
    }
    Ok(Value::list(items))
}

/// `dict { ... }`: evaluates the Code's assignments inside a fresh isolated
/// scope, then lifts that scope's own bindings into a dict (`spec.md`
/// §4.5).
fn dict_ctor(evaluator: &mut Evaluator, scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let code = as_code(&args[0], "dict")?;
    let child = scope::new_scope_with_parent(Rc::clone(scope));
    for expr in &code.exprs {
        eval::eval_expr(evaluator, expr, &child)?;
    }
    let mut map = IndexMap::new();
    for key in scope::own_keys(&child) {
        map.insert(key.clone(), scope::get(&child, &key)?);
    }
    Ok(Value::dict(map))
}

fn dict_into_scope(dict: &Value) -> EvalResult<ScopeRef> {
    let Value::Dict(d) = dict else {
        return Err(SlipError::type_error(format!("expected a dict, got {dict}")));
    };
    let built = scope::new_scope();
    for (k, v) in d.borrow().iter() {
        scope::set_local(&built, k, v.clone());
    }
    Ok(built)
}

/// `scope #{ ... }`: builds a fresh Scope from a dict's bindings
/// (`spec.md` §4.5).
fn scope_ctor(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Scope(dict_into_scope(&args[0])?))
}

/// `schema #{ ... }`: a `scope` that additionally inherits the well-known
/// `Schema` scope, so `is-schema?` can recognize it later (`spec.md`
/// §4.5).
fn schema_ctor(_e: &mut Evaluator, call_scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let built = dict_into_scope(&args[0])?;
    let Value::Scope(schema_root) = scope::get(call_scope, SCHEMA_BINDING)? else {
        return Err(SlipError::runtime("the Schema root binding has been overwritten with a non-scope value"));
    };
    scope::inherit(&built, schema_root)?;
    Ok(Value::Scope(built))
}

fn is_schema(_e: &mut Evaluator, call_scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::Scope(candidate) = &args[0] else {
        return Ok(Value::Bool(false));
    };
    let matched = match scope::try_get(call_scope, SCHEMA_BINDING) {
        Some(Value::Scope(schema_root)) => {
            let family = scope::family(candidate);
            family.contains(&schema_root.borrow().id)
        }
        _ => false,
    };
    Ok(Value::Bool(matched))
}

fn new_scope_ctor(_e: &mut Evaluator, _s: &ScopeRef, _args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Scope(scope::new_scope()))
}

fn inherit_ctor(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (Value::Scope(child), Value::Scope(parent)) = (&args[0], &args[1]) else {
        return Err(SlipError::type_error("inherit expects two scopes"));
    };
    scope::inherit(child, Rc::clone(parent))?;
    Ok(args[0].clone())
}

fn mixin_ctor(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (Value::Scope(target), Value::Scope(mixin)) = (&args[0], &args[1]) else {
        return Err(SlipError::type_error("mixin expects two scopes"));
    };
    scope::add_mixin(target, Rc::clone(mixin));
    Ok(args[0].clone())
}

/// `create`, `create Prototype`, `create [ ... ]`, or
/// `create Prototype [ ... ]`: a fresh scope, optionally inheriting a
/// prototype, optionally configured by running a Code block against it
/// (`spec.md` §4.5 "Object system").
fn create(evaluator: &mut Evaluator, scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let mut prototype = None;
    let mut config = None;
    for arg in args {
        match arg {
            Value::Scope(s) => prototype = Some(s),
            Value::Code(c) => config = Some(c),
            other => return Err(SlipError::type_error(format!("create expects a scope prototype and/or a Code block, got {other}"))),
        }
    }
    let built = scope::new_scope();
    if let Some(parent) = prototype {
        scope::inherit(&built, parent)?;
    }
    if let Some(code) = config {
        for expr in &code.exprs {
            eval::eval_expr(evaluator, expr, &built)?;
        }
    }
    Ok(Value::Scope(built))
}

/// `with obj [ ... ]`: runs a block with `obj` as the lexical scope, then
/// returns `obj` (`spec.md` §4.5).
fn with_block(evaluator: &mut Evaluator, _scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::Scope(target) = &args[0] else {
        return Err(SlipError::type_error("with expects a scope as its first argument"));
    };
    let code = as_code(&args[1], "with")?;
    for expr in &code.exprs {
        eval::eval_expr(evaluator, expr, target)?;
    }
    Ok(args[0].clone())
}

fn current_scope(_e: &mut Evaluator, scope: &ScopeRef, _args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Scope(Rc::clone(scope)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_ctor_lifts_dict_bindings_into_a_fresh_scope() {
        let mut evaluator = Evaluator::new();
        let call_scope = scope::new_scope();
        let mut map = IndexMap::new();
        map.insert("hp".to_owned(), Value::Int(100));
        let result = scope_ctor(&mut evaluator, &call_scope, vec![Value::dict(map)]).unwrap();
        let Value::Scope(s) = result else { unreachable!() };
        assert_eq!(scope::get(&s, "hp").unwrap(), Value::Int(100));
    }

    #[test]
    fn schema_inherits_the_well_known_schema_root() {
        let mut evaluator = Evaluator::new();
        let root = scope::new_scope();
        install(&root);
        let result = schema_ctor(&mut evaluator, &root, vec![Value::dict(IndexMap::new())]).unwrap();
        let is_schema_result = is_schema(&mut evaluator, &root, vec![result]).unwrap();
        assert_eq!(is_schema_result, Value::Bool(true));
    }
}
