//! Arithmetic, comparison, and boolean operators (`spec.md` §4.5).
//!
//! Grounded on `ouros::modules::operator`: plain binary functions bound
//! under their infix name, so the evaluator's operator-resolution rule
//! (`spec.md` §4.3) can look them up like any other path.

use crate::error::{EvalResult, SlipError};
use crate::eval::Evaluator;
use crate::scope::ScopeRef;
use crate::value::Value;

pub(crate) fn install(root: &ScopeRef) {
    super::bind_native(root, "+", 2, false, add);
    super::bind_native(root, "-", 2, false, sub);
    super::bind_native(root, "*", 2, false, mul);
    super::bind_native(root, "/", 2, false, div);
    super::bind_native(root, "%", 2, false, rem);
    super::bind_native(root, "=", 2, false, eq);
    super::bind_native(root, "eq", 2, false, eq);
    super::bind_native(root, "!=", 2, false, neq);
    super::bind_native(root, ">", 2, false, gt);
    super::bind_native(root, "<", 2, false, lt);
    super::bind_native(root, ">=", 2, false, gte);
    super::bind_native(root, "<=", 2, false, lte);
    super::bind_native(root, "and", 2, false, logical_and);
    super::bind_native(root, "logical-and", 2, false, logical_and);
    super::bind_native(root, "or", 2, false, logical_or);
    super::bind_native(root, "not", 1, false, logical_not);

    // Named primitives (`spec.md` §4.5): the same functions the operator
    // aliases above bind, reachable by name for callers that pass them as
    // values (e.g. `reduce list add`) rather than writing infix.
    super::bind_native(root, "add", 2, false, add);
    super::bind_native(root, "sub", 2, false, sub);
    super::bind_native(root, "mul", 2, false, mul);
    super::bind_native(root, "div", 2, false, div);
    super::bind_native(root, "mod", 2, false, rem);
    super::bind_native(root, "pow", 2, false, pow);
    super::bind_native(root, "neq", 2, false, neq);
    super::bind_native(root, "gt", 2, false, gt);
    super::bind_native(root, "gte", 2, false, gte);
    super::bind_native(root, "lt", 2, false, lt);
    super::bind_native(root, "lte", 2, false, lte);
}

fn numeric_pair(args: &[Value]) -> EvalResult<(f64, f64, bool)> {
    let both_int = matches!((&args[0], &args[1]), (Value::Int(_), Value::Int(_)));
    let as_f64 = |v: &Value| -> EvalResult<f64> {
        match v {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            other => Err(SlipError::type_error(format!("expected a number, got {other}"))),
        }
    };
    Ok((as_f64(&args[0])?, as_f64(&args[1])?, both_int))
}

fn add(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    if let (Value::Str(a), Value::Str(b)) = (&args[0], &args[1]) {
        return Ok(Value::str(format!("{a}{b}")));
    }
    let (a, b, both_int) = numeric_pair(&args)?;
    Ok(if both_int { Value::Int(a as i64 + b as i64) } else { Value::Float(a + b) })
}

fn sub(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (a, b, both_int) = numeric_pair(&args)?;
    Ok(if both_int { Value::Int(a as i64 - b as i64) } else { Value::Float(a - b) })
}

fn mul(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (a, b, both_int) = numeric_pair(&args)?;
    Ok(if both_int { Value::Int(a as i64 * b as i64) } else { Value::Float(a * b) })
}

fn div(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (a, b, _) = numeric_pair(&args)?;
    if b == 0.0 {
        return Err(SlipError::runtime("division by zero"));
    }
    Ok(Value::Float(a / b))
}

fn rem(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (a, b, both_int) = numeric_pair(&args)?;
    if b == 0.0 {
        return Err(SlipError::runtime("modulo by zero"));
    }
    Ok(if both_int { Value::Int(a as i64 % b as i64) } else { Value::Float(a % b) })
}

fn pow(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (a, b, both_int) = numeric_pair(&args)?;
    if both_int && b >= 0.0 {
        return Ok(Value::Int((a as i64).pow(b as u32)));
    }
    Ok(Value::Float(a.powf(b)))
}

fn eq(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(Value::slip_eq(&args[0], &args[1])))
}

fn neq(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(!Value::slip_eq(&args[0], &args[1])))
}

fn gt(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (a, b, _) = numeric_pair(&args)?;
    Ok(Value::Bool(a > b))
}

fn lt(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (a, b, _) = numeric_pair(&args)?;
    Ok(Value::Bool(a < b))
}

fn gte(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (a, b, _) = numeric_pair(&args)?;
    Ok(Value::Bool(a >= b))
}

fn lte(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let (a, b, _) = numeric_pair(&args)?;
    Ok(Value::Bool(a <= b))
}

fn logical_and(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(args[0].is_truthy() && args[1].is_truthy()))
}

fn logical_or(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(args[0].is_truthy() || args[1].is_truthy()))
}

fn logical_not(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Bool(!args[0].is_truthy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope;

    #[test]
    fn add_promotes_to_float_when_either_operand_is_float() {
        let mut evaluator = Evaluator::new();
        let scope = scope::new_scope();
        let result = add(&mut evaluator, &scope, vec![Value::Int(1), Value::Float(2.5)]).unwrap();
        assert_eq!(result, Value::Float(3.5));
    }

    #[test]
    fn div_by_zero_errors() {
        let mut evaluator = Evaluator::new();
        let scope = scope::new_scope();
        assert!(div(&mut evaluator, &scope, vec![Value::Int(1), Value::Int(0)]).is_err());
    }
}
