//! Effects and Response construction (`spec.md` §3 Response, §4.5).
//!
//! `return` is an ordinary native here — the control-flow short-circuit it
//! triggers is entirely `eval.rs`'s doing (`is_return`/`unwrap_return`),
//! keyed off the `status` field this module stamps onto the Response it
//! returns.

use crate::error::EvalResult;
use crate::eval::Evaluator;
use crate::scope::ScopeRef;
use crate::value::Value;

pub(crate) fn install(root: &ScopeRef) {
    super::bind_native(root, "emit", 1, true, emit);
    super::bind_native(root, "respond", 2, false, respond);
    super::bind_native(root, "response", 2, false, respond);
    super::bind_native(root, "return", 0, true, do_return);
    super::bind_native(root, "stderr", 1, false, stderr);
}

fn status_label(topics: &Value) -> String {
    match topics {
        Value::Str(s) | Value::IString(s) => s.to_string(),
        Value::List(l) => l.borrow().iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

fn emit(evaluator: &mut Evaluator, _s: &ScopeRef, mut args: Vec<Value>) -> EvalResult<Value> {
    let message = args.pop().map_or_else(String::new, |v| v.to_string());
    let topics = args.first().map_or_else(|| "emit".to_owned(), status_label);
    evaluator.tracer.on_effect(&topics, &message);
    Ok(Value::Null)
}

fn respond(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::response(status_label(&args[0]), args[1].clone()))
}

fn do_return(_e: &mut Evaluator, _s: &ScopeRef, mut args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::response(crate::eval::RETURN_STATUS, args.pop().unwrap_or(Value::Null)))
}

fn stderr(evaluator: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    evaluator.tracer.on_effect("stderr", &args[0].to_string());
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope;
    use crate::tracer::{RecordingTracer, TraceEvent};

    #[test]
    fn return_tags_its_value_with_the_return_status() {
        let mut evaluator = Evaluator::new();
        let scope = scope::new_scope();
        let result = do_return(&mut evaluator, &scope, vec![Value::Int(9)]).unwrap();
        assert!(crate::eval::is_return(&result));
    }

    #[test]
    fn emit_records_an_effect_with_the_joined_topic() {
        let mut evaluator = Evaluator::new().with_tracer(Box::new(RecordingTracer::default()));
        let scope = scope::new_scope();
        emit(&mut evaluator, &scope, vec![Value::str("alerts"), Value::str("boom")]).unwrap();
        let recorder = evaluator.tracer.as_any().downcast_ref::<RecordingTracer>().unwrap();
        assert!(matches!(&recorder.events[0], TraceEvent::Effect { channel, message } if channel == "alerts" && message == "boom"));
    }
}
