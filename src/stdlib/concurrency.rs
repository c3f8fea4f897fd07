//! Tasks and channels (`spec.md` §4.6).
//!
//! `task` does not run its body at all; it enqueues a `PendingTask` on the
//! evaluator's task registry and returns the (not-yet-done) handle
//! immediately. A suspension point — `receive` finding its channel empty,
//! `sleep`, or a loop's auto-yield once per iteration while a task body is
//! running — drains the queue, running each pending task's body to
//! completion before the suspension point re-checks its own condition. That
//! is genuine interleaving between tasks, demand-driven rather than eager,
//! though a dequeued task still runs to completion in one step: nothing
//! short of a continuation-passing rewrite of the evaluator could pause a
//! task mid-body and hand control back before it finishes.

use std::rc::Rc;

use crate::concurrency::{self, PendingTask};
use crate::error::{EvalResult, SlipError};
use crate::eval::{self, Evaluator};
use crate::scope::{self, ScopeRef};
use crate::value::Value;

pub(crate) fn install(root: &ScopeRef) {
    super::bind_native(root, "task", 1, false, task);
    super::bind_native(root, "make-channel", 0, false, make_channel);
    super::bind_native(root, "send", 2, false, send);
    super::bind_native(root, "receive", 1, false, receive);
    super::bind_native(root, "sleep", 1, false, sleep);
    super::bind_native(root, "cancel-tasks", 0, false, cancel_tasks);
}

fn task(evaluator: &mut Evaluator, scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::Code(code) = &args[0] else {
        return Err(SlipError::type_error("task expects a Code argument"));
    };
    let handle = concurrency::new_task_handle();
    let child = scope::new_scope_with_parent(Rc::clone(scope));
    evaluator.tasks.enqueue(PendingTask {
        handle: Rc::clone(&handle),
        code: Rc::clone(code),
        scope: child,
    });
    Ok(Value::Task(handle))
}

fn make_channel(_e: &mut Evaluator, _s: &ScopeRef, _args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Channel(concurrency::new_channel()))
}

fn send(_e: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::Channel(ch) = &args[0] else {
        return Err(SlipError::type_error("send expects a channel as its first argument"));
    };
    concurrency::channel_send(ch, args[1].clone());
    Ok(Value::Null)
}

/// Drains one pending task at a time before giving up: a channel with
/// nothing queued might simply belong to a task that hasn't been driven yet
/// (`spec.md` §4.6 Channels). Only once the pending queue is exhausted with
/// the channel still empty is it a genuine deadlock.
fn receive(evaluator: &mut Evaluator, _s: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
    let Value::Channel(ch) = &args[0] else {
        return Err(SlipError::type_error("receive expects a channel"));
    };
    loop {
        eval::check_cancellation(evaluator)?;
        if let Some(v) = concurrency::channel_try_receive(ch) {
            return Ok(v);
        }
        if !eval::drive_one_pending_task(evaluator) {
            return Err(SlipError::runtime("receive on a channel with no pending value and no task left to fill it"));
        }
    }
}

/// Yields to the scheduler: drains every currently pending task before
/// returning, giving spawned work a chance to run (`spec.md` §4.6).
fn sleep(evaluator: &mut Evaluator, _s: &ScopeRef, _args: Vec<Value>) -> EvalResult<Value> {
    evaluator.resources.check_time().map_err(|e| SlipError::runtime(e.to_string()))?;
    eval::check_cancellation(evaluator)?;
    while eval::drive_one_pending_task(evaluator) {}
    Ok(Value::Null)
}

fn cancel_tasks(evaluator: &mut Evaluator, _s: &ScopeRef, _args: Vec<Value>) -> EvalResult<Value> {
    evaluator.tasks.cancel_all();
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_fifo_order_is_preserved_across_sends_and_receives() {
        let mut evaluator = Evaluator::new();
        let scope = scope::new_scope();
        let ch = make_channel(&mut evaluator, &scope, vec![]).unwrap();
        for i in 1..=5 {
            send(&mut evaluator, &scope, vec![ch.clone(), Value::Int(i)]).unwrap();
        }
        let mut out = vec![];
        for _ in 0..5 {
            out.push(receive(&mut evaluator, &scope, vec![ch.clone()]).unwrap());
        }
        assert_eq!(out, vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4), Value::Int(5)]);
    }

    #[test]
    fn receive_drives_a_pending_task_to_fill_an_empty_channel() {
        use crate::ast::{CodeData, PathAst, PathKind, Segment, Term};

        let mut evaluator = Evaluator::new();
        let scope = scope::new_scope();
        install(&scope);

        let ch = make_channel(&mut evaluator, &scope, vec![]).unwrap();
        scope::set_local(&scope, "ch", ch.clone());

        fn get(name: &str) -> Term {
            Term::Path(Rc::new(PathAst::new(PathKind::Get, vec![Segment::Name(name.to_owned())])))
        }

        let send_expr = vec![get("send"), get("ch"), Term::Int(99)];
        let task_body = Term::CodeLit(CodeData::new(vec![send_expr]));
        let spawn_expr = vec![get("task"), task_body];
        let task_value = eval::eval_expr(&mut evaluator, &spawn_expr, &scope).unwrap();
        assert!(matches!(task_value, Value::Task(_)));

        assert!(concurrency::channel_try_receive(&ch).is_none());
        let received = receive(&mut evaluator, &scope, vec![ch.clone()]).unwrap();
        assert_eq!(received, Value::Int(99));
    }
}
