//! Evaluator core: expression evaluation, head-form dispatch, implicit
//! pipe/operator resolution, template expansion, interpolated-string
//! rendering (`spec.md` §4.3).
//!
//! Grounded on `ouros::run.rs`'s tree-walking `eval`/`eval_stmt` split, but
//! there is no bytecode layer here: `eval_expr` walks the semantic
//! `Expr`/`Term` AST directly, which is the whole point of skipping a VM
//! (`spec.md` §1 Non-goals: "bytecode/JIT compilation").

use std::rc::Rc;

use crate::ast::{ByteElemType, CodeData, Expr, PathKind, Segment, SigAst, Term};
use crate::capability::CapabilitySet;
use crate::concurrency::{TaskHandleRef, TaskRegistry};
use crate::dispatch;
use crate::error::{EvalResult, SlipError};
use crate::function::{FunctionMeta, FunctionValue, NativeFunction, SlipFunction};
use crate::resolver;
use crate::resource::ResourceTracker;
use crate::scope::{self, ScopeRef};
use crate::tracer::Tracer;
use crate::value::Value;

/// Status name used by `return`/Response control flow (`spec.md` §4.3
/// "Response-as-control-flow").
pub(crate) const RETURN_STATUS: &str = "return";

/// Per-run mutable context threaded through every evaluation call: the
/// tracer, resource accounting, capability grant set, and the task
/// registry backing cooperative concurrency. Mirrors `ouros::run.rs`'s
/// `VmState`, minus anything bytecode-specific.
pub(crate) struct Evaluator {
    pub tracer: Box<dyn Tracer>,
    pub resources: ResourceTracker,
    pub capabilities: CapabilitySet,
    pub tasks: TaskRegistry,
    pub source_dir: Option<std::path::PathBuf>,
    pub http_client: Option<Box<dyn crate::io_adapter::HttpClient>>,
    /// `import`'s module cache, keyed by the imported PathLiteral's
    /// canonical text (`spec.md` §4.5 "`import` ... caches by the
    /// PathLiteral string key").
    pub import_cache: std::collections::HashMap<String, Value>,
    call_depth: usize,
    /// Nonzero while a pending task's body is being driven (`spec.md` §4.6
    /// "task-context counter"), gating loop auto-yield.
    task_depth: usize,
    /// The handle of the task currently being driven, if any; checked at
    /// suspension points so a cancelled task can unwind there instead of
    /// running to completion regardless (`spec.md` §4.6 Cancellation).
    current_task: Option<TaskHandleRef>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            tracer: Box::new(crate::tracer::NoopTracer),
            resources: ResourceTracker::unlimited(),
            capabilities: CapabilitySet::default(),
            tasks: TaskRegistry::default(),
            source_dir: None,
            http_client: None,
            import_cache: std::collections::HashMap::new(),
            call_depth: 0,
            task_depth: 0,
            current_task: None,
        }
    }

    pub fn with_tracer(mut self, tracer: Box<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn with_resources(mut self, resources: ResourceTracker) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors if the task currently being driven (if any) has been cancelled,
/// so a suspension point can unwind instead of continuing a cancelled
/// task's body (`spec.md` §4.6 Cancellation: "tasks observe cancellation at
/// the next suspension point").
pub(crate) fn check_cancellation(evaluator: &Evaluator) -> EvalResult<()> {
    if let Some(handle) = &evaluator.current_task {
        if handle.borrow().cancelled {
            return Err(SlipError::cancelled());
        }
    }
    Ok(())
}

/// Pops one queued task off the registry and runs its body to completion,
/// recording the result on its handle. Returns whether a task was actually
/// run, so a caller can keep draining until the queue is dry (`spec.md`
/// §4.6: `receive`/`sleep` and loop auto-yield all drive this).
pub(crate) fn drive_one_pending_task(evaluator: &mut Evaluator) -> bool {
    let Some(pending) = evaluator.tasks.pop_ready() else {
        return false;
    };
    if pending.handle.borrow().cancelled {
        let mut state = pending.handle.borrow_mut();
        state.done = true;
        state.result = Some(Err(SlipError::cancelled()));
        return true;
    }
    let previous_task = evaluator.current_task.replace(Rc::clone(&pending.handle));
    evaluator.task_depth += 1;
    let result = eval_code(evaluator, &pending.code, &pending.scope);
    evaluator.task_depth -= 1;
    evaluator.current_task = previous_task;
    let mut state = pending.handle.borrow_mut();
    state.done = true;
    state.result = Some(result);
    true
}

/// Gives other queued tasks a chance to run between loop iterations, but
/// only while we're actually inside a task's body (`spec.md` §4.6
/// "auto-yield ... once per iteration").
fn auto_yield(evaluator: &mut Evaluator) -> EvalResult<()> {
    if evaluator.task_depth == 0 {
        return Ok(());
    }
    check_cancellation(evaluator)?;
    drive_one_pending_task(evaluator);
    check_cancellation(evaluator)
}

/// Evaluates every expression in `code` in `scope`, returning the value of
/// the last one (or `Null` for an empty body). Template expansion
/// (`inject`/`splice`) runs once per `Code` value, guarded by its
/// `expanded` flag (`spec.md` §4.3 "Template expansion idempotence").
pub(crate) fn eval_code(evaluator: &mut Evaluator, code: &Rc<CodeData>, scope: &ScopeRef) -> EvalResult<Value> {
    let exprs = expand_code(evaluator, code, scope)?;
    let mut last = Value::Null;
    for expr in &exprs {
        last = eval_expr(evaluator, expr, scope)?;
        if is_return(&last) {
            return Ok(last);
        }
    }
    Ok(last)
}

/// Expands `inject`/`splice` terms in `code`'s top-level expressions exactly
/// once, returning the (possibly identical) expanded expression list
/// (`spec.md` §4.3).
fn expand_code(evaluator: &mut Evaluator, code: &Rc<CodeData>, scope: &ScopeRef) -> EvalResult<Vec<Expr>> {
    if code.expanded.get() {
        return Ok(code.exprs.clone());
    }
    let mut out = Vec::with_capacity(code.exprs.len());
    for expr in &code.exprs {
        expand_expr_into(evaluator, expr, scope, &mut out)?;
    }
    code.expanded.set(true);
    Ok(out)
}

fn expand_expr_into(evaluator: &mut Evaluator, expr: &Expr, scope: &ScopeRef, out: &mut Vec<Expr>) -> EvalResult<()> {
    let mut expanded_terms = Vec::with_capacity(expr.len());
    for term in expr {
        match term {
            Term::Inject(inner) => {
                let v = eval_expr(evaluator, inner, scope)?;
                expanded_terms.push(value_to_literal_term(&v)?);
            }
            Term::Splice(inner) => {
                let v = eval_expr(evaluator, inner, scope)?;
                match v {
                    Value::List(l) => {
                        for item in l.borrow().iter() {
                            expanded_terms.push(value_to_literal_term(item)?);
                        }
                    }
                    Value::Code(c) => {
                        // Splicing a Code value inserts its expressions as
                        // additional statements rather than terms; flush
                        // what's been built so far as its own expr first.
                        if !expanded_terms.is_empty() {
                            out.push(std::mem::take(&mut expanded_terms));
                        }
                        for sub in &c.exprs {
                            out.push(sub.clone());
                        }
                    }
                    other => expanded_terms.push(value_to_literal_term(&other)?),
                }
            }
            other => expanded_terms.push(other.clone()),
        }
    }
    if !expanded_terms.is_empty() {
        out.push(expanded_terms);
    }
    Ok(())
}

/// Converts an already-evaluated `Value` into an inert literal `Term` so it
/// can be spliced back into template-expanded code.
fn value_to_literal_term(value: &Value) -> EvalResult<Term> {
    Ok(match value {
        Value::Int(i) => Term::Int(*i),
        Value::Float(f) => Term::Float(*f),
        Value::Bool(b) => Term::Bool(*b),
        Value::Null => Term::Null,
        Value::Str(s) => Term::Str(Rc::clone(s)),
        Value::Path(p) => Term::Path(Rc::clone(p)),
        Value::Code(c) => Term::CodeLit(Rc::clone(c)),
        other => Term::Opaque(other.clone()),
    })
}

/// `spec.md` §4.3 "Response-as-control-flow": a `return`-status Response
/// short-circuits enclosing Code evaluation.
pub(crate) fn is_return(value: &Value) -> bool {
    matches!(value, Value::Response(r) if &*r.status == RETURN_STATUS)
}

pub(crate) fn unwrap_return(value: Value) -> Value {
    match value {
        Value::Response(r) if &*r.status == RETURN_STATUS => r.value.clone(),
        other => other,
    }
}

/// Evaluates one `Expr` (a sequence of terms with no operator precedence)
/// using the implicit-pipe/operator-resolution rule (`spec.md` §4.3):
///
/// - A callable head consumes every remaining term in the expr as its
///   (individually evaluated) arguments.
/// - A non-callable head is folded left-to-right against alternating
///   operator/operand term pairs, i.e. `1 + 2 + 3` evaluates as
///   `(add (add 1 2) 3)`.
pub(crate) fn eval_expr(evaluator: &mut Evaluator, expr: &Expr, scope: &ScopeRef) -> EvalResult<Value> {
    if expr.is_empty() {
        return Ok(Value::Null);
    }
    if let Term::Path(path) = &expr[0] {
        if !path.literal {
            match path.kind {
                PathKind::Set => return eval_set_assignment(evaluator, path, &expr[1..], scope),
                PathKind::Post => return eval_post_assignment(evaluator, path, &expr[1..], scope),
                _ => {}
            }
        }
    }
    if let Term::MultiSetTag(targets) = &expr[0] {
        return eval_multi_set_assignment(evaluator, targets, &expr[1..], scope);
    }

    if let Some(name) = special_form_name(&expr[0]) {
        if let Some((value, consumed)) = eval_special_form(evaluator, name, &expr[1..], scope)? {
            return fold_infix(evaluator, scope, value, &expr[1 + consumed..]);
        }
    }

    let mut current = eval_term(evaluator, &expr[0], scope)?;
    if expr.len() == 1 {
        return auto_invoke_zero_arity(evaluator, scope, current);
    }

    if is_callable(&current) {
        let mut args = Vec::with_capacity(expr.len() - 1);
        for term in &expr[1..] {
            args.push(eval_term(evaluator, term, scope)?);
        }
        return call_value(evaluator, scope, current, args);
    }

    fold_infix(evaluator, scope, current, &expr[1..])
}

/// The name a single-segment, non-literal `GetPath` term resolves through
/// if looked up as a bare name — used both to recognize special-form heads
/// and to spot `and`/`or` aliases in infix position for short-circuiting.
fn operator_name(term: &Term) -> Option<&str> {
    let Term::Path(p) = term else { return None };
    if p.literal || !matches!(p.kind, PathKind::Get | PathKind::Piped) {
        return None;
    }
    match p.segments.as_slice() {
        [Segment::Name(n)] => Some(n.as_str()),
        _ => None,
    }
}

const SPECIAL_FORMS: &[&str] = &["if", "fn", "when", "while", "loop", "foreach", "for", "cond", "do", "with-log"];

fn special_form_name(term: &Term) -> Option<&str> {
    operator_name(term).filter(|n| SPECIAL_FORMS.contains(n))
}

/// Dispatches one of the reserved control-flow/metaprogramming heads
/// (`spec.md` §4.3 "Special-form macros"). Returns the form's value and how
/// many terms after the head it consumed, so the caller can fold any
/// trailing piped operators (e.g. `fn {...} [...] |example {...}`) onto the
/// result exactly like a non-special infix chain would.
fn eval_special_form(evaluator: &mut Evaluator, name: &str, rest: &[Term], scope: &ScopeRef) -> EvalResult<Option<(Value, usize)>> {
    match name {
        "if" => eval_if_form(evaluator, rest, scope).map(Some),
        "when" => eval_when_form(evaluator, rest, scope).map(Some),
        "while" => eval_while_form(evaluator, rest, scope).map(Some),
        "loop" => eval_loop_form(evaluator, rest, scope).map(Some),
        "foreach" => eval_foreach_form(evaluator, rest, scope).map(Some),
        "for" => eval_for_form(evaluator, rest, scope).map(Some),
        "cond" => eval_cond_form(evaluator, rest, scope).map(Some),
        "fn" => eval_fn_form(rest, scope).map(Some),
        "do" => eval_do_form(evaluator, rest, scope, false).map(Some),
        "with-log" => eval_do_form(evaluator, rest, scope, true).map(Some),
        _ => Ok(None),
    }
}

fn code_lit(evaluator: &mut Evaluator, term: &Term, scope: &ScopeRef, what: &str) -> EvalResult<Rc<CodeData>> {
    match eval_term(evaluator, term, scope)? {
        Value::Code(c) => Ok(c),
        other => Err(SlipError::type_error(format!("{what} must be a Code literal, got {other}"))),
    }
}

/// `if cond then-block [else-block]`; a missing else returns `Null`
/// (`spec.md` §4.5, §8 edge case).
fn eval_if_form(evaluator: &mut Evaluator, rest: &[Term], scope: &ScopeRef) -> EvalResult<(Value, usize)> {
    let cond_term = rest.first().ok_or_else(|| SlipError::runtime("if requires a condition"))?;
    let then_term = rest.get(1).ok_or_else(|| SlipError::runtime("if requires a then-block"))?;
    let has_else = rest.len() > 2 && matches!(&rest[2], Term::CodeLit(_));
    let consumed = if has_else { 3 } else { 2 };

    let cond = eval_term(evaluator, cond_term, scope)?;
    let branch_term = if cond.is_truthy() {
        Some(then_term)
    } else if has_else {
        Some(&rest[2])
    } else {
        None
    };
    let Some(branch_term) = branch_term else {
        return Ok((Value::Null, consumed));
    };
    let body = code_lit(evaluator, branch_term, scope, "if's branch")?;
    let child = scope::new_scope_with_parent(Rc::clone(scope));
    Ok((eval_code(evaluator, &body, &child)?, consumed))
}

/// `when cond-block body-block`; a single-branch `if` with no else — a
/// false condition returns `Null` (`spec.md` §4.5).
fn eval_when_form(evaluator: &mut Evaluator, rest: &[Term], scope: &ScopeRef) -> EvalResult<(Value, usize)> {
    let cond_term = rest.first().ok_or_else(|| SlipError::runtime("when requires a condition"))?;
    let body_term = rest.get(1).ok_or_else(|| SlipError::runtime("when requires a body"))?;
    let cond = eval_term(evaluator, cond_term, scope)?;
    if !cond.is_truthy() {
        return Ok((Value::Null, 2));
    }
    let body = code_lit(evaluator, body_term, scope, "when's body")?;
    let child = scope::new_scope_with_parent(Rc::clone(scope));
    Ok((eval_code(evaluator, &body, &child)?, 2))
}

/// `while cond-block body-block`; re-evaluates `cond-block` before every
/// iteration. A never-true condition returns `Null` (`spec.md` §8 edge
/// case).
fn eval_while_form(evaluator: &mut Evaluator, rest: &[Term], scope: &ScopeRef) -> EvalResult<(Value, usize)> {
    let cond_term = rest.first().ok_or_else(|| SlipError::runtime("while requires a condition"))?;
    let body_term = rest.get(1).ok_or_else(|| SlipError::runtime("while requires a body"))?;
    let cond_code = code_lit(evaluator, cond_term, scope, "while's condition")?;
    let body_code = code_lit(evaluator, body_term, scope, "while's body")?;

    let mut last = Value::Null;
    loop {
        evaluator.resources.check_time().map_err(|e| SlipError::runtime(e.to_string()))?;
        if !eval_code(evaluator, &cond_code, scope)?.is_truthy() {
            break;
        }
        last = eval_code(evaluator, &body_code, scope)?;
        if is_return(&last) {
            return Ok((last, 2));
        }
        auto_yield(evaluator)?;
    }
    Ok((last, 2))
}

/// `loop body-block`; an unconditional repeat with no exit condition of its
/// own, relying on an explicit `return` inside the body to stop it
/// (`spec.md` §4.5). Resource limits bound a body that never returns.
fn eval_loop_form(evaluator: &mut Evaluator, rest: &[Term], scope: &ScopeRef) -> EvalResult<(Value, usize)> {
    let body_term = rest.first().ok_or_else(|| SlipError::runtime("loop requires a body"))?;
    let body_code = code_lit(evaluator, body_term, scope, "loop's body")?;

    loop {
        evaluator.resources.check_time().map_err(|e| SlipError::runtime(e.to_string()))?;
        let last = eval_code(evaluator, &body_code, scope)?;
        if is_return(&last) {
            return Ok((last, 1));
        }
        auto_yield(evaluator)?;
    }
}

/// `for init-block cond-block step-block body-block`, a C-style counted
/// loop distinct from `foreach`'s container iteration (`spec.md` §4.5):
/// `init-block` runs once in a scope shared by every iteration, `cond-block`
/// gates each iteration, `step-block` runs after the body. Never running the
/// body returns `Null` (`spec.md` §8 edge case, mirroring `while`).
fn eval_for_form(evaluator: &mut Evaluator, rest: &[Term], scope: &ScopeRef) -> EvalResult<(Value, usize)> {
    let init_term = rest.first().ok_or_else(|| SlipError::runtime("for requires an init block"))?;
    let cond_term = rest.get(1).ok_or_else(|| SlipError::runtime("for requires a condition block"))?;
    let step_term = rest.get(2).ok_or_else(|| SlipError::runtime("for requires a step block"))?;
    let body_term = rest.get(3).ok_or_else(|| SlipError::runtime("for requires a body"))?;
    let init_code = code_lit(evaluator, init_term, scope, "for's init block")?;
    let cond_code = code_lit(evaluator, cond_term, scope, "for's condition")?;
    let step_code = code_lit(evaluator, step_term, scope, "for's step block")?;
    let body_code = code_lit(evaluator, body_term, scope, "for's body")?;

    let loop_scope = scope::new_scope_with_parent(Rc::clone(scope));
    eval_code(evaluator, &init_code, &loop_scope)?;

    let mut last = Value::Null;
    loop {
        evaluator.resources.check_time().map_err(|e| SlipError::runtime(e.to_string()))?;
        if !eval_code(evaluator, &cond_code, &loop_scope)?.is_truthy() {
            break;
        }
        last = eval_code(evaluator, &body_code, &loop_scope)?;
        if is_return(&last) {
            return Ok((last, 4));
        }
        eval_code(evaluator, &step_code, &loop_scope)?;
        auto_yield(evaluator)?;
    }
    Ok((last, 4))
}

fn term_name(term: &Term, what: &str) -> EvalResult<String> {
    operator_name(term).map(str::to_owned).ok_or_else(|| SlipError::type_error(format!("{what} must be a bare name")))
}

/// `foreach name iterable body` (lists) or `foreach key value iterable body`
/// (dicts/scopes); leaves the bound variable(s) untouched over an empty
/// container (`spec.md` §4.5, §8 edge case).
fn eval_foreach_form(evaluator: &mut Evaluator, rest: &[Term], scope: &ScopeRef) -> EvalResult<(Value, usize)> {
    let (names, iterable_term, body_term, consumed) = match rest.len() {
        3 => (vec![term_name(&rest[0], "foreach's binding")?], &rest[1], &rest[2], 3),
        4 => (
            vec![term_name(&rest[0], "foreach's binding")?, term_name(&rest[1], "foreach's binding")?],
            &rest[2],
            &rest[3],
            4,
        ),
        _ => return Err(SlipError::runtime("foreach requires a binding name, an iterable, and a body")),
    };
    let iterable = eval_term(evaluator, iterable_term, scope)?;
    let body = code_lit(evaluator, body_term, scope, "foreach's body")?;

    let mut last = Value::Null;
    match &iterable {
        Value::List(items) => {
            let snapshot: Vec<Value> = items.borrow().clone();
            for item in snapshot {
                evaluator.resources.check_time().map_err(|e| SlipError::runtime(e.to_string()))?;
                let child = scope::new_scope_with_parent(Rc::clone(scope));
                scope::set_local(&child, &names[0], item);
                last = eval_code(evaluator, &body, &child)?;
                if is_return(&last) {
                    return Ok((last, consumed));
                }
                auto_yield(evaluator)?;
            }
        }
        Value::Dict(d) => {
            let snapshot: Vec<(String, Value)> = d.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            for (key, val) in snapshot {
                evaluator.resources.check_time().map_err(|e| SlipError::runtime(e.to_string()))?;
                let child = scope::new_scope_with_parent(Rc::clone(scope));
                bind_foreach_pair(&child, &names, key, val);
                last = eval_code(evaluator, &body, &child)?;
                if is_return(&last) {
                    return Ok((last, consumed));
                }
                auto_yield(evaluator)?;
            }
        }
        Value::Scope(s) => {
            for key in scope::own_keys(s) {
                evaluator.resources.check_time().map_err(|e| SlipError::runtime(e.to_string()))?;
                let val = scope::get(s, &key)?;
                let child = scope::new_scope_with_parent(Rc::clone(scope));
                bind_foreach_pair(&child, &names, key, val);
                last = eval_code(evaluator, &body, &child)?;
                if is_return(&last) {
                    return Ok((last, consumed));
                }
                auto_yield(evaluator)?;
            }
        }
        other => return Err(SlipError::type_error(format!("foreach cannot iterate over {other}"))),
    }
    Ok((last, consumed))
}

fn bind_foreach_pair(child: &ScopeRef, names: &[String], key: String, value: Value) {
    if names.len() == 2 {
        scope::set_local(child, &names[0], Value::str(key));
        scope::set_local(child, &names[1], value);
    } else {
        scope::set_local(child, &names[0], Value::str(key));
    }
}

/// `cond cond-block-1 body-block-1 [cond-block-2 body-block-2 ...]
/// [default-body-block]`: picks the first condition block that evaluates
/// truthy and runs its paired body, or the trailing unpaired body if no
/// condition matches (`spec.md` §4.5). Consumes every leading Code literal,
/// stopping at the first term that isn't one — that's where a trailing
/// piped chain, if any, begins.
fn eval_cond_form(evaluator: &mut Evaluator, rest: &[Term], scope: &ScopeRef) -> EvalResult<(Value, usize)> {
    let consumed = rest.iter().take_while(|t| matches!(t, Term::CodeLit(_))).count();
    let branches = &rest[..consumed];
    if branches.is_empty() {
        return Err(SlipError::runtime("cond requires at least one condition/body pair"));
    }

    let mut i = 0;
    while i + 1 < branches.len() {
        let cond_code = code_lit(evaluator, &branches[i], scope, "cond's condition")?;
        let cond_scope = scope::new_scope_with_parent(Rc::clone(scope));
        if eval_code(evaluator, &cond_code, &cond_scope)?.is_truthy() {
            let body_code = code_lit(evaluator, &branches[i + 1], scope, "cond's body")?;
            let body_scope = scope::new_scope_with_parent(Rc::clone(scope));
            return Ok((eval_code(evaluator, &body_code, &body_scope)?, consumed));
        }
        i += 2;
    }
    if i < branches.len() {
        let body_code = code_lit(evaluator, &branches[i], scope, "cond's default body")?;
        let body_scope = scope::new_scope_with_parent(Rc::clone(scope));
        return Ok((eval_code(evaluator, &body_code, &body_scope)?, consumed));
    }
    Ok((Value::Null, consumed))
}

/// `fn params-form body-block`, building a `SlipFunction` closing over the
/// defining scope (`spec.md` §3 SlipFunction). Parameters are either a
/// typed `Sig` or a bare Code whose expressions are single-name paths.
fn eval_fn_form(rest: &[Term], scope: &ScopeRef) -> EvalResult<(Value, usize)> {
    let params_term = rest.first().ok_or_else(|| SlipError::runtime("fn requires a parameter list"))?;
    let body_term = rest.get(1).ok_or_else(|| SlipError::runtime("fn requires a body"))?;
    let declared_sig = match params_term {
        Term::SigLit(sig) => Some(Rc::clone(sig)),
        _ => None,
    };
    let params = match params_term {
        Term::SigLit(sig) => crate::function::ParamSpec::Sig(Rc::clone(sig)),
        Term::CodeLit(code) => {
            let mut names = Vec::new();
            for expr in &code.exprs {
                for term in expr {
                    if let Some(n) = operator_name(term) {
                        names.push(n.to_owned());
                    }
                }
            }
            crate::function::ParamSpec::Names(names)
        }
        other => return Err(SlipError::type_error(format!("fn's parameter list must be a Sig or a Code of names, got {other:?}"))),
    };
    let Term::CodeLit(body) = body_term else {
        return Err(SlipError::type_error("fn's body must be a Code literal"));
    };
    let function = Rc::new(SlipFunction {
        name: None,
        closure: Rc::clone(scope),
        params,
        body: Rc::clone(body),
        meta: FunctionMeta {
            // A Sig literal doubles as the dispatch-time type signature
            // (`spec.md` §4.4): a function declared with one is exact/
            // variadic-tiered without needing `example`-driven synthesis.
            type_sig: declared_sig,
            ..FunctionMeta::default()
        },
    });
    Ok((Value::Function(FunctionValue::Slip(function)), 2))
}

/// `do body-block` / `with-log body-block`: runs `body-block` in a child
/// scope, never propagating its error, and returns that scope with an
/// `outcome` binding of `{status, value}` (`spec.md` §4.5, §7). `with-log`
/// additionally swaps in a recording tracer for the duration and exposes
/// the captured events under `log`.
fn eval_do_form(evaluator: &mut Evaluator, rest: &[Term], scope: &ScopeRef, with_log: bool) -> EvalResult<(Value, usize)> {
    let body_term = rest.first().ok_or_else(|| SlipError::runtime("do requires a body"))?;
    let Term::CodeLit(body) = body_term else {
        return Err(SlipError::type_error("do's body must be a Code literal"));
    };
    let child = scope::new_scope_with_parent(Rc::clone(scope));

    let previous_tracer =
        with_log.then(|| std::mem::replace(&mut evaluator.tracer, Box::new(crate::tracer::RecordingTracer::default())));

    let outcome = crate::run::run_capturing(evaluator, body, &child);

    let mut wrapper = indexmap::IndexMap::new();
    wrapper.insert("outcome".to_owned(), outcome);
    if let Some(previous) = previous_tracer {
        let recorder = std::mem::replace(&mut evaluator.tracer, previous);
        let events = recorder
            .as_any()
            .downcast_ref::<crate::tracer::RecordingTracer>()
            .map(|r| r.events.clone())
            .unwrap_or_default();
        wrapper.insert("log".to_owned(), Value::list(events.iter().map(|e| Value::str(format!("{e:?}"))).collect()));
    }
    Ok((Value::dict(wrapper), 1))
}

/// Folds `tail` as alternating operator/operand pairs starting from `seed`,
/// the rule `eval_expr` applies after a non-callable head or a special-form
/// result (`spec.md` §4.3). `and`/`logical-and`/`or`/`logical-or` short-
/// circuit: the right-hand operand is only evaluated when it can change the
/// result (`spec.md` §4.3 "Logical short-circuiting").
fn fold_infix(evaluator: &mut Evaluator, scope: &ScopeRef, seed: Value, tail: &[Term]) -> EvalResult<Value> {
    let mut current = seed;
    let mut i = 0;
    while i < tail.len() {
        let op_term = &tail[i];
        if let Some(name) = operator_name(op_term) {
            if matches!(name, "and" | "logical-and" | "or" | "logical-or") {
                i += 1;
                let short_circuits_to = matches!(name, "and" | "logical-and") && !current.is_truthy();
                let short_circuits_or = matches!(name, "or" | "logical-or") && current.is_truthy();
                if short_circuits_to {
                    current = Value::Bool(false);
                    i += 1;
                    continue;
                }
                if short_circuits_or {
                    current = Value::Bool(true);
                    i += 1;
                    continue;
                }
                let rhs = eval_next(evaluator, tail, &mut i, scope)?;
                current = Value::Bool(rhs.is_truthy());
                continue;
            }
        }
        let op = eval_term(evaluator, op_term, scope)?;
        if !is_callable(&op) {
            return Err(SlipError::type_error(format!("expected an operator/function in infix position, got {op}")));
        }
        i += 1;
        let rhs = eval_next(evaluator, tail, &mut i, scope)?;
        current = call_value(evaluator, scope, op, vec![current, rhs])?;
    }
    Ok(current)
}

fn eval_next(evaluator: &mut Evaluator, tail: &[Term], i: &mut usize, scope: &ScopeRef) -> EvalResult<Value> {
    if *i < tail.len() {
        let v = eval_term(evaluator, &tail[*i], scope)?;
        *i += 1;
        Ok(v)
    } else {
        Err(SlipError::type_error("operator is missing its right-hand operand"))
    }
}

/// `SetPath: value-expr` (`spec.md` §4.3 "Assignment forms").
///
/// Three special cases layer on top of a plain write: update-style piping
/// (seed the RHS pipeline with the path's current value when it begins with
/// a piped operator), alias write-through (a simple name bound to a
/// `GetPath` alias writes through it instead of rebinding the name), and
/// function binding (a `SlipFunction` RHS merges into the name's existing
/// `GenericFunction`, or starts a new one).
fn eval_set_assignment(evaluator: &mut Evaluator, path: &Rc<crate::ast::PathAst>, rhs_terms: &[Term], scope: &ScopeRef) -> EvalResult<Value> {
    if rhs_terms.is_empty() {
        return Err(SlipError::runtime("a set-path assignment requires a right-hand side"));
    }

    let simple_name = simple_name_segment(path);
    let begins_with_piped = matches!(&rhs_terms[0], Term::Path(p) if !p.literal && p.kind == PathKind::Piped);

    // A vectorized target (a non-final filter-query fan-out) updates each
    // matched field from its own current value, not from one seed folded
    // once and broadcast to every match (`spec.md` §4.2/§4.3 "vectorized
    // writes" + "update-style piping" combined).
    if begins_with_piped && crate::io_adapter::detect_locator(path).is_none() {
        if let Ok(resolver::Walked::Matches(targets)) = resolver::walk(path, scope, evaluator) {
            let mut results = Vec::with_capacity(targets.len());
            for (container, key) in &targets {
                let seed = resolver::read_field(container, key)?;
                let updated = fold_infix(evaluator, scope, seed, rhs_terms)?;
                resolver::write_field(container, key, updated.clone())?;
                results.push(updated);
            }
            return Ok(Value::list(results));
        }
    }

    let current = resolver::get_path(path, scope, evaluator).ok();
    let value = match &current {
        Some(seed) if begins_with_piped && !matches!(seed, Value::Path(p) if p.kind == PathKind::Piped) => {
            fold_infix(evaluator, scope, seed.clone(), rhs_terms)?
        }
        _ => eval_expr(evaluator, &rhs_terms.to_vec(), scope)?,
    };

    if let Some(name) = simple_name {
        if let Some(Value::Path(alias)) = scope::try_get(scope, &name) {
            if alias.kind == PathKind::Get && !alias.literal {
                return resolver::set_path(&alias, value, scope, evaluator);
            }
        }
        if let Value::Function(FunctionValue::Slip(method)) = &value {
            let existing = scope::try_get(scope, &name);
            let generic = crate::function::merge_into_generic(existing, &name, Rc::clone(method));
            let clones = crate::function::synthesize_examples(evaluator, method, scope)?;
            if !clones.is_empty() {
                crate::function::merge_examples_into_generic(&generic, clones);
            }
            let merged = Value::Function(FunctionValue::Generic(generic));
            return resolver::set_path(path, merged, scope, evaluator);
        }
    }

    resolver::set_path(path, value, scope, evaluator)
}

/// A single-segment (optionally rooted) `Name` path, the only shape eligible
/// for alias write-through/function-merge (`spec.md` §4.3).
fn simple_name_segment(path: &crate::ast::PathAst) -> Option<String> {
    match path.segments.as_slice() {
        [crate::ast::Segment::Name(n)] => Some(n.clone()),
        [crate::ast::Segment::Root, crate::ast::Segment::Name(n)] => Some(n.clone()),
        _ => None,
    }
}

/// `PostPath: value-expr`, valid only over an http(s) locator (`spec.md`
/// §4.3 "Assignment forms").
fn eval_post_assignment(evaluator: &mut Evaluator, path: &Rc<crate::ast::PathAst>, rhs_terms: &[Term], scope: &ScopeRef) -> EvalResult<Value> {
    if rhs_terms.is_empty() {
        return Err(SlipError::runtime("a post-path assignment requires a right-hand side"));
    }
    let value = eval_expr(evaluator, &rhs_terms.to_vec(), scope)?;
    let Some(locator) = crate::io_adapter::detect_locator(path) else {
        return Err(SlipError::runtime("a post-path requires an http(s):// locator"));
    };
    crate::io_adapter::post(evaluator, &locator, path, value, scope)
}

/// `MultiSetPath: value-expr`: RHS must evaluate to a list the same length
/// as `targets`; elementwise assign (`spec.md` §4.3).
fn eval_multi_set_assignment(evaluator: &mut Evaluator, targets: &[Rc<crate::ast::PathAst>], rhs_terms: &[Term], scope: &ScopeRef) -> EvalResult<Value> {
    if rhs_terms.is_empty() {
        return Err(SlipError::runtime("a multi-set assignment requires a right-hand side"));
    }
    let value = eval_expr(evaluator, &rhs_terms.to_vec(), scope)?;
    let Value::List(items) = &value else {
        return Err(SlipError::type_error("a multi-set assignment's right-hand side must evaluate to a list"));
    };
    let items = items.borrow();
    if items.len() != targets.len() {
        return Err(SlipError::runtime(format!(
            "multi-set assignment expects a {}-element list, got {}",
            targets.len(),
            items.len()
        )));
    }
    for (target, item) in targets.iter().zip(items.iter()) {
        resolver::set_path(target, item.clone(), scope, evaluator)?;
    }
    drop(items);
    Ok(value)
}

fn is_callable(value: &Value) -> bool {
    matches!(value, Value::Function(_) | Value::Native(_))
}

/// If `value` is a callable whose only method accepts zero arguments, calls
/// it immediately (`spec.md` §4.3 "Auto-invocation of zero-arity
/// callables") — e.g. a bare `random-number` reference invokes rather than
/// returning the function value itself.
fn auto_invoke_zero_arity(evaluator: &mut Evaluator, scope: &ScopeRef, value: Value) -> EvalResult<Value> {
    match &value {
        Value::Function(f) if f.has_zero_arity_method() => call_value(evaluator, scope, value.clone(), vec![]),
        Value::Native(n) if n.has_zero_arity() => call_value(evaluator, scope, value.clone(), vec![]),
        _ => Ok(value),
    }
}

fn eval_term(evaluator: &mut Evaluator, term: &Term, scope: &ScopeRef) -> EvalResult<Value> {
    match term {
        Term::Int(i) => Ok(Value::Int(*i)),
        Term::Float(f) => Ok(Value::Float(*f)),
        Term::Bool(b) => Ok(Value::Bool(*b)),
        Term::Null => Ok(Value::Null),
        Term::Str(s) => Ok(Value::Str(Rc::clone(s))),
        Term::IString(template) => render_interpolated(template, scope),
        Term::Bytes(b) => Ok(Value::Bytes(Rc::clone(b))),
        Term::Path(p) => eval_path(evaluator, p, scope),
        Term::Group(exprs) => {
            let mut last = Value::Null;
            for e in exprs {
                last = eval_expr(evaluator, e, scope)?;
                if is_return(&last) {
                    return Ok(last);
                }
            }
            Ok(last)
        }
        Term::ListLit(items) => {
            let mut out = Vec::with_capacity(items.len());
            for e in items {
                out.push(eval_expr(evaluator, e, scope)?);
            }
            Ok(Value::list(out))
        }
        Term::DictTag(exprs) => eval_dict_literal(evaluator, exprs, scope),
        Term::CodeLit(code) => Ok(Value::Code(Rc::clone(code))),
        Term::SigLit(sig) => Ok(Value::Sig(Rc::clone(sig))),
        Term::ByteStreamLit(stream) => eval_byte_stream(evaluator, stream, scope),
        Term::MultiSetTag(paths) => eval_multi_set_literal(evaluator, paths, scope),
        Term::Inject(inner) | Term::Splice(inner) => {
            // Reaching evaluation un-expanded means the enclosing Code was
            // never passed through `expand_code`; evaluate the inner
            // expression anyway so nested ad-hoc groups still work.
            eval_expr(evaluator, inner, scope)
        }
        Term::Opaque(v) => Ok(v.clone()),
    }
}

fn eval_dict_literal(evaluator: &mut Evaluator, exprs: &[Expr], scope: &ScopeRef) -> EvalResult<Value> {
    let dict_scope = scope::new_scope_with_parent(Rc::clone(scope));
    for expr in exprs {
        eval_expr(evaluator, expr, &dict_scope)?;
    }
    let mut map = indexmap::IndexMap::new();
    for key in scope::own_keys(&dict_scope) {
        let value = scope::get(&dict_scope, &key)?;
        map.insert(key, value);
    }
    Ok(Value::dict(map))
}

fn eval_multi_set_literal(evaluator: &mut Evaluator, paths: &[Rc<crate::ast::PathAst>], scope: &ScopeRef) -> EvalResult<Value> {
    let _ = (evaluator, paths, scope);
    Err(SlipError::runtime("a multi-set target may only appear as an assignment's left-hand side"))
}

fn eval_byte_stream(evaluator: &mut Evaluator, stream: &crate::ast::ByteStreamAst, scope: &ScopeRef) -> EvalResult<Value> {
    let mut bytes = Vec::new();
    for expr in &stream.items {
        let v = eval_expr(evaluator, expr, scope)?;
        pack_byte_elem(&mut bytes, stream.elem, &v)?;
    }
    Ok(Value::Bytes(bytes.into()))
}

fn pack_byte_elem(out: &mut Vec<u8>, elem: ByteElemType, value: &Value) -> EvalResult<()> {
    let as_i64 = |v: &Value| -> EvalResult<i64> {
        match v {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            other => Err(SlipError::type_error(format!("expected an integer byte-stream element, got {other}"))),
        }
    };
    match elem {
        ByteElemType::U8 => out.push(as_i64(value)? as u8),
        ByteElemType::I8 => out.push(as_i64(value)? as i8 as u8),
        ByteElemType::U16 => out.extend_from_slice(&(as_i64(value)? as u16).to_le_bytes()),
        ByteElemType::I16 => out.extend_from_slice(&(as_i64(value)? as i16).to_le_bytes()),
        ByteElemType::U32 => out.extend_from_slice(&(as_i64(value)? as u32).to_le_bytes()),
        ByteElemType::I32 => out.extend_from_slice(&(as_i64(value)? as i32).to_le_bytes()),
        ByteElemType::U64 => out.extend_from_slice(&(as_i64(value)? as u64).to_le_bytes()),
        ByteElemType::I64 => out.extend_from_slice(&(as_i64(value)?).to_le_bytes()),
        ByteElemType::F32 => {
            let Value::Float(f) = value else {
                return Err(SlipError::type_error("expected a float byte-stream element"));
            };
            out.extend_from_slice(&(*f as f32).to_le_bytes());
        }
        ByteElemType::F64 => {
            let Value::Float(f) = value else {
                return Err(SlipError::type_error("expected a float byte-stream element"));
            };
            out.extend_from_slice(&f.to_le_bytes());
        }
        ByteElemType::B1 => out.push(u8::from(value.is_truthy())),
    }
    Ok(())
}

/// Renders a Mustache-like interpolated string against the current lexical
/// scope (`spec.md` §4.3 "Interpolated-string rendering"), grounded on
/// `slip_interpreter.py`'s `_scope_to_dict`/`pystache` usage: the whole
/// scope chain is flattened (root-to-current, current wins) into a plain
/// context before substitution.
fn render_interpolated(template: &str, scope: &ScopeRef) -> EvalResult<Value> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let name = after[..end].trim();
        let value = scope::try_get(scope, name).unwrap_or(Value::Null);
        out.push_str(&value.to_string());
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(Value::IString(out.into()))
}

fn eval_path(evaluator: &mut Evaluator, path: &Rc<crate::ast::PathAst>, scope: &ScopeRef) -> EvalResult<Value> {
    if path.literal {
        return Ok(Value::Path(Rc::clone(path)));
    }
    match path.kind {
        PathKind::Get | PathKind::Piped => resolver::get_path(path, scope, evaluator),
        PathKind::Set => Err(SlipError::runtime("a set-path may only appear as an assignment's left-hand side")),
        PathKind::Del => {
            resolver::delete_path(path, scope, evaluator)?;
            Ok(Value::Null)
        }
        PathKind::Post => Err(SlipError::runtime("a post-path requires a right-hand side value")),
        PathKind::MultiSet => Err(SlipError::runtime("a multi-set-path may only appear as an assignment's left-hand side")),
    }
}

/// Invokes `callee` with `args`, resolving multi-method dispatch if `callee`
/// is a `GenericFunction` (`spec.md` §4.3/§4.4).
pub(crate) fn call_value(evaluator: &mut Evaluator, scope: &ScopeRef, callee: Value, args: Vec<Value>) -> EvalResult<Value> {
    evaluator.call_depth += 1;
    if evaluator.call_depth > evaluator.resources.max_call_depth() {
        evaluator.call_depth -= 1;
        return Err(SlipError::runtime("maximum call depth exceeded"));
    }
    // Only a SlipFunction call boundary consumes a `return`-status Response
    // (`spec.md` §4.3 "Response-as-control-flow"). A native call must NOT
    // unwrap here: the `return` primitive itself is a native that produces
    // that Response, and it has to survive unstripped back through every
    // enclosing `eval_expr`/`eval_code` until it reaches the function call
    // that's actually returning.
    let result = match callee {
        Value::Native(native) => call_native(evaluator, scope, &native, args),
        Value::Function(FunctionValue::Slip(f)) => call_slip_function(evaluator, &f, args).map(unwrap_return),
        Value::Function(FunctionValue::Generic(g)) => match dispatch::select_method(evaluator, scope, &g, &args)? {
            dispatch::Selected::Method(method) => call_slip_function(evaluator, &method, args).map(unwrap_return),
            dispatch::Selected::Fallback(callee) => call_value(evaluator, scope, callee, args),
        },
        other => Err(SlipError::type_error(format!("{other} is not callable"))),
    };
    evaluator.call_depth -= 1;
    result
}

fn call_native(evaluator: &mut Evaluator, scope: &ScopeRef, native: &NativeFunction, args: Vec<Value>) -> EvalResult<Value> {
    if args.len() < native.min_arity || (!native.variadic && args.len() > native.min_arity) {
        return Err(SlipError::type_error(format!(
            "{} expects {}{} argument(s), got {}",
            native.name,
            native.min_arity,
            if native.variadic { "+" } else { "" },
            args.len()
        )));
    }
    evaluator.tracer.on_call(native.name);
    (native.func)(evaluator, scope, args)
}

/// Binds `args` into a fresh child of the function's closure scope, then
/// evaluates its body (`spec.md` §3 SlipFunction, §4.3).
fn call_slip_function(evaluator: &mut Evaluator, function: &Rc<SlipFunction>, mut args: Vec<Value>) -> EvalResult<Value> {
    let call_scope = scope::new_scope_with_parent(Rc::clone(&function.closure));
    bind_params(&function.params, &mut args, &call_scope)?;
    evaluator.tracer.on_call(function.name.as_deref().unwrap_or("<anonymous>"));
    eval_code(evaluator, &function.body, &call_scope)
}

fn bind_params(params: &crate::function::ParamSpec, args: &mut Vec<Value>, call_scope: &ScopeRef) -> EvalResult<()> {
    match params {
        crate::function::ParamSpec::Names(names) => {
            for (i, name) in names.iter().enumerate() {
                let value = args.get(i).cloned().unwrap_or(Value::Null);
                scope::set_local(call_scope, name, value);
            }
        }
        crate::function::ParamSpec::Sig(sig) => bind_sig_params(sig, args, call_scope)?,
    }
    Ok(())
}

fn bind_sig_params(sig: &SigAst, args: &mut Vec<Value>, call_scope: &ScopeRef) -> EvalResult<()> {
    let mut it = args.drain(..);
    for name in &sig.positional {
        let value = it.next().unwrap_or(Value::Null);
        scope::set_local(call_scope, name, value);
    }
    if let Some(rest) = &sig.rest {
        let remaining: Vec<Value> = it.by_ref().collect();
        scope::set_local(call_scope, rest, Value::list(remaining));
    } else {
        // Keywords are resolved by name from caller-supplied dict-style
        // trailing arguments at the call site in the full language; in the
        // absence of that wiring here, defaults stand.
        let _ = it.by_ref().count();
    }
    for (name, _default_expr) in &sig.keywords {
        if scope::try_get(call_scope, name).is_none() {
            scope::set_local(call_scope, name, Value::Null);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Segment;

    fn add_native(_evaluator: &mut Evaluator, _scope: &ScopeRef, args: Vec<Value>) -> EvalResult<Value> {
        let (Value::Int(a), Value::Int(b)) = (&args[0], &args[1]) else {
            return Err(SlipError::type_error("add expects two ints"));
        };
        Ok(Value::Int(a + b))
    }

    #[test]
    fn infix_chain_folds_left_to_right() {
        let mut evaluator = Evaluator::new();
        let scope = scope::new_scope();
        scope::set_local(
            &scope,
            "+",
            Value::Native(Rc::new(NativeFunction {
                name: "+",
                min_arity: 2,
                variadic: false,
                func: add_native,
            })),
        );
        let path = Rc::new(crate::ast::PathAst::new(PathKind::Get, vec![Segment::Name("+".to_owned())]));
        let expr: Expr = vec![Term::Int(1), Term::Path(Rc::clone(&path)), Term::Int(2), Term::Path(path), Term::Int(3)];
        let result = eval_expr(&mut evaluator, &expr, &scope).unwrap();
        assert_eq!(result, Value::Int(6));
    }

    #[test]
    fn interpolated_string_substitutes_scope_bindings() {
        let scope = scope::new_scope();
        scope::set_local(&scope, "name", Value::str("Ada"));
        let rendered = render_interpolated("hello {{name}}!", &scope).unwrap();
        assert_eq!(rendered, Value::IString("hello Ada!".into()));
    }
}
