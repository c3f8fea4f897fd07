//! Scope & prototype chain (`spec.md` §4.1).
//!
//! A `Scope` is the language's object/namespace primitive: a mutable,
//! insertion-ordered string-keyed mapping with an optional prototype
//! (`parent`) link and an ordered list of `mixins`. Lookup consults own
//! bindings, then mixins (insertion order, recursive), then the parent
//! chain (recursively) — see `get`/`find_owner` below.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::RandomState;
use indexmap::IndexMap;

use crate::error::{EvalResult, SlipError};
use crate::value::Value;

/// Process-unique, monotonically increasing identity for a `Scope`.
///
/// Mirrors `ouros`'s `TaskId`/`CallId`/type-id counters: plain sequential
/// integers handed out from a single atomic, used so Scopes can be put in
/// hash sets (family sets) without relying on pointer identity tricks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ScopeId(u64);

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_TYPE_ID: AtomicU64 = AtomicU64::new(1);

impl ScopeId {
    fn next() -> Self {
        Self(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) type ScopeRef = Rc<RefCell<ScopeData>>;
pub(crate) type FamilySet = Rc<HashSet<ScopeId, RandomState>>;

/// Christening metadata, set at most once per Scope (`spec.md` §3 invariant).
#[derive(Debug, Clone, Default)]
pub(crate) struct ScopeMeta {
    pub name: Option<String>,
    pub type_id: Option<u64>,
}

#[derive(Debug)]
pub(crate) struct ScopeData {
    pub id: ScopeId,
    pub bindings: IndexMap<String, Value>,
    pub parent: Option<ScopeRef>,
    pub mixins: Vec<ScopeRef>,
    pub meta: ScopeMeta,
    family_cache: RefCell<Option<FamilySet>>,
    /// Whether pruning should cascade through this scope when it's a link
    /// in a deletion's write path; not a `spec.md` concept by itself, kept
    /// as a convenience for hosts that want to mark scaffolding scopes.
    pub prunable: Cell<bool>,
}

impl ScopeData {
    fn fresh() -> Self {
        Self {
            id: ScopeId::next(),
            bindings: IndexMap::new(),
            parent: None,
            mixins: Vec::new(),
            meta: ScopeMeta::default(),
            family_cache: RefCell::new(None),
            prunable: Cell::new(true),
        }
    }

    fn invalidate_family(&self) {
        self.family_cache.borrow_mut().take();
    }
}

/// Creates a fresh, parentless, mixin-less scope.
pub(crate) fn new_scope() -> ScopeRef {
    Rc::new(RefCell::new(ScopeData::fresh()))
}

/// Creates a fresh scope whose prototype is `parent`.
pub(crate) fn new_scope_with_parent(parent: ScopeRef) -> ScopeRef {
    let scope = new_scope();
    scope.borrow_mut().parent = Some(parent);
    scope
}

/// Reads `key`, consulting own bindings, then mixins (recursively,
/// mixins-before-parent), then the parent chain (`spec.md` §4.1).
pub(crate) fn get(scope: &ScopeRef, key: &str) -> EvalResult<Value> {
    let data = scope.borrow();
    if let Some(v) = data.bindings.get(key) {
        return Ok(v.clone());
    }
    for mixin in &data.mixins {
        if let Ok(v) = get(mixin, key) {
            return Ok(v);
        }
    }
    if let Some(parent) = &data.parent {
        return get(parent, key);
    }
    Err(SlipError::path_not_found(key))
}

/// Like `get` but returns `None` instead of erroring on a miss.
pub(crate) fn try_get(scope: &ScopeRef, key: &str) -> Option<Value> {
    get(scope, key).ok()
}

/// Returns the nearest Scope in the own+parent chain that owns `key` (mixins
/// are searched for lookup purposes but are not themselves write targets via
/// `find_owner`, matching `spec.md`'s "owner-write" update semantics which
/// only ever targets an *ancestor*, i.e. parent-chain, binding).
pub(crate) fn find_owner(scope: &ScopeRef, key: &str) -> Option<ScopeRef> {
    if scope.borrow().bindings.contains_key(key) {
        return Some(Rc::clone(scope));
    }
    for mixin in &scope.borrow().mixins {
        if let Some(owner) = find_owner_mixin_or_self(mixin, key) {
            return Some(owner);
        }
    }
    let parent = scope.borrow().parent.clone();
    if let Some(parent) = parent {
        return find_owner(&parent, key);
    }
    None
}

fn find_owner_mixin_or_self(scope: &ScopeRef, key: &str) -> Option<ScopeRef> {
    if scope.borrow().bindings.contains_key(key) {
        return Some(Rc::clone(scope));
    }
    for mixin in &scope.borrow().mixins {
        if let Some(owner) = find_owner_mixin_or_self(mixin, key) {
            return Some(owner);
        }
    }
    let parent = scope.borrow().parent.clone();
    if let Some(parent) = parent {
        return find_owner_mixin_or_self(&parent, key);
    }
    None
}

/// Writes `key` directly onto `scope`'s own bindings (local-by-default
/// write policy, `spec.md` §4.1), running christening when the value is an
/// un-christened Scope.
pub(crate) fn set_local(scope: &ScopeRef, key: &str, value: Value) {
    christen_if_scope(&value, key);
    scope.borrow_mut().bindings.insert(key.to_owned(), value);
    scope.borrow().invalidate_family();
}

/// Removes `key` from `scope`'s own bindings only (`spec.md` §4.1 `delete`).
pub(crate) fn delete_own(scope: &ScopeRef, key: &str) -> Option<Value> {
    let removed = scope.borrow_mut().bindings.shift_remove(key);
    scope.borrow().invalidate_family();
    removed
}

/// The first assignment that writes a Scope value under a string key sets
/// that Scope's `meta.name` and a globally-unique `type_id`
/// (`spec.md` §3 invariant "Scope christening").
fn christen_if_scope(value: &Value, key: &str) {
    if let Value::Scope(inner) = value {
        let mut data = inner.borrow_mut();
        if data.meta.name.is_none() && data.meta.type_id.is_none() {
            let id = NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed);
            data.meta.name = Some(key.to_owned());
            data.meta.type_id = Some(id);
        }
    }
}

/// `inherit`: a Scope may adopt at most one parent; a second call errors
/// (`spec.md` §3 invariant).
pub(crate) fn inherit(scope: &ScopeRef, parent: ScopeRef) -> EvalResult<()> {
    if Rc::ptr_eq(scope, &parent) {
        return Err(SlipError::type_error("a scope cannot inherit from itself"));
    }
    let mut data = scope.borrow_mut();
    if data.parent.is_some() {
        return Err(SlipError::type_error("scope already has a parent; inherit may only be called once"));
    }
    data.parent = Some(parent);
    data.invalidate_family();
    Ok(())
}

/// `mixin`: adds `m` to `scope`'s mixin list, deduplicated by identity,
/// preserving insertion order (`spec.md` §3 invariant).
pub(crate) fn add_mixin(scope: &ScopeRef, m: ScopeRef) {
    let mut data = scope.borrow_mut();
    if !data.mixins.iter().any(|existing| Rc::ptr_eq(existing, &m)) {
        data.mixins.push(m);
        data.invalidate_family();
    }
}

/// Own bindings only, insertion order preserved (`spec.md` §4.1 `keys`/`values`).
pub(crate) fn own_keys(scope: &ScopeRef) -> Vec<String> {
    scope.borrow().bindings.keys().cloned().collect()
}

pub(crate) fn own_values(scope: &ScopeRef) -> Vec<Value> {
    scope.borrow().bindings.values().cloned().collect()
}

/// The transitive closure of `scope` under `{parent, mixins}`, cached on
/// the scope and invalidated on structural change (`spec.md` §4.1 "Family
/// set").
pub(crate) fn family(scope: &ScopeRef) -> FamilySet {
    if let Some(cached) = scope.borrow().family_cache.borrow().as_ref() {
        return Rc::clone(cached);
    }
    let mut seen: HashSet<ScopeId, RandomState> = HashSet::default();
    collect_family(scope, &mut seen);
    let set = Rc::new(seen);
    *scope.borrow().family_cache.borrow_mut() = Some(Rc::clone(&set));
    set
}

fn collect_family(scope: &ScopeRef, seen: &mut HashSet<ScopeId, RandomState>) {
    let id = scope.borrow().id;
    if !seen.insert(id) {
        return;
    }
    let (mixins, parent) = {
        let data = scope.borrow();
        (data.mixins.clone(), data.parent.clone())
    };
    for mixin in &mixins {
        collect_family(mixin, seen);
    }
    if let Some(parent) = &parent {
        collect_family(parent, seen);
    }
}

pub(crate) fn scope_id(scope: &ScopeRef) -> ScopeId {
    scope.borrow().id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prototype_lookup_falls_through_to_parent() {
        let character = new_scope();
        set_local(&character, "hp", Value::Int(100));
        let player = new_scope_with_parent(Rc::clone(&character));
        assert_eq!(get(&player, "hp").unwrap(), Value::Int(100));
    }

    #[test]
    fn own_binding_hides_parent() {
        let parent = new_scope();
        set_local(&parent, "hp", Value::Int(100));
        let child = new_scope_with_parent(Rc::clone(&parent));
        set_local(&child, "hp", Value::Int(50));
        assert_eq!(get(&child, "hp").unwrap(), Value::Int(50));
    }

    #[test]
    fn christening_happens_once() {
        let owner = new_scope();
        let foo = Value::Scope(new_scope());
        set_local(&owner, "Foo", foo);
        let Value::Scope(foo_ref) = get(&owner, "Foo").unwrap() else {
            panic!("expected scope");
        };
        let first_id = foo_ref.borrow().meta.type_id;
        assert_eq!(foo_ref.borrow().meta.name.as_deref(), Some("Foo"));
        // Re-binding under a new name must not re-christen.
        set_local(&owner, "Bar", Value::Scope(Rc::clone(&foo_ref)));
        assert_eq!(foo_ref.borrow().meta.name.as_deref(), Some("Foo"));
        assert_eq!(foo_ref.borrow().meta.type_id, first_id);
    }

    #[test]
    fn inherit_twice_errors() {
        let a = new_scope();
        let b = new_scope();
        let c = new_scope();
        inherit(&a, b).unwrap();
        assert!(inherit(&a, c).is_err());
    }

    #[test]
    fn mixins_are_deduplicated_by_identity() {
        let scope = new_scope();
        let mixin = new_scope();
        add_mixin(&scope, Rc::clone(&mixin));
        add_mixin(&scope, Rc::clone(&mixin));
        assert_eq!(scope.borrow().mixins.len(), 1);
    }
}
