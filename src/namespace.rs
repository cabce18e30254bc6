// File: src/namespace.rs
//
// Root + child namespace lookup (spec §4.B). A root namespace is a
// concurrent name→value mapping shared by the whole process; child
// namespaces (used by the macro expander to pass the invoking scope
// to a macro body) delegate unresolved lookups to their parent.

use crate::value::{Name, Symbol, Value};
use ahash::RandomState;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A process-wide or lexically-scoped binding environment.
#[derive(Clone)]
pub struct Namespace(Arc<Inner>);

struct Inner {
    parent: Option<Namespace>,
    bindings: RwLock<HashMap<Name, Value, RandomState>>,
}

impl Namespace {
    /// Creates a fresh root namespace with no parent.
    pub fn root() -> Self {
        Namespace(Arc::new(Inner {
            parent: None,
            bindings: RwLock::new(HashMap::with_hasher(RandomState::new())),
        }))
    }

    /// Creates a child namespace whose unresolved lookups fall through
    /// to `self`.
    pub fn child(&self) -> Self {
        Namespace(Arc::new(Inner {
            parent: Some(self.clone()),
            bindings: RwLock::new(HashMap::with_hasher(RandomState::new())),
        }))
    }

    pub fn get_root(&self) -> Namespace {
        match &self.0.parent {
            Some(p) => p.get_root(),
            None => self.clone(),
        }
    }

    /// Binds a name to a value in this namespace. Idempotent for an
    /// identical value (by `Equal`); rebinding a different value is
    /// permitted, matching REPL/top-level `def` semantics.
    pub fn bind(&self, name: impl AsRef<str>, value: Value) {
        let name: Name = Arc::from(name.as_ref());
        let mut bindings = self.0.bindings.write().unwrap();
        bindings.insert(name, value);
    }

    /// Declares a name without a value, so forward references within a
    /// single compilation unit resolve to `Scope::Global` before the
    /// binding is actually produced.
    pub fn declare(&self, name: impl AsRef<str>) {
        let name: Name = Arc::from(name.as_ref());
        let mut bindings = self.0.bindings.write().unwrap();
        bindings.entry(name).or_insert(Value::Nil);
    }

    pub fn is_bound(&self, name: &str) -> bool {
        if self.0.bindings.read().unwrap().contains_key(name) {
            return true;
        }
        self.0.parent.as_ref().map(|p| p.is_bound(name)).unwrap_or(false)
    }

    pub fn resolve(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.0.bindings.read().unwrap().get(name) {
            return Some(v.clone());
        }
        self.0.parent.as_ref().and_then(|p| p.resolve(name))
    }

    pub fn resolve_symbol(&self, sym: &Symbol) -> Option<Value> {
        self.resolve(sym.name())
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Namespace::root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_falls_through_to_parent() {
        let root = Namespace::root();
        root.bind("x", Value::int(1));
        let child = root.child();
        assert_eq!(child.resolve("x"), Some(Value::int(1)));
    }

    #[test]
    fn rebind_in_same_namespace_replaces_value() {
        let root = Namespace::root();
        root.bind("x", Value::int(1));
        root.bind("x", Value::int(2));
        assert_eq!(root.resolve("x"), Some(Value::int(2)));
    }

    #[test]
    fn child_binding_does_not_leak_to_parent() {
        let root = Namespace::root();
        let child = root.child();
        child.bind("y", Value::int(5));
        assert_eq!(root.resolve("y"), None);
        assert_eq!(child.resolve("y"), Some(Value::int(5)));
    }
}
