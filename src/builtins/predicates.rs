// File: src/builtins/predicates.rs
//
// The `is-*` type-testing names (spec §4.K), each a fixed-arity unary
// native function, plus `not` — the callable counterpart of the
// inlined `Not` opcode (src/special_forms.rs's `primitive_opcode`),
// needed so `not` still resolves when passed as a value or shadowed.

use crate::value::{ArityChecker, NativeFunction, Value};
use std::sync::Arc;

fn predicate(name: &'static str, test: fn(&Value) -> bool) -> Value {
    Value::Function(Arc::new(NativeFunction::new(name, ArityChecker::fixed(1), move |args| {
        Ok(Value::Bool(test(&args[0])))
    })))
}

pub fn install(ns: &crate::namespace::Namespace) {
    ns.bind(
        "not",
        Value::Function(Arc::new(NativeFunction::new("not", ArityChecker::fixed(1), |args| {
            Ok(Value::Bool(!args[0].is_truthy()))
        }))),
    );
    ns.bind("is-nil", predicate("is-nil", |v| v.is_nil()));
    ns.bind("is-atom", predicate("is-atom", |v| v.is_atom()));
    ns.bind("is-keyword", predicate("is-keyword", |v| matches!(v, Value::Keyword(_))));
    ns.bind("is-symbol", predicate("is-symbol", |v| matches!(v, Value::Symbol(_))));
    ns.bind("is-str", predicate("is-str", |v| matches!(v, Value::Str(_))));
    ns.bind("is-list", predicate("is-list", |v| matches!(v, Value::List(_))));
    ns.bind("is-vector", predicate("is-vector", |v| matches!(v, Value::Vector(_))));
    ns.bind("is-seq", predicate("is-seq", |v| v.is_sequence()));
    ns.bind("is-pos-inf", predicate("is-pos-inf", |v| matches!(v, Value::Float(f) if *f == f64::INFINITY)));
    ns.bind("is-neg-inf", predicate("is-neg-inf", |v| matches!(v, Value::Float(f) if *f == f64::NEG_INFINITY)));
    ns.bind("is-nan", predicate("is-nan", |v| matches!(v, Value::Float(f) if f.is_nan())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;

    #[test]
    fn predicates_resolve_and_classify() {
        let ns = Namespace::root();
        install(&ns);
        let is_nil = ns.resolve("is-nil").unwrap();
        let f = match is_nil {
            Value::Function(f) => f,
            _ => panic!("expected a function"),
        };
        assert_eq!((f.func)(&[Value::Nil]).unwrap(), Value::Bool(true));
        assert_eq!((f.func)(&[Value::int(0)]).unwrap(), Value::Bool(false));
    }
}
