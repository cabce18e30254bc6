// File: src/builtins/mod.rs
//
// The standard library (spec §4.K): every name §6 lists under "Standard
// names", organized the way the distinct concern groups are organized —
// arithmetic, comparison, predicates, sequences, concurrency — then
// bound into a namespace by `install`. `bootstrap::install` calls this
// after `special_forms::install` so special forms take priority when a
// name collides (none currently do).

pub mod arithmetic;
pub mod comparison;
pub mod concurrency;
pub mod predicates;
pub mod sequence;

use crate::errors::AleResult;
use crate::value::{ArityChecker, NativeFunction, Value};
use crate::vm::invoke;
use std::sync::Arc;

fn apply(args: &[Value]) -> AleResult<Value> {
    let callee = &args[0];
    if args.len() == 1 {
        return invoke(callee, &[]);
    }
    let mut call_args: Vec<Value> = args[1..args.len() - 1].to_vec();
    let mut cur = args[args.len() - 1].clone();
    loop {
        let (first, rest, more) = cur.split()?;
        if !more {
            break;
        }
        call_args.push(first);
        cur = rest;
    }
    invoke(callee, &call_args)
}

pub fn install(ns: &crate::namespace::Namespace) {
    arithmetic::install(ns);
    comparison::install(ns);
    predicates::install(ns);
    sequence::install(ns);
    concurrency::install(ns);
    ns.bind("apply", Value::Function(Arc::new(NativeFunction::new("apply", ArityChecker::at_least(1), apply))));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;
    use crate::value::List;

    #[test]
    fn apply_splats_the_trailing_list() {
        let ns = Namespace::root();
        install(&ns);
        let plus = ns.resolve("+").unwrap();
        let trailing = Value::List(List::from_vec(vec![Value::int(3), Value::int(4)]));
        let result = apply(&[plus, Value::int(1), Value::int(2), trailing]).unwrap();
        assert_eq!(result, Value::int(10));
    }

    #[test]
    fn every_standard_name_resolves() {
        let ns = Namespace::root();
        install(&ns);
        for name in [
            "+", "-", "*", "/", "mod", "=", "!=", "<", "<=", ">", ">=", "not", "is-nil", "is-atom", "is-keyword",
            "is-symbol", "is-str", "is-list", "is-vector", "is-seq", "is-pos-inf", "is-neg-inf", "is-nan", "cons",
            "first", "rest", "list", "vector", "len", "nth", "get", "seq", "conj", "concat", "apply", "go*", "chan",
            "promise", "is-promise", "raise", "recover*", "defer*", "current-time",
        ] {
            assert!(ns.is_bound(name), "{name} should be bound");
        }
    }
}
