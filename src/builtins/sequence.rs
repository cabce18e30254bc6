// File: src/builtins/sequence.rs
//
// Sequence and collection-construction names (spec §4.K): `cons first
// rest list vector len nth get seq conj concat`. These lean entirely on
// `Value`'s Sequence/Counted/Indexed/Mapped capabilities already
// implemented in src/value/mod.rs.

use crate::errors::AleResult;
use crate::value::{ArityChecker, List, NativeFunction, Value, Vector};
use std::sync::Arc;

fn native(name: &'static str, arity: ArityChecker, f: impl Fn(&[Value]) -> AleResult<Value> + Send + Sync + 'static) -> Value {
    Value::Function(Arc::new(NativeFunction::new(name, arity, f)))
}

/// Walks any `Sequence` value into a plain `Vec`, used to flatten
/// `list`/`vector`/`concat` arguments.
fn drain(v: &Value) -> AleResult<Vec<Value>> {
    let mut out = Vec::new();
    let mut cur = v.clone();
    loop {
        let (first, rest, more) = cur.split()?;
        if !more {
            break;
        }
        out.push(first);
        cur = rest;
    }
    Ok(out)
}

pub fn install(ns: &crate::namespace::Namespace) {
    ns.bind("cons", native("cons", ArityChecker::fixed(2), |a| Ok(Value::cons(a[0].clone(), a[1].clone()))));
    ns.bind("first", native("first", ArityChecker::fixed(1), |a| a[0].first()));
    ns.bind("rest", native("rest", ArityChecker::fixed(1), |a| a[0].rest()));
    ns.bind("list", native("list", ArityChecker::at_least(0), |a| Ok(Value::List(List::from_vec(a.to_vec())))));
    ns.bind("vector", native("vector", ArityChecker::at_least(0), |a| Ok(Value::Vector(Vector::from_vec(a.to_vec())))));
    ns.bind("len", native("len", ArityChecker::fixed(1), |a| Ok(Value::int(a[0].count()? as i64))));
    ns.bind("nth", native("nth", ArityChecker::fixed(2), |a| {
        let idx = as_index(&a[1])?;
        a[0].nth(idx)
    }));
    ns.bind("get", native("get", ArityChecker::ranged(2, 3), |a| a[0].get(&a[1], a.get(2).cloned())));
    ns.bind("seq", native("seq", ArityChecker::fixed(1), |a| Ok(Value::List(List::from_vec(drain(&a[0])?)))));
    ns.bind("conj", native("conj", ArityChecker::fixed(2), |a| a[0].conj(a[1].clone())));
    ns.bind("concat", native("concat", ArityChecker::at_least(0), |a| {
        let mut out = Vec::new();
        for v in a {
            out.extend(drain(v)?);
        }
        Ok(Value::List(List::from_vec(out)))
    }));
}

fn as_index(v: &Value) -> AleResult<usize> {
    match v {
        Value::Integer(n) => {
            use num_traits::ToPrimitive;
            n.to_usize().ok_or_else(|| crate::errors::AleError::type_error("index must be a non-negative integer"))
        }
        _ => Err(crate::errors::AleError::type_error(format!("{} is not an index", v.type_name()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;

    fn call(ns: &Namespace, name: &str, args: &[Value]) -> Value {
        match ns.resolve(name).unwrap() {
            Value::Function(f) => (f.func)(args).unwrap(),
            _ => panic!("{name} is not a function"),
        }
    }

    #[test]
    fn cons_first_rest_round_trip() {
        let ns = Namespace::root();
        install(&ns);
        let pair = call(&ns, "cons", &[Value::int(1), Value::int(2)]);
        assert_eq!(pair.car().unwrap(), Value::int(1));
    }

    #[test]
    fn concat_flattens_several_lists() {
        let ns = Namespace::root();
        install(&ns);
        let a = Value::List(List::from_vec(vec![Value::int(1), Value::int(2)]));
        let b = Value::List(List::from_vec(vec![Value::int(3)]));
        let result = call(&ns, "concat", &[a, b]);
        assert_eq!(result.count().unwrap(), 3);
    }

    #[test]
    fn nth_indexes_a_vector() {
        let ns = Namespace::root();
        install(&ns);
        let v = Value::Vector(Vector::from_vec(vec![Value::int(10), Value::int(20)]));
        assert_eq!(call(&ns, "nth", &[v, Value::int(1)]), Value::int(20));
    }
}
