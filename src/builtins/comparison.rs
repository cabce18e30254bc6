// File: src/builtins/comparison.rs
//
// Equality and ordering, shared by the inlined Eq/Neq/Lt/Lte/Gt/Gte
// opcodes and the variadic `= != < <= > >=` names. Chained comparisons
// (`(< 1 2 3)`) succeed when every adjacent pair satisfies the relation.

use crate::errors::{AleError, AleResult};
use crate::isa::OpCode;
use crate::value::{ArityChecker, NativeFunction, Value};
use std::cmp::Ordering;
use std::sync::Arc;

pub fn binary(op: &OpCode, a: &Value, b: &Value) -> AleResult<Value> {
    let result = match op {
        OpCode::Eq => a.equal(b),
        OpCode::Neq => !a.equal(b),
        OpCode::Lt => a.compare(b)? == Ordering::Less,
        OpCode::Lte => a.compare(b)? != Ordering::Greater,
        OpCode::Gt => a.compare(b)? == Ordering::Greater,
        OpCode::Gte => a.compare(b)? != Ordering::Less,
        _ => return Err(AleError::compile(format!("{op:?} is not a comparison opcode"))),
    };
    Ok(Value::Bool(result))
}

fn chained(args: &[Value], op: &OpCode) -> AleResult<Value> {
    for pair in args.windows(2) {
        if !binary(op, &pair[0], &pair[1])?.is_truthy() {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

/// Binds the variadic comparison names `= != < <= > >=` (spec §4.K).
pub fn install(ns: &crate::namespace::Namespace) {
    let entries: &[(&str, OpCode)] = &[
        ("=", OpCode::Eq),
        ("!=", OpCode::Neq),
        ("<", OpCode::Lt),
        ("<=", OpCode::Lte),
        (">", OpCode::Gt),
        (">=", OpCode::Gte),
    ];
    for (name, op) in entries {
        let op = op.clone();
        let name_owned = name.to_string();
        ns.bind(
            *name,
            Value::Function(Arc::new(NativeFunction::new(name_owned, ArityChecker::at_least(1), move |args| {
                chained(args, &op)
            }))),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_less_than_requires_every_pair_to_hold() {
        let args = vec![Value::int(1), Value::int(2), Value::int(3)];
        assert_eq!(chained(&args, &OpCode::Lt).unwrap(), Value::Bool(true));
        let args = vec![Value::int(1), Value::int(3), Value::int(2)];
        assert_eq!(chained(&args, &OpCode::Lt).unwrap(), Value::Bool(false));
    }

    #[test]
    fn equality_crosses_integer_and_float() {
        assert_eq!(binary(&OpCode::Eq, &Value::int(1), &Value::Float(1.0)).unwrap(), Value::Bool(true));
    }
}
