// File: src/builtins/arithmetic.rs
//
// Numeric operations shared by the inlined Add/Sub/Mul/Div/Mod/Neg
// opcodes (src/vm.rs) and the variadic `+ - * / mod` names bound into
// the root namespace by `bootstrap::install`. Integers stay exact
// (`BigInt`); mixing an integer with a float promotes to float.

use crate::errors::{AleError, AleResult};
use crate::isa::OpCode;
use crate::value::{ArityChecker, NativeFunction, Value};
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::sync::Arc;

fn as_f64(v: &Value) -> AleResult<f64> {
    match v {
        Value::Integer(n) => {
            n.to_f64().ok_or_else(|| AleError::arithmetic("integer too large to convert to float"))
        }
        Value::Float(f) => Ok(*f),
        _ => Err(AleError::type_error(format!("{} is not a number", v.type_name()))),
    }
}

/// Dispatches one of the inlined binary arithmetic opcodes.
pub fn binary(op: &OpCode, a: &Value, b: &Value) -> AleResult<Value> {
    match op {
        OpCode::Add => add(a, b),
        OpCode::Sub => sub(a, b),
        OpCode::Mul => mul(a, b),
        OpCode::Div => div(a, b),
        OpCode::Mod => rem(a, b),
        _ => Err(AleError::compile(format!("{op:?} is not an arithmetic opcode"))),
    }
}

pub fn negate(v: &Value) -> AleResult<Value> {
    match v {
        Value::Integer(n) => Ok(Value::Integer(-n)),
        Value::Float(f) => Ok(Value::Float(-f)),
        _ => Err(AleError::type_error(format!("{} is not a number", v.type_name()))),
    }
}

pub fn add(a: &Value, b: &Value) -> AleResult<Value> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(x + y)),
        _ => Ok(Value::Float(as_f64(a)? + as_f64(b)?)),
    }
}

pub fn sub(a: &Value, b: &Value) -> AleResult<Value> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(x - y)),
        _ => Ok(Value::Float(as_f64(a)? - as_f64(b)?)),
    }
}

pub fn mul(a: &Value, b: &Value) -> AleResult<Value> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(x * y)),
        _ => Ok(Value::Float(as_f64(a)? * as_f64(b)?)),
    }
}

pub fn div(a: &Value, b: &Value) -> AleResult<Value> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => {
            if y.is_zero() {
                return Err(AleError::arithmetic("division by zero"));
            }
            if (x % y).is_zero() {
                Ok(Value::Integer(x / y))
            } else {
                Ok(Value::Float(x.to_f64().unwrap_or(f64::NAN) / y.to_f64().unwrap_or(f64::NAN)))
            }
        }
        _ => {
            let y = as_f64(b)?;
            Ok(Value::Float(as_f64(a)? / y))
        }
    }
}

pub fn rem(a: &Value, b: &Value) -> AleResult<Value> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => {
            if y.is_zero() {
                return Err(AleError::arithmetic("division by zero"));
            }
            Ok(Value::Integer(x % y))
        }
        _ => Ok(Value::Float(as_f64(a)? % as_f64(b)?)),
    }
}

fn reduce(name: &'static str, args: &[Value], identity: BigInt, op: fn(&Value, &Value) -> AleResult<Value>) -> AleResult<Value> {
    if args.is_empty() {
        return Ok(Value::Integer(identity));
    }
    let mut acc = args[0].clone();
    for v in &args[1..] {
        acc = op(&acc, v).map_err(|e| AleError::arithmetic(format!("{name}: {}", e.message)))?;
    }
    Ok(acc)
}

/// Binds the variadic arithmetic names `+ - * / mod` (spec §4.K).
pub fn install(ns: &crate::namespace::Namespace) {
    ns.bind(
        "+",
        Value::Function(Arc::new(NativeFunction::new("+", ArityChecker::at_least(0), |args| {
            reduce("+", args, BigInt::from(0), add)
        }))),
    );
    ns.bind(
        "*",
        Value::Function(Arc::new(NativeFunction::new("*", ArityChecker::at_least(0), |args| {
            reduce("*", args, BigInt::from(1), mul)
        }))),
    );
    ns.bind(
        "-",
        Value::Function(Arc::new(NativeFunction::new("-", ArityChecker::at_least(1), |args| {
            if args.len() == 1 {
                return negate(&args[0]);
            }
            let mut acc = args[0].clone();
            for v in &args[1..] {
                acc = sub(&acc, v)?;
            }
            Ok(acc)
        }))),
    );
    ns.bind(
        "/",
        Value::Function(Arc::new(NativeFunction::new("/", ArityChecker::at_least(1), |args| {
            if args.len() == 1 {
                return div(&Value::int(1), &args[0]);
            }
            let mut acc = args[0].clone();
            for v in &args[1..] {
                acc = div(&acc, v)?;
            }
            Ok(acc)
        }))),
    );
    ns.bind(
        "mod",
        Value::Function(Arc::new(NativeFunction::new("mod", ArityChecker::fixed(2), |args| {
            rem(&args[0], &args[1])
        }))),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_stays_exact_when_it_divides_evenly() {
        assert_eq!(div(&Value::int(6), &Value::int(3)).unwrap(), Value::int(2));
    }

    #[test]
    fn integer_division_promotes_to_float_on_remainder() {
        assert_eq!(div(&Value::int(7), &Value::int(2)).unwrap(), Value::Float(3.5));
    }

    #[test]
    fn division_by_zero_is_an_arithmetic_error() {
        assert!(div(&Value::int(1), &Value::int(0)).is_err());
    }

    #[test]
    fn unary_minus_negates() {
        assert_eq!(negate(&Value::int(5)).unwrap(), Value::int(-5));
    }
}
