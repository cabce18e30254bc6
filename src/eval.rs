// File: src/eval.rs
//
// Top-level evaluation entry points, grounded on eval/evaluator.go:
// compile a value (or a whole sequence of top-level forms) into a
// zero-argument procedure and invoke it immediately. Used by the `eval`
// special form, the CLI's `run` command, and the REPL.

use crate::encoder::Encoder;
use crate::errors::AleResult;
use crate::isa::OpCode;
use crate::namespace::Namespace;
use crate::special_forms;
use crate::value::Value;
use crate::vm::{Arity, Closure, Procedure};
use std::sync::Arc;

/// Compiles and runs a single value against `ns`, returning its result.
pub fn eval_value(ns: &Namespace, v: Value) -> AleResult<Value> {
    let mut encoder = Encoder::new(ns.clone());
    special_forms::compile(&mut encoder, &v)?;
    encoder.emit(OpCode::Return);
    let procedure: Procedure = encoder.finalize(Arity::fixed(0), false)?;
    let closure = Closure { proc: Arc::new(procedure), captured: Vec::new() };
    closure.call(&[])
}

/// Compiles and runs each top-level form of `forms` in turn against
/// `ns`, returning the result of the last one (or `Nil` if empty).
pub fn eval_block(ns: &Namespace, forms: &[Value]) -> AleResult<Value> {
    let mut result = Value::Nil;
    for form in forms {
        result = eval_value(ns, form.clone())?;
    }
    Ok(result)
}

/// Reads and evaluates source text as a sequence of top-level forms.
pub fn eval_source(ns: &Namespace, src: &str) -> AleResult<Value> {
    let forms = crate::reader::read(src)?;
    let forms: Vec<Value> = forms.iter().collect();
    eval_block(ns, &forms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_a_literal() {
        let ns = Namespace::root();
        let result = eval_value(&ns, Value::int(42)).unwrap();
        assert_eq!(result, Value::int(42));
    }
}
