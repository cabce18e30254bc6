// File: src/macro_expand.rs
//
// Macro expansion (spec §4.G), grounded directly on macro/macro.go:
// `expand1` resolves a list's head symbol in the namespace and, if it
// names a macro-tagged closure, invokes it with the list's unevaluated
// tail; `expand` iterates to a fixpoint.
//
// Macro bodies are compiled procedures tagged `is_macro` by `defmacro`
// (src/special_forms.rs). Unlike the reference implementation's
// distinct macro `Call` type (which threads the invoking namespace as
// a separate argument), macros here are invoked exactly like any other
// closure: `Value` has no variant to carry a `Namespace`, so
// namespace-aware macros are out of scope (see DESIGN.md).

use crate::errors::AleResult;
use crate::namespace::Namespace;
use crate::value::{Symbol, Value};

fn as_macro_closure(v: &Value) -> Option<&std::sync::Arc<crate::vm::Closure>> {
    match v {
        Value::Closure(c) if c.proc.is_macro => Some(c),
        _ => None,
    }
}

/// Attempts one expansion step. Returns `(value, true)` if `v` was a
/// macro call and got rewritten, `(v, false)` otherwise.
pub fn expand1(ns: &Namespace, v: &Value) -> AleResult<(Value, bool)> {
    if let Value::List(list) = v {
        let (head, rest, has_head) = list.split();
        if has_head {
            if let Value::Symbol(Symbol::Local(name)) | Value::Symbol(Symbol::Qualified(_, name)) = &head {
                if let Some(bound) = ns.resolve(name.as_ref()) {
                    if let Some(closure) = as_macro_closure(&bound) {
                        let args: Vec<Value> = rest.iter().collect();
                        let expanded = closure.call(&args)?;
                        return Ok((expanded, true));
                    }
                }
            }
        }
    }
    Ok((v.clone(), false))
}

/// Expands to a fixpoint: repeats `expand1` until it stops rewriting.
pub fn expand(ns: &Namespace, v: &Value) -> AleResult<Value> {
    let mut current = v.clone();
    loop {
        let (next, changed) = expand1(ns, &current)?;
        if !changed {
            return Ok(next);
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use crate::isa::OpCode;
    use crate::value::{List, Name};
    use crate::vm::{Arity, Closure};
    use std::sync::Arc;

    fn unless_macro(ns: &Namespace) {
        // (defmacro unless (c body) (list 'if c nil body)) hand-assembled:
        // pushes `list`, then its four arguments, then calls it with
        // Call(4), building the literal (if <c> nil <body>) form.
        let list_fn = Value::Function(Arc::new(crate::value::NativeFunction::new(
            "list",
            crate::value::ArityChecker::at_least(0),
            |args| Ok(Value::List(List::from_vec(args.to_vec()))),
        )));
        let mut e = Encoder::new(ns.clone());
        e.push_args(vec![Name::from("c"), Name::from("body")], false);
        let list_idx = e.add_constant(list_fn);
        e.emit(OpCode::Const(list_idx));
        let if_const = e.add_constant(Value::symbol("if"));
        e.emit(OpCode::Const(if_const));
        e.emit(OpCode::Arg(0));
        e.emit(OpCode::Nil);
        e.emit(OpCode::Arg(1));
        e.emit(OpCode::Call(4));
        e.emit(OpCode::Return);
        let proc = e.finalize(Arity::fixed(2), true).unwrap();
        let closure = Value::Closure(Arc::new(Closure { proc: Arc::new(proc), captured: Vec::new() }));
        ns.bind("unless", closure);
    }

    #[test]
    fn expand1_rewrites_a_macro_call_and_stops_on_plain_lists() {
        let ns = Namespace::root();
        unless_macro(&ns);
        let call = Value::List(List::from_vec(vec![
            Value::symbol("unless"),
            Value::Bool(false),
            Value::keyword("ok"),
        ]));
        let (expanded, changed) = expand1(&ns, &call).unwrap();
        assert!(changed);
        assert_eq!(expanded.first().unwrap(), Value::symbol("if"));

        let (_, changed_again) = expand1(&ns, &expanded).unwrap();
        assert!(!changed_again, "an `if` form is not itself a macro call");
    }

    #[test]
    fn expand_reaches_a_fixpoint() {
        let ns = Namespace::root();
        unless_macro(&ns);
        let call = Value::List(List::from_vec(vec![
            Value::symbol("unless"),
            Value::Bool(false),
            Value::keyword("ok"),
        ]));
        let fully = expand(&ns, &call).unwrap();
        assert_eq!(fully.first().unwrap(), Value::symbol("if"));
    }

    #[test]
    fn non_macro_list_is_left_untouched() {
        let ns = Namespace::root();
        let form = Value::List(List::from_vec(vec![Value::symbol("+"), Value::int(1), Value::int(2)]));
        let (result, changed) = expand1(&ns, &form).unwrap();
        assert!(!changed);
        assert!(result.equal(&form));
    }
}
