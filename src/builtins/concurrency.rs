// File: src/builtins/concurrency.rs
//
// Concurrency and control-transfer names (spec §4.I, §4.K): `go* chan
// promise is-promise`, plus `raise`/`recover*`/`defer*`, the callable
// counterparts the `recover`/`defer` special forms (src/special_forms.rs)
// compile down to, and `current-time`.

use crate::concurrency::{new_channel, ChannelEnd, Promise};
use crate::errors::AleError;
use crate::value::{ArityChecker, List, NativeFunction, Value};
use crate::vm::invoke;
use std::sync::Arc;

fn native(name: &'static str, arity: ArityChecker, f: impl Fn(&[Value]) -> crate::errors::AleResult<Value> + Send + Sync + 'static) -> Value {
    Value::Function(Arc::new(NativeFunction::new(name, arity, f)))
}

pub fn install(ns: &crate::namespace::Namespace) {
    ns.bind(
        "go*",
        native("go*", ArityChecker::fixed(1), |args| {
            let thunk = args[0].clone();
            std::thread::spawn(move || {
                let _ = invoke(&thunk, &[]);
            });
            Ok(Value::Nil)
        }),
    );

    ns.bind(
        "chan",
        native("chan", ArityChecker::fixed(0), |_| {
            let (emitter, sequence) = new_channel();
            Ok(Value::List(List::from_vec(vec![
                Value::Channel(ChannelEnd::Emitter(emitter)),
                Value::Channel(ChannelEnd::Sequence(sequence)),
            ])))
        }),
    );

    ns.bind("promise", native("promise", ArityChecker::fixed(0), |_| Ok(Value::Promise(Arc::new(Promise::new())))));

    ns.bind(
        "is-promise",
        native("is-promise", ArityChecker::fixed(1), |args| Ok(Value::Bool(matches!(&args[0], Value::Promise(_))))),
    );

    ns.bind("raise", native("raise", ArityChecker::fixed(1), |args| Err(AleError::raised(args[0].clone()))));

    ns.bind(
        "recover*",
        native("recover*", ArityChecker::fixed(1), |args| match invoke(&args[0], &[]) {
            Ok(v) => Ok(v),
            Err(e) => Ok(e.recovered_value()),
        }),
    );

    ns.bind(
        "defer*",
        native("defer*", ArityChecker::fixed(2), |args| {
            let body_result = invoke(&args[0], &[]);
            let cleanup_result = invoke(&args[1], &[]);
            match body_result {
                Ok(v) => cleanup_result.map(|_| v),
                Err(e) => {
                    let _ = cleanup_result;
                    Err(e)
                }
            }
        }),
    );

    ns.bind(
        "current-time",
        native("current-time", ArityChecker::fixed(0), |_| Ok(Value::int(chrono::Utc::now().timestamp_millis()))),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;

    fn call(ns: &Namespace, name: &str, args: &[Value]) -> crate::errors::AleResult<Value> {
        match ns.resolve(name).unwrap() {
            Value::Function(f) => (f.func)(args),
            _ => panic!("{name} is not a function"),
        }
    }

    #[test]
    fn raise_produces_a_user_error_carrying_the_payload() {
        let ns = Namespace::root();
        install(&ns);
        let err = call(&ns, "raise", &[Value::keyword("boom")]).unwrap_err();
        assert_eq!(err.recovered_value(), Value::keyword("boom"));
    }

    #[test]
    fn recover_star_catches_a_thunk_that_raises() {
        let ns = Namespace::root();
        install(&ns);
        let raiser = native("raiser", ArityChecker::fixed(0), |_| Err(AleError::raised(Value::str("bad"))));
        let result = call(&ns, "recover*", &[raiser]).unwrap();
        assert_eq!(result, Value::str("bad"));
    }

    #[test]
    fn defer_star_runs_cleanup_and_returns_the_body_value() {
        let ns = Namespace::root();
        install(&ns);
        let body = native("body", ArityChecker::fixed(0), |_| Ok(Value::int(7)));
        let cleanup = native("cleanup", ArityChecker::fixed(0), |_| Ok(Value::Nil));
        let result = call(&ns, "defer*", &[body, cleanup]).unwrap();
        assert_eq!(result, Value::int(7));
    }

    #[test]
    fn chan_returns_an_emitter_and_sequence_pair() {
        let ns = Namespace::root();
        install(&ns);
        let pair = call(&ns, "chan", &[]).unwrap();
        assert_eq!(pair.count().unwrap(), 2);
    }
}
