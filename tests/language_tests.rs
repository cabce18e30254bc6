// Integration tests for the ale language: reads and evaluates complete
// programs against a fresh root namespace and checks the results.

use ale::bootstrap;
use ale::eval::eval_source;
use ale::value::Value;

fn run(src: &str) -> Value {
    let ns = bootstrap::root();
    eval_source(&ns, src).unwrap_or_else(|e| panic!("evaluation failed: {e}"))
}

#[test]
fn def_binds_into_the_root_namespace() {
    let ns = bootstrap::root();
    let result = eval_source(&ns, "(def x 42) x").unwrap();
    assert_eq!(result, Value::int(42));
    assert_eq!(ns.resolve("x"), Some(Value::int(42)));
}

#[test]
fn anonymous_self_recursion_computes_a_factorial() {
    let result = run("((fn (n) (if (= n 0) 1 (* n (self (- n 1))))) 5)");
    assert_eq!(result, Value::int(120));
}

#[test]
fn let_bindings_do_not_leak_into_the_enclosing_namespace() {
    let ns = bootstrap::root();
    let result = eval_source(&ns, "(let (a 1 b 2) (+ a b))").unwrap();
    assert_eq!(result, Value::int(3));
    assert!(!ns.is_bound("a"));
    assert!(!ns.is_bound("b"));
}

#[test]
fn closures_capture_their_defining_environment() {
    let result = run("(def add (fn (x) (fn (y) (+ x y)))) ((add 3) 4)");
    assert_eq!(result, Value::int(7));
}

#[test]
fn defmacro_expands_before_evaluation() {
    let result = run("(defmacro unless (c body) (list 'if c nil body)) (unless false 'ok)");
    assert_eq!(result, Value::symbol("ok"));
}

#[test]
fn promise_delivered_from_another_thread_resolves_once() {
    let result = run("(def p (promise)) (go* (fn () (p 99))) (p)");
    assert_eq!(result, Value::int(99));
}

#[test]
fn redelivering_the_same_value_to_a_promise_is_a_no_op() {
    let result = run("(def p (promise)) (p 99) (p 99)");
    assert_eq!(result, Value::int(99));
}

#[test]
fn redelivering_a_different_value_to_a_promise_panics() {
    let ns = bootstrap::root();
    eval_source(&ns, "(def p (promise)) (p 99)").unwrap();
    let err = eval_source(&ns, "(p 100)").unwrap_err();
    assert!(err.message.contains("can't deliver a promise twice"));
}

#[test]
fn variadic_functions_collect_trailing_args_with_ampersand() {
    let result = run("((fn (a & rest) (len rest)) 1 2 3 4)");
    assert_eq!(result, Value::int(3));
}

#[test]
fn recover_catches_a_raised_value() {
    let result = run("(recover (raise 'boom))");
    assert_eq!(result, Value::symbol("boom"));
}

#[test]
fn macroexpand_1_performs_a_single_expansion_step() {
    let result = run("(defmacro unless (c body) (list 'if c nil body)) (macroexpand-1 '(unless false 'ok))");
    match result {
        Value::List(_) => {}
        other => panic!("expected a list, got {other:?}"),
    }
}

#[test]
fn apply_splats_the_trailing_sequence() {
    let result = run("(apply + 1 2 (list 3 4))");
    assert_eq!(result, Value::int(10));
}
