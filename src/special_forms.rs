// File: src/special_forms.rs
//
// Special-form compilers and the general expression compiler (spec
// §4.F): `quote`, `do`, `if`, `let`, `fn`, `eval`, `declare`, `def`,
// `defmacro`, `macroexpand-1`, `macroexpand`, plus call and atom
// compilation. `compile` is the single recursive entry point every
// special form's body and every call argument goes through, so macro
// expansion (spec §4.G) happens uniformly at every nesting level.

use crate::encoder::{Encoder, Scope};
use crate::errors::AleError;
use crate::isa::{Index, OpCode};
use crate::macro_expand;
use crate::value::{ArityChecker, List, Name, NativeFunction, Special, SpecialTransform, Symbol, Value};
use crate::vm::{self, Arity};
use num_traits::ToPrimitive;
use std::sync::Arc;

/// Compiles one form: macro-expands it, then dispatches to a special
/// form, a call, a symbol reference, or a self-evaluating literal.
pub fn compile(encoder: &mut Encoder, form: &Value) -> Result<(), AleError> {
    let form = macro_expand::expand(encoder.globals(), form)?;
    match &form {
        Value::Symbol(sym) => compile_symbol(encoder, sym),
        Value::List(list) if !list.is_empty() => compile_list(encoder, list),
        other => {
            compile_literal(encoder, other);
            Ok(())
        }
    }
}

fn compile_symbol(encoder: &mut Encoder, sym: &Symbol) -> Result<(), AleError> {
    if sym.name() == "self" {
        encoder.emit(OpCode::SelfValue);
        return Ok(());
    }
    emit_scope_ref(encoder, sym.name())
}

/// Pushes the value bound to `name` in whichever scope it resolves to.
/// Shared by atom compilation (referencing a symbol) and by `fn`'s
/// closure-cell capture (the parent pushing a captured name's value).
fn emit_scope_ref(encoder: &mut Encoder, name: &str) -> Result<(), AleError> {
    match encoder.resolve_scope(name) {
        Some(Scope::Argument) => {
            let (idx, is_rest) = encoder.resolve_arg(name).expect("just resolved");
            encoder.emit(if is_rest { OpCode::RestArg(idx) } else { OpCode::Arg(idx) });
        }
        Some(Scope::Local) => {
            let idx = encoder.resolve_local(name).expect("just resolved");
            encoder.emit(OpCode::Load(idx));
        }
        Some(Scope::Closure) => {
            let idx = encoder.resolve_closure(name).expect("just resolved");
            encoder.emit(OpCode::Closure(idx));
        }
        Some(Scope::Global) => {
            let idx = encoder.add_constant(Value::Symbol(Symbol::local(name)));
            encoder.emit(OpCode::Resolve(idx));
        }
        None => return Err(AleError::compile(format!("unbound symbol: {name}"))),
    }
    Ok(())
}

/// Pushes `v` as a literal, using the small-constant opcode shortcuts
/// where they apply.
fn compile_literal(encoder: &mut Encoder, v: &Value) {
    match v {
        Value::Nil => encoder.emit(OpCode::Nil),
        Value::Bool(true) => encoder.emit(OpCode::True),
        Value::Bool(false) => encoder.emit(OpCode::False),
        Value::Integer(n) => {
            if let Some(small) = small_integer_opcode(n) {
                encoder.emit(small);
            } else {
                let idx = encoder.add_constant(v.clone());
                encoder.emit(OpCode::Const(idx));
            }
        }
        Value::Float(f) if f.is_infinite() => {
            encoder.emit(if *f > 0.0 { OpCode::PosInfinity } else { OpCode::NegInfinity });
        }
        _ => {
            let idx = encoder.add_constant(v.clone());
            encoder.emit(OpCode::Const(idx));
        }
    }
}

fn small_integer_opcode(n: &num_bigint::BigInt) -> Option<OpCode> {
    let i = n.to_i64()?;
    match i {
        0 => Some(OpCode::Zero),
        1 => Some(OpCode::One),
        2 => Some(OpCode::Two),
        -1 => Some(OpCode::NegOne),
        _ => None,
    }
}

/// Arithmetic and comparison opcodes are inlined for direct calls to
/// their standard names (spec §4.C/§4.K), bypassing the generic `Call`
/// path the way a dedicated bytecode instruction implies. The same
/// names stay bound to ordinary native functions (src/builtins) for
/// indirect use — passed as a value, or shadowed in a local scope.
fn primitive_opcode(name: &str, argc: usize) -> Option<OpCode> {
    match (name, argc) {
        ("+", 2) => Some(OpCode::Add),
        ("-", 2) => Some(OpCode::Sub),
        ("-", 1) => Some(OpCode::Neg),
        ("*", 2) => Some(OpCode::Mul),
        ("/", 2) => Some(OpCode::Div),
        ("mod", 2) => Some(OpCode::Mod),
        ("=", 2) => Some(OpCode::Eq),
        ("!=", 2) => Some(OpCode::Neq),
        ("<", 2) => Some(OpCode::Lt),
        ("<=", 2) => Some(OpCode::Lte),
        (">", 2) => Some(OpCode::Gt),
        (">=", 2) => Some(OpCode::Gte),
        ("not", 1) => Some(OpCode::Not),
        _ => None,
    }
}

fn compile_list(encoder: &mut Encoder, list: &List) -> Result<(), AleError> {
    let (head, rest, _) = list.split();
    let args: Vec<Value> = rest.iter().collect();
    if let Value::Symbol(sym) = &head {
        let name = sym.name();
        let shadowed =
            matches!(encoder.resolve_scope(name), Some(Scope::Argument) | Some(Scope::Local) | Some(Scope::Closure));
        if !shadowed {
            if let Some(op) = primitive_opcode(name, args.len()) {
                for a in &args {
                    compile(encoder, a)?;
                }
                encoder.emit(op);
                return Ok(());
            }
            if let Some(Value::Special(special)) = encoder.globals().resolve(name) {
                return (special.transform)(encoder, &args);
            }
        }
    }
    compile_call(encoder, &head, &args)
}

fn compile_call(encoder: &mut Encoder, head: &Value, args: &[Value]) -> Result<(), AleError> {
    compile(encoder, head)?;
    for a in args {
        compile(encoder, a)?;
    }
    match args.len() {
        0 => encoder.emit(OpCode::Call0),
        1 => encoder.emit(OpCode::Call1),
        n => encoder.emit(OpCode::Call(n as Index)),
    }
    Ok(())
}

fn compile_do(encoder: &mut Encoder, exprs: &[Value]) -> Result<(), AleError> {
    if exprs.is_empty() {
        encoder.emit(OpCode::Nil);
        return Ok(());
    }
    for e in &exprs[..exprs.len() - 1] {
        compile(encoder, e)?;
        encoder.emit(OpCode::Pop);
    }
    compile(encoder, &exprs[exprs.len() - 1])
}

fn as_symbol(v: &Value) -> Result<&Symbol, AleError> {
    match v {
        Value::Symbol(s) => Ok(s),
        _ => Err(AleError::compile(format!("expected a symbol, got {}", v.type_name()))),
    }
}

fn sequence_to_vec(v: &Value) -> Result<Vec<Value>, AleError> {
    match v {
        Value::List(_) | Value::Vector(_) | Value::Nil => {
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
        _ => Err(AleError::compile(format!("expected a sequence, got {}", v.type_name()))),
    }
}

/// Parses an argument-list form into parameter names and a variadic
/// flag. A literal `&` marks the next name as the rest parameter
/// (e.g. `(a b & rest)`) — a surface-syntax convention of this port,
/// since the distilled spec leaves variadic notation unspecified (see
/// DESIGN.md).
fn parse_arg_list(v: &Value) -> Result<(Vec<Name>, bool), AleError> {
    let items = sequence_to_vec(v)?;
    let mut names = Vec::new();
    let mut variadic = false;
    let mut i = 0;
    while i < items.len() {
        let sym = as_symbol(&items[i])?;
        if sym.name() == "&" {
            variadic = true;
            i += 1;
            let rest_sym = as_symbol(
                items.get(i).ok_or_else(|| AleError::compile("missing rest parameter name after '&'"))?,
            )?;
            names.push(Name::from(rest_sym.name()));
            i += 1;
        } else {
            names.push(Name::from(sym.name()));
            i += 1;
        }
    }
    Ok((names, variadic))
}

fn arity_from_names(names: &[Name], variadic: bool) -> Arity {
    if variadic {
        Arity::variadic((names.len() - 1) as u32)
    } else {
        Arity::fixed(names.len() as u32)
    }
}

/// Shared by `fn` and `defmacro`: compiles a child procedure, captures
/// each closure cell by pushing its value in the parent, then wraps
/// the procedure into a callable closure on the parent's stack.
fn compile_function(
    encoder: &mut Encoder,
    name: Option<&str>,
    arg_list: &Value,
    body: &[Value],
    is_macro: bool,
) -> Result<(), AleError> {
    let (names, variadic) = parse_arg_list(arg_list)?;
    let mut child = match name {
        Some(n) => encoder.named_child(n),
        None => encoder.child(),
    };
    child.push_args(names.clone(), variadic);
    compile_do(&mut child, body)?;
    child.emit(OpCode::Return);
    let arity = arity_from_names(&names, variadic);
    let closure_names: Vec<Name> = child.closure_names().to_vec();
    let procedure = child.finalize(arity, is_macro)?;
    let proc_value = Value::Closure(Arc::new(vm::Closure { proc: Arc::new(procedure), captured: Vec::new() }));
    let proc_const = encoder.add_constant(proc_value);
    for cname in &closure_names {
        emit_scope_ref(encoder, cname)?;
    }
    encoder.emit(OpCode::MakeCall { proc_const, capture_count: closure_names.len() as Index });
    Ok(())
}

/// `(recover body...)` runs `body` as a zero-argument thunk through the
/// `recover*` builtin, which returns the recovered value instead of
/// propagating a raised error (spec §7's "nearest recover handler").
fn compile_recover(encoder: &mut Encoder, args: &[Value]) -> Result<(), AleError> {
    emit_scope_ref(encoder, "recover*")?;
    compile_function(encoder, None, &Value::Nil, args, false)?;
    encoder.emit(OpCode::Call1);
    Ok(())
}

/// `(defer cleanup body...)` runs `cleanup` after `body`, regardless of
/// whether `body` raised (spec §7's "defer bodies run ... on any exit
/// path"). Multiple defers are expressed by nesting rather than an
/// implicit per-frame stack (see DESIGN.md): `(defer c1 (defer c2
/// body))` runs `c2` before `c1`, the same reverse-registration order a
/// LIFO defer stack would give.
fn compile_defer(encoder: &mut Encoder, args: &[Value]) -> Result<(), AleError> {
    let cleanup = args.first().ok_or_else(|| AleError::compile("defer requires a cleanup expression"))?;
    let body = if args.len() <= 1 { &[][..] } else { &args[1..] };
    emit_scope_ref(encoder, "defer*")?;
    compile_function(encoder, None, &Value::Nil, body, false)?;
    compile_function(encoder, None, &Value::Nil, std::slice::from_ref(cleanup), false)?;
    encoder.emit(OpCode::Call(2));
    Ok(())
}

fn compile_quote(encoder: &mut Encoder, args: &[Value]) -> Result<(), AleError> {
    let v = args.first().ok_or_else(|| AleError::compile("quote requires one argument"))?;
    compile_literal(encoder, v);
    Ok(())
}

fn compile_if(encoder: &mut Encoder, args: &[Value]) -> Result<(), AleError> {
    let test = args.first().ok_or_else(|| AleError::compile("if requires a test"))?;
    let then = args.get(1).ok_or_else(|| AleError::compile("if requires a then branch"))?;
    let els = args.get(2);
    compile(encoder, test)?;
    let l_then = encoder.new_label();
    let l_end = encoder.new_label();
    encoder.emit_cond_jump(l_then);
    match els {
        Some(e) => compile(encoder, e)?,
        None => encoder.emit(OpCode::Nil),
    }
    encoder.emit_jump(l_end);
    encoder.mark_label(l_then);
    compile(encoder, then)?;
    encoder.mark_label(l_end);
    Ok(())
}

fn compile_let(encoder: &mut Encoder, args: &[Value]) -> Result<(), AleError> {
    let bindings = args.first().ok_or_else(|| AleError::compile("let requires a binding form"))?;
    let body = if args.is_empty() { &[][..] } else { &args[1..] };
    let pairs = sequence_to_vec(bindings)?;
    if pairs.len() % 2 != 0 {
        return Err(AleError::compile("let requires an even number of binding forms"));
    }
    encoder.push_locals();
    let mut i = 0;
    while i < pairs.len() {
        let name = as_symbol(&pairs[i])?.name().to_string();
        compile(encoder, &pairs[i + 1])?;
        let idx = encoder.add_local(&name);
        encoder.emit(OpCode::Store(idx));
        i += 2;
    }
    compile_do(encoder, body)?;
    encoder.pop_locals();
    Ok(())
}

fn compile_fn(encoder: &mut Encoder, args: &[Value]) -> Result<(), AleError> {
    let (name, rest) = match args.first() {
        Some(Value::Symbol(s)) => (Some(s.name().to_string()), &args[1..]),
        _ => (None, args),
    };
    let arg_list = rest.first().ok_or_else(|| AleError::compile("fn requires an argument list"))?;
    let body = if rest.len() <= 1 { &[][..] } else { &rest[1..] };
    compile_function(encoder, name.as_deref(), arg_list, body, false)
}

fn compile_declare(encoder: &mut Encoder, args: &[Value]) -> Result<(), AleError> {
    let sym = as_symbol(args.first().ok_or_else(|| AleError::compile("declare requires a symbol"))?)?;
    let idx = encoder.add_constant(Value::Symbol(sym.clone()));
    encoder.emit(OpCode::Declare(idx));
    encoder.emit(OpCode::Nil);
    Ok(())
}

fn compile_def(encoder: &mut Encoder, args: &[Value]) -> Result<(), AleError> {
    let sym = as_symbol(args.first().ok_or_else(|| AleError::compile("def requires a symbol"))?)?.clone();
    let value = args.get(1).ok_or_else(|| AleError::compile("def requires a value"))?;
    compile(encoder, value)?;
    encoder.emit(OpCode::Dup);
    let idx = encoder.add_constant(Value::Symbol(sym));
    encoder.emit(OpCode::Bind(idx));
    Ok(())
}

fn compile_defmacro(encoder: &mut Encoder, args: &[Value]) -> Result<(), AleError> {
    let sym = as_symbol(args.first().ok_or_else(|| AleError::compile("defmacro requires a symbol"))?)?.clone();
    let arg_list = args.get(1).ok_or_else(|| AleError::compile("defmacro requires an argument list"))?;
    let body = if args.len() <= 2 { &[][..] } else { &args[2..] };
    compile_function(encoder, Some(sym.name()), arg_list, body, true)?;
    encoder.emit(OpCode::Dup);
    let idx = encoder.add_constant(Value::Symbol(sym));
    encoder.emit(OpCode::Bind(idx));
    Ok(())
}

/// Shared shape for `eval`/`macroexpand-1`/`macroexpand`: push a native
/// callback that closes over this compile site's global namespace,
/// then the target form's runtime value, then call it.
fn compile_runtime_call(encoder: &mut Encoder, target: &Value, native: NativeFunction) -> Result<(), AleError> {
    let idx = encoder.add_constant(Value::Function(Arc::new(native)));
    encoder.emit(OpCode::Const(idx));
    compile(encoder, target)?;
    encoder.emit(OpCode::Call1);
    Ok(())
}

fn compile_eval(encoder: &mut Encoder, args: &[Value]) -> Result<(), AleError> {
    let x = args.first().ok_or_else(|| AleError::compile("eval requires one argument"))?;
    let globals = encoder.globals().clone();
    let native = NativeFunction::new("eval*", ArityChecker::fixed(1), move |a| {
        crate::eval::eval_value(&globals, a[0].clone())
    });
    compile_runtime_call(encoder, x, native)
}

fn compile_macroexpand1(encoder: &mut Encoder, args: &[Value]) -> Result<(), AleError> {
    let x = args.first().ok_or_else(|| AleError::compile("macroexpand-1 requires one argument"))?;
    let globals = encoder.globals().clone();
    let native = NativeFunction::new("macroexpand-1*", ArityChecker::fixed(1), move |a| {
        Ok(macro_expand::expand1(&globals, &a[0])?.0)
    });
    compile_runtime_call(encoder, x, native)
}

fn compile_macroexpand(encoder: &mut Encoder, args: &[Value]) -> Result<(), AleError> {
    let x = args.first().ok_or_else(|| AleError::compile("macroexpand requires one argument"))?;
    let globals = encoder.globals().clone();
    let native = NativeFunction::new("macroexpand*", ArityChecker::fixed(1), move |a| {
        macro_expand::expand(&globals, &a[0])
    });
    compile_runtime_call(encoder, x, native)
}

fn special(name: &str, transform: impl Fn(&mut Encoder, &[Value]) -> Result<(), AleError> + Send + Sync + 'static) -> Value {
    let transform: SpecialTransform = Arc::new(transform);
    Value::Special(Arc::new(Special { name: name.to_string(), transform }))
}

/// Binds the thirteen special forms into `ns` (spec §4.F).
pub fn install(ns: &crate::namespace::Namespace) {
    ns.bind("quote", special("quote", compile_quote));
    ns.bind("do", special("do", |e, args| compile_do(e, args)));
    ns.bind("if", special("if", compile_if));
    ns.bind("let", special("let", compile_let));
    ns.bind("fn", special("fn", compile_fn));
    ns.bind("eval", special("eval", compile_eval));
    ns.bind("declare", special("declare", compile_declare));
    ns.bind("def", special("def", compile_def));
    ns.bind("defmacro", special("defmacro", compile_defmacro));
    ns.bind("macroexpand-1", special("macroexpand-1", compile_macroexpand1));
    ns.bind("macroexpand", special("macroexpand", compile_macroexpand));
    ns.bind("recover", special("recover", compile_recover));
    ns.bind("defer", special("defer", compile_defer));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;

    fn run(ns: &Namespace, form: Value) -> Value {
        crate::eval::eval_value(ns, form).unwrap()
    }

    fn root() -> Namespace {
        let ns = Namespace::root();
        install(&ns);
        crate::builtins::install(&ns);
        ns
    }

    #[test]
    fn def_binds_and_returns_the_value() {
        let ns = root();
        let list = Value::List(List::from_vec(vec![
            Value::symbol("def"),
            Value::symbol("x"),
            Value::int(42),
        ]));
        assert_eq!(run(&ns, list), Value::int(42));
        assert_eq!(ns.resolve("x"), Some(Value::int(42)));
    }

    #[test]
    fn if_picks_branch_by_truthiness() {
        let ns = root();
        let form = Value::List(List::from_vec(vec![
            Value::symbol("if"),
            Value::Bool(false),
            Value::int(1),
            Value::int(2),
        ]));
        assert_eq!(run(&ns, form), Value::int(2));
    }

    #[test]
    fn let_scopes_bindings_to_the_body() {
        let ns = root();
        let bindings = Value::List(List::from_vec(vec![
            Value::symbol("a"),
            Value::int(1),
            Value::symbol("b"),
            Value::int(2),
        ]));
        let add = Value::List(List::from_vec(vec![Value::symbol("+"), Value::symbol("a"), Value::symbol("b")]));
        let form = Value::List(List::from_vec(vec![Value::symbol("let"), bindings, add]));
        assert_eq!(run(&ns, form), Value::int(3));
        assert_eq!(ns.resolve("a"), None);
    }

    #[test]
    fn closures_capture_enclosing_arguments() {
        let ns = root();
        // (def add (fn (x) (fn (y) (+ x y))))
        let inner_args = Value::List(List::from_vec(vec![Value::symbol("y")]));
        let inner_body = Value::List(List::from_vec(vec![Value::symbol("+"), Value::symbol("x"), Value::symbol("y")]));
        let inner_fn = Value::List(List::from_vec(vec![Value::symbol("fn"), inner_args, inner_body]));
        let outer_args = Value::List(List::from_vec(vec![Value::symbol("x")]));
        let outer_fn = Value::List(List::from_vec(vec![Value::symbol("fn"), outer_args, inner_fn]));
        let def_add = Value::List(List::from_vec(vec![Value::symbol("def"), Value::symbol("add"), outer_fn]));
        run(&ns, def_add);

        let call = Value::List(List::from_vec(vec![
            Value::List(List::from_vec(vec![Value::symbol("add"), Value::int(3)])),
            Value::int(4),
        ]));
        assert_eq!(run(&ns, call), Value::int(7));
    }

    #[test]
    fn self_enables_anonymous_recursion() {
        let ns = root();
        // ((fn (n) (if (= n 0) 1 (* n (self (- n 1))))) 5)
        let cond = Value::List(List::from_vec(vec![Value::symbol("="), Value::symbol("n"), Value::int(0)]));
        let recurse = Value::List(List::from_vec(vec![
            Value::symbol("self"),
            Value::List(List::from_vec(vec![Value::symbol("-"), Value::symbol("n"), Value::int(1)])),
        ]));
        let mult = Value::List(List::from_vec(vec![Value::symbol("*"), Value::symbol("n"), recurse]));
        let body = Value::List(List::from_vec(vec![Value::symbol("if"), cond, Value::int(1), mult]));
        let args = Value::List(List::from_vec(vec![Value::symbol("n")]));
        let f = Value::List(List::from_vec(vec![Value::symbol("fn"), args, body]));
        let call = Value::List(List::from_vec(vec![f, Value::int(5)]));
        assert_eq!(run(&ns, call), Value::int(120));
    }

    #[test]
    fn defmacro_expands_before_compilation() {
        let ns = root();
        // (defmacro unless (c body) (list 'if c nil body))
        let mac_args = Value::List(List::from_vec(vec![Value::symbol("c"), Value::symbol("body")]));
        let quoted_if = Value::List(List::from_vec(vec![Value::symbol("quote"), Value::symbol("if")]));
        let list_call = Value::List(List::from_vec(vec![
            Value::symbol("list"),
            quoted_if,
            Value::symbol("c"),
            Value::Nil,
            Value::symbol("body"),
        ]));
        let defmacro = Value::List(List::from_vec(vec![
            Value::symbol("defmacro"),
            Value::symbol("unless"),
            mac_args,
            list_call,
        ]));
        run(&ns, defmacro);

        let quoted_ok = Value::List(List::from_vec(vec![Value::symbol("quote"), Value::keyword("ok")]));
        let usage = Value::List(List::from_vec(vec![Value::symbol("unless"), Value::Bool(false), quoted_ok]));
        assert_eq!(run(&ns, usage), Value::keyword("ok"));
    }
}
