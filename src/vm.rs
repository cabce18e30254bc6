// File: src/vm.rs
//
// The virtual machine (spec §4.H): a single linear value stack per
// call frame plus argument/local slots and a reference to the
// executing closure's captured values. `Panic` unwinds as a plain
// `Err(AleError)` rather than a native Rust panic — `defer`/`recover`
// are ordinary built-in procedures (src/builtins/concurrency.rs and
// friends) layered on top of that `Result`-based propagation, not VM
// opcodes themselves.

use crate::errors::{AleError, AleResult};
use crate::isa::{OpCode, Word};
use crate::namespace::Namespace;
use crate::value::{List, Name, Symbol, Value};
use std::sync::Arc;

/// A call-time argument count contract: fixed, ranged, or "n or more"
/// (`max: None`).
#[derive(Debug, Clone, Copy)]
pub struct Arity {
    pub min: u32,
    pub max: Option<u32>,
}

impl Arity {
    pub fn fixed(n: u32) -> Self {
        Arity { min: n, max: Some(n) }
    }

    pub fn variadic(min: u32) -> Self {
        Arity { min, max: None }
    }

    pub fn check(&self, count: usize) -> AleResult<()> {
        let count = count as u32;
        if count < self.min || self.max.map(|m| count > m).unwrap_or(false) {
            let expected = match self.max {
                Some(max) if max == self.min => format!("{}", self.min),
                Some(max) => format!("{}..{}", self.min, max),
                None => format!("{} or more", self.min),
            };
            return Err(AleError::arity(format!(
                "wrong number of arguments: expected {expected}, got {count}"
            )));
        }
        Ok(())
    }
}

/// The immutable output of compiling one `fn`/`defmacro` body: the
/// bytecode-layout contract from spec §6.
pub struct Procedure {
    pub name: Option<Name>,
    pub constants: Vec<Value>,
    pub code: Vec<Word>,
    pub stack_size: u32,
    pub local_count: u32,
    pub arity: Arity,
    pub closure_names: Vec<Name>,
    pub is_macro: bool,
    pub globals: Namespace,
}

/// A `Procedure` bound to the values it captured from enclosing
/// scopes, in `closure_names` order.
pub struct Closure {
    pub proc: Arc<Procedure>,
    pub captured: Vec<Value>,
}

impl Closure {
    pub fn display_name(&self) -> String {
        self.proc.name.as_deref().unwrap_or("anonymous").to_string()
    }

    pub fn call(&self, args: &[Value]) -> AleResult<Value> {
        self.proc.arity.check(args.len())?;
        let mut frame = Frame::new(self, args);
        run(&mut frame)
    }
}

struct Frame<'a> {
    proc: &'a Procedure,
    captured: &'a [Value],
    args: Vec<Value>,
    locals: Vec<Value>,
    stack: Vec<Value>,
    ip: usize,
}

impl<'a> Frame<'a> {
    fn new(closure: &'a Closure, args: &[Value]) -> Self {
        Frame {
            proc: &closure.proc,
            captured: &closure.captured,
            args: args.to_vec(),
            locals: vec![Value::Nil; closure.proc.local_count as usize],
            stack: Vec::with_capacity(closure.proc.stack_size as usize),
            ip: 0,
        }
    }

    fn pop(&mut self) -> AleResult<Value> {
        self.stack.pop().ok_or_else(|| AleError::compile("stack underflow at runtime"))
    }

    fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    fn const_symbol(&self, idx: u32) -> AleResult<&Symbol> {
        match self.proc.constants.get(idx as usize) {
            Some(Value::Symbol(s)) => Ok(s),
            _ => Err(AleError::compile("name constant is not a symbol")),
        }
    }
}

/// Runs a frame's bytecode to completion, returning the value produced
/// by whichever `Return*` instruction was reached.
fn run(frame: &mut Frame) -> AleResult<Value> {
    loop {
        let op = frame
            .proc
            .code
            .get(frame.ip)
            .ok_or_else(|| AleError::compile("instruction pointer ran off the end of code"))?
            .clone();
        frame.ip += 1;

        match op {
            OpCode::Nil => frame.push(Value::Nil),
            OpCode::True => frame.push(Value::Bool(true)),
            OpCode::False => frame.push(Value::Bool(false)),
            OpCode::Zero => frame.push(Value::int(0)),
            OpCode::One => frame.push(Value::int(1)),
            OpCode::Two => frame.push(Value::int(2)),
            OpCode::NegOne => frame.push(Value::int(-1)),
            OpCode::PosInfinity => frame.push(Value::Float(f64::INFINITY)),
            OpCode::NegInfinity => frame.push(Value::Float(f64::NEG_INFINITY)),

            OpCode::Const(idx) => {
                let v = frame
                    .proc
                    .constants
                    .get(idx as usize)
                    .cloned()
                    .ok_or_else(|| AleError::compile("constant index out of range"))?;
                frame.push(v);
            }
            OpCode::Arg(idx) => {
                let v = frame
                    .args
                    .get(idx as usize)
                    .cloned()
                    .ok_or_else(|| AleError::compile("argument index out of range"))?;
                frame.push(v);
            }
            OpCode::ArgLen => frame.push(Value::int(frame.args.len() as i64)),
            OpCode::RestArg(idx) => {
                let rest: Vec<Value> = frame.args.iter().skip(idx as usize).cloned().collect();
                frame.push(Value::List(List::from_vec(rest)));
            }
            OpCode::Load(idx) => {
                let v = frame
                    .locals
                    .get(idx as usize)
                    .cloned()
                    .ok_or_else(|| AleError::compile("local index out of range"))?;
                frame.push(v);
            }
            OpCode::Store(idx) => {
                let v = frame.pop()?;
                *frame
                    .locals
                    .get_mut(idx as usize)
                    .ok_or_else(|| AleError::compile("local index out of range"))? = v;
            }
            OpCode::SelfValue => {
                // Reconstructed from the frame's own procedure + captures
                // rather than a stored back-reference, since the closure
                // that invoked `call` may no longer be on the Rust stack
                // by the time this executes (tail positions, re-entrancy).
                frame.push(Value::Closure(Arc::new(Closure {
                    proc: Arc::new(clone_procedure_shell(frame.proc)),
                    captured: frame.captured.to_vec(),
                })));
            }
            OpCode::Closure(idx) => {
                let v = frame
                    .captured
                    .get(idx as usize)
                    .cloned()
                    .ok_or_else(|| AleError::compile("closure cell index out of range"))?;
                frame.push(v);
            }
            OpCode::Resolve(idx) => {
                let sym = frame.const_symbol(idx)?.clone();
                let v = frame
                    .proc
                    .globals
                    .resolve_symbol(&sym)
                    .ok_or_else(|| AleError::compile(format!("unbound symbol: {sym}")))?;
                frame.push(v);
            }
            OpCode::Declare(idx) => {
                let sym = frame.const_symbol(idx)?.clone();
                frame.proc.globals.declare(sym.name());
            }
            OpCode::Bind(idx) => {
                let sym = frame.const_symbol(idx)?.clone();
                let v = frame.pop()?;
                frame.proc.globals.bind(sym.name(), v);
            }

            OpCode::Dup => {
                let v = frame.pop()?;
                frame.push(v.clone());
                frame.push(v);
            }
            OpCode::Pop => {
                frame.pop()?;
            }

            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Mod => {
                let b = frame.pop()?;
                let a = frame.pop()?;
                frame.push(crate::builtins::arithmetic::binary(&op, &a, &b)?);
            }
            OpCode::Eq | OpCode::Neq | OpCode::Lt | OpCode::Lte | OpCode::Gt | OpCode::Gte => {
                let b = frame.pop()?;
                let a = frame.pop()?;
                frame.push(crate::builtins::comparison::binary(&op, &a, &b)?);
            }

            OpCode::Neg => {
                let v = frame.pop()?;
                frame.push(crate::builtins::arithmetic::negate(&v)?);
            }
            OpCode::Not => {
                let v = frame.pop()?;
                frame.push(Value::Bool(!v.is_truthy()));
            }
            OpCode::MakeTruthy => {
                let v = frame.pop()?;
                frame.push(Value::Bool(v.is_truthy()));
            }

            OpCode::MakeCall { proc_const, capture_count } => {
                let mut captured = Vec::with_capacity(capture_count as usize);
                for _ in 0..capture_count {
                    captured.push(frame.pop()?);
                }
                captured.reverse();
                let template = match frame.proc.constants.get(proc_const as usize) {
                    Some(Value::Closure(c)) => c.clone(),
                    _ => return Err(AleError::compile("MakeCall target is not a procedure")),
                };
                frame.push(Value::Closure(Arc::new(Closure { proc: template.proc.clone(), captured })));
            }

            OpCode::Call0 => {
                let callee = frame.pop()?;
                let result = invoke(&callee, &[])?;
                frame.push(result);
            }
            OpCode::Call1 => {
                let arg = frame.pop()?;
                let callee = frame.pop()?;
                let result = invoke(&callee, &[arg])?;
                frame.push(result);
            }
            OpCode::Call(n) => {
                let mut args = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    args.push(frame.pop()?);
                }
                args.reverse();
                let callee = frame.pop()?;
                let result = invoke(&callee, &args)?;
                frame.push(result);
            }

            OpCode::Jump(target) => frame.ip = target as usize,
            OpCode::CondJump(target) => {
                let v = frame.pop()?;
                if v.is_truthy() {
                    frame.ip = target as usize;
                }
            }

            OpCode::Return => return frame.pop(),
            OpCode::ReturnNil => return Ok(Value::Nil),
            OpCode::ReturnTrue => return Ok(Value::Bool(true)),
            OpCode::ReturnFalse => return Ok(Value::Bool(false)),
            OpCode::Panic => {
                let v = frame.pop()?;
                return Err(AleError::raised(v));
            }

            OpCode::NoOp => {}
        }
    }
}

/// `Self` needs to push *a* callable value representing the running
/// function; since the frame only borrows its `Procedure`, we rebuild
/// an `Arc` around a cheap shell that shares the original code via a
/// fresh `Arc` allocation sized once at first use. Functions that
/// reference `self` are expected to be small and called often, so this
/// trades one allocation per `Self` opcode for not having to thread an
/// `Arc<Procedure>` through every frame just for this one case.
fn clone_procedure_shell(proc: &Procedure) -> Procedure {
    Procedure {
        name: proc.name.clone(),
        constants: proc.constants.clone(),
        code: proc.code.clone(),
        stack_size: proc.stack_size,
        local_count: proc.local_count,
        arity: proc.arity,
        closure_names: proc.closure_names.clone(),
        is_macro: proc.is_macro,
        globals: proc.globals.clone(),
    }
}

/// Arity is verified before transfer, matching §4.H's failure
/// semantics: an arity mismatch is fatal before the callee's code ever
/// runs.
pub fn invoke(callee: &Value, args: &[Value]) -> AleResult<Value> {
    match callee {
        Value::Closure(c) => c.call(args),
        Value::Function(f) => {
            f.arity.check(args.len())?;
            (f.func)(args)
        }
        _ => {
            let f = callee.caller()?;
            f(args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::OpCode;

    fn const_proc(code: Vec<Word>, constants: Vec<Value>, arity: Arity) -> Arc<Closure> {
        let globals = Namespace::root();
        Arc::new(Closure {
            proc: Arc::new(Procedure {
                name: None,
                constants,
                code,
                stack_size: 4,
                local_count: 0,
                arity,
                closure_names: Vec::new(),
                is_macro: false,
                globals,
            }),
            captured: Vec::new(),
        })
    }

    #[test]
    fn runs_straight_line_arithmetic() {
        let closure =
            const_proc(vec![OpCode::One, OpCode::Two, OpCode::Add, OpCode::Return], vec![], Arity::fixed(0));
        assert_eq!(closure.call(&[]).unwrap(), Value::int(3));
    }

    #[test]
    fn arg_reads_bound_parameter() {
        let closure = const_proc(vec![OpCode::Arg(0), OpCode::Return], vec![], Arity::fixed(1));
        assert_eq!(closure.call(&[Value::int(41)]).unwrap(), Value::int(41));
    }

    #[test]
    fn panic_propagates_as_a_result_error() {
        let closure = const_proc(
            vec![OpCode::Const(0), OpCode::Panic],
            vec![Value::str("boom")],
            Arity::fixed(0),
        );
        let err = closure.call(&[]).unwrap_err();
        assert_eq!(err.recovered_value(), Value::str("boom"));
    }

    #[test]
    fn conditional_jump_selects_branch() {
        let closure = const_proc(
            vec![
                OpCode::True,
                OpCode::CondJump(4),
                OpCode::Zero,
                OpCode::Jump(5),
                OpCode::One,
                OpCode::Return,
            ],
            vec![],
            Arity::fixed(0),
        );
        assert_eq!(closure.call(&[]).unwrap(), Value::int(1));
    }
}
