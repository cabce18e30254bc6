// File: src/value/mod.rs
//
// The ale runtime value model (spec §3): a tagged sum of every kind of
// value that can flow through the reader, the encoder's constant pool,
// and the VM's stack. Capabilities (Sequence, Counted, Indexed, Mapped,
// Caller, Hashable, Equatable, Named) are plain methods dispatched by
// match rather than a trait-object hierarchy, per the design note on
// avoiding deep inheritance for dynamic dispatch on value kind.

mod list;
mod object;
mod vector;

pub use list::List;
pub use object::Object;
pub use vector::Vector;

use crate::concurrency::{ChannelEnd, Promise};
use crate::errors::{AleError, AleResult};
use crate::vm::Closure;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A callable's calling convention (glossary: Convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// Arguments are evaluated before the call (ordinary functions).
    Applicative,
    /// Arguments are passed unevaluated (special forms and macros).
    Normal,
}

/// Validates a call-time argument count against a declared spec: fixed,
/// ranged, or "at least n" (`max: None`).
#[derive(Debug, Clone, Copy)]
pub struct ArityChecker {
    pub min: usize,
    pub max: Option<usize>,
}

impl ArityChecker {
    pub fn fixed(n: usize) -> Self {
        ArityChecker { min: n, max: Some(n) }
    }

    pub fn ranged(min: usize, max: usize) -> Self {
        ArityChecker { min, max: Some(max) }
    }

    pub fn at_least(min: usize) -> Self {
        ArityChecker { min, max: None }
    }

    pub fn check(&self, count: usize) -> AleResult<()> {
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

pub type CallFn = Arc<dyn Fn(&[Value]) -> AleResult<Value> + Send + Sync>;

/// A built-in (Rust-implemented) procedure.
pub struct NativeFunction {
    pub name: String,
    pub convention: Convention,
    pub arity: ArityChecker,
    pub func: CallFn,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        arity: ArityChecker,
        func: impl Fn(&[Value]) -> AleResult<Value> + Send + Sync + 'static,
    ) -> Self {
        NativeFunction {
            name: name.into(),
            convention: Convention::Applicative,
            arity,
            func: Arc::new(func),
        }
    }
}

/// A special form: an encoder-time transform (spec §4.F). The transform
/// receives the encoder being compiled into and the form's raw
/// (unevaluated) argument values.
pub type SpecialTransform =
    Arc<dyn Fn(&mut crate::encoder::Encoder, &[Value]) -> AleResult<()> + Send + Sync>;

pub struct Special {
    pub name: String,
    pub transform: SpecialTransform,
}

/// A binding name: interned-free but cheaply cloned, since the same
/// identifier tends to flow through constants, closures, and
/// namespace lookups repeatedly during a single compilation.
pub type Name = Arc<str>;

/// A symbol, either bound to the local lexical/global namespace or
/// qualified by an explicit domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    Local(Arc<str>),
    Qualified(Arc<str>, Arc<str>),
}

impl Symbol {
    pub fn local(name: impl AsRef<str>) -> Self {
        Symbol::Local(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        match self {
            Symbol::Local(n) => n,
            Symbol::Qualified(_, n) => n,
        }
    }

    pub fn domain(&self) -> Option<&str> {
        match self {
            Symbol::Local(_) => None,
            Symbol::Qualified(d, _) => Some(d),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Symbol::Local(n) => write!(f, "{n}"),
            Symbol::Qualified(d, n) => write!(f, "{d}/{n}"),
        }
    }
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Integer(BigInt),
    Float(f64),
    Str(Arc<String>),
    Keyword(Arc<str>),
    Symbol(Symbol),
    List(List),
    Vector(Vector),
    Object(Object),
    Cons(Arc<(Value, Value)>),
    Function(Arc<NativeFunction>),
    Closure(Arc<Closure>),
    Special(Arc<Special>),
    Channel(ChannelEnd),
    Promise(Arc<Promise>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(Arc::new(s.into()))
    }

    pub fn keyword(name: impl AsRef<str>) -> Value {
        Value::Keyword(Arc::from(name.as_ref()))
    }

    pub fn symbol(name: impl AsRef<str>) -> Value {
        Value::Symbol(Symbol::local(name))
    }

    pub fn int(n: i64) -> Value {
        Value::Integer(BigInt::from(n))
    }

    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Cons(Arc::new((car, cdr)))
    }

    pub fn bool(b: bool) -> Value {
        Value::Bool(b)
    }

    pub fn car(&self) -> AleResult<Value> {
        match self {
            Value::Cons(p) => Ok(p.0.clone()),
            _ => Err(AleError::type_error(format!("{} is not a pair", self.type_name()))),
        }
    }

    pub fn cdr(&self) -> AleResult<Value> {
        match self {
            Value::Cons(p) => Ok(p.1.clone()),
            _ => Err(AleError::type_error(format!("{} is not a pair", self.type_name()))),
        }
    }

    /// Named capability: a short type tag, used in error messages and by
    /// the `is-*` predicate builtins.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Keyword(_) => "keyword",
            Value::Symbol(Symbol::Local(_)) => "local-symbol",
            Value::Symbol(Symbol::Qualified(..)) => "qualified-symbol",
            Value::List(_) => "list",
            Value::Vector(_) => "vector",
            Value::Object(_) => "object",
            Value::Cons(_) => "cons",
            Value::Function(_) => "function",
            Value::Closure(_) => "closure",
            Value::Special(_) => "special",
            Value::Channel(_) => "channel",
            Value::Promise(_) => "promise",
        }
    }

    /// Every value except `nil` and `false` is truthy (used by
    /// MakeTruthy, CondJump, and the `if` special form).
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// An atom is anything that is not itself a compound sequence.
    pub fn is_atom(&self) -> bool {
        !matches!(self, Value::List(_) | Value::Vector(_) | Value::Object(_) | Value::Cons(_))
    }

    /// Sequence capability: `(first, rest, more?)`. `Nil` behaves as the
    /// empty list, per the invariant that EmptyList terminates every
    /// list.
    pub fn split(&self) -> AleResult<(Value, Value, bool)> {
        match self {
            Value::Nil => Ok((Value::Nil, Value::List(List::empty()), false)),
            Value::List(l) => {
                let (f, r, more) = l.split();
                Ok((f, Value::List(r), more))
            }
            Value::Vector(v) => {
                let (f, r, more) = v.split();
                Ok((f, Value::Vector(r), more))
            }
            Value::Object(o) => {
                let (f, r, more) = o.split();
                Ok((f, Value::Object(r), more))
            }
            _ => Err(AleError::type_error(format!("{} is not a sequence", self.type_name()))),
        }
    }

    pub fn first(&self) -> AleResult<Value> {
        Ok(self.split()?.0)
    }

    pub fn rest(&self) -> AleResult<Value> {
        Ok(self.split()?.1)
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::Nil | Value::List(_) | Value::Vector(_) | Value::Object(_))
    }

    /// Counted capability.
    pub fn count(&self) -> AleResult<usize> {
        match self {
            Value::Nil => Ok(0),
            Value::List(l) => Ok(l.count()),
            Value::Vector(v) => Ok(v.len()),
            Value::Object(o) => Ok(o.count()),
            Value::Str(s) => Ok(s.chars().count()),
            _ => Err(AleError::type_error(format!("{} is not counted", self.type_name()))),
        }
    }

    /// Indexed capability (vectors and strings; lists are walked, not
    /// indexed).
    pub fn nth(&self, index: usize) -> AleResult<Value> {
        match self {
            Value::Vector(v) => {
                v.get(index).ok_or_else(|| AleError::type_error("index out of range"))
            }
            Value::List(l) => {
                l.element_at(index).ok_or_else(|| AleError::type_error("index out of range"))
            }
            Value::Str(s) => s
                .chars()
                .nth(index)
                .map(|c| Value::str(c.to_string()))
                .ok_or_else(|| AleError::type_error("index out of range")),
            _ => Err(AleError::type_error(format!("{} is not indexed", self.type_name()))),
        }
    }

    /// Mapped capability: `get` with an optional default.
    pub fn get(&self, key: &Value, default: Option<Value>) -> AleResult<Value> {
        match self {
            Value::Object(o) => Ok(o.get(key).or(default).unwrap_or(Value::Nil)),
            _ => Err(AleError::type_error(format!("{} is not mapped", self.type_name()))),
        }
    }

    /// Conjoin a value: prepend for lists, append for vectors, an
    /// implicit pair for objects.
    pub fn conj(&self, v: Value) -> AleResult<Value> {
        match self {
            Value::Nil => Ok(Value::List(List::empty().prepend(v))),
            Value::List(l) => Ok(Value::List(l.prepend(v))),
            Value::Vector(vec) => Ok(Value::Vector(vec.conj(v))),
            Value::Object(o) => {
                let (k, val) = (v.car()?, v.cdr()?);
                Ok(Value::Object(o.put(k, val)))
            }
            _ => Err(AleError::type_error(format!("{} cannot be conjoined", self.type_name()))),
        }
    }

    /// Caller capability, resolved with a single convention (spec §9's
    /// Open Question): every callable exposes its call procedure once.
    pub fn caller(&self) -> AleResult<CallFn> {
        match self {
            Value::Function(f) => Ok(f.func.clone()),
            Value::Closure(c) => {
                let c = c.clone();
                Ok(Arc::new(move |args: &[Value]| c.call(args)))
            }
            Value::Promise(p) => {
                let p = p.clone();
                Ok(Arc::new(move |args: &[Value]| {
                    if args.is_empty() {
                        p.resolve()
                    } else {
                        p.deliver(args[0].clone())
                    }
                }))
            }
            Value::Object(o) => {
                let o = o.clone();
                Ok(Arc::new(move |args: &[Value]| {
                    let found = o.get(&args[0]);
                    Ok(found.or_else(|| args.get(1).cloned()).unwrap_or(Value::Nil))
                }))
            }
            _ => Err(AleError::type_error(format!("{} is not callable", self.type_name()))),
        }
    }

    pub fn is_callable(&self) -> bool {
        self.caller().is_ok()
    }

    /// Equatable capability. Structural equality; Integer and Float
    /// compare across kinds by numeric value so `(= 1 1.0)` holds.
    pub fn equal(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Bool(a), Bool(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Integer(a), Float(b)) | (Float(b), Integer(a)) => {
                a.to_f64().map(|a| a == *b).unwrap_or(false)
            }
            (Str(a), Str(b)) => a == b,
            (Keyword(a), Keyword(b)) => a == b,
            (Symbol(a), Symbol(b)) => a == b,
            (List(a), List(b)) => a.equal(b),
            (Vector(a), Vector(b)) => a.equal(b),
            (Object(a), Object(b)) => a.equal(b),
            (Cons(a), Cons(b)) => a.0.equal(&b.0) && a.1.equal(&b.1),
            (Nil, List(l)) | (List(l), Nil) => l.is_empty(),
            _ => false,
        }
    }

    /// Hashable capability: must agree with `equal` (§8's invariant).
    pub fn hash_code(&self) -> u64 {
        use Value::*;
        match self {
            Nil => 0x9e37_79b9,
            Bool(b) => *b as u64 + 1,
            Integer(n) => {
                if let Some(f) = n.to_f64() {
                    f.to_bits()
                } else {
                    hash_bytes(&n.to_signed_bytes_le())
                }
            }
            Float(f) => f.to_bits(),
            Str(s) => hash_bytes(s.as_bytes()),
            Keyword(s) => hash_bytes(s.as_bytes()).wrapping_add(1),
            Symbol(s) => hash_bytes(s.to_string().as_bytes()).wrapping_add(2),
            List(l) => l.hash_code(),
            Vector(v) => v.hash_code(),
            Object(o) => o.hash_code(),
            Cons(p) => p.0.hash_code() ^ p.1.hash_code().rotate_left(13),
            Function(f) => hash_bytes(f.name.as_bytes()),
            Closure(c) => c.as_ref() as *const crate::vm::Closure as u64,
            Special(s) => hash_bytes(s.name.as_bytes()),
            Channel(_) | Promise(_) => {
                // Identity-only values: pointer identity is the only
                // sensible hash since two distinct promises/channels
                // are never structurally equal.
                self as *const Value as u64
            }
        }
    }

    /// Numeric/lexicographic ordering for the comparison opcodes
    /// (Lt/Gt/Lte/Gte). Integers and floats compare across kinds.
    pub fn compare(&self, other: &Value) -> AleResult<Ordering> {
        use Value::*;
        match (self, other) {
            (Integer(a), Integer(b)) => Ok(a.cmp(b)),
            (Float(a), Float(b)) => {
                a.partial_cmp(b).ok_or_else(|| AleError::arithmetic("NaN is unordered"))
            }
            (Integer(a), Float(b)) => a
                .to_f64()
                .and_then(|a| a.partial_cmp(b))
                .ok_or_else(|| AleError::arithmetic("NaN is unordered")),
            (Float(a), Integer(b)) => b
                .to_f64()
                .and_then(|b| a.partial_cmp(&b))
                .ok_or_else(|| AleError::arithmetic("NaN is unordered")),
            (Str(a), Str(b)) => Ok(a.cmp(b)),
            _ => Err(AleError::type_error(format!(
                "cannot compare {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::Integer(n) => n.is_zero(),
            Value::Float(f) => *f == 0.0,
            _ => false,
        }
    }

    pub fn print(&self) -> String {
        use Value::*;
        match self {
            Nil => "nil".to_string(),
            Bool(b) => b.to_string(),
            Integer(n) => n.to_string(),
            Float(f) => print_float(*f),
            Str(s) => format!("{:?}", s.as_str()),
            Keyword(k) => format!(":{k}"),
            Symbol(s) => s.to_string(),
            List(l) => l.to_string(),
            Vector(v) => v.to_string(),
            Object(o) => o.to_string(),
            Cons(p) => format!("({} . {})", p.0.print(), p.1.print()),
            Function(f) => format!("#<function {}>", f.name),
            Closure(c) => format!("#<closure {}>", c.display_name()),
            Special(s) => format!("#<special {}>", s.name),
            Channel(_) => "#<channel>".to_string(),
            Promise(_) => "#<promise>".to_string(),
        }
    }
}

fn print_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "+Inf".to_string() } else { "-Inf".to_string() }
    } else if f == f.trunc() && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

fn hash_bytes(bytes: &[u8]) -> u64 {
    // FNV-1a: simple, deterministic across runs (unlike ahash's random
    // per-process seed), which the Equal/HashCode invariant needs to
    // hold for values built at different times within the same process.
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.print())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}
