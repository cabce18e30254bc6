// File: src/encoder.rs
//
// The encoder (spec §4.D): a compile-time accumulator that turns
// special-form and call compilers' decisions into a bytecode stream,
// tracking constants, locals, arguments, and closure cells along the
// way.
//
// Parent/child encoders don't keep a live back-reference. A child only
// needs read access to its immediate parent's argument and local
// frames at the moment it's created (the parent is paused on the Rust
// call stack while the child compiles, so those frames can't change
// underneath it); that's captured once as a `ParentScope` snapshot,
// severing the link for good once the child is finalized into a
// `Procedure` value.

use crate::errors::AleError;
use crate::isa::{Index, OpCode, Word};
use crate::namespace::Namespace;
use crate::value::{Name, Value};
use crate::{analysis, vm};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Argument,
    Local,
    Closure,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Clone, Default)]
struct ArgFrame {
    names: Vec<Name>,
    variadic: bool,
}

#[derive(Clone, Default)]
struct LocalFrame {
    names: Vec<(Name, Index)>,
}

/// A read-only snapshot of a parent encoder's argument and local
/// frames, enough to answer "is this name a direct arg or local of my
/// immediate lexical parent?" without holding a live reference.
#[derive(Clone, Default)]
struct ParentScope {
    args: Vec<ArgFrame>,
    locals: Vec<LocalFrame>,
}

pub struct Encoder {
    parent: Option<ParentScope>,
    globals: Namespace,
    name: Option<Name>,
    constants: Vec<Value>,
    closure: Vec<Name>,
    args: Vec<ArgFrame>,
    locals: Vec<LocalFrame>,
    local_frame_start: Vec<u32>,
    next_local: u32,
    max_local: u32,
    code: Vec<OpCode>,
    labels: Vec<Option<usize>>,
    finalized: bool,
}

impl Encoder {
    pub fn new(globals: Namespace) -> Self {
        Encoder {
            parent: None,
            globals,
            name: None,
            constants: Vec::new(),
            closure: Vec::new(),
            args: Vec::new(),
            locals: vec![LocalFrame::default()],
            local_frame_start: vec![0],
            next_local: 0,
            max_local: 0,
            code: Vec::new(),
            labels: Vec::new(),
            finalized: false,
        }
    }

    fn new_child(&self) -> Self {
        Encoder {
            parent: Some(ParentScope { args: self.args.clone(), locals: self.locals.clone() }),
            globals: self.globals.clone(),
            name: None,
            constants: Vec::new(),
            closure: Vec::new(),
            args: Vec::new(),
            locals: vec![LocalFrame::default()],
            local_frame_start: vec![0],
            next_local: 0,
            max_local: 0,
            code: Vec::new(),
            labels: Vec::new(),
            finalized: false,
        }
    }

    pub fn child(&self) -> Self {
        self.new_child()
    }

    pub fn named_child(&self, name: impl AsRef<str>) -> Self {
        let mut child = self.new_child();
        child.name = Some(Arc::from(name.as_ref()));
        child
    }

    pub fn name(&self) -> Option<&Name> {
        self.name.as_ref()
    }

    pub fn globals(&self) -> &Namespace {
        &self.globals
    }

    // -- code emission --------------------------------------------------

    pub fn emit(&mut self, op: OpCode) {
        assert!(!self.finalized, "emitting after finalization");
        self.code.push(op);
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    pub fn mark_label(&mut self, label: Label) {
        self.labels[label.0] = Some(self.code.len());
    }

    pub fn emit_jump(&mut self, label: Label) {
        self.emit(OpCode::Jump(label.0 as Index));
    }

    pub fn emit_cond_jump(&mut self, label: Label) {
        self.emit(OpCode::CondJump(label.0 as Index));
    }

    /// Resolves labels to instruction offsets and flattens the stream.
    /// Subsequent `emit` calls are a programming error (`finalized`
    /// gates them via the assert above).
    pub fn code(&mut self) -> Result<Vec<Word>, AleError> {
        let resolved = self.resolve_labels()?;
        self.finalized = true;
        Ok(resolved)
    }

    fn resolve_labels(&self) -> Result<Vec<Word>, AleError> {
        self.code
            .iter()
            .map(|op| match op {
                OpCode::Jump(label) => {
                    let offset = self.labels.get(*label as usize).copied().flatten().ok_or_else(
                        || AleError::compile(format!("unresolved label {label}")),
                    )?;
                    Ok(OpCode::Jump(offset as Index))
                }
                OpCode::CondJump(label) => {
                    let offset = self.labels.get(*label as usize).copied().flatten().ok_or_else(
                        || AleError::compile(format!("unresolved label {label}")),
                    )?;
                    Ok(OpCode::CondJump(offset as Index))
                }
                other => Ok(other.clone()),
            })
            .collect()
    }

    pub fn stack_size(&self) -> Result<usize, AleError> {
        let resolved = self.resolve_labels()?;
        analysis::stack_size(&resolved)
    }

    // -- constants --------------------------------------------------------

    pub fn add_constant(&mut self, value: Value) -> Index {
        if let Some(idx) = self.constants.iter().position(|c| c.equal(&value)) {
            return idx as Index;
        }
        self.constants.push(value);
        (self.constants.len() - 1) as Index
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    // -- arguments ----------------------------------------------------------

    pub fn push_args(&mut self, names: Vec<Name>, variadic: bool) {
        self.args.push(ArgFrame { names, variadic });
    }

    pub fn pop_args(&mut self) {
        self.args.pop();
    }

    pub fn resolve_arg(&self, sym: &str) -> Option<(Index, bool)> {
        let frame = self.args.last()?;
        let pos = frame.names.iter().position(|n| n.as_ref() == sym)?;
        let is_rest = frame.variadic && pos == frame.names.len() - 1;
        Some((pos as Index, is_rest))
    }

    pub fn arg_count(&self) -> usize {
        self.args.last().map(|f| f.names.len()).unwrap_or(0)
    }

    pub fn is_variadic(&self) -> bool {
        self.args.last().map(|f| f.variadic).unwrap_or(false)
    }

    // -- locals -----------------------------------------------------------

    pub fn push_locals(&mut self) {
        self.locals.push(LocalFrame::default());
        self.local_frame_start.push(self.next_local);
    }

    /// Deallocates the innermost local frame. Slot indices are reused
    /// by later sibling `let` blocks, but `max_local` (the high-water
    /// mark driving frame-allocation size) is never reduced.
    pub fn pop_locals(&mut self) {
        self.locals.pop();
        if let Some(start) = self.local_frame_start.pop() {
            self.next_local = start;
        }
    }

    pub fn add_local(&mut self, name: impl AsRef<str>) -> Index {
        let idx = self.next_local;
        self.next_local += 1;
        if self.next_local > self.max_local {
            self.max_local = self.next_local;
        }
        let name: Name = Arc::from(name.as_ref());
        self.locals.last_mut().expect("at least one local frame").names.push((name, idx));
        idx
    }

    pub fn resolve_local(&self, sym: &str) -> Option<Index> {
        for frame in self.locals.iter().rev() {
            if let Some((_, idx)) = frame.names.iter().rev().find(|(n, _)| n.as_ref() == sym) {
                return Some(*idx);
            }
        }
        None
    }

    pub fn local_count(&self) -> u32 {
        self.max_local
    }

    // -- closure cells ------------------------------------------------------

    /// Walks only the *immediate* parent's argument/local snapshot.
    /// Capture from further ancestors falls out of the recursive
    /// structure: when this encoder is finalized, its own parent is
    /// asked (via `resolve_scope`) to supply a value for each captured
    /// name, and if the parent doesn't have it directly either, that
    /// call recurses into the parent's own `resolve_closure` against
    /// *its* parent, registering the capture one level at a time.
    pub fn resolve_closure(&mut self, sym: &str) -> Option<Index> {
        let parent = self.parent.as_ref()?;
        let found_in_parent = parent.args.last().map(|f| f.names.iter().any(|n| n.as_ref() == sym)).unwrap_or(false)
            || parent.locals.iter().any(|f| f.names.iter().any(|(n, _)| n.as_ref() == sym));
        if !found_in_parent {
            return None;
        }
        if let Some(idx) = self.closure.iter().position(|n| n.as_ref() == sym) {
            return Some(idx as Index);
        }
        self.closure.push(Arc::from(sym));
        Some((self.closure.len() - 1) as Index)
    }

    pub fn closure_names(&self) -> &[Name] {
        &self.closure
    }

    // -- scope resolution ----------------------------------------------------

    pub fn resolve_scope(&mut self, sym: &str) -> Option<Scope> {
        if self.resolve_arg(sym).is_some() {
            return Some(Scope::Argument);
        }
        if self.resolve_local(sym).is_some() {
            return Some(Scope::Local);
        }
        if self.resolve_closure(sym).is_some() {
            return Some(Scope::Closure);
        }
        if self.globals.is_bound(sym) {
            return Some(Scope::Global);
        }
        None
    }

    pub fn in_scope(&mut self, sym: &str) -> bool {
        self.resolve_scope(sym).is_some()
    }

    /// Finalizes this encoder into an immutable procedure, the form a
    /// compiled function or macro body takes once compilation is done.
    pub fn finalize(
        mut self,
        arity: vm::Arity,
        is_macro: bool,
    ) -> Result<vm::Procedure, AleError> {
        let stack_size = self.stack_size()?;
        let code = self.code()?;
        Ok(vm::Procedure {
            name: self.name.take(),
            constants: self.constants,
            code,
            stack_size: stack_size as u32,
            local_count: self.max_local,
            arity,
            closure_names: self.closure,
            is_macro,
            globals: self.globals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_encoder() -> Encoder {
        Encoder::new(Namespace::root())
    }

    #[test]
    fn resolve_arg_only_sees_topmost_frame() {
        let mut e = test_encoder();
        e.push_args(vec![Arc::from("x")], false);
        assert_eq!(e.resolve_arg("x"), Some((0, false)));
        assert_eq!(e.resolve_arg("y"), None);
    }

    #[test]
    fn pop_locals_frees_slots_without_lowering_max_local() {
        let mut e = test_encoder();
        e.push_locals();
        e.add_local("a");
        e.add_local("b");
        assert_eq!(e.local_count(), 2);
        e.pop_locals();
        e.push_locals();
        let idx = e.add_local("c");
        assert_eq!(idx, 0, "slot should be reused after the sibling frame closed");
        assert_eq!(e.local_count(), 2, "high-water mark must not shrink");
    }

    #[test]
    fn child_captures_parent_arg_as_closure_cell() {
        let mut parent = test_encoder();
        parent.push_args(vec![Arc::from("x")], false);
        let mut child = parent.child();
        assert_eq!(child.resolve_scope("x"), Some(Scope::Closure));
        assert_eq!(child.closure_names(), &[Arc::<str>::from("x")]);
        // Idempotent: resolving again returns the same index.
        assert_eq!(child.resolve_closure("x"), Some(0));
    }

    #[test]
    fn unresolved_label_is_a_compile_error() {
        let mut e = test_encoder();
        let label = e.new_label();
        e.emit_jump(label);
        assert!(e.code().is_err());
    }
}
