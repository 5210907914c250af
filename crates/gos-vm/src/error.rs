//! Heap and VM errors.

use thiserror::Error;

use crate::heap::{Addr, Tag};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HeapError {
    #[error("heap size {0} is not a multiple of the 8-byte word size")]
    Misaligned(usize),
    #[error("heap exhausted: requested {requested} words with {free} of {capacity} words in use")]
    OutOfMemory {
        requested: usize,
        free: usize,
        capacity: usize,
    },
    #[error("heap size {0} exceeds the 32-bit word address space")]
    TooLarge(usize),
    #[error("string node at {0} has no pool entry")]
    DanglingString(Addr),
    #[error("cannot encode {0} as a heap value")]
    Encoding(&'static str),
    #[error("pair at {0} is part of a cycle and has no finite value")]
    Cyclic(Addr),
    #[error("node at {addr} with tag {tag:?} is not a value")]
    NotAValue { addr: Addr, tag: Tag },
    #[error("invalid tag byte {byte} at {addr}")]
    InvalidTag { addr: Addr, byte: u8 },
}

/// Runtime failures. Every variant is terminal for the whole run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    // === Runtime faults: broken compiler/VM invariants ===
    #[error("operand stack underflow at pc {pc}")]
    StackUnderflow { pc: usize },
    #[error("control stack underflow at pc {pc}")]
    ControlStackUnderflow { pc: usize },
    #[error("control stack corrupt at pc {pc}: expected {expected}, found {found:?}")]
    ControlStackCorrupt {
        pc: usize,
        expected: &'static str,
        found: Tag,
    },
    #[error("environment position ({frame}, {slot}) out of range")]
    PositionOutOfRange { frame: u16, slot: u16 },
    #[error("use of name before initialization at position ({frame}, {slot})")]
    UseBeforeInit { frame: u16, slot: u16 },
    #[error("invalid opcode {0:#04x}")]
    InvalidOpcode(u8),
    #[error("invalid operator code {0}")]
    InvalidOperator(u8),
    #[error("program counter {0} outside the program")]
    PcOutOfRange(usize),
    #[error("constant index {0} outside the constant pool")]
    ConstantOutOfRange(u32),
    #[error("type mismatch: {op} does not accept {found:?}")]
    TypeMismatch { op: &'static str, found: Tag },
    #[error("value of type {0:?} is not callable")]
    NotCallable(Tag),
    #[error("arity mismatch: expected {expected} arguments, got {got}")]
    ArityMismatch { expected: usize, got: usize },
    #[error("invalid builtin id {0}")]
    InvalidBuiltin(u8),
    #[error("step limit of {0} instructions exceeded")]
    StepLimitExceeded(u64),
    #[error(transparent)]
    Heap(#[from] HeapError),

    // === User errors ===
    #[error("error: {0}")]
    User(String),

    // === Scheduling ===
    #[error("deadlock: all goroutines are asleep ({parked} parked)")]
    Deadlock { parked: usize },
}

impl VmError {
    /// Faults signal a broken invariant rather than a user or scheduling outcome.
    pub fn is_fault(&self) -> bool {
        !matches!(self, VmError::User(_) | VmError::Deadlock { .. })
    }
}

pub type VmResult<T> = Result<T, VmError>;
