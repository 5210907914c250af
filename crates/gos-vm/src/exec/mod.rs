//! Instruction implementations grouped by concern.

pub mod call;
pub mod chan;
pub mod ops;

/// Outcome of executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecResult {
    Continue,
    /// Channel blocking: park, don't re-queue until woken.
    Block,
    /// A goroutine returned from its entry function.
    Exit,
    Done,
}
