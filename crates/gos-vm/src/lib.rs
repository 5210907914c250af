//! goslang virtual machine.
//!
//! All runtime data lives in a word-addressed [`Heap`] of tagged nodes. The
//! [`Vm`] interprets a flat [`Program`] on the active fiber and switches
//! fibers round-robin after every instruction; goroutines meet on unbuffered
//! channels.

pub mod builtins;
pub mod bytecode;
pub mod error;
pub mod exec;
pub mod fiber;
pub mod heap;
pub mod instruction;
pub mod scheduler;
pub mod value;
pub mod vm;

pub use builtins::Builtin;
pub use bytecode::{Constant, Program};
pub use error::{HeapError, VmError, VmResult};
pub use fiber::{Fiber, FiberId, FiberStatus, MAIN_FIBER};
pub use heap::{Addr, Heap, Position, Tag};
pub use instruction::{BinaryOp, Instruction, Opcode, UnaryOp};
pub use scheduler::Scheduler;
pub use value::Value;
pub use vm::{TraceEvent, Vm, VmConfig};
