//! Fiber (goroutine) state.

use crate::error::{VmError, VmResult};
use crate::heap::{Addr, UNDEFINED};

pub type FiberId = u32;

/// The program-entry routine. Its lifetime spans the whole run.
pub const MAIN_FIBER: FiberId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiberStatus {
    /// Running or waiting in the ready queue.
    Ready,
    /// Parked on a channel; absent from the ready queue.
    Parked,
    Dead,
}

/// Reified execution state of one goroutine.
#[derive(Debug, Clone)]
pub struct Fiber {
    pub id: FiberId,
    pub status: FiberStatus,
    /// Operand stack.
    pub os: Vec<Addr>,
    /// Control stack of Blockframe/Callframe nodes.
    pub rts: Vec<Addr>,
    /// Environment pointer.
    pub env: Addr,
    pub pc: usize,
}

impl Fiber {
    pub fn new(id: FiberId, env: Addr, pc: usize) -> Self {
        Self {
            id,
            status: FiberStatus::Ready,
            os: Vec::new(),
            rts: Vec::new(),
            env,
            pc,
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.status != FiberStatus::Dead
    }

    #[inline]
    pub fn push(&mut self, value: Addr) {
        self.os.push(value);
    }

    #[inline]
    pub fn pop(&mut self) -> VmResult<Addr> {
        self.os.pop().ok_or(VmError::StackUnderflow { pc: self.pc })
    }

    /// Value `depth` slots below the top (0 is the top).
    #[inline]
    pub fn peek(&self, depth: usize) -> VmResult<Addr> {
        self.os
            .len()
            .checked_sub(depth + 1)
            .map(|idx| self.os[idx])
            .ok_or(VmError::StackUnderflow { pc: self.pc })
    }

    /// Pop the top `n` operands, preserving push order.
    pub fn pop_n(&mut self, n: usize) -> VmResult<Vec<Addr>> {
        let start = self
            .os
            .len()
            .checked_sub(n)
            .ok_or(VmError::StackUnderflow { pc: self.pc })?;
        Ok(self.os.split_off(start))
    }

    #[inline]
    pub fn pop_control(&mut self) -> VmResult<Addr> {
        self.rts
            .pop()
            .ok_or(VmError::ControlStackUnderflow { pc: self.pc })
    }
}

/// Placeholder left in a registry slot while that fiber is the active one.
impl Default for Fiber {
    fn default() -> Self {
        Self {
            id: 0,
            status: FiberStatus::Dead,
            os: Vec::new(),
            rts: Vec::new(),
            env: UNDEFINED,
            pc: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{NULL, TRUE};

    #[test]
    fn test_stack_ops() {
        let mut f = Fiber::new(0, UNDEFINED, 3);
        f.push(TRUE);
        f.push(NULL);
        assert_eq!(f.peek(0).unwrap(), NULL);
        assert_eq!(f.peek(1).unwrap(), TRUE);
        assert_eq!(f.peek(2), Err(VmError::StackUnderflow { pc: 3 }));
        assert_eq!(f.pop_n(2).unwrap(), vec![TRUE, NULL]);
        assert_eq!(f.pop(), Err(VmError::StackUnderflow { pc: 3 }));
        assert_eq!(f.pop_control(), Err(VmError::ControlStackUnderflow { pc: 3 }));
    }
}
