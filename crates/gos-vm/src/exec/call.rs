//! Function and scope instructions: LDF, CALL, GOCALL, RESET, ENTER_SCOPE, EXIT_SCOPE

use crate::builtins::{self, Builtin};
use crate::error::{VmError, VmResult};
use crate::fiber::Fiber;
use crate::heap::{Addr, Heap, Tag, UNDEFINED};
use crate::instruction::Instruction;
use crate::scheduler::Scheduler;

use super::ExecResult;

fn code_address(pc: usize) -> VmResult<u16> {
    u16::try_from(pc).map_err(|_| VmError::PcOutOfRange(pc))
}

pub fn exec_ldf(fiber: &mut Fiber, heap: &mut Heap, inst: &Instruction) -> VmResult<()> {
    let entry = inst.imm32_unsigned() as usize;
    let closure = heap.alloc_closure(inst.a as u8, code_address(entry)?, fiber.env)?;
    fiber.push(closure);
    Ok(())
}

/// Pop `arity` arguments into a fresh Frame, then pop the callee itself.
fn bind_arguments(fiber: &mut Fiber, heap: &mut Heap, callee: Addr, arity: usize) -> VmResult<Addr> {
    let expected = heap.closure_arity(callee) as usize;
    if expected != arity {
        return Err(VmError::ArityMismatch {
            expected,
            got: arity,
        });
    }
    let frame = heap.alloc_frame(arity)?;
    for slot in (0..arity).rev() {
        let arg = fiber.pop()?;
        heap.set_child(frame, slot, arg);
    }
    fiber.pop()?;
    Ok(frame)
}

/// Pop the arguments and callee of a builtin call and apply it.
fn apply_builtin(
    fiber: &mut Fiber,
    heap: &mut Heap,
    callee: Addr,
    arity: usize,
    output: &mut Vec<String>,
) -> VmResult<Addr> {
    let builtin = Builtin::from_node(heap, callee)?;
    let args = fiber.pop_n(arity)?;
    fiber.pop()?;
    builtins::call(builtin, heap, &args, output)
}

pub fn exec_call(
    fiber: &mut Fiber,
    heap: &mut Heap,
    inst: &Instruction,
    output: &mut Vec<String>,
) -> VmResult<()> {
    let arity = inst.a as usize;
    let callee = fiber.peek(arity)?;
    match heap.tag(callee)? {
        Tag::Closure => {
            let frame = bind_arguments(fiber, heap, callee, arity)?;
            let callframe = heap.alloc_callframe(fiber.env, code_address(fiber.pc)?)?;
            fiber.rts.push(callframe);
            let closure_env = heap.closure_env(callee);
            fiber.env = heap.environment_extend(closure_env, frame)?;
            fiber.pc = heap.closure_pc(callee) as usize;
        }
        Tag::Builtin => {
            let result = apply_builtin(fiber, heap, callee, arity, output)?;
            fiber.push(result);
        }
        tag => return Err(VmError::NotCallable(tag)),
    }
    Ok(())
}

/// Spawn the call as a new goroutine. The spawner continues with
/// `undefined` in place of the call's result.
pub fn exec_gocall(
    fiber: &mut Fiber,
    heap: &mut Heap,
    scheduler: &mut Scheduler,
    inst: &Instruction,
    output: &mut Vec<String>,
) -> VmResult<()> {
    let arity = inst.a as usize;
    let callee = fiber.peek(arity)?;
    match heap.tag(callee)? {
        Tag::Closure => {
            let frame = bind_arguments(fiber, heap, callee, arity)?;
            // the snapshot keeps the spawner's later frame writes out of the
            // goroutine's view of its own return context
            let saved_env = heap.environment_copy(fiber.env)?;
            let go_frame = heap.alloc_go_callframe(saved_env, code_address(fiber.pc)?)?;
            let closure_env = heap.closure_env(callee);
            let env = heap.environment_extend(closure_env, frame)?;
            let entry = heap.closure_pc(callee) as usize;
            scheduler.spawn(env, vec![go_frame], entry);
        }
        // builtins have no body to schedule; they run to completion here
        Tag::Builtin => {
            apply_builtin(fiber, heap, callee, arity, output)?;
        }
        tag => return Err(VmError::NotCallable(tag)),
    }
    fiber.push(UNDEFINED);
    Ok(())
}

/// Unwind one control frame. Block frames leave pc on this RESET so the
/// next step unwinds again; a call frame restores the caller.
pub fn exec_reset(fiber: &mut Fiber, heap: &mut Heap) -> VmResult<ExecResult> {
    fiber.pc -= 1;
    let top = fiber.pop_control()?;
    match heap.tag(top)? {
        Tag::Blockframe => {}
        Tag::Callframe => {
            if heap.is_go_callframe(top) {
                return Ok(ExecResult::Exit);
            }
            fiber.pc = heap.callframe_pc(top) as usize;
            fiber.env = heap.callframe_env(top);
        }
        found => {
            return Err(VmError::ControlStackCorrupt {
                pc: fiber.pc,
                expected: "Blockframe or Callframe",
                found,
            })
        }
    }
    Ok(ExecResult::Continue)
}

pub fn exec_enter_scope(fiber: &mut Fiber, heap: &mut Heap, slots: usize) -> VmResult<()> {
    let blockframe = heap.alloc_blockframe(fiber.env)?;
    fiber.rts.push(blockframe);
    let frame = heap.alloc_frame(slots)?;
    fiber.env = heap.environment_extend(fiber.env, frame)?;
    Ok(())
}

pub fn exec_exit_scope(fiber: &mut Fiber, heap: &mut Heap) -> VmResult<()> {
    let top = fiber.pop_control()?;
    let found = heap.tag(top)?;
    if found != Tag::Blockframe {
        return Err(VmError::ControlStackCorrupt {
            pc: fiber.pc,
            expected: "Blockframe",
            found,
        });
    }
    fiber.env = heap.blockframe_env(top);
    Ok(())
}
