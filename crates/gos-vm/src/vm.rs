//! Virtual machine: fetch/dispatch loop over the active fiber, with a
//! round-robin switch after every instruction.

use crate::builtins::Builtin;
use crate::bytecode::{Constant, Program};
use crate::error::{HeapError, VmError, VmResult};
use crate::exec::{call, chan, ops, ExecResult};
use crate::fiber::{Fiber, FiberId, MAIN_FIBER};
use crate::heap::{Addr, Heap, DEFAULT_HEAP_BYTES, NULL, UNASSIGNED, UNDEFINED};
use crate::instruction::Opcode;
use crate::scheduler::Scheduler;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Heap size in bytes; must be a multiple of 8.
    pub heap_bytes: usize,
    /// Abort with [`VmError::StepLimitExceeded`] after this many instructions.
    pub max_steps: Option<u64>,
    /// Record every executed instruction in [`Vm::trace`].
    pub trace: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            heap_bytes: DEFAULT_HEAP_BYTES,
            max_steps: None,
            trace: false,
        }
    }
}

/// One executed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent {
    pub fiber: FiberId,
    pub pc: usize,
    pub op: Opcode,
}

pub struct Vm {
    heap: Heap,
    program: Program,
    scheduler: Scheduler,
    /// The running fiber.
    fiber: Fiber,
    config: VmConfig,
    output: Vec<String>,
    trace: Vec<TraceEvent>,
    steps: u64,
}

/// Base environment: a single frame holding the builtins in id order.
fn global_environment(heap: &mut Heap) -> Result<Addr, HeapError> {
    let empty = heap.alloc_environment(0)?;
    let frame = heap.alloc_frame(Builtin::ALL.len())?;
    for builtin in Builtin::ALL {
        let node = heap.alloc_builtin(builtin.into())?;
        heap.set_child(frame, builtin as usize, node);
    }
    heap.environment_extend(empty, frame)
}

fn load_constant(heap: &mut Heap, c: &Constant) -> Result<Addr, HeapError> {
    match c {
        Constant::Undefined => Ok(UNDEFINED),
        Constant::Null => Ok(NULL),
        Constant::Bool(b) => Ok(heap.boolean(*b)),
        Constant::Number(n) => heap.alloc_number(*n),
        Constant::String(s) => heap.alloc_string(s),
    }
}

impl Vm {
    pub fn new(program: Program) -> VmResult<Self> {
        Self::with_config(program, VmConfig::default())
    }

    pub fn with_config(program: Program, config: VmConfig) -> VmResult<Self> {
        let mut heap = Heap::new(config.heap_bytes)?;
        let env = global_environment(&mut heap)?;
        let mut scheduler = Scheduler::new();
        let fiber = scheduler.init_base_routine(env);
        tracing::debug!(
            target: "gos::vm",
            instructions = program.len(),
            constants = program.constants.len(),
            heap_words = heap.capacity_words(),
            "vm initialized"
        );
        Ok(Self {
            heap,
            program,
            scheduler,
            fiber,
            config,
            output: Vec::new(),
            trace: Vec::new(),
            steps: 0,
        })
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }

    /// Lines printed by `display` since the last call.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Run until goroutine 0 reaches `DONE`; returns the address on top of
    /// its operand stack (`undefined` when empty).
    pub fn run(&mut self) -> VmResult<Addr> {
        loop {
            if let Some(limit) = self.config.max_steps {
                if self.steps >= limit {
                    return Err(VmError::StepLimitExceeded(limit));
                }
            }
            self.steps += 1;

            match self.step()? {
                ExecResult::Continue => {}
                ExecResult::Block => self.scheduler.park(&mut self.fiber),
                ExecResult::Exit => self.scheduler.kill(&mut self.fiber),
                ExecResult::Done => {
                    if self.fiber.id == MAIN_FIBER {
                        let result = self.fiber.os.last().copied().unwrap_or(UNDEFINED);
                        tracing::debug!(
                            target: "gos::vm",
                            steps = self.steps,
                            fibers = self.scheduler.fiber_count(),
                            heap_used = self.heap.used_words(),
                            "main routine done"
                        );
                        return Ok(result);
                    }
                    self.scheduler.kill(&mut self.fiber);
                }
            }
            self.scheduler.rotate(&mut self.fiber)?;
        }
    }

    /// [`run`](Self::run), decoding the result into a host value.
    pub fn run_to_value(&mut self) -> VmResult<Value> {
        let addr = self.run()?;
        Ok(self.heap.to_value(addr)?)
    }

    fn step(&mut self) -> VmResult<ExecResult> {
        let pc = self.fiber.pc;
        let inst = *self
            .program
            .code
            .get(pc)
            .ok_or(VmError::PcOutOfRange(pc))?;
        let op = inst.opcode()?;
        if self.config.trace {
            self.trace.push(TraceEvent {
                fiber: self.fiber.id,
                pc,
                op,
            });
        }
        tracing::trace!(target: "gos::vm", fiber = self.fiber.id, pc, op = op.mnemonic());
        self.fiber.pc += 1;

        let fiber = &mut self.fiber;
        let heap = &mut self.heap;
        match op {
            Opcode::Ldc => {
                let idx = inst.imm32_unsigned();
                let c = self
                    .program
                    .constant(idx)
                    .ok_or(VmError::ConstantOutOfRange(idx))?;
                let addr = load_constant(heap, c)?;
                fiber.push(addr);
            }
            Opcode::Ld => {
                let pos = inst.position();
                let value = heap.environment_value(fiber.env, pos)?;
                if value == UNASSIGNED {
                    return Err(VmError::UseBeforeInit {
                        frame: pos.frame,
                        slot: pos.slot,
                    });
                }
                fiber.push(value);
            }
            Opcode::Assign => {
                let value = fiber.peek(0)?;
                heap.set_environment_value(fiber.env, inst.position(), value)?;
            }
            Opcode::Pop => {
                fiber.pop()?;
            }
            Opcode::Binop => ops::exec_binop(fiber, heap, &inst)?,
            Opcode::Unop => ops::exec_unop(fiber, heap, &inst)?,
            Opcode::Jof => {
                let cond = fiber.pop()?;
                if !ops::is_truthy(heap, cond)? {
                    fiber.pc = inst.imm32_unsigned() as usize;
                }
            }
            Opcode::Goto => fiber.pc = inst.imm32_unsigned() as usize,
            Opcode::EnterScope => call::exec_enter_scope(fiber, heap, inst.a as usize)?,
            Opcode::ExitScope => call::exec_exit_scope(fiber, heap)?,
            Opcode::Ldf => call::exec_ldf(fiber, heap, &inst)?,
            Opcode::Call => call::exec_call(fiber, heap, &inst, &mut self.output)?,
            Opcode::GoCall => {
                call::exec_gocall(fiber, heap, &mut self.scheduler, &inst, &mut self.output)?
            }
            Opcode::Reset => return call::exec_reset(fiber, heap),
            Opcode::CreateChan => chan::exec_create_chan(fiber, heap)?,
            Opcode::Send => return chan::exec_send(fiber, heap, &mut self.scheduler),
            Opcode::Recv => return chan::exec_recv(fiber, heap, &mut self.scheduler),
            Opcode::Done => {
                fiber.pc -= 1;
                return Ok(ExecResult::Done);
            }
        }
        Ok(ExecResult::Continue)
    }
}
