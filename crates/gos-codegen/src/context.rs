//! Codegen context - owns the program under construction.

use std::collections::HashMap;

use gos_vm::{Constant, Instruction, Opcode, Program};

use crate::error::CodegenError;

#[derive(Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    String(String),
}

impl ConstKey {
    fn of(c: &Constant) -> Self {
        match c {
            Constant::Undefined => ConstKey::Undefined,
            Constant::Null => ConstKey::Null,
            Constant::Bool(b) => ConstKey::Bool(*b),
            Constant::Number(n) => ConstKey::Number(n.to_bits()),
            Constant::String(s) => ConstKey::String(s.clone()),
        }
    }
}

pub struct CodegenContext {
    program: Program,
    const_indices: HashMap<ConstKey, u32>,
}

impl CodegenContext {
    pub fn new() -> Self {
        Self {
            program: Program::new(),
            const_indices: HashMap::new(),
        }
    }

    /// Address of the next instruction to be emitted.
    pub fn pc(&self) -> usize {
        self.program.code.len()
    }

    pub fn emit(&mut self, inst: Instruction) -> usize {
        let at = self.pc();
        self.program.code.push(inst);
        at
    }

    pub fn emit_op(&mut self, op: Opcode) -> usize {
        self.emit(Instruction::new(op, 0, 0, 0))
    }

    /// Intern a constant; equal constants share one pool slot.
    pub fn constant(&mut self, c: Constant) -> u32 {
        let key = ConstKey::of(&c);
        if let Some(&idx) = self.const_indices.get(&key) {
            return idx;
        }
        let idx = self.program.add_constant(c);
        self.const_indices.insert(key, idx);
        idx
    }

    pub fn emit_constant(&mut self, c: Constant) -> usize {
        let idx = self.constant(c);
        self.emit(Instruction::with_imm32(Opcode::Ldc, 0, idx))
    }

    /// Emit a jump whose target is filled in later by [`patch_target`](Self::patch_target).
    pub fn emit_jump(&mut self, op: Opcode) -> usize {
        self.emit(Instruction::with_imm32(op, 0, 0))
    }

    /// Set the jump target / closure entry of the instruction at `at`.
    pub fn patch_target(&mut self, at: usize, target: usize) {
        self.program.code[at].set_imm32(target as u32);
    }

    /// Turn the `CALL` just emitted into a `GOCALL`.
    pub fn rewrite_call_as_gocall(&mut self) -> bool {
        match self.program.code.last_mut() {
            Some(inst) if inst.op == Opcode::Call as u8 => {
                inst.op = Opcode::GoCall as u8;
                true
            }
            _ => false,
        }
    }

    /// Close the program with `DONE` and check every code address fits the
    /// 16-bit pc fields of closures and call frames.
    pub fn finish(mut self) -> Result<Program, CodegenError> {
        self.emit_op(Opcode::Done);
        let len = self.program.len();
        if len > u16::MAX as usize {
            return Err(CodegenError::ProgramTooLarge(len));
        }
        Ok(self.program)
    }
}

impl Default for CodegenContext {
    fn default() -> Self {
        Self::new()
    }
}
