//! Compiled program: flat instruction array plus constant pool.

use core::fmt;

use crate::instruction::Instruction;
use crate::value::format_number;

/// Literal constant referenced by `LDC`.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Undefined => f.write_str("undefined"),
            Constant::Null => f.write_str("null"),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Number(n) => format_number(*n, f),
            Constant::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// A compiled goslang program. The last instruction is the shared `DONE`.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub code: Vec<Instruction>,
    pub constants: Vec<Constant>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constant and return its index.
    pub fn add_constant(&mut self, c: Constant) -> u32 {
        let idx = self.constants.len();
        self.constants.push(c);
        idx as u32
    }

    pub fn constant(&self, idx: u32) -> Option<&Constant> {
        self.constants.get(idx as usize)
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pc, inst) in self.code.iter().enumerate() {
            write!(f, "{:>4}  {}", pc, inst)?;
            if let Ok(crate::instruction::Opcode::Ldc) = inst.opcode() {
                if let Some(c) = self.constant(inst.imm32_unsigned()) {
                    write!(f, "  ; {}", c)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
