//! Instruction format and opcodes.

use core::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::VmError;
use crate::heap::Position;

/// 8-byte fixed instruction format.
///
/// Operand use per opcode:
/// - `LDC`: `b|c` constant index
/// - `LD`, `ASSIGN`: `a` frame index, `b` slot index
/// - `BINOP`, `UNOP`: `a` operator code
/// - `JOF`, `GOTO`: `b|c` target
/// - `ENTER_SCOPE`: `a` slot count
/// - `LDF`: `a` arity, `b|c` entry
/// - `CALL`, `GOCALL`: `a` arity
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: u8,
    pub flags: u8,
    pub a: u16,
    pub b: u16,
    pub c: u16,
}

impl Instruction {
    #[inline]
    pub const fn new(op: Opcode, a: u16, b: u16, c: u16) -> Self {
        Self {
            op: op as u8,
            flags: 0,
            a,
            b,
            c,
        }
    }

    #[inline]
    pub const fn with_imm32(op: Opcode, a: u16, imm: u32) -> Self {
        Self::new(op, a, imm as u16, (imm >> 16) as u16)
    }

    #[inline]
    pub fn opcode(&self) -> Result<Opcode, VmError> {
        Opcode::try_from(self.op).map_err(|_| VmError::InvalidOpcode(self.op))
    }

    #[inline]
    pub fn imm32_unsigned(&self) -> u32 {
        (self.b as u32) | ((self.c as u32) << 16)
    }

    /// Back-patch the 32-bit immediate (jump targets, closure entries).
    #[inline]
    pub fn set_imm32(&mut self, imm: u32) {
        self.b = imm as u16;
        self.c = (imm >> 16) as u16;
    }

    #[inline]
    pub fn position(&self) -> Position {
        Position::new(self.a, self.b)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum Opcode {
    // === LOAD ===
    Ldc = 0,
    Ld,
    Assign,
    Pop,

    // === OPERATORS ===
    Binop,
    Unop,

    // === JUMP ===
    Jof,
    Goto,

    // === SCOPE ===
    EnterScope,
    ExitScope,

    // === CALL ===
    Ldf,
    Call,
    GoCall,
    Reset,

    // === CHAN ===
    CreateChan,
    Send,
    Recv,

    Done,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Ldc => "LDC",
            Opcode::Ld => "LD",
            Opcode::Assign => "ASSIGN",
            Opcode::Pop => "POP",
            Opcode::Binop => "BINOP",
            Opcode::Unop => "UNOP",
            Opcode::Jof => "JOF",
            Opcode::Goto => "GOTO",
            Opcode::EnterScope => "ENTER_SCOPE",
            Opcode::ExitScope => "EXIT_SCOPE",
            Opcode::Ldf => "LDF",
            Opcode::Call => "CALL",
            Opcode::GoCall => "GOCALL",
            Opcode::Reset => "RESET",
            Opcode::CreateChan => "CREATE_CHAN",
            Opcode::Send => "SEND",
            Opcode::Recv => "RECV",
            Opcode::Done => "DONE",
        }
    }
}

/// Binary operators carried in the `a` operand of `BINOP`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum BinaryOp {
    Add = 0,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn from_symbol(sym: &str) -> Option<Self> {
        Some(match sym {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "===" | "==" => BinaryOp::Eq,
            "!==" | "!=" => BinaryOp::Ne,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "===",
            BinaryOp::Ne => "!==",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum UnaryOp {
    Neg = 0,
    Not,
}

impl UnaryOp {
    pub fn from_symbol(sym: &str) -> Option<Self> {
        match sym {
            "-unary" | "-" => Some(UnaryOp::Neg),
            "!" => Some(UnaryOp::Not),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-unary",
            UnaryOp::Not => "!",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.opcode() {
            Ok(op) => op,
            Err(_) => return write!(f, "<invalid {:#04x}>", self.op),
        };
        let name = op.mnemonic();
        match op {
            Opcode::Ldc => write!(f, "{} #{}", name, self.imm32_unsigned()),
            Opcode::Ld | Opcode::Assign => write!(f, "{} {}", name, self.position()),
            Opcode::Binop => match BinaryOp::try_from(self.a as u8) {
                Ok(bin) => write!(f, "{} {}", name, bin.symbol()),
                Err(_) => write!(f, "{} <invalid {}>", name, self.a),
            },
            Opcode::Unop => match UnaryOp::try_from(self.a as u8) {
                Ok(un) => write!(f, "{} {}", name, un.symbol()),
                Err(_) => write!(f, "{} <invalid {}>", name, self.a),
            },
            Opcode::Jof | Opcode::Goto => write!(f, "{} {}", name, self.imm32_unsigned()),
            Opcode::EnterScope | Opcode::Call | Opcode::GoCall => write!(f, "{} {}", name, self.a),
            Opcode::Ldf => write!(f, "{} {} {}", name, self.a, self.imm32_unsigned()),
            _ => f.write_str(name),
        }
    }
}
