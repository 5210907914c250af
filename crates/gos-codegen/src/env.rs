//! Compile-time environment: the static mirror of the runtime scope chain.

use gos_vm::{Builtin, Position};

use crate::error::CodegenError;

/// Frames of names, outermost first. Frame `i` here is frame `i` of the
/// runtime Environment the compiled code executes in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileEnv {
    frames: Vec<Vec<String>>,
}

impl CompileEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// The program's outermost environment: one frame of builtin names in
    /// builtin-id order.
    pub fn global() -> Self {
        let names = Builtin::ALL.iter().map(|b| b.name().to_string()).collect();
        Self::new().extend(names)
    }

    /// New environment with `names` as its innermost frame. `self` is unchanged.
    pub fn extend(&self, names: Vec<String>) -> Self {
        let mut frames = self.frames.clone();
        frames.push(names);
        Self { frames }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Resolve `sym` to the innermost frame declaring it.
    pub fn position(&self, sym: &str) -> Result<Position, CodegenError> {
        for (frame_idx, frame) in self.frames.iter().enumerate().rev() {
            if let Some(slot) = frame.iter().position(|name| name == sym) {
                let frame = u16::try_from(frame_idx)
                    .map_err(|_| CodegenError::ScopeTooDeep(self.frames.len()))?;
                let slot =
                    u16::try_from(slot).map_err(|_| CodegenError::TooManyNames(frame_idx))?;
                return Ok(Position::new(frame, slot));
            }
        }
        Err(CodegenError::UnboundSymbol(sym.to_string()))
    }
}
