//! goslang bytecode code generation.
//!
//! This crate compiles a goslang AST to a flat VM [`Program`].

mod context;
mod env;
mod error;
mod expr;
mod stmt;

pub use context::CodegenContext;
pub use env::CompileEnv;
pub use error::CodegenError;

use gos_ast::Node;
use gos_vm::Program;

/// Compile a whole program. Names resolve against the builtins frame, and
/// the code ends with the `DONE` that stops goroutine 0.
pub fn compile_program(program: &Node) -> Result<Program, CodegenError> {
    let mut ctx = CodegenContext::new();
    let env = CompileEnv::global();
    expr::compile_expr(&mut ctx, &env, program)?;
    let program = ctx.finish()?;
    tracing::debug!(
        target: "gos::codegen",
        instructions = program.len(),
        constants = program.constants.len(),
        "compiled program"
    );
    Ok(program)
}
