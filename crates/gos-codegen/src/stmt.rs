//! Statement compilation: sequences, blocks, declarations, loops.

use gos_ast::Node;
use gos_vm::{Constant, Instruction, Opcode};

use crate::context::CodegenContext;
use crate::env::CompileEnv;
use crate::error::CodegenError;
use crate::expr::compile_expr;

/// Names declared by `const`, `var` and `fun` at the top level of a block
/// body, left to right. Nested blocks and function bodies are not entered.
pub fn scan_declarations(body: &Node) -> Vec<String> {
    let mut names = Vec::new();
    collect_declarations(body, &mut names);
    names
}

fn collect_declarations(node: &Node, names: &mut Vec<String>) {
    match node {
        Node::Sequence { stmts } => {
            for stmt in stmts {
                collect_declarations(stmt, names);
            }
        }
        Node::Const { sym, .. } | Node::Var { sym, .. } | Node::Function { sym, .. } => {
            names.push(sym.clone())
        }
        _ => {}
    }
}

/// Every statement but the last has its value popped.
pub fn compile_sequence(
    ctx: &mut CodegenContext,
    env: &CompileEnv,
    stmts: &[Node],
) -> Result<(), CodegenError> {
    if stmts.is_empty() {
        ctx.emit_constant(Constant::Undefined);
        return Ok(());
    }
    for (i, stmt) in stmts.iter().enumerate() {
        if i > 0 {
            ctx.emit_op(Opcode::Pop);
        }
        compile_expr(ctx, env, stmt)?;
    }
    Ok(())
}

pub fn compile_block(
    ctx: &mut CodegenContext,
    env: &CompileEnv,
    body: &Node,
) -> Result<(), CodegenError> {
    let names = scan_declarations(body);
    let count = u16::try_from(names.len()).map_err(|_| CodegenError::TooManyNames(names.len()))?;
    let block_env = env.extend(names);
    if block_env.depth() > u16::MAX as usize {
        return Err(CodegenError::ScopeTooDeep(block_env.depth()));
    }
    ctx.emit(Instruction::new(Opcode::EnterScope, count, 0, 0));
    compile_expr(ctx, &block_env, body)?;
    ctx.emit_op(Opcode::ExitScope);
    Ok(())
}

/// `e; ASSIGN pos(sym)`, shared by assignment and both declaration forms.
pub fn compile_assign(
    ctx: &mut CodegenContext,
    env: &CompileEnv,
    sym: &str,
    expr: &Node,
) -> Result<(), CodegenError> {
    compile_expr(ctx, env, expr)?;
    let pos = env.position(sym)?;
    ctx.emit(Instruction::new(Opcode::Assign, pos.frame, pos.slot, 0));
    Ok(())
}

/// `L0: p; JOF L1; body; POP; GOTO L0; L1: LDC undefined`
pub fn compile_while(
    ctx: &mut CodegenContext,
    env: &CompileEnv,
    pred: &Node,
    body: &Node,
) -> Result<(), CodegenError> {
    let top = ctx.pc();
    compile_expr(ctx, env, pred)?;
    let exit = ctx.emit_jump(Opcode::Jof);
    compile_expr(ctx, env, body)?;
    ctx.emit_op(Opcode::Pop);
    let back = ctx.emit_jump(Opcode::Goto);
    ctx.patch_target(back, top);
    let end = ctx.pc();
    ctx.patch_target(exit, end);
    ctx.emit_constant(Constant::Undefined);
    Ok(())
}
