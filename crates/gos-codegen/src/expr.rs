//! Expression compilation.

use gos_ast::{Literal, Node};
use gos_vm::{BinaryOp, Constant, Instruction, Opcode, UnaryOp};

use crate::context::CodegenContext;
use crate::env::CompileEnv;
use crate::error::CodegenError;
use crate::stmt;

fn literal_constant(lit: &Literal) -> Constant {
    match lit {
        Literal::Undefined => Constant::Undefined,
        Literal::Null => Constant::Null,
        Literal::Bool(b) => Constant::Bool(*b),
        Literal::Number(n) => Constant::Number(*n),
        Literal::Str(s) => Constant::String(s.clone()),
    }
}

/// Compile `node` so that it leaves exactly one value on the operand stack.
pub fn compile_expr(
    ctx: &mut CodegenContext,
    env: &CompileEnv,
    node: &Node,
) -> Result<(), CodegenError> {
    match node {
        Node::Literal { val } => {
            ctx.emit_constant(literal_constant(val));
        }
        Node::BinaryOp { sym, left, right } => {
            let op = BinaryOp::from_symbol(sym)
                .ok_or_else(|| CodegenError::UnknownOperator(sym.clone()))?;
            compile_expr(ctx, env, left)?;
            compile_expr(ctx, env, right)?;
            ctx.emit(Instruction::new(Opcode::Binop, op as u16, 0, 0));
        }
        Node::UnaryOp { sym, operand } => {
            let op = UnaryOp::from_symbol(sym)
                .ok_or_else(|| CodegenError::UnknownOperator(sym.clone()))?;
            compile_expr(ctx, env, operand)?;
            ctx.emit(Instruction::new(Opcode::Unop, op as u16, 0, 0));
        }
        Node::Name { sym } => {
            let pos = env.position(sym)?;
            ctx.emit(Instruction::new(Opcode::Ld, pos.frame, pos.slot, 0));
        }
        Node::Cond { pred, cons, alt } => compile_cond(ctx, env, pred, cons, alt.as_deref())?,
        Node::Apply { fun, args } => compile_apply(ctx, env, fun, args)?,
        Node::Lambda { prms, body } => compile_lambda(ctx, env, prms, body)?,
        Node::Go { call } => {
            if !matches!(**call, Node::Apply { .. }) {
                return Err(CodegenError::InvalidGoTarget(call.tag()));
            }
            compile_expr(ctx, env, call)?;
            if !ctx.rewrite_call_as_gocall() {
                return Err(CodegenError::InvalidGoTarget(call.tag()));
            }
        }
        Node::MakeChan => {
            ctx.emit_op(Opcode::CreateChan);
        }
        Node::Send { chan, val } => {
            compile_expr(ctx, env, chan)?;
            compile_expr(ctx, env, val)?;
            ctx.emit_op(Opcode::Send);
        }
        Node::Recv { chan } => {
            compile_expr(ctx, env, chan)?;
            ctx.emit_op(Opcode::Recv);
        }
        Node::Sequence { stmts } => stmt::compile_sequence(ctx, env, stmts)?,
        Node::Block { body } => stmt::compile_block(ctx, env, body)?,
        Node::Assign { sym, expr } | Node::Const { sym, expr } | Node::Var { sym, expr } => {
            stmt::compile_assign(ctx, env, sym, expr)?
        }
        Node::Function { sym, prms, body } => {
            compile_lambda(ctx, env, prms, body)?;
            let pos = env.position(sym)?;
            ctx.emit(Instruction::new(Opcode::Assign, pos.frame, pos.slot, 0));
        }
        Node::Return { expr } => {
            compile_expr(ctx, env, expr)?;
            ctx.emit_op(Opcode::Reset);
        }
        Node::While { pred, body } => stmt::compile_while(ctx, env, pred, body)?,
    }
    Ok(())
}

fn compile_cond(
    ctx: &mut CodegenContext,
    env: &CompileEnv,
    pred: &Node,
    cons: &Node,
    alt: Option<&Node>,
) -> Result<(), CodegenError> {
    compile_expr(ctx, env, pred)?;
    let jof = ctx.emit_jump(Opcode::Jof);
    compile_expr(ctx, env, cons)?;
    let goto = ctx.emit_jump(Opcode::Goto);
    let alt_start = ctx.pc();
    ctx.patch_target(jof, alt_start);
    match alt {
        Some(alt) => compile_expr(ctx, env, alt)?,
        None => {
            ctx.emit_constant(Constant::Undefined);
        }
    }
    let end = ctx.pc();
    ctx.patch_target(goto, end);
    Ok(())
}

fn compile_apply(
    ctx: &mut CodegenContext,
    env: &CompileEnv,
    fun: &Node,
    args: &[Node],
) -> Result<(), CodegenError> {
    let arity = u8::try_from(args.len()).map_err(|_| CodegenError::TooManyArgs(args.len()))?;
    compile_expr(ctx, env, fun)?;
    for arg in args {
        compile_expr(ctx, env, arg)?;
    }
    ctx.emit(Instruction::new(Opcode::Call, arity as u16, 0, 0));
    Ok(())
}

/// `LDF n L1; GOTO L2; L1: body; LDC undefined; RESET; L2:`
fn compile_lambda(
    ctx: &mut CodegenContext,
    env: &CompileEnv,
    prms: &[String],
    body: &Node,
) -> Result<(), CodegenError> {
    let arity = u8::try_from(prms.len()).map_err(|_| CodegenError::TooManyParams(prms.len()))?;
    let ldf = ctx.emit(Instruction::with_imm32(Opcode::Ldf, arity as u16, 0));
    let skip = ctx.emit_jump(Opcode::Goto);
    let entry = ctx.pc();
    ctx.patch_target(ldf, entry);

    let body_env = env.extend(prms.to_vec());
    compile_expr(ctx, &body_env, body)?;
    // falling off the end returns undefined
    ctx.emit_constant(Constant::Undefined);
    ctx.emit_op(Opcode::Reset);

    let after = ctx.pc();
    ctx.patch_target(skip, after);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gos_vm::Program;
    use pretty_assertions::assert_eq;

    fn compile(node: &Node) -> Result<Program, CodegenError> {
        let mut ctx = CodegenContext::new();
        compile_expr(&mut ctx, &CompileEnv::global(), node)?;
        ctx.finish()
    }

    fn listing(program: &Program) -> Vec<String> {
        program.code.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_binop_shape() {
        let p = compile(&Node::binop("+", Node::lit(10), Node::lit(5))).unwrap();
        assert_eq!(listing(&p), vec!["LDC #0", "LDC #1", "BINOP +", "DONE"]);
        assert_eq!(p.constants, vec![Constant::Number(10.0), Constant::Number(5.0)]);
    }

    #[test]
    fn test_cond_without_alt() {
        let p = compile(&Node::cond(Node::lit(true), Node::lit(1), None)).unwrap();
        assert_eq!(
            listing(&p),
            vec!["LDC #0", "JOF 4", "LDC #1", "GOTO 5", "LDC #2", "DONE"]
        );
        assert_eq!(p.constants[2], Constant::Undefined);
    }

    #[test]
    fn test_lambda_shape() {
        let p = compile(&Node::lambda(&["x"], Node::name("x"))).unwrap();
        assert_eq!(
            listing(&p),
            vec!["LDF 1 2", "GOTO 5", "LD (1, 0)", "LDC #0", "RESET", "DONE"]
        );
    }

    #[test]
    fn test_go_rewrites_call() {
        let call = Node::apply(Node::name("display"), vec![Node::lit(1)]);
        let p = compile(&Node::go(call)).unwrap();
        assert_eq!(listing(&p), vec!["LD (0, 0)", "LDC #0", "GOCALL 1", "DONE"]);
    }

    #[test]
    fn test_go_requires_application() {
        assert_eq!(
            compile(&Node::go(Node::lit(1))).err(),
            Some(CodegenError::InvalidGoTarget("lit"))
        );
    }

    #[test]
    fn test_unknown_operator() {
        assert_eq!(
            compile(&Node::binop("**", Node::lit(2), Node::lit(3))).err(),
            Some(CodegenError::UnknownOperator("**".into()))
        );
    }

    #[test]
    fn test_unbound_name() {
        assert_eq!(
            compile(&Node::name("nope")).err(),
            Some(CodegenError::UnboundSymbol("nope".into()))
        );
    }
}
