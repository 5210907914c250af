//! Operators: BINOP, UNOP, and the truthiness used by JOF.

use crate::error::{VmError, VmResult};
use crate::fiber::Fiber;
use crate::heap::{Addr, Heap, Tag};
use crate::instruction::{BinaryOp, Instruction, UnaryOp};

/// `false`, `null`, `undefined`, unassigned, `0`, `NaN` and `""` are falsy.
pub fn is_truthy(heap: &Heap, value: Addr) -> VmResult<bool> {
    Ok(match heap.tag(value)? {
        Tag::False | Tag::Null | Tag::Undefined | Tag::Unassigned => false,
        Tag::Number => {
            let n = heap.number_value(value);
            n != 0.0 && !n.is_nan()
        }
        Tag::String => !heap.string_value(value)?.is_empty(),
        _ => true,
    })
}

/// Numbers compare by value; everything else by address. Strings are
/// interned and the scalar singletons are canonical, so address identity is
/// value identity for them.
pub fn strict_equal(heap: &Heap, x: Addr, y: Addr) -> bool {
    if heap.is(x, Tag::Number) && heap.is(y, Tag::Number) {
        return heap.number_value(x) == heap.number_value(y);
    }
    x == y
}

fn number_operands(heap: &Heap, op: BinaryOp, x: Addr, y: Addr) -> VmResult<(f64, f64)> {
    for v in [x, y] {
        let tag = heap.tag(v)?;
        if tag != Tag::Number {
            return Err(VmError::TypeMismatch {
                op: op.symbol(),
                found: tag,
            });
        }
    }
    Ok((heap.number_value(x), heap.number_value(y)))
}

/// Text used when `+` joins a string with another value.
fn concat_text(heap: &Heap, v: Addr) -> VmResult<String> {
    if heap.is(v, Tag::String) {
        Ok(heap.string_value(v)?.to_string())
    } else {
        Ok(heap.display_value(v)?)
    }
}

pub fn binary(heap: &mut Heap, op: BinaryOp, x: Addr, y: Addr) -> VmResult<Addr> {
    let result = match op {
        BinaryOp::Add => {
            if heap.is(x, Tag::String) || heap.is(y, Tag::String) {
                let joined = concat_text(heap, x)? + &concat_text(heap, y)?;
                return Ok(heap.alloc_string(&joined)?);
            }
            let (a, b) = number_operands(heap, op, x, y)?;
            heap.alloc_number(a + b)?
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (a, b) = number_operands(heap, op, x, y)?;
            let n = match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            };
            heap.alloc_number(n)?
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = if heap.is(x, Tag::String) && heap.is(y, Tag::String) {
                heap.string_value(x)?.partial_cmp(heap.string_value(y)?)
            } else {
                let (a, b) = number_operands(heap, op, x, y)?;
                a.partial_cmp(&b)
            };
            let holds = match ordering {
                None => false,
                Some(ord) => match op {
                    BinaryOp::Lt => ord.is_lt(),
                    BinaryOp::Le => ord.is_le(),
                    BinaryOp::Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                },
            };
            heap.boolean(holds)
        }
        BinaryOp::Eq => heap.boolean(strict_equal(heap, x, y)),
        BinaryOp::Ne => heap.boolean(!strict_equal(heap, x, y)),
        // both operands are already evaluated; the deciding one is the result
        BinaryOp::And => {
            if is_truthy(heap, x)? {
                y
            } else {
                x
            }
        }
        BinaryOp::Or => {
            if is_truthy(heap, x)? {
                x
            } else {
                y
            }
        }
    };
    Ok(result)
}

pub fn unary(heap: &mut Heap, op: UnaryOp, x: Addr) -> VmResult<Addr> {
    match op {
        UnaryOp::Neg => {
            let found = heap.tag(x)?;
            if found != Tag::Number {
                return Err(VmError::TypeMismatch { op: "-unary", found });
            }
            let n = heap.number_value(x);
            Ok(heap.alloc_number(-n)?)
        }
        UnaryOp::Not => {
            let b = !is_truthy(heap, x)?;
            Ok(heap.boolean(b))
        }
    }
}

pub fn exec_binop(fiber: &mut Fiber, heap: &mut Heap, inst: &Instruction) -> VmResult<()> {
    let code = inst.a as u8;
    let op = BinaryOp::try_from(code).map_err(|_| VmError::InvalidOperator(code))?;
    let y = fiber.pop()?;
    let x = fiber.pop()?;
    let r = binary(heap, op, x, y)?;
    fiber.push(r);
    Ok(())
}

pub fn exec_unop(fiber: &mut Fiber, heap: &mut Heap, inst: &Instruction) -> VmResult<()> {
    let code = inst.a as u8;
    let op = UnaryOp::try_from(code).map_err(|_| VmError::InvalidOperator(code))?;
    let x = fiber.pop()?;
    let r = unary(heap, op, x)?;
    fiber.push(r);
    Ok(())
}
