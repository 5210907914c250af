//! Builtin functions.
//!
//! Builtins occupy the outermost environment frame. Their slot index in that
//! frame equals their id, so the compiler and the VM agree on positions by
//! iterating [`Builtin::ALL`] in order.

use std::time::{SystemTime, UNIX_EPOCH};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{VmError, VmResult};
use crate::heap::{Addr, Heap, Tag, UNDEFINED};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum Builtin {
    Display = 0,
    GetTime,
    Error,
    IsNumber,
    IsBoolean,
    IsUndefined,
    IsString,
    IsFunction,
    MathSqrt,
    Pair,
    IsPair,
    Head,
    Tail,
    IsNull,
    SetHead,
    SetTail,
}

impl Builtin {
    pub const ALL: [Builtin; 16] = [
        Builtin::Display,
        Builtin::GetTime,
        Builtin::Error,
        Builtin::IsNumber,
        Builtin::IsBoolean,
        Builtin::IsUndefined,
        Builtin::IsString,
        Builtin::IsFunction,
        Builtin::MathSqrt,
        Builtin::Pair,
        Builtin::IsPair,
        Builtin::Head,
        Builtin::Tail,
        Builtin::IsNull,
        Builtin::SetHead,
        Builtin::SetTail,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Display => "display",
            Builtin::GetTime => "get_time",
            Builtin::Error => "error",
            Builtin::IsNumber => "is_number",
            Builtin::IsBoolean => "is_boolean",
            Builtin::IsUndefined => "is_undefined",
            Builtin::IsString => "is_string",
            Builtin::IsFunction => "is_function",
            Builtin::MathSqrt => "math_sqrt",
            Builtin::Pair => "pair",
            Builtin::IsPair => "is_pair",
            Builtin::Head => "head",
            Builtin::Tail => "tail",
            Builtin::IsNull => "is_null",
            Builtin::SetHead => "set_head",
            Builtin::SetTail => "set_tail",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::GetTime => 0,
            Builtin::Pair | Builtin::SetHead | Builtin::SetTail => 2,
            _ => 1,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Decode the id stored in a Builtin node.
    pub fn from_node(heap: &Heap, addr: Addr) -> VmResult<Self> {
        let id = heap.builtin_id(addr);
        Builtin::try_from(id).map_err(|_| VmError::InvalidBuiltin(id))
    }
}

fn expect(heap: &Heap, addr: Addr, tag: Tag, op: &'static str) -> VmResult<()> {
    let found = heap.tag(addr)?;
    if found != tag {
        return Err(VmError::TypeMismatch { op, found });
    }
    Ok(())
}

/// Apply `builtin` to `args` (in call order). `display` lines are appended
/// to `output`.
pub fn call(
    builtin: Builtin,
    heap: &mut Heap,
    args: &[Addr],
    output: &mut Vec<String>,
) -> VmResult<Addr> {
    if args.len() != builtin.arity() {
        return Err(VmError::ArityMismatch {
            expected: builtin.arity(),
            got: args.len(),
        });
    }
    let result = match builtin {
        Builtin::Display => {
            let line = heap.display_value(args[0])?;
            tracing::debug!(target: "gos::vm", %line, "display");
            output.push(line);
            args[0]
        }
        Builtin::GetTime => {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64() * 1000.0)
                .unwrap_or(0.0);
            heap.alloc_number(millis.floor())?
        }
        Builtin::Error => {
            let message = if heap.is(args[0], Tag::String) {
                heap.string_value(args[0])?.to_string()
            } else {
                heap.display_value(args[0])?
            };
            return Err(VmError::User(message));
        }
        Builtin::IsNumber => heap.boolean(heap.is(args[0], Tag::Number)),
        Builtin::IsBoolean => heap.boolean(heap.is_boolean(args[0])),
        Builtin::IsUndefined => heap.boolean(heap.is(args[0], Tag::Undefined)),
        Builtin::IsString => heap.boolean(heap.is(args[0], Tag::String)),
        Builtin::IsFunction => {
            let f = heap.is(args[0], Tag::Closure) || heap.is(args[0], Tag::Builtin);
            heap.boolean(f)
        }
        Builtin::MathSqrt => {
            expect(heap, args[0], Tag::Number, "math_sqrt")?;
            let n = heap.number_value(args[0]);
            heap.alloc_number(n.sqrt())?
        }
        Builtin::Pair => heap.alloc_pair(args[0], args[1])?,
        Builtin::IsPair => heap.boolean(heap.is(args[0], Tag::Pair)),
        Builtin::Head => {
            expect(heap, args[0], Tag::Pair, "head")?;
            heap.pair_head(args[0])
        }
        Builtin::Tail => {
            expect(heap, args[0], Tag::Pair, "tail")?;
            heap.pair_tail(args[0])
        }
        Builtin::IsNull => heap.boolean(heap.is(args[0], Tag::Null)),
        Builtin::SetHead => {
            expect(heap, args[0], Tag::Pair, "set_head")?;
            heap.set_pair_head(args[0], args[1]);
            UNDEFINED
        }
        Builtin::SetTail => {
            expect(heap, args[0], Tag::Pair, "set_tail")?;
            heap.set_pair_tail(args[0], args[1]);
            UNDEFINED
        }
    };
    Ok(result)
}
