//! Conversions between heap addresses and host values.
//!
//! Pair structures can be as long as the heap allows and, through
//! `set_head`/`set_tail`, cyclic. Every walk below keeps its own work stack
//! instead of recursing.

use core::fmt;
use std::mem;

use hashbrown::HashSet;

use crate::error::HeapError;
use crate::heap::{Addr, Heap, Tag, NULL, UNDEFINED};

/// Host-side view of a heap value.
///
/// A chain of pairs linked through their tails is flattened into one
/// `List`: the heads in order, then whatever non-pair value ends the chain
/// (`Null` for a proper list).
///
/// Function and channel values only exist as heap nodes; they come out as
/// opaque markers and cannot be boxed back.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Value>, Box<Value>),
    Closure,
    Builtin,
    Channel,
    Unassigned,
}

impl Value {
    pub fn pair(head: Value, mut tail: Value) -> Value {
        match &mut tail {
            Value::List(items, _) => {
                items.insert(0, head);
                tail
            }
            _ => Value::List(vec![head], Box::new(tail)),
        }
    }

    /// Build a null-terminated list.
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
    {
        let items: Vec<Value> = items.into_iter().collect();
        if items.is_empty() {
            Value::Null
        } else {
            Value::List(items, Box::new(Value::Null))
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn is_list(&self) -> bool {
        matches!(self, Value::List(..))
    }
}

// Lists nested through their heads are torn down from a work list.
impl Drop for Value {
    fn drop(&mut self) {
        let Value::List(items, end) = self else {
            return;
        };
        if !end.is_list() && !items.iter().any(Value::is_list) {
            return;
        }
        let mut pending = mem::take(items);
        pending.push(mem::take(&mut **end));
        while let Some(mut value) = pending.pop() {
            if let Value::List(items, end) = &mut value {
                pending.append(items);
                pending.push(mem::take(&mut **end));
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

/// Integral numbers print without a fraction.
pub(crate) fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

enum Piece<'a> {
    Value(&'a Value),
    Text(&'static str),
    Close(usize),
}

/// Lists print as nested pairs: `[1, [2, null]]`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pieces = vec![Piece::Value(self)];
        while let Some(piece) = pieces.pop() {
            let value = match piece {
                Piece::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Piece::Close(n) => {
                    for _ in 0..n {
                        f.write_str("]")?;
                    }
                    continue;
                }
                Piece::Value(value) => value,
            };
            match value {
                Value::Undefined => f.write_str("undefined")?,
                Value::Null => f.write_str("null")?,
                Value::Bool(b) => write!(f, "{}", b)?,
                Value::Number(n) => format_number(*n, f)?,
                Value::Str(s) => write!(f, "{:?}", s)?,
                Value::List(items, end) => {
                    pieces.push(Piece::Close(items.len()));
                    pieces.push(Piece::Value(end));
                    for item in items.iter().rev() {
                        pieces.push(Piece::Text(", "));
                        pieces.push(Piece::Value(item));
                        pieces.push(Piece::Text("["));
                    }
                }
                Value::Closure => f.write_str("<closure>")?,
                Value::Builtin => f.write_str("<builtin>")?,
                Value::Channel => f.write_str("<channel>")?,
                Value::Unassigned => f.write_str("<unassigned>")?,
            }
        }
        Ok(())
    }
}

enum ReadStep {
    Visit(Addr),
    /// Collect the heads of `chain`, which are the values on top of the
    /// stack, into a list ending in `end`.
    Build { chain: Vec<Addr>, end: Value },
}

enum WriteStep<'a> {
    Visit(&'a Value),
    /// The heads then the end of a list are the top `n + 1` addresses.
    Build(usize),
}

enum ShowStep {
    Visit(Addr),
    Text(&'static str),
    Leave(Addr),
}

impl Heap {
    /// Value of a node that is not a pair.
    fn leaf_value(&self, addr: Addr, tag: Tag) -> Result<Value, HeapError> {
        Ok(match tag {
            Tag::False => Value::Bool(false),
            Tag::True => Value::Bool(true),
            Tag::Number => Value::Number(self.number_value(addr)),
            Tag::Null => Value::Null,
            Tag::Undefined => Value::Undefined,
            Tag::Unassigned => Value::Unassigned,
            Tag::String => Value::Str(self.string_value(addr)?.to_string()),
            Tag::Closure => Value::Closure,
            Tag::Builtin => Value::Builtin,
            Tag::Channel => Value::Channel,
            // pairs are walked by the callers
            Tag::Pair | Tag::Blockframe | Tag::Callframe | Tag::Frame | Tag::Environment => {
                return Err(HeapError::NotAValue { addr, tag })
            }
        })
    }

    /// Read the value at `addr` into a host value. A pair that reaches
    /// itself has no finite value and fails with [`HeapError::Cyclic`].
    pub fn to_value(&self, addr: Addr) -> Result<Value, HeapError> {
        let mut steps = vec![ReadStep::Visit(addr)];
        let mut values: Vec<Value> = Vec::new();
        // pairs on the path from the root to the node being read
        let mut path: HashSet<Addr> = HashSet::new();

        while let Some(step) = steps.pop() {
            match step {
                ReadStep::Visit(addr) => {
                    let mut cur = addr;
                    let mut chain = Vec::new();
                    while self.is(cur, Tag::Pair) {
                        if !path.insert(cur) {
                            return Err(HeapError::Cyclic(cur));
                        }
                        chain.push(cur);
                        cur = self.pair_tail(cur);
                    }
                    let end = self.leaf_value(cur, self.tag(cur)?)?;
                    if chain.is_empty() {
                        values.push(end);
                        continue;
                    }
                    let heads: Vec<Addr> = chain.iter().map(|&p| self.pair_head(p)).collect();
                    steps.push(ReadStep::Build { chain, end });
                    steps.extend(heads.into_iter().rev().map(ReadStep::Visit));
                }
                ReadStep::Build { chain, end } => {
                    for pair in &chain {
                        path.remove(pair);
                    }
                    let items = values.split_off(values.len() - chain.len());
                    values.push(Value::List(items, Box::new(end)));
                }
            }
        }
        Ok(values.pop().unwrap_or_default())
    }

    /// Box a host value onto the heap.
    pub fn from_value(&mut self, value: &Value) -> Result<Addr, HeapError> {
        let mut steps = vec![WriteStep::Visit(value)];
        let mut addrs: Vec<Addr> = Vec::new();

        while let Some(step) = steps.pop() {
            match step {
                WriteStep::Visit(value) => {
                    let addr = match value {
                        Value::Undefined => UNDEFINED,
                        Value::Null => NULL,
                        Value::Bool(b) => self.boolean(*b),
                        Value::Number(n) => self.alloc_number(*n)?,
                        Value::Str(s) => self.alloc_string(s)?,
                        Value::List(items, end) => {
                            steps.push(WriteStep::Build(items.len()));
                            steps.push(WriteStep::Visit(end));
                            steps.extend(items.iter().rev().map(WriteStep::Visit));
                            continue;
                        }
                        Value::Closure => return Err(HeapError::Encoding("closure")),
                        Value::Builtin => return Err(HeapError::Encoding("builtin")),
                        Value::Channel => return Err(HeapError::Encoding("channel")),
                        Value::Unassigned => return Err(HeapError::Encoding("unassigned")),
                    };
                    addrs.push(addr);
                }
                WriteStep::Build(n) => {
                    let parts = addrs.split_off(addrs.len() - (n + 1));
                    let list = parts[..n]
                        .iter()
                        .rev()
                        .try_fold(parts[n], |tail, &head| self.alloc_pair(head, tail))?;
                    addrs.push(list);
                }
            }
        }
        Ok(addrs.pop().unwrap_or(UNDEFINED))
    }

    /// Display form of the value at `addr`, as printed by `display`. A pair
    /// reached again from inside itself prints as `<cycle>`.
    pub fn display_value(&self, addr: Addr) -> Result<String, HeapError> {
        let mut out = String::new();
        let mut steps = vec![ShowStep::Visit(addr)];
        let mut path: HashSet<Addr> = HashSet::new();

        while let Some(step) = steps.pop() {
            match step {
                ShowStep::Text(text) => out.push_str(text),
                ShowStep::Leave(pair) => {
                    path.remove(&pair);
                }
                ShowStep::Visit(addr) => {
                    let tag = self.tag(addr)?;
                    if tag != Tag::Pair {
                        out.push_str(&self.leaf_value(addr, tag)?.to_string());
                    } else if !path.insert(addr) {
                        out.push_str("<cycle>");
                    } else {
                        out.push('[');
                        steps.push(ShowStep::Leave(addr));
                        steps.push(ShowStep::Text("]"));
                        steps.push(ShowStep::Visit(self.pair_tail(addr)));
                        steps.push(ShowStep::Text(", "));
                        steps.push(ShowStep::Visit(self.pair_head(addr)));
                    }
                }
            }
        }
        Ok(out)
    }
}
