//! Abstract Syntax Tree definitions for goslang.
//!
//! The parser is an external collaborator: it hands over a tree of tagged
//! nodes, normally serialized as JSON objects carrying a `tag` field
//! (`{"tag":"binop","sym":"+","frst":{...},"scnd":{...}}`). This crate fixes
//! that schema and provides builder helpers for constructing trees in code.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors raised while loading an AST.
#[derive(Debug, Error)]
pub enum AstError {
    /// The input is not valid JSON or does not match the node schema
    /// (including unknown `tag` values).
    #[error("malformed AST: {0}")]
    Json(#[from] serde_json::Error),
}

// ═══════════════════════════════════════════════════════════════════════════
// Literals
// ═══════════════════════════════════════════════════════════════════════════

/// A literal value.
///
/// In JSON a missing `val` is `undefined` and an explicit `null` is `null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Literal {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

impl Literal {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Literal::Undefined)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarRepr {
    Bool(bool),
    Number(f64),
    Str(String),
}

impl<'de> Deserialize<'de> for Literal {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(match Option::<ScalarRepr>::deserialize(d)? {
            None => Literal::Null,
            Some(ScalarRepr::Bool(b)) => Literal::Bool(b),
            Some(ScalarRepr::Number(n)) => Literal::Number(n),
            Some(ScalarRepr::Str(s)) => Literal::Str(s),
        })
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Literal::Undefined | Literal::Null => s.serialize_none(),
            Literal::Bool(b) => s.serialize_bool(*b),
            Literal::Number(n) => s.serialize_f64(*n),
            Literal::Str(v) => s.serialize_str(v),
        }
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Number(n)
    }
}

impl From<i32> for Literal {
    fn from(n: i32) -> Self {
        Literal::Number(n as f64)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Str(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Str(s)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Nodes
// ═══════════════════════════════════════════════════════════════════════════

/// An AST node. The serde representation is the parser's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum Node {
    #[serde(rename = "lit")]
    Literal {
        #[serde(default, skip_serializing_if = "Literal::is_undefined")]
        val: Literal,
    },

    #[serde(rename = "binop")]
    BinaryOp {
        sym: String,
        #[serde(rename = "frst")]
        left: Box<Node>,
        #[serde(rename = "scnd")]
        right: Box<Node>,
    },

    #[serde(rename = "unop")]
    UnaryOp {
        sym: String,
        #[serde(rename = "frst")]
        operand: Box<Node>,
    },

    #[serde(rename = "seq")]
    Sequence { stmts: Vec<Node> },

    #[serde(rename = "nam")]
    Name { sym: String },

    #[serde(rename = "assmt")]
    Assign { sym: String, expr: Box<Node> },

    #[serde(rename = "cond")]
    Cond {
        pred: Box<Node>,
        cons: Box<Node>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<Box<Node>>,
    },

    #[serde(rename = "app")]
    Apply { fun: Box<Node>, args: Vec<Node> },

    #[serde(rename = "blk")]
    Block { body: Box<Node> },

    #[serde(rename = "const")]
    Const { sym: String, expr: Box<Node> },

    #[serde(rename = "var")]
    Var { sym: String, expr: Box<Node> },

    #[serde(rename = "ret")]
    Return { expr: Box<Node> },

    #[serde(rename = "fun")]
    Function {
        sym: String,
        prms: Vec<String>,
        body: Box<Node>,
    },

    #[serde(rename = "lam")]
    Lambda { prms: Vec<String>, body: Box<Node> },

    /// `go f(args)`: the operand must be an application.
    #[serde(rename = "go")]
    Go { call: Box<Node> },

    /// `make(chan)`
    #[serde(rename = "chan")]
    MakeChan,

    /// `ch <- val`
    #[serde(rename = "send")]
    Send { chan: Box<Node>, val: Box<Node> },

    /// `<-ch`
    #[serde(rename = "recv")]
    Recv { chan: Box<Node> },

    #[serde(rename = "while")]
    While { pred: Box<Node>, body: Box<Node> },
}

impl Node {
    /// Parse a node tree from its JSON wire form.
    pub fn from_json(src: &str) -> Result<Node, AstError> {
        Ok(serde_json::from_str(src)?)
    }

    pub fn to_json(&self) -> Result<String, AstError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The wire tag of this node.
    pub fn tag(&self) -> &'static str {
        match self {
            Node::Literal { .. } => "lit",
            Node::BinaryOp { .. } => "binop",
            Node::UnaryOp { .. } => "unop",
            Node::Sequence { .. } => "seq",
            Node::Name { .. } => "nam",
            Node::Assign { .. } => "assmt",
            Node::Cond { .. } => "cond",
            Node::Apply { .. } => "app",
            Node::Block { .. } => "blk",
            Node::Const { .. } => "const",
            Node::Var { .. } => "var",
            Node::Return { .. } => "ret",
            Node::Function { .. } => "fun",
            Node::Lambda { .. } => "lam",
            Node::Go { .. } => "go",
            Node::MakeChan => "chan",
            Node::Send { .. } => "send",
            Node::Recv { .. } => "recv",
            Node::While { .. } => "while",
        }
    }

    // === Builders ===

    pub fn lit(val: impl Into<Literal>) -> Node {
        Node::Literal { val: val.into() }
    }

    pub fn null() -> Node {
        Node::Literal { val: Literal::Null }
    }

    pub fn undefined() -> Node {
        Node::Literal { val: Literal::Undefined }
    }

    pub fn binop(sym: &str, left: Node, right: Node) -> Node {
        Node::BinaryOp {
            sym: sym.to_string(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unop(sym: &str, operand: Node) -> Node {
        Node::UnaryOp {
            sym: sym.to_string(),
            operand: Box::new(operand),
        }
    }

    pub fn seq(stmts: Vec<Node>) -> Node {
        Node::Sequence { stmts }
    }

    pub fn name(sym: &str) -> Node {
        Node::Name { sym: sym.to_string() }
    }

    pub fn assign(sym: &str, expr: Node) -> Node {
        Node::Assign {
            sym: sym.to_string(),
            expr: Box::new(expr),
        }
    }

    pub fn cond(pred: Node, cons: Node, alt: Option<Node>) -> Node {
        Node::Cond {
            pred: Box::new(pred),
            cons: Box::new(cons),
            alt: alt.map(Box::new),
        }
    }

    pub fn apply(fun: Node, args: Vec<Node>) -> Node {
        Node::Apply {
            fun: Box::new(fun),
            args,
        }
    }

    pub fn block(body: Node) -> Node {
        Node::Block { body: Box::new(body) }
    }

    pub fn constant(sym: &str, expr: Node) -> Node {
        Node::Const {
            sym: sym.to_string(),
            expr: Box::new(expr),
        }
    }

    pub fn var(sym: &str, expr: Node) -> Node {
        Node::Var {
            sym: sym.to_string(),
            expr: Box::new(expr),
        }
    }

    pub fn ret(expr: Node) -> Node {
        Node::Return { expr: Box::new(expr) }
    }

    pub fn function(sym: &str, prms: &[&str], body: Node) -> Node {
        Node::Function {
            sym: sym.to_string(),
            prms: prms.iter().map(|p| p.to_string()).collect(),
            body: Box::new(body),
        }
    }

    pub fn lambda(prms: &[&str], body: Node) -> Node {
        Node::Lambda {
            prms: prms.iter().map(|p| p.to_string()).collect(),
            body: Box::new(body),
        }
    }

    pub fn go(call: Node) -> Node {
        Node::Go { call: Box::new(call) }
    }

    pub fn make_chan() -> Node {
        Node::MakeChan
    }

    pub fn send(chan: Node, val: Node) -> Node {
        Node::Send {
            chan: Box::new(chan),
            val: Box::new(val),
        }
    }

    pub fn recv(chan: Node) -> Node {
        Node::Recv { chan: Box::new(chan) }
    }

    pub fn while_loop(pred: Node, body: Node) -> Node {
        Node::While {
            pred: Box::new(pred),
            body: Box::new(body),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "<{}>", self.tag()),
        }
    }
}
