//! Arithmetic and miscellaneous primitive nodes.

use core_types::{DataType, NumericValue};

use crate::node::NodeKey;

/// Multi-input adder/subtractor.  `signs[i]` is the sign applied to input
/// port `i` (true = add).
#[derive(Debug, Clone, PartialEq)]
pub struct Sum {
    pub signs: Vec<bool>,
}

impl Sum {
    pub fn new(signs: Vec<bool>) -> Sum {
        Sum { signs }
    }

    /// Parse a sign string such as `"++-"`.
    pub fn parse_signs(s: &str) -> Vec<bool> {
        s.chars().filter(|c| matches!(c, '+' | '-')).map(|c| c == '+').collect()
    }
}

/// Multi-input multiplier/divider.  `ops[i]` is the operation applied to
/// input port `i` (true = multiply).
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub ops: Vec<bool>,
}

impl Product {
    pub fn new(ops: Vec<bool>) -> Product {
        Product { ops }
    }

    pub fn parse_ops(s: &str) -> Vec<bool> {
        s.chars().filter(|c| matches!(c, '*' | '/')).map(|c| c == '*').collect()
    }
}

/// Constant multiplier.  Medium-level node: expands into Constant + Product.
#[derive(Debug, Clone, PartialEq)]
pub struct Gain {
    pub gain: Vec<NumericValue>,
}

/// A constant source.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantNode {
    pub values: Vec<NumericValue>,
    pub data_type: DataType,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Leq,
    Gt,
    Geq,
    Eq,
    Neq,
}

impl CompareOp {
    pub fn c_op(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Leq => "<=",
            CompareOp::Gt => ">",
            CompareOp::Geq => ">=",
            CompareOp::Eq => "==",
            CompareOp::Neq => "!=",
        }
    }

    pub fn parse(s: &str) -> Option<CompareOp> {
        match s.trim() {
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Leq),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Geq),
            "==" => Some(CompareOp::Eq),
            "~=" | "!=" => Some(CompareOp::Neq),
            _ => None,
        }
    }
}

/// Two-input comparison producing a boolean.
#[derive(Debug, Clone, PartialEq)]
pub struct Compare {
    pub op: CompareOp,
}

/// Opaque user-provided code.  The body is emitted verbatim at file scope;
/// outputs are produced by calling `call_name(inputs..)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlackBox {
    pub body: String,
    pub call_name: String,
    pub stateful: bool,
    pub combinational: bool,
}

/// Synthetic node materializing the read-before-write ordering of a stateful
/// node: ordered after the primary node's next-state computation and after
/// every reader of the previous state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    /// The stateful node whose state this update commits.
    pub primary: NodeKey,
}

/// Synthesized modulo counter strobe.  Drives downsample clock-domain
/// contexts: output is true on ticks where `count == 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct TickCounter {
    pub period: usize,
}
