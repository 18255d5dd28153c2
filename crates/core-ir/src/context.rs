//! Contexts: (root, subcontext) pairs gating node execution.
//!
//! A node's context stack is the ordered list of nested contexts enclosing
//! it, outermost first.  Contexts are first-class data: after encapsulation
//! the context stack and the structural parent chain are kept consistent, but
//! the stack remains authoritative for execution gating.

use crate::node::NodeKey;

/// One level of context nesting: a context root and the index of the
/// subcontext the node belongs to (e.g. a mux data-port index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Context {
    pub root: NodeKey,
    pub sub_context: usize,
}

impl Context {
    pub fn new(root: NodeKey, sub_context: usize) -> Context {
        Context { root, sub_context }
    }
}

/// True if `inner` extends `outer` (i.e. `outer` is a prefix of `inner`).
pub fn is_prefix(outer: &[Context], inner: &[Context]) -> bool {
    inner.len() >= outer.len() && inner[..outer.len()] == *outer
}

/// Length of the longest common prefix of two context stacks.
pub fn common_prefix_len(a: &[Context], b: &[Context]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}
