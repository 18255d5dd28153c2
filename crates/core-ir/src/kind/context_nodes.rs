//! Context encapsulation nodes and context-root primitives.

use core_types::Variable;

use crate::node::NodeKey;

use super::SubsystemBase;

/// Container created per (context root, partition) during encapsulation.
/// Owns one [`ContextContainer`] child per subcontext.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextFamilyContainer {
    pub base: SubsystemBase,
    pub context_root: NodeKey,
    pub partition: i32,
    /// Child container per subcontext index.
    pub sub_containers: Vec<NodeKey>,
    /// Sibling family containers for the same root in other partitions.
    pub siblings: Vec<NodeKey>,
}

/// Container for the nodes of one subcontext.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextContainer {
    pub base: SubsystemBase,
    pub context_root: NodeKey,
    pub sub_context: usize,
}

/// Synthetic node updating the persistent decision state of a context root
/// (mux select latches).  Ordered after the root and all subcontext bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextVariableUpdate {
    pub context_root: NodeKey,
    pub decision_var: Variable,
}

/// Boundary pass-through at the edge of an enabled subsystem.
///
/// `EnableInput` forwards its data input while the context executes.
/// `EnableOutput` additionally latches the last forwarded value so consumers
/// outside the context observe a held output while the context is disabled;
/// the latch makes it stateful.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnableGate {
    pub enabled_subsystem: Option<NodeKey>,
}

/// N-way selector.  Context root: each data input port is a subcontext that
/// executes only when selected.
#[derive(Debug, Clone, PartialEq)]
pub struct Mux {
    /// Number of data input ports (selector is input port 0; data ports are
    /// 1..=num_data_inputs).
    pub num_data_inputs: usize,
    /// If true, the select decision is latched into a persistent variable
    /// updated by a [`ContextVariableUpdate`] node.
    pub use_switchable_decision: bool,
}

impl Mux {
    pub fn new(num_data_inputs: usize) -> Mux {
        Mux { num_data_inputs, use_switchable_decision: true }
    }

    /// Input port carrying the selector.
    pub const SELECT_PORT: u32 = 0;

    /// Input port for data input `i` (0-based subcontext index).
    pub fn data_port(i: usize) -> u32 {
        (i + 1) as u32
    }
}
