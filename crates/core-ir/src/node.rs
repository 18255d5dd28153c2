//! Nodes: common attributes plus the tagged kind payload.

use crate::context::Context;
use crate::kind::{NodeKind, SubsystemBase};
use crate::port::{Port, PortKind, PortRef};

/// Partition sentinel: node not yet assigned to a thread.
pub const PARTITION_UNASSIGNED: i32 = -1;
/// Partition sentinel: node executes on the I/O thread.
pub const PARTITION_IO: i32 = -2;

/// Stable handle to a node in a [`Design`](crate::Design).  Handles survive
/// ID renumbering and deep copies (copies preserve keys).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub u32);

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A node in the design graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Public ID used in serialized graphs.  `-1` until assigned; IDs 1..=5
    /// are reserved for the master nodes.
    pub id: i32,
    /// Instance name (one path component of the qualified name).
    pub name: String,
    /// Structural parent; `None` for top-level nodes and masters.
    pub parent: Option<NodeKey>,
    /// Thread assignment; see [`PARTITION_UNASSIGNED`] / [`PARTITION_IO`].
    pub partition: i32,
    /// Execution order within one cycle; `-1` = unscheduled.
    pub sched_order: i64,
    /// Stack of contexts enclosing this node, outermost first.
    pub contexts: Vec<Context>,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
    /// Enable line (enabled subsystems and their boundary nodes).
    pub enable_port: Option<Port>,
    /// Scheduling-only ordering constraints.
    pub order_in: Port,
    pub order_out: Port,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Node {
        Node {
            id: -1,
            name: name.into(),
            parent: None,
            partition: PARTITION_UNASSIGNED,
            sched_order: -1,
            contexts: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            enable_port: None,
            order_in: Port::new(0),
            order_out: Port::new(0),
            kind,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.sched_order >= 0
    }

    pub fn is_master(&self) -> bool {
        self.kind.is_master()
    }

    pub fn is_subsystem_like(&self) -> bool {
        self.kind.subsystem_base().is_some()
    }

    pub fn children(&self) -> Option<&SubsystemBase> {
        self.kind.subsystem_base()
    }

    /// Look up a port; `None` if it was never created.
    pub fn port(&self, kind: PortKind, number: u32) -> Option<&Port> {
        match kind {
            PortKind::Input => self.inputs.get(number as usize),
            PortKind::Output => self.outputs.get(number as usize),
            PortKind::Enable => self.enable_port.as_ref(),
            PortKind::OrderConstraintIn => Some(&self.order_in),
            PortKind::OrderConstraintOut => Some(&self.order_out),
        }
    }

    /// Look up a port, creating it (and any lower-numbered siblings) first.
    pub fn port_mut(&mut self, kind: PortKind, number: u32) -> &mut Port {
        match kind {
            PortKind::Input => {
                Self::ensure(&mut self.inputs, number);
                &mut self.inputs[number as usize]
            }
            PortKind::Output => {
                Self::ensure(&mut self.outputs, number);
                &mut self.outputs[number as usize]
            }
            PortKind::Enable => self.enable_port.get_or_insert_with(|| Port::new(0)),
            PortKind::OrderConstraintIn => &mut self.order_in,
            PortKind::OrderConstraintOut => &mut self.order_out,
        }
    }

    fn ensure(ports: &mut Vec<Port>, number: u32) {
        while ports.len() <= number as usize {
            ports.push(Port::new(ports.len() as u32));
        }
    }

    /// All ports of this node paired with the refs addressing them.
    pub fn all_ports(&self, key: NodeKey) -> Vec<(PortRef, &Port)> {
        let mut out = Vec::new();
        for p in &self.inputs {
            out.push((PortRef { node: key, kind: PortKind::Input, number: p.number }, p));
        }
        for p in &self.outputs {
            out.push((PortRef { node: key, kind: PortKind::Output, number: p.number }, p));
        }
        if let Some(p) = &self.enable_port {
            out.push((PortRef { node: key, kind: PortKind::Enable, number: 0 }, p));
        }
        out.push((PortRef { node: key, kind: PortKind::OrderConstraintIn, number: 0 }, &self.order_in));
        out.push((PortRef { node: key, kind: PortKind::OrderConstraintOut, number: 0 }, &self.order_out));
        out
    }

    // ---- Hook set: flags -------------------------------------------------

    /// True if the node holds state across cycles.
    pub fn has_state(&self) -> bool {
        match &self.kind {
            NodeKind::Delay(d) => d.delay > 0,
            NodeKind::TappedDelay(t) => t.delay.delay > 0 || t.include_current,
            NodeKind::Fifo(_) => true,
            NodeKind::BlackBox(b) => b.stateful,
            NodeKind::Lut(l) => l.search.has_memory(),
            NodeKind::EnableOutput(_) => true,
            NodeKind::TickCounter(_) => true,
            NodeKind::ContextVariableUpdate(_) => false,
            _ => false,
        }
    }

    /// True if an input can reach an output combinationally within one cycle.
    pub fn has_combinational_path(&self) -> bool {
        match &self.kind {
            NodeKind::Delay(d) => d.delay == 0,
            NodeKind::TappedDelay(t) => t.include_current,
            NodeKind::Fifo(_) => false,
            NodeKind::BlackBox(b) => b.combinational,
            NodeKind::StateUpdate(_) => false,
            NodeKind::ContextVariableUpdate(_) => false,
            NodeKind::TickCounter(_) => false,
            NodeKind::Master(_) => false,
            _ => true,
        }
    }

    /// True if the node contributes declarations at file scope.
    pub fn has_global_decl(&self) -> bool {
        match &self.kind {
            NodeKind::Lut(_) => true,
            NodeKind::BlackBox(_) => true,
            NodeKind::Constant(c) => c.values.len() > 1,
            _ => false,
        }
    }

    /// True if this node can be expanded into a primitive subgraph.
    pub fn can_expand(&self) -> bool {
        matches!(self.kind, NodeKind::Gain(_))
    }

    /// Human-readable label used in dumps and error messages.
    pub fn label_string(&self) -> String {
        let detail = match &self.kind {
            NodeKind::Sum(s) => {
                let signs: String = s.signs.iter().map(|p| if *p { '+' } else { '-' }).collect();
                format!("({signs})")
            }
            NodeKind::Product(p) => {
                let ops: String = p.ops.iter().map(|m| if *m { '*' } else { '/' }).collect();
                format!("({ops})")
            }
            NodeKind::Delay(d) => format!("(z^-{})", d.delay),
            NodeKind::TappedDelay(t) => format!("(taps={})", t.exposed_len()),
            NodeKind::ClockDomain(cd) => format!("({}:{})", cd.rate.0, cd.rate.1),
            NodeKind::Compare(c) => format!("({})", c.op.c_op()),
            _ => String::new(),
        };
        format!("{}{}[{}]", self.kind.tag(), detail, self.name)
    }
}
