//! The tagged node variant.
//!
//! Every node in the design is one of these kinds.  The scheduler and the
//! emitters never match on the concrete kind directly; they go through the
//! hook methods on [`Node`](crate::Node) and [`Design`](crate::Design), which
//! dispatch here.

mod blocking;
mod clock;
mod context_nodes;
mod delay;
mod fifo;
mod lut;
mod master;
mod prims;
mod subsystem;

pub use blocking::{BlockingBoundary, BlockingDomain};
pub use clock::{ClockDomain, ClockDomainVariant, RateChange, RateChangeVariant};
pub use context_nodes::{
    ContextContainer, ContextFamilyContainer, ContextVariableUpdate, EnableGate, Mux,
};
pub use delay::{Delay, DelayBuffer, TappedDelay};
pub use fifo::{FifoPort, FifoVariant, ThreadCrossingFifo};
pub use lut::{ExtrapMethod, InterpMethod, Lut, SearchMethod};
pub use master::{MasterNode, MasterRole};
pub use prims::{BlackBox, Compare, CompareOp, ConstantNode, Gain, Product, StateUpdate, Sum, TickCounter};
pub use subsystem::{EnabledSubsystem, ExpandedNode, Subsystem, SubsystemBase};

/// Tagged variant over every node the middle-end can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // Sentinels
    Master(MasterNode),

    // Hierarchy
    Subsystem(Subsystem),
    Expanded(ExpandedNode),
    EnabledSubsystem(EnabledSubsystem),

    // Context plumbing
    ContextFamilyContainer(ContextFamilyContainer),
    ContextContainer(ContextContainer),
    ContextVariableUpdate(ContextVariableUpdate),
    EnableInput(EnableGate),
    EnableOutput(EnableGate),
    Mux(Mux),

    // Clock domains and rate changes
    ClockDomain(ClockDomain),
    RateChange(RateChange),
    TickCounter(TickCounter),

    // Blocking
    BlockingDomain(BlockingDomain),
    BlockingInput(BlockingBoundary),
    BlockingOutput(BlockingBoundary),

    // Primitives
    Sum(Sum),
    Product(Product),
    Gain(Gain),
    Constant(ConstantNode),
    Compare(Compare),
    Delay(Delay),
    TappedDelay(TappedDelay),
    Lut(Lut),
    BlackBox(BlackBox),
    StateUpdate(StateUpdate),

    // Multithread
    Fifo(ThreadCrossingFifo),
}

impl NodeKind {
    /// Short kind tag used in labels, debug dumps, and synthesized names.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Master(m) => m.role().tag(),
            NodeKind::Subsystem(_) => "Subsystem",
            NodeKind::Expanded(_) => "Expanded",
            NodeKind::EnabledSubsystem(_) => "EnabledSubsystem",
            NodeKind::ContextFamilyContainer(_) => "ContextFamilyContainer",
            NodeKind::ContextContainer(_) => "ContextContainer",
            NodeKind::ContextVariableUpdate(_) => "ContextVariableUpdate",
            NodeKind::EnableInput(_) => "EnableInput",
            NodeKind::EnableOutput(_) => "EnableOutput",
            NodeKind::Mux(_) => "Mux",
            NodeKind::ClockDomain(cd) => cd.variant.tag(),
            NodeKind::RateChange(_) => "RateChange",
            NodeKind::TickCounter(_) => "TickCounter",
            NodeKind::BlockingDomain(_) => "BlockingDomain",
            NodeKind::BlockingInput(_) => "BlockingInput",
            NodeKind::BlockingOutput(_) => "BlockingOutput",
            NodeKind::Sum(_) => "Sum",
            NodeKind::Product(_) => "Product",
            NodeKind::Gain(_) => "Gain",
            NodeKind::Constant(_) => "Constant",
            NodeKind::Compare(_) => "Compare",
            NodeKind::Delay(_) => "Delay",
            NodeKind::TappedDelay(_) => "TappedDelay",
            NodeKind::Lut(_) => "LUT",
            NodeKind::BlackBox(_) => "BlackBox",
            NodeKind::StateUpdate(_) => "StateUpdate",
            NodeKind::Fifo(_) => "ThreadCrossingFIFO",
        }
    }

    /// Kinds that own children (form the design hierarchy).
    pub fn subsystem_base(&self) -> Option<&SubsystemBase> {
        match self {
            NodeKind::Subsystem(s) => Some(&s.base),
            NodeKind::Expanded(s) => Some(&s.base),
            NodeKind::EnabledSubsystem(s) => Some(&s.base),
            NodeKind::ClockDomain(s) => Some(&s.base),
            NodeKind::BlockingDomain(s) => Some(&s.base),
            NodeKind::ContextFamilyContainer(s) => Some(&s.base),
            NodeKind::ContextContainer(s) => Some(&s.base),
            _ => None,
        }
    }

    pub fn subsystem_base_mut(&mut self) -> Option<&mut SubsystemBase> {
        match self {
            NodeKind::Subsystem(s) => Some(&mut s.base),
            NodeKind::Expanded(s) => Some(&mut s.base),
            NodeKind::EnabledSubsystem(s) => Some(&mut s.base),
            NodeKind::ClockDomain(s) => Some(&mut s.base),
            NodeKind::BlockingDomain(s) => Some(&mut s.base),
            NodeKind::ContextFamilyContainer(s) => Some(&mut s.base),
            NodeKind::ContextContainer(s) => Some(&mut s.base),
            _ => None,
        }
    }

    /// Kinds whose execution decision defines a context.
    pub fn is_context_root(&self) -> bool {
        match self {
            NodeKind::Mux(_) | NodeKind::EnabledSubsystem(_) | NodeKind::BlockingDomain(_) => true,
            NodeKind::ClockDomain(cd) => cd.variant != ClockDomainVariant::Unspecialized,
            _ => false,
        }
    }

    /// Number of subcontexts a context root carries.
    pub fn sub_context_count(&self) -> usize {
        match self {
            NodeKind::Mux(m) => m.num_data_inputs,
            NodeKind::EnabledSubsystem(_) => 1,
            NodeKind::ClockDomain(_) => 1,
            NodeKind::BlockingDomain(_) => 1,
            _ => 0,
        }
    }

    pub fn is_master(&self) -> bool {
        matches!(self, NodeKind::Master(_))
    }
}
