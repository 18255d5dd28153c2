//! Thread-crossing FIFO nodes.

use core_types::NumericValue;

use crate::node::NodeKey;

/// FIFO implementation variant emitted for a crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoVariant {
    /// Single-producer/single-consumer lockless ring of blocks; data copied
    /// in and out of the ring.
    Lockless,
    /// Lockless ring where compute happens directly in the ring slot.
    LocklessInPlace,
}

impl FifoVariant {
    pub fn tag(self) -> &'static str {
        match self {
            FifoVariant::Lockless => "lockless",
            FifoVariant::LocklessInPlace => "lockless_inplace",
        }
    }
}

/// Per-port-pair bookkeeping.  After merging, one FIFO node can carry several
/// independent signals between the same partition pair; input port `i` feeds
/// output port `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FifoPort {
    /// Flattened initial conditions, oldest first.  After all transforms the
    /// count must be a multiple of `block_size * elements_per_sample`.
    pub init_conditions: Vec<NumericValue>,
    /// Clock domain observed at this port (from the producer side).
    pub clock_domain: Option<NodeKey>,
}

/// A producer/consumer queue between two partitions.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadCrossingFifo {
    pub variant: FifoVariant,
    /// FIFO capacity in blocks.
    pub length_blocks: usize,
    /// Samples per block at this crossing.
    pub block_size: usize,
    /// Samples per sub-block at this crossing.
    pub sub_block_size: usize,
    /// One entry per input/output port pair.
    pub ports: Vec<FifoPort>,
    /// Whether head/tail indices are cached between emptiness checks in the
    /// emitted code.
    pub cached_indexes: bool,
}

impl ThreadCrossingFifo {
    pub fn new(variant: FifoVariant, length_blocks: usize) -> ThreadCrossingFifo {
        ThreadCrossingFifo {
            variant,
            length_blocks,
            block_size: 1,
            sub_block_size: 1,
            ports: vec![FifoPort::default()],
            cached_indexes: true,
        }
    }

    /// Initial conditions of port pair `i`, counted in samples.
    pub fn init_count(&self, port: usize) -> usize {
        self.ports.get(port).map(|p| p.init_conditions.len()).unwrap_or(0)
    }

    /// Smallest initial-condition count across all port pairs.
    pub fn min_init_count(&self) -> usize {
        self.ports.iter().map(|p| p.init_conditions.len()).min().unwrap_or(0)
    }
}
