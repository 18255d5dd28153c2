//! Blocking domains: regions processing whole blocks of samples per tick.

use super::SubsystemBase;

/// A region whose nodes process `blocking_len` samples per invocation of the
/// enclosing scheduler tick, iterated `blocking_len / sub_blocking_len` times
/// over sub-blocks.  The global blocking domain wraps the entire design;
/// interior sub-blocking domains wrap groups of nodes that must execute
/// together.  Context root with a single subcontext.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockingDomain {
    pub base: SubsystemBase,
    pub blocking_len: usize,
    pub sub_blocking_len: usize,
    /// True only for the single global domain wrapping the design.
    pub global: bool,
}

impl BlockingDomain {
    pub fn new(blocking_len: usize, sub_blocking_len: usize, global: bool) -> BlockingDomain {
        BlockingDomain { base: SubsystemBase::default(), blocking_len, sub_blocking_len, global }
    }

    /// Number of sub-block iterations per block.
    pub fn iterations(&self) -> usize {
        self.blocking_len / self.sub_blocking_len.max(1)
    }
}

/// Boundary node converting between the blocked (outer-dimension-expanded)
/// signal outside a blocking domain and the per-iteration view inside it.
/// `BlockingInput` indexes into the blocked signal; `BlockingOutput` writes
/// the per-iteration result back out.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockingBoundary {
    pub blocking_len: usize,
    pub sub_blocking_len: usize,
}

impl BlockingBoundary {
    pub fn new(blocking_len: usize, sub_blocking_len: usize) -> BlockingBoundary {
        BlockingBoundary { blocking_len, sub_blocking_len }
    }
}
