//! Clock domains and rate-change boundary nodes.

use indexmap::IndexSet;

use crate::node::NodeKey;

use super::SubsystemBase;

/// Specialization state of a clock domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDomainVariant {
    /// Imported, not yet specialized.
    Unspecialized,
    /// Executes `numerator` times per `denominator` outer ticks, with
    /// numerator > denominator (vector expansion inside).
    Upsample,
    /// Executes less often than the outer domain; gated by a counter strobe.
    Downsample,
}

impl ClockDomainVariant {
    pub fn tag(self) -> &'static str {
        match self {
            ClockDomainVariant::Unspecialized => "ClockDomain",
            ClockDomainVariant::Upsample => "UpsampleClockDomain",
            ClockDomainVariant::Downsample => "DownsampleClockDomain",
        }
    }
}

/// A region of the design executing at a rational multiple of the base rate.
/// Context root once specialized.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockDomain {
    pub base: SubsystemBase,
    pub variant: ClockDomainVariant,
    /// Rate relative to the outer domain, as (numerator, denominator).
    pub rate: (u32, u32),
    /// Rate-change nodes on the input side of the boundary.
    pub rate_change_in: IndexSet<NodeKey>,
    /// Rate-change nodes on the output side of the boundary.
    pub rate_change_out: IndexSet<NodeKey>,
    /// Synthesized tick-counter strobe driving a downsample context.
    pub counter_driver: Option<NodeKey>,
    /// Per-partition replicas of the counter driver.
    pub partition_drivers: Vec<(i32, NodeKey)>,
}

impl ClockDomain {
    pub fn new() -> ClockDomain {
        ClockDomain {
            base: SubsystemBase::default(),
            variant: ClockDomainVariant::Unspecialized,
            rate: (1, 1),
            rate_change_in: IndexSet::new(),
            rate_change_out: IndexSet::new(),
            counter_driver: None,
            partition_drivers: Vec::new(),
        }
    }

    /// Rate-reduction factor contributed to the effective sub-block length:
    /// `denominator / numerator` as a rational applied multiplicatively.
    pub fn rate_ratio(&self) -> (u32, u32) {
        self.rate
    }

    /// True once the rate marks this as decimating relative to the outer
    /// domain.
    pub fn is_downsampling(&self) -> bool {
        self.rate.0 < self.rate.1
    }
}

impl Default for ClockDomain {
    fn default() -> Self {
        ClockDomain::new()
    }
}

/// Position and specialization of a rate-change node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateChangeVariant {
    /// Imported placeholder, direction known but not yet specialized into an
    /// input/output implementation.
    Generic,
    /// Implementation at the input boundary of its domain.
    InputImpl,
    /// Implementation at the output boundary of its domain.
    OutputImpl,
}

/// A node at a clock-domain boundary that up- or down-samples its signal.
#[derive(Debug, Clone, PartialEq)]
pub struct RateChange {
    pub variant: RateChangeVariant,
    /// True for upsampling (rate increases crossing into the domain).
    pub upsample: bool,
    /// (numerator, denominator) of the rate change.
    pub rate: (u32, u32),
    /// The clock domain this node belongs to.
    pub domain: Option<NodeKey>,
}

impl RateChange {
    pub fn new(upsample: bool, rate: (u32, u32)) -> RateChange {
        RateChange { variant: RateChangeVariant::Generic, upsample, rate, domain: None }
    }
}
