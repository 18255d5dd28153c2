//! Directed, typed edges between ports.

use core_types::DataType;

use crate::port::PortRef;

/// Stable handle to an arc in a [`Design`](crate::Design).  Handles survive
/// ID renumbering; the public integer ID lives on the arc itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArcKey(pub u32);

impl std::fmt::Display for ArcKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// A directed edge `(src_port → dst_port)` carrying a signal of a given type
/// and sample time.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcData {
    /// Public ID used in serialized graphs.  `-1` until assigned.
    pub id: i32,
    pub src: PortRef,
    pub dst: PortRef,
    pub data_type: DataType,
    /// Sample period of the signal, in seconds (`-1.0` = inherited).
    pub sample_time: f64,
}

impl ArcData {
    pub fn new(src: PortRef, dst: PortRef, data_type: DataType, sample_time: f64) -> ArcData {
        ArcData { id: -1, src, dst, data_type, sample_time }
    }
}
