//! Thread-crossing FIFO insertion.
//!
//! Partition crossings are grouped per ordered partition pair; arcs sharing
//! a source port bundle into one FIFO, independent sources become separate
//! FIFOs.  Each original crossing arc is split into a producer arc (into the
//! FIFO) and consumer arcs (out of the FIFO).

use tracing::{debug, info};

use core_domains::clock;
use core_ir::{
    Design, FifoVariant, NodeKey, NodeKind, PortRef, Result, ThreadCrossingFifo,
};

/// Parameters for the inserted FIFOs.
#[derive(Debug, Clone, Copy)]
pub struct FifoSpec {
    pub variant: FifoVariant,
    /// Capacity in blocks.
    pub length_blocks: usize,
    pub block_size: usize,
    pub sub_block_size: usize,
    pub cached_indexes: bool,
}

impl Default for FifoSpec {
    fn default() -> Self {
        FifoSpec {
            variant: FifoVariant::Lockless,
            length_blocks: 16,
            block_size: 1,
            sub_block_size: 1,
            cached_indexes: true,
        }
    }
}

/// Structural parent for a FIFO fed by `src`: the source's context family
/// container where applicable, except that enable outputs and rate-change
/// outputs place the FIFO one level outward.
fn placement_parent(design: &Design, src: NodeKey) -> Option<NodeKey> {
    let mut cur = design.node(src).parent;
    while let Some(p) = cur {
        if matches!(design.node(p).kind, NodeKind::ContextFamilyContainer(_)) {
            let outward = matches!(
                design.node(src).kind,
                NodeKind::EnableOutput(_) | NodeKind::RateChange(_)
            );
            return if outward { design.node(p).parent } else { Some(p) };
        }
        cur = design.node(p).parent;
    }
    None
}

/// Insert a thread-crossing FIFO for every groupable partition crossing.
pub fn insert_partition_crossing_fifos(
    design: &mut Design,
    spec: &FifoSpec,
) -> Result<Vec<NodeKey>> {
    let sinks = design.sink_masters();
    let groups = design.group_partition_crossings();
    let mut created = Vec::new();

    for ((src_part, dst_part), bundles) in groups {
        for (n, bundle) in bundles.into_iter().enumerate() {
            // Crossings into discard sinks carry no data between threads.
            let arcs: Vec<_> = bundle
                .arcs
                .iter()
                .copied()
                .filter(|a| !sinks.contains(&design.arc(*a).dst.node))
                .collect();
            if arcs.is_empty() {
                continue;
            }

            let src_port = bundle.src_port;
            let src_node = src_port.node;
            let data_type = design.arc(arcs[0]).data_type.clone();
            let sample_time = design.arc(arcs[0]).sample_time;

            let mut payload = ThreadCrossingFifo::new(spec.variant, spec.length_blocks);
            // Master-side arcs are already block-expanded by the blocking
            // pass: one arc sample is one whole block.
            let blocked_side = design.node(src_node).is_master()
                || arcs.iter().any(|a| design.node(design.arc(*a).dst.node).is_master());
            payload.block_size = if blocked_side { 1 } else { spec.block_size };
            payload.sub_block_size = spec.sub_block_size;
            payload.cached_indexes = spec.cached_indexes;
            payload.ports[0].clock_domain = clock::domain_of(design, src_node);

            let parent = placement_parent(design, src_node);
            let fifo = design.add_node(
                format!(
                    "fifo_{}_{}_{}",
                    partition_label(src_part),
                    partition_label(dst_part),
                    n
                ),
                NodeKind::Fifo(payload),
                parent,
            );
            design.node_mut(fifo).partition = src_part;
            if parent.is_some() {
                design.node_mut(fifo).contexts = design.node(src_node).contexts.clone();
            }

            // Producer arc into the FIFO, consumer arcs re-sourced from it.
            design.add_arc(src_port, PortRef::input(fifo, 0), data_type, sample_time);
            for arc in &arcs {
                design.set_arc_src(*arc, PortRef::output(fifo, 0));
            }

            debug!(
                target: "mt.fifo",
                fifo = %design.qualified_name(fifo),
                src_part,
                dst_part,
                arcs = arcs.len(),
                "fifo_inserted"
            );
            created.push(fifo);
        }
    }
    info!(target: "mt.fifo", count = created.len(), "partition_crossing_fifos_inserted");
    Ok(created)
}

fn partition_label(partition: i32) -> String {
    if partition < 0 { format!("io{}", -partition) } else { partition.to_string() }
}

/// Set FIFO block and sub-block sizes after blocking has fixed them.
pub fn set_fifo_block_sizes(design: &mut Design, block_size: usize, sub_block_size: usize) {
    for key in design.node_keys() {
        if let NodeKind::Fifo(f) = &mut design.node_mut(key).kind {
            f.block_size = block_size;
            f.sub_block_size = sub_block_size;
        }
    }
}
