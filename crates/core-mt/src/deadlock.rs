//! Inter-thread deadlock check.
//!
//! The emitted threads block on full/empty FIFOs, so a cycle in the
//! partition-level graph deadlocks at startup unless the FIFOs on the cycle
//! collectively carry at least one block of initial data.  Equivalently: the
//! subgraph of partition edges whose FIFOs carry zero initial blocks must be
//! acyclic.

use indexmap::{IndexMap, IndexSet};
use tracing::info;

use core_ir::{CompileError, Design, NodeKind, Result};

/// Partition-level FIFO edges with their initial data, in blocks.
pub fn partition_fifo_graph(design: &Design) -> IndexMap<(i32, i32), usize> {
    let mut edges: IndexMap<(i32, i32), usize> = IndexMap::new();
    for key in design.node_keys() {
        let NodeKind::Fifo(f) = &design.node(key).kind else { continue };
        let src_part = design.node(key).partition;
        let Some(&out_arc) = design.out_arcs(key).first() else { continue };
        let dst_part = design.node(design.arc(out_arc).dst.node).partition;
        if src_part == dst_part {
            continue;
        }
        let elements = design.input_type(key, 0).num_elements().max(1);
        let blocks = f.min_init_count() / elements / f.block_size.max(1);
        let entry = edges.entry((src_part, dst_part)).or_insert(usize::MAX);
        // A pair served by several FIFOs is only as deep as its shallowest.
        *entry = (*entry).min(blocks);
    }
    edges
}

/// Fail if any partition cycle has zero total initial conditions.
pub fn check_inter_thread_deadlock(design: &Design) -> Result<()> {
    let edges = partition_fifo_graph(design);

    // Only zero-block edges can participate in a deadlocked cycle.  The I/O
    // thread stages its writes before draining outputs, so cycles through
    // the I/O partition cannot deadlock and are excluded.
    let mut adjacency: IndexMap<i32, Vec<i32>> = IndexMap::new();
    for (&(src, dst), &blocks) in &edges {
        if src == core_ir::PARTITION_IO || dst == core_ir::PARTITION_IO {
            continue;
        }
        if blocks == 0 {
            adjacency.entry(src).or_default().push(dst);
        }
        adjacency.entry(dst).or_default();
    }

    // DFS cycle detection over the zero-init subgraph.
    let mut visiting: IndexSet<i32> = IndexSet::new();
    let mut done: IndexSet<i32> = IndexSet::new();
    for &start in adjacency.keys() {
        if done.contains(&start) {
            continue;
        }
        let mut stack = vec![(start, 0usize)];
        visiting.insert(start);
        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let cursor = frame.1;
            frame.1 += 1;
            let next = adjacency.get(&node).and_then(|s| s.get(cursor)).copied();
            match next {
                Some(succ) if visiting.contains(&succ) => {
                    let cycle: Vec<i32> = visiting.iter().copied().collect();
                    return Err(CompileError::Deadlock(format!(
                        "partition cycle {:?} has zero total initial conditions",
                        cycle
                    )));
                }
                Some(succ) if !done.contains(&succ) => {
                    visiting.insert(succ);
                    stack.push((succ, 0));
                }
                Some(_) => {}
                None => {
                    stack.pop();
                    visiting.shift_remove(&node);
                    done.insert(node);
                }
            }
        }
    }
    info!(target: "mt.deadlock", edges = edges.len(), "deadlock_check_passed");
    Ok(())
}
