//! General passes over a design: partition propagation, pruning, hierarchy
//! cleanup, and expansion to primitives.

use tracing::{debug, info};

use core_ir::{Design, NodeKey, PortRef, Result, PARTITION_UNASSIGNED};

/// Propagate partition annotations from subsystems to descendants lacking
/// one.  Outer assignments win only where the descendant has none.
pub fn propagate_partitions(design: &mut Design) {
    let mut assigned = 0usize;
    // Top-down: process parents before children so the nearest annotated
    // ancestor wins.
    let mut stack: Vec<NodeKey> = design.top_level_nodes().to_vec();
    while let Some(key) = stack.pop() {
        let part = design.node(key).partition;
        for child in design.children_of(key) {
            if part != PARTITION_UNASSIGNED
                && design.node(child).partition == PARTITION_UNASSIGNED
            {
                design.node_mut(child).partition = part;
                assigned += 1;
            }
            stack.push(child);
        }
    }
    info!(target: "pass.partition", assigned, "partitions_propagated");
}

/// Assign a default partition to any node still unassigned.
pub fn assign_default_partitions(design: &mut Design, default: i32) {
    let mut assigned = 0usize;
    for key in design.node_keys() {
        let node = design.node(key);
        if !node.is_master() && node.partition == PARTITION_UNASSIGNED {
            design.node_mut(key).partition = default;
            assigned += 1;
        }
    }
    if assigned > 0 {
        info!(target: "pass.partition", assigned, default, "default_partitions_assigned");
    }
}

/// Remove arcs terminating at the unconnected or terminator masters (and the
/// visualization master when `remove_vis_arcs` is set).
pub fn disconnect_unconnected_arcs(design: &mut Design, remove_vis_arcs: bool) -> usize {
    let mut sinks = design.sink_masters().to_vec();
    if remove_vis_arcs {
        sinks.push(design.vis_master());
    }
    let doomed: Vec<_> = design
        .arc_keys()
        .into_iter()
        .filter(|a| sinks.contains(&design.arc(*a).dst.node))
        .collect();
    let count = doomed.len();
    for a in doomed {
        design.remove_arc(a);
    }
    debug!(target: "pass.prune", removed_arcs = count, "unconnected_arcs_disconnected");
    count
}

/// Prune unused nodes: repeatedly remove non-master leaves whose effective
/// out-degree is zero when arcs into the unconnected/terminator masters (and
/// optionally the visualization master) are ignored.
///
/// Subsystems and state-holding nodes are never pruned.  Output ports left
/// with no arcs afterwards are tied off to the unconnected master.
pub fn prune(design: &mut Design, include_vis_master: bool) -> Result<usize> {
    let mut ignored = design.sink_masters().to_vec();
    if include_vis_master {
        ignored.push(design.vis_master());
    }
    let masters = design.master_keys();

    let mut removed = 0usize;
    loop {
        let mut doomed = Vec::new();
        for key in design.node_keys() {
            let node = design.node(key);
            if masters.contains(&key)
                || node.is_subsystem_like()
                || node.has_state()
            {
                continue;
            }
            if design.out_degree_ignoring(key, &ignored) == 0 {
                doomed.push(key);
            }
        }
        if doomed.is_empty() {
            break;
        }
        for key in doomed {
            debug!(target: "pass.prune", node = %design.qualified_name(key), "pruned");
            design.remove_node(key)?;
            removed += 1;
        }
    }

    // Tie off dangling output ports so they are explicitly marked.
    let unconnected = design.unconnected_master();
    for key in design.node_keys() {
        if masters.contains(&key) || design.node(key).is_subsystem_like() {
            continue;
        }
        let empty_ports: Vec<u32> = design
            .node(key)
            .outputs
            .iter()
            .filter(|p| p.arcs.is_empty())
            .map(|p| p.number)
            .collect();
        for port in empty_ports {
            let sink_port = design.node(unconnected).inputs.len() as u32;
            let ty = design.output_type(key, port);
            design.add_arc(
                PortRef::output(key, port),
                PortRef::input(unconnected, sink_port),
                ty,
                -1.0,
            );
        }
    }

    info!(target: "pass.prune", removed, "prune_complete");
    Ok(removed)
}

/// Remove subsystems that have been emptied by node-moving passes, walking
/// upward so chains of empty parents collapse.  Context roots are kept.
pub fn cleanup_empty_hierarchy(design: &mut Design, reason: &str) -> Result<usize> {
    let mut removed = 0usize;
    loop {
        let empties: Vec<NodeKey> = design
            .node_keys()
            .into_iter()
            .filter(|k| {
                let n = design.node(*k);
                n.is_subsystem_like()
                    && !n.kind.is_context_root()
                    && n.children().is_some_and(|b| b.children.is_empty())
            })
            .collect();
        if empties.is_empty() {
            break;
        }
        for key in empties {
            debug!(
                target: "pass.hierarchy",
                node = %design.qualified_name(key),
                reason,
                "empty_subsystem_removed"
            );
            design.remove_node(key)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Expand every expandable node until the design holds only primitives.
pub fn expand_to_primitives(design: &mut Design) -> Result<bool> {
    let mut any = false;
    loop {
        let expandable: Vec<NodeKey> =
            design.node_keys().into_iter().filter(|k| design.node(*k).can_expand()).collect();
        if expandable.is_empty() {
            break;
        }
        for key in expandable {
            if design.expand_node(key)?.is_some() {
                any = true;
            }
        }
    }
    if any {
        info!(target: "pass.expand", "design_expanded_to_primitives");
    }
    Ok(any)
}
