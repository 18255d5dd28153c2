//! State-update node insertion.
//!
//! A stateful node computes its next state while consumers still read the
//! previous state.  The synthetic StateUpdate node materializes that
//! read-before-write ordering for the scheduler: it is ordered after the
//! primary node (next state computed) and after every consumer of the
//! primary's outputs (all reads of the previous state done).

use tracing::info;

use core_ir::{Design, NodeKey, NodeKind, Result, StateUpdate};

/// Create a StateUpdate node for every stateful node in the design.
///
/// FIFOs manage their own state hand-off and are skipped.  With
/// `include_context`, the update node joins the primary's context (and
/// structural parent); otherwise it is placed at the top level.
pub fn create_state_update_nodes(design: &mut Design, include_context: bool) -> Result<Vec<NodeKey>> {
    let mut created = Vec::new();
    for primary in design.nodes_with_state() {
        if matches!(design.node(primary).kind, NodeKind::Fifo(_)) {
            continue;
        }

        let name = format!("{}_stateUpdate", design.node(primary).name);
        let parent = if include_context { design.node(primary).parent } else { None };
        let update =
            design.add_node(name, NodeKind::StateUpdate(StateUpdate { primary }), parent);
        design.node_mut(update).partition = design.node(primary).partition;
        if include_context {
            design.node_mut(update).contexts = design.node(primary).contexts.clone();
        }

        // Next state must be computed before the update commits it.
        design.add_order_constraint(primary, update);

        // Every reader of the previous state must run first.
        let mut readers: Vec<NodeKey> = design
            .out_arcs(primary)
            .into_iter()
            .map(|a| design.arc(a).dst.node)
            .filter(|n| !design.node(*n).is_master() && *n != primary)
            .collect();
        readers.sort_unstable();
        readers.dedup();
        for reader in readers {
            design.add_order_constraint(reader, update);
        }

        created.push(update);
    }
    info!(target: "pass.state", count = created.len(), "state_update_nodes_created");
    Ok(created)
}
