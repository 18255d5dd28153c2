//! Context discovery, driver replication, and encapsulation.
//!
//! A context is a (root, subcontext) pair; nodes carrying it execute only
//! when the root selects that subcontext.  Discovery marks context stacks on
//! nodes; encapsulation then re-homes marked nodes into per-(root, partition)
//! family containers so the scheduler and emitter can treat each subcontext
//! body as a unit.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use core_ir::{
    ClockDomainVariant, CompileError, Context, ContextContainer, ContextFamilyContainer,
    ContextVariableUpdate, Design, Mux, NodeKey, NodeKind, PortKind, PortRef, Result,
    SubsystemBase,
};
use core_types::{DataType, Variable};

/// Move nodes whose only consumers live inside an enabled subsystem into
/// that subsystem, so they join its context.  Nodes driving the enable line
/// itself stay outside.
pub fn expand_enabled_subsystem_contexts(design: &mut Design) -> Result<usize> {
    let mut moved = 0usize;
    let subsystems: Vec<NodeKey> = design
        .node_keys()
        .into_iter()
        .filter(|k| matches!(design.node(*k).kind, NodeKind::EnabledSubsystem(_)))
        .collect();

    for es in subsystems {
        loop {
            let mut inside: IndexSet<NodeKey> = design.descendants(es).into_iter().collect();
            inside.insert(es);

            let mut candidate = None;
            for key in design.node_keys() {
                let node = design.node(key);
                if node.is_master()
                    || node.has_state()
                    || node.kind.is_context_root()
                    || node.is_subsystem_like()
                    || inside.contains(&key)
                {
                    continue;
                }
                let out = design.out_arcs(key);
                if out.is_empty() {
                    continue;
                }
                let all_inside = out.iter().all(|a| {
                    let arc = design.arc(*a);
                    arc.dst.kind != PortKind::Enable && inside.contains(&arc.dst.node)
                });
                if all_inside {
                    candidate = Some(key);
                    break;
                }
            }
            match candidate {
                Some(key) => {
                    debug!(
                        target: "pass.context",
                        node = %design.qualified_name(key),
                        into = %design.qualified_name(es),
                        "moved_into_enabled_context"
                    );
                    design.set_parent(key, Some(es));
                    moved += 1;
                }
                None => break,
            }
        }
    }
    Ok(moved)
}

/// Give enable boundary nodes the partition of their enclosing subsystem
/// (falling back to the partition of their driver).
pub fn place_enable_nodes_in_partitions(design: &mut Design) {
    for key in design.node_keys() {
        let node = design.node(key);
        if !matches!(node.kind, NodeKind::EnableInput(_) | NodeKind::EnableOutput(_)) {
            continue;
        }
        if node.partition != core_ir::PARTITION_UNASSIGNED {
            continue;
        }
        let partition = node
            .parent
            .map(|p| design.node(p).partition)
            .filter(|p| *p != core_ir::PARTITION_UNASSIGNED)
            .or_else(|| {
                design
                    .input_arc(key, 0)
                    .map(|a| design.node(design.arc(a).src.node).partition)
            })
            .unwrap_or(core_ir::PARTITION_UNASSIGNED);
        design.node_mut(key).partition = partition;
    }
}

fn context_roots_by_depth(design: &Design, deepest_first: bool) -> Vec<NodeKey> {
    let mut roots = design.context_root_nodes();
    let depth = |design: &Design, key: NodeKey| {
        let mut d = 0usize;
        let mut cur = design.node(key).parent;
        while let Some(p) = cur {
            d += 1;
            cur = design.node(p).parent;
        }
        d
    };
    roots.sort_by_key(|k| depth(design, *k));
    if deepest_first {
        roots.reverse();
    }
    roots
}

/// Discover contexts: mark every node's context stack.
///
/// Structural roots (enabled subsystems, specialized clock domains, blocking
/// domains) contribute their whole sub-hierarchy.  Mux roots contribute the
/// cone of nodes that exist only to feed one data port; the backward
/// traversal stops at state-holding nodes (including FIFOs with initial
/// state) and at other context roots.
pub fn discover_and_mark_contexts(design: &mut Design) -> Result<Vec<NodeKey>> {
    // Stacks are rebuilt from scratch; this pass re-runs after blocking.
    for key in design.node_keys() {
        design.node_mut(key).contexts.clear();
    }

    let roots = context_roots_by_depth(design, false);
    for root in &roots {
        match &design.node(*root).kind {
            NodeKind::Mux(m) => {
                let data_inputs = m.num_data_inputs;
                for sub in 0..data_inputs {
                    let cone = mux_subcontext_cone(design, *root, sub);
                    let mut stack = design.node(*root).contexts.clone();
                    stack.push(Context::new(*root, sub));
                    for key in cone {
                        design.node_mut(key).contexts = stack.clone();
                    }
                }
            }
            _ => {
                let mut stack = design.node(*root).contexts.clone();
                stack.push(Context::new(*root, 0));
                for key in design.descendants(*root) {
                    design.node_mut(key).contexts = stack.clone();
                }
            }
        }
    }
    info!(target: "pass.context", roots = roots.len(), "contexts_discovered");
    Ok(roots)
}

/// Backward cone of nodes whose only purpose is to feed `mux` data port
/// `sub`.
fn mux_subcontext_cone(design: &Design, mux: NodeKey, sub: usize) -> IndexSet<NodeKey> {
    let port = Mux::data_port(sub);
    let mut cone: IndexSet<NodeKey> = IndexSet::new();
    loop {
        let mut grew = false;
        // Candidates: predecessors of the mux data port and of cone members.
        let mut candidates: Vec<NodeKey> = Vec::new();
        if let Some(a) = design.input_arc(mux, port) {
            candidates.push(design.arc(a).src.node);
        }
        for member in &cone {
            for a in design.in_arcs(*member) {
                candidates.push(design.arc(a).src.node);
            }
        }
        for key in candidates {
            if cone.contains(&key) {
                continue;
            }
            let node = design.node(key);
            if node.is_master() || node.has_state() || node.kind.is_context_root() || key == mux {
                continue;
            }
            let out = design.out_arcs(key);
            let only_feeds_cone = !out.is_empty()
                && out.iter().all(|a| {
                    let arc = design.arc(*a);
                    (arc.dst.node == mux
                        && arc.dst.kind == PortKind::Input
                        && arc.dst.number == port)
                        || cone.contains(&arc.dst.node)
                });
            if only_feeds_cone {
                cone.insert(key);
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }
    cone
}

/// Driver nodes whose value decides a context root's execution.
fn context_drivers(design: &Design, root: NodeKey) -> Vec<NodeKey> {
    let node = design.node(root);
    match &node.kind {
        NodeKind::EnabledSubsystem(_) => node
            .enable_port
            .as_ref()
            .and_then(|p| p.arcs.first())
            .map(|a| vec![design.arc(*a).src.node])
            .unwrap_or_default(),
        NodeKind::Mux(_) => design
            .input_arc(root, Mux::SELECT_PORT)
            .map(|a| vec![design.arc(a).src.node])
            .unwrap_or_default(),
        NodeKind::ClockDomain(cd) => cd.counter_driver.into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Replicate context drivers per partition so the decision value can be
/// computed locally in every partition holding part of the context.
pub fn replicate_context_drivers(design: &mut Design) -> Result<usize> {
    let mut replicated = 0usize;
    for root in design.context_root_nodes() {
        if !matches!(
            design.node(root).kind,
            NodeKind::EnabledSubsystem(_) | NodeKind::ClockDomain(_)
        ) {
            continue;
        }
        let drivers = context_drivers(design, root);
        let Some(&driver) = drivers.first() else { continue };
        if design.node(driver).is_subsystem_like() {
            // Compound drivers are not replicated.
            continue;
        }

        // Partitions holding part of this context.
        let mut partitions: IndexSet<i32> = IndexSet::new();
        for key in design.node_keys() {
            if design.node(key).contexts.iter().any(|c| c.root == root) {
                partitions.insert(design.node(key).partition);
            }
        }

        for partition in partitions {
            let name = format!("{}_rep_p{}", design.node(driver).name, partition_label(partition));
            let parent = design.node(driver).parent;
            let kind = design.node(driver).kind.clone();
            let replica = design.add_node(name, kind, parent);
            design.node_mut(replica).partition = partition;
            design.node_mut(replica).contexts = design.node(driver).contexts.clone();

            // Duplicate the driver's input arcs from the same sources.
            for a in design.in_arcs(driver) {
                let arc = design.arc(a).clone();
                design.add_arc(
                    arc.src,
                    PortRef { node: replica, kind: arc.dst.kind, number: arc.dst.number },
                    arc.data_type,
                    arc.sample_time,
                );
            }

            match &mut design.node_mut(root).kind {
                NodeKind::EnabledSubsystem(es) => es.partition_drivers.push((partition, replica)),
                NodeKind::ClockDomain(cd) => cd.partition_drivers.push((partition, replica)),
                _ => {}
            }
            replicated += 1;
            debug!(
                target: "pass.context",
                root = %design.qualified_name(root),
                partition,
                "context_driver_replicated"
            );
        }
    }
    Ok(replicated)
}

fn partition_label(partition: i32) -> String {
    if partition < 0 { format!("io{}", -partition) } else { partition.to_string() }
}

/// Encapsulate contexts: create a family container per (root, partition) and
/// a context container per subcontext, re-homing marked nodes.  Drivers of
/// the boundary become order dependencies of the containers.
pub fn encapsulate_contexts(design: &mut Design) -> Result<usize> {
    let mut created = 0usize;
    for root in context_roots_by_depth(design, true) {
        let sub_count = design.node(root).kind.sub_context_count();

        // Members: nodes whose innermost context belongs to this root.
        // Inner context roots are excluded: each root already moved into its
        // own family container (processed deepest-first), and that family
        // carries the outer context on its behalf.
        let mut members: IndexMap<(i32, usize), Vec<NodeKey>> = IndexMap::new();
        for key in design.node_keys() {
            if key == root || design.node(key).kind.is_context_root() {
                continue;
            }
            let node = design.node(key);
            if let Some(last) = node.contexts.last()
                && last.root == root
            {
                members.entry((node.partition, last.sub_context)).or_default().push(key);
            }
        }

        let mut partitions: IndexSet<i32> = members.keys().map(|(p, _)| *p).collect();
        partitions.insert(design.node(root).partition);

        let outer_contexts = design.node(root).contexts.clone();
        let parent = design.node(root).parent;
        let root_name = design.node(root).name.clone();
        let root_partition = design.node(root).partition;

        let mut family_of: IndexMap<i32, NodeKey> = IndexMap::new();
        for &partition in &partitions {
            let fam = design.add_node(
                format!("{root_name}_ctxFam_p{}", partition_label(partition)),
                NodeKind::ContextFamilyContainer(ContextFamilyContainer {
                    base: SubsystemBase::default(),
                    context_root: root,
                    partition,
                    sub_containers: Vec::new(),
                    siblings: Vec::new(),
                }),
                parent,
            );
            design.node_mut(fam).partition = partition;
            design.node_mut(fam).contexts = outer_contexts.clone();
            created += 1;

            let mut subs = Vec::with_capacity(sub_count);
            for sub in 0..sub_count {
                let cc = design.add_node(
                    format!("{root_name}_ctx{sub}_p{}", partition_label(partition)),
                    NodeKind::ContextContainer(ContextContainer {
                        base: SubsystemBase::default(),
                        context_root: root,
                        sub_context: sub,
                    }),
                    Some(fam),
                );
                design.node_mut(cc).partition = partition;
                design.node_mut(cc).contexts = outer_contexts.clone();
                subs.push(cc);

                if let Some(nodes) = members.get(&(partition, sub)) {
                    for &key in nodes {
                        design.set_parent(key, Some(subs[sub]));
                    }
                }
            }
            if let NodeKind::ContextFamilyContainer(fc) = &mut design.node_mut(fam).kind {
                fc.sub_containers = subs;
            }
            family_of.insert(partition, fam);
        }

        // Sibling links between the per-partition families.
        let fams: Vec<NodeKey> = family_of.values().copied().collect();
        for &fam in &fams {
            if let NodeKind::ContextFamilyContainer(fc) = &mut design.node_mut(fam).kind {
                fc.siblings = fams.iter().copied().filter(|f| *f != fam).collect();
            }
        }

        // The root itself lives in its partition's family container.
        if let Some(&fam) = family_of.get(&root_partition) {
            design.set_parent(root, Some(fam));
        }

        // Boundary drivers order-constrain every family container.
        for driver in context_drivers(design, root) {
            for &fam in &fams {
                design.add_order_constraint(driver, fam);
            }
        }

        debug!(
            target: "pass.context",
            root = %design.qualified_name(root),
            families = fams.len(),
            "context_encapsulated"
        );
    }
    Ok(created)
}

/// Create context-variable-update nodes for roots carrying persistent
/// decision state (muxes with switchable decisions).
pub fn create_context_variable_updates(design: &mut Design) -> Result<Vec<NodeKey>> {
    let mut created = Vec::new();
    for root in design.context_root_nodes() {
        let NodeKind::Mux(m) = &design.node(root).kind else { continue };
        if !m.use_switchable_decision {
            continue;
        }
        let name = design.node(root).name.clone();
        let parent = design.node(root).parent;
        let partition = design.node(root).partition;
        let contexts = design.node(root).contexts.clone();

        let sel_ty = DataType::new(false, true, false, 32, 0, vec![1]);
        let update = design.add_node(
            format!("{name}_ctxVarUpdate"),
            NodeKind::ContextVariableUpdate(ContextVariableUpdate {
                context_root: root,
                decision_var: Variable::new(format!("{name}_ctxsel"), sel_ty),
            }),
            parent,
        );
        design.node_mut(update).partition = partition;
        design.node_mut(update).contexts = contexts;
        design.add_order_constraint(root, update);
        created.push(update);
    }
    if !created.is_empty() {
        info!(target: "pass.context", count = created.len(), "context_variable_updates_created");
    }
    Ok(created)
}

/// Check the post-encapsulation invariant: every node's context stack is a
/// prefix-extension of its structural parent's stack.
pub fn verify_context_structure(design: &Design) -> Result<()> {
    for key in design.node_keys() {
        let node = design.node(key);
        if let Some(parent) = node.parent {
            let pstack = &design.node(parent).contexts;
            if !core_ir::is_prefix(pstack, &node.contexts)
                && !matches!(
                    design.node(parent).kind,
                    NodeKind::ContextContainer(_) | NodeKind::ContextFamilyContainer(_)
                )
            {
                return Err(CompileError::Transform(format!(
                    "context stack of `{}` is inconsistent with its parent chain",
                    design.qualified_name(key)
                )));
            }
        }
    }
    Ok(())
}
