//! Blocking and sub-blocking.
//!
//! The whole design is wrapped in one global blocking domain of factor `B`:
//! the emitted program moves `B` samples per scheduler tick at the I/O
//! boundary, expanding the outermost dimension of every master port by `B`.
//! Interior nodes that must execute together over a whole sub-block (mux
//! contexts and upsample clock domains) are grouped into sub-blocking
//! domains of factor `b`.
//!
//! Delay dimension changes are not applied here: FIFO delay absorption runs
//! first, so arcs adjacent to delays are recorded in a side table and
//! expanded afterwards by [`specialize_deferred_delays`].

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use core_ir::{
    ArcKey, BlockingBoundary, BlockingDomain, CompileError, Context, Design, NodeKey, NodeKind,
    PortRef, Result,
};

/// Side table of arcs whose outer dimension expansion is deferred until
/// after FIFO delay absorption.
pub type DeferredExpansion = IndexMap<ArcKey, usize>;

/// Effective sub-block length at a node: the base length divided by the
/// rate-reduction factors of the enclosing clock-domain chain.  `None` when
/// the division is not integral (the node must then stay inside a
/// surrounding blocking domain).
pub fn effective_sub_block_len(design: &Design, key: NodeKey, base: usize) -> Option<usize> {
    let (num, den) = crate::clock::effective_rate(design, key);
    // Rate num/den scales the per-tick sample count; base * num must divide
    // evenly by den.
    let scaled = base * num as usize;
    if scaled % den as usize != 0 {
        return None;
    }
    let eff = scaled / den as usize;
    if eff == 0 { None } else { Some(eff) }
}

/// Nodes that can break dependency chains when sub-blocking: delays outside
/// sub-blocking groups whose effective sub-block length is integral.
pub fn discover_dependency_breakers(design: &Design, base: usize) -> IndexSet<NodeKey> {
    design
        .node_keys()
        .into_iter()
        .filter(|k| {
            matches!(design.node(*k).kind, NodeKind::Delay(_))
                && effective_sub_block_len(design, *k, base).is_some()
        })
        .collect()
}

/// Wrap the design in a global blocking domain of factor `block_len` and
/// sub-block the interior by `sub_block_len`.
///
/// Returns the global domain's key.  `deferred` collects arc expansions to
/// apply after FIFO absorption.
pub fn block_and_sub_block_design(
    design: &mut Design,
    block_len: usize,
    sub_block_len: usize,
    deferred: &mut DeferredExpansion,
) -> Result<NodeKey> {
    if block_len == 0 || sub_block_len == 0 || block_len % sub_block_len != 0 {
        return Err(CompileError::Transform(format!(
            "sub-block length {sub_block_len} must divide block length {block_len}"
        )));
    }

    let global = create_global_blocking_domain(design, block_len, sub_block_len, deferred)?;
    if sub_block_len > 1 {
        create_sub_blocking_domains(design, global, sub_block_len, deferred)?;
    }
    info!(
        target: "pass.blocking",
        block_len,
        sub_block_len,
        "design_blocked"
    );
    Ok(global)
}

/// Create the global blocking domain, re-home every top-level node under it,
/// and put BlockingInput/BlockingOutput boundary nodes on the master arcs,
/// expanding master port dimensions by the block factor.
pub fn create_global_blocking_domain(
    design: &mut Design,
    block_len: usize,
    sub_block_len: usize,
    deferred: &mut DeferredExpansion,
) -> Result<NodeKey> {
    let global = design.add_node(
        "blockingGlobal",
        NodeKind::BlockingDomain(BlockingDomain::new(block_len, sub_block_len, true)),
        None,
    );

    for key in design.top_level_nodes().to_vec() {
        if key == global {
            continue;
        }
        design.set_parent(key, Some(global));
    }

    // Input boundary.
    let input = design.input_master();
    for arc_key in design.out_arcs(input) {
        let arc = design.arc(arc_key).clone();
        let inner_ty = arc.data_type.clone();
        let blocked_ty = inner_ty.expand_outer_dimension(block_len);

        let bi = design.add_node(
            format!("blockingIn_p{}", arc.src.number),
            NodeKind::BlockingInput(BlockingBoundary::new(block_len, sub_block_len)),
            Some(global),
        );
        design.node_mut(bi).partition = design.node(arc.dst.node).partition;

        design.add_arc(arc.src, PortRef::input(bi, 0), blocked_ty, arc.sample_time);
        design.set_arc_src(arc_key, PortRef::output(bi, 0));
        if let NodeKind::Master(m) = &mut design.node_mut(input).kind {
            m.set_port_block_size(arc.src.number as usize, block_len);
        }
        if matches!(design.node(design.arc(arc_key).dst.node).kind, NodeKind::Delay(_)) {
            deferred.insert(arc_key, sub_block_len);
        }
    }

    // Output boundaries (output and visualization masters).
    for master in [design.output_master(), design.vis_master()] {
        for arc_key in design
            .arc_keys()
            .into_iter()
            .filter(|a| design.arc(*a).dst.node == master)
            .collect::<Vec<_>>()
        {
            let arc = design.arc(arc_key).clone();
            let inner_ty = arc.data_type.clone();
            let blocked_ty = inner_ty.expand_outer_dimension(block_len);

            let bo = design.add_node(
                format!("blockingOut_p{}", arc.dst.number),
                NodeKind::BlockingOutput(BlockingBoundary::new(block_len, sub_block_len)),
                Some(global),
            );
            design.node_mut(bo).partition = design.node(arc.src.node).partition;

            design.add_arc(PortRef::output(bo, 0), arc.dst, blocked_ty, arc.sample_time);
            design.set_arc_dst(arc_key, PortRef::input(bo, 0));
            if let NodeKind::Master(m) = &mut design.node_mut(master).kind {
                m.set_port_block_size(arc.dst.number as usize, block_len);
            }
        }
    }

    debug!(target: "pass.blocking", "global_blocking_domain_created");
    Ok(global)
}

/// Group interior nodes that cannot be split across sub-block iterations and
/// wrap each group in a sub-blocking domain.
///
/// Grouping: nodes sharing a context whose root is a Mux or an upsample
/// clock domain must land in the same group.  A group whose effective
/// sub-block length is not integral is left in the surrounding domain.
pub fn create_sub_blocking_domains(
    design: &mut Design,
    global: NodeKey,
    sub_block_len: usize,
    deferred: &mut DeferredExpansion,
) -> Result<Vec<NodeKey>> {
    // Union nodes by their outermost non-splittable context root.
    let mut group_of: IndexMap<NodeKey, NodeKey> = IndexMap::new();
    for key in design.node_keys() {
        let node = design.node(key);
        if node.is_master() {
            continue;
        }
        let anchor = node.contexts.iter().map(|c: &Context| c.root).find(|r| {
            match &design.node(*r).kind {
                NodeKind::Mux(_) => true,
                NodeKind::ClockDomain(cd) => !cd.is_downsampling(),
                _ => false,
            }
        });
        if let Some(anchor) = anchor {
            group_of.insert(key, anchor);
        }
    }

    let mut groups: IndexMap<NodeKey, Vec<NodeKey>> = IndexMap::new();
    for (node, anchor) in group_of {
        groups.entry(anchor).or_default().push(node);
    }

    let mut created = Vec::new();
    for (anchor, mut members) in groups {
        members.push(anchor);
        // Non-integral effective length: the group cannot be split; it stays
        // directly in the surrounding blocking domain.
        let Some(eff) = effective_sub_block_len(design, anchor, sub_block_len) else {
            debug!(
                target: "pass.blocking",
                anchor = %design.qualified_name(anchor),
                "group_kept_in_surrounding_domain"
            );
            continue;
        };

        let sub = design.add_node(
            format!("{}_subBlocking", design.node(anchor).name),
            NodeKind::BlockingDomain(BlockingDomain::new(eff, 1, false)),
            Some(global),
        );
        design.node_mut(sub).partition = design.node(anchor).partition;
        created.push(sub);

        // Only re-home group members still directly under the global domain;
        // nodes inside the anchor's own hierarchy move with the anchor.
        for member in members {
            if design.node(member).parent == Some(global) {
                design.set_parent(member, Some(sub));
            }
        }

        // Boundary arcs expand by the sub-block factor; delay-adjacent arcs
        // defer the expansion to after FIFO absorption.
        let inside: IndexSet<NodeKey> = {
            let mut s: IndexSet<NodeKey> = design.descendants(sub).into_iter().collect();
            s.insert(sub);
            s
        };
        for arc_key in design.arc_keys() {
            let arc = design.arc(arc_key);
            let src_in = inside.contains(&arc.src.node);
            let dst_in = inside.contains(&arc.dst.node);
            if src_in == dst_in {
                continue;
            }
            let delay_adjacent = matches!(design.node(arc.src.node).kind, NodeKind::Delay(_))
                || matches!(design.node(arc.dst.node).kind, NodeKind::Delay(_));
            if delay_adjacent {
                deferred.insert(arc_key, eff);
            } else {
                let expanded = design.arc(arc_key).data_type.expand_outer_dimension(eff);
                design.arc_mut(arc_key).data_type = expanded;
            }
        }
        debug!(
            target: "pass.blocking",
            domain = %design.qualified_name(sub),
            factor = eff,
            "sub_blocking_domain_created"
        );
    }
    Ok(created)
}

/// Apply the deferred delay-dimension expansions recorded during blocking.
///
/// The arc's outer dimension is multiplied; a delay endpoint has its initial
/// conditions expanded elementwise to match the widened sample.
pub fn specialize_deferred_delays(design: &mut Design, deferred: &DeferredExpansion) -> Result<()> {
    for (&arc_key, &factor) in deferred {
        if !design.contains_arc(arc_key) {
            // The arc was consumed by FIFO insertion or absorption.
            continue;
        }
        let expanded = design.arc(arc_key).data_type.expand_outer_dimension(factor);
        design.arc_mut(arc_key).data_type = expanded;

        for endpoint in [design.arc(arc_key).src.node, design.arc(arc_key).dst.node] {
            if let NodeKind::Delay(d) = &mut design.node_mut(endpoint).kind {
                // Elementwise expansion: each per-sample value is repeated
                // across the widened sample.
                let mut init = Vec::with_capacity(d.init_conditions.len() * factor);
                for v in &d.init_conditions {
                    for _ in 0..factor {
                        init.push(*v);
                    }
                }
                d.init_conditions = init;
            }
        }
    }
    if !deferred.is_empty() {
        info!(target: "pass.blocking", count = deferred.len(), "deferred_delays_specialized");
    }
    Ok(())
}
