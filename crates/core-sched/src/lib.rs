//! Topological scheduling.
//!
//! The scheduler works on a destructive clone of the design: master-input
//! outputs, stateful-node outputs (whose values are constants within one
//! cycle), and constant nodes are disconnected, then the residual graph is
//! topologically sorted with a configurable tie-break heuristic.  The
//! resulting order is back-propagated onto the original graph by key.
//! Cycles in the residual graph are fatal; the offending partial schedule is
//! dumped as a GraphML artifact named after the design.

use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use core_ir::{CompileError, Design, NodeKey, NodeKind, Result, PARTITION_IO};

/// Tie-break heuristic for picking among ready nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedHeuristic {
    /// Breadth-first: oldest ready node first.
    Bfs,
    /// Depth-first: newest ready node first.
    Dfs,
    /// Uniform random pick, reproducible from the seed.
    Random,
}

impl SchedHeuristic {
    pub fn parse(s: &str) -> Option<SchedHeuristic> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bfs" => Some(SchedHeuristic::Bfs),
            "dfs" => Some(SchedHeuristic::Dfs),
            "random" => Some(SchedHeuristic::Random),
            _ => None,
        }
    }
}

/// Parameters for the topological sort.
#[derive(Debug, Clone, Copy)]
pub struct TopologicalSortParams {
    pub heuristic: SchedHeuristic,
    pub rand_seed: u64,
}

impl Default for TopologicalSortParams {
    fn default() -> Self {
        TopologicalSortParams { heuristic: SchedHeuristic::Bfs, rand_seed: 0 }
    }
}

/// Traversal strategy for the single-threaded emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedStrategy {
    /// Emit backwards from the outputs.
    BottomUp,
    /// Emit in topological order.
    Topological,
    /// Emit in topological order with context guards.
    TopologicalContext,
}

impl SchedStrategy {
    pub fn parse(s: &str) -> Option<SchedStrategy> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bottomup" | "bottom-up" => Some(SchedStrategy::BottomUp),
            "topological" => Some(SchedStrategy::Topological),
            "topological_context" | "topological-context" => Some(SchedStrategy::TopologicalContext),
            _ => None,
        }
    }

    pub fn is_context_aware(self) -> bool {
        matches!(self, SchedStrategy::TopologicalContext)
    }
}

/// Nodes whose outputs carry no intra-cycle dependency.
fn is_exempt_source(design: &Design, key: NodeKey) -> bool {
    let node = design.node(key);
    key == design.input_master()
        || matches!(node.kind, NodeKind::Constant(_))
        || node.has_state()
}

/// True for nodes that receive a schedule order.
fn is_schedulable(design: &Design, key: NodeKey) -> bool {
    let node = design.node(key);
    if node.is_subsystem_like() {
        return false;
    }
    if node.is_master() {
        // Only the output master executes (it commits the design outputs).
        return key == design.output_master();
    }
    !matches!(node.kind, NodeKind::Constant(_))
}

/// Schedule the design topologically, globally or per partition.
///
/// In per-partition mode each partition gets an independent order space and
/// the output master is scheduled with the I/O partition.
pub fn schedule_topological(
    design: &mut Design,
    params: TopologicalSortParams,
    per_partition: bool,
    design_name: &str,
    dump_dir: Option<&Path>,
) -> Result<()> {
    let (mut work, _maps) = design.copy_graph();
    prepare_destructive(&mut work);

    let order = if per_partition {
        let mut order: IndexMap<NodeKey, i64> = IndexMap::new();
        let partitions: IndexSet<i32> = work
            .node_keys()
            .into_iter()
            .filter(|k| is_schedulable(&work, *k))
            .map(|k| work.node(k).partition)
            .collect();
        for partition in partitions {
            let scheduled =
                topological_sort_destructive(&mut work, params, Some(partition), design_name, dump_dir)?;
            for (i, key) in scheduled.into_iter().enumerate() {
                order.insert(key, i as i64);
            }
        }
        order
    } else {
        let scheduled =
            topological_sort_destructive(&mut work, params, None, design_name, dump_dir)?;
        scheduled.into_iter().enumerate().map(|(i, k)| (k, i as i64)).collect()
    };

    // Keys are preserved by copy_graph: back-propagate directly.
    for (key, ord) in order {
        design.node_mut(key).sched_order = ord;
    }
    info!(target: "sched", per_partition, "schedule_complete");
    Ok(())
}

/// Containers do not execute, but their members must still wait for the
/// container's drivers (context decision values, enable lines).  Push those
/// dependencies down onto the schedulable members of each container.
fn propagate_container_dependencies(work: &mut Design) {
    for key in work.node_keys() {
        let node = work.node(key);
        if !node.is_subsystem_like() {
            continue;
        }
        let mut drivers: Vec<NodeKey> =
            node.order_in.arcs.iter().map(|a| work.arc(*a).src.node).collect();
        if let Some(p) = &node.enable_port {
            drivers.extend(p.arcs.iter().map(|a| work.arc(*a).src.node));
        }
        if drivers.is_empty() {
            continue;
        }
        for member in work.descendants(key) {
            if is_schedulable(work, member) {
                for &driver in &drivers {
                    work.add_order_constraint(driver, member);
                }
            }
        }
    }
}

/// Remove intra-cycle-irrelevant dependencies from the working copy.
fn prepare_destructive(work: &mut Design) {
    propagate_container_dependencies(work);
    let input = work.input_master();
    for arc in work.out_arcs_with_order(input) {
        work.remove_arc(arc);
    }
    for key in work.node_keys() {
        if work.node(key).has_state() {
            for arc in work.out_arcs(key) {
                work.remove_arc(arc);
            }
        }
    }
    let constants: Vec<NodeKey> = work
        .node_keys()
        .into_iter()
        .filter(|k| matches!(work.node(*k).kind, NodeKind::Constant(_)))
        .collect();
    for key in constants {
        for arc in work.arcs_of_node(key) {
            work.remove_arc(arc);
        }
    }
}

/// Kahn's algorithm over the (already prepared) working copy, destroying its
/// arcs.  `partition` restricts scheduling to one partition; dependencies
/// from other partitions are treated as already satisfied.
fn topological_sort_destructive(
    work: &mut Design,
    params: TopologicalSortParams,
    partition: Option<i32>,
    design_name: &str,
    dump_dir: Option<&Path>,
) -> Result<Vec<NodeKey>> {
    let in_scope = |work: &Design, key: NodeKey| -> bool {
        if !is_schedulable(work, key) {
            return false;
        }
        match partition {
            Some(p) => {
                if key == work.output_master() {
                    p == PARTITION_IO
                } else {
                    work.node(key).partition == p
                }
            }
            None => true,
        }
    };

    let candidates: Vec<NodeKey> =
        work.node_keys().into_iter().filter(|k| in_scope(work, *k)).collect();

    let in_degree = |work: &Design, key: NodeKey| -> usize {
        work.in_arcs_with_order(key)
            .into_iter()
            .filter(|a| {
                let src = work.arc(*a).src.node;
                in_scope(work, src)
            })
            .count()
    };

    let mut ready: Vec<NodeKey> =
        candidates.iter().copied().filter(|k| in_degree(work, *k) == 0).collect();
    let mut scheduled = Vec::with_capacity(candidates.len());
    let mut rng = StdRng::seed_from_u64(params.rand_seed);

    while !ready.is_empty() {
        let pick = match params.heuristic {
            SchedHeuristic::Bfs => 0,
            SchedHeuristic::Dfs => ready.len() - 1,
            SchedHeuristic::Random => rng.gen_range(0..ready.len()),
        };
        let node = ready.remove(pick);
        scheduled.push(node);

        // Release successors.
        for arc in work.out_arcs_with_order(node) {
            let dst = work.arc(arc).dst.node;
            work.remove_arc(arc);
            if in_scope(work, dst)
                && !scheduled.contains(&dst)
                && !ready.contains(&dst)
                && in_degree(work, dst) == 0
            {
                ready.push(dst);
            }
        }
    }

    if scheduled.len() != candidates.len() {
        let stuck: Vec<String> = candidates
            .iter()
            .filter(|k| !scheduled.contains(k))
            .map(|k| work.qualified_name(*k))
            .collect();
        if let Some(dir) = dump_dir {
            let path = dir.join(format!("{design_name}_schedule_error.graphml"));
            let mut dump = work.clone();
            dump.assign_node_ids();
            dump.assign_arc_ids();
            // Failure to write the diagnostic must not mask the cycle error.
            if let Err(e) = core_graphml::export_design(&dump, &path) {
                debug!(target: "sched", error = %e, "residual_dump_failed");
            }
        }
        return Err(CompileError::Schedule(format!(
            "cycle in residual graph; unscheduled nodes: {}",
            stuck.join(", ")
        )));
    }
    Ok(scheduled)
}

/// Verify the post-schedule ordering: for every arc (a → b) with `a` not
/// scheduler-exempt, either `b` is unscheduled or `a` runs first (orders are
/// comparable only within one partition in per-partition mode).  If the
/// output master has incoming arcs it must be scheduled.
pub fn verify_topological_order(design: &Design, check_output_master: bool) -> Result<()> {
    for arc_key in design.arc_keys() {
        let arc = design.arc(arc_key);
        let (a, b) = (arc.src.node, arc.dst.node);
        if is_exempt_source(design, a) || design.node(a).is_subsystem_like() {
            continue;
        }
        if design.node(b).is_subsystem_like() {
            continue;
        }
        let (oa, ob) = (design.node(a).sched_order, design.node(b).sched_order);
        if ob < 0 || oa < 0 {
            continue;
        }
        if design.node(a).partition != design.node(b).partition {
            continue;
        }
        if oa >= ob {
            return Err(CompileError::Schedule(format!(
                "arc `{}` -> `{}` violates schedule order ({oa} >= {ob})",
                design.qualified_name(a),
                design.qualified_name(b)
            )));
        }
    }

    if check_output_master {
        let output = design.output_master();
        let has_inputs = design.node(output).inputs.iter().any(|p| !p.arcs.is_empty());
        if has_inputs && !design.node(output).is_scheduled() {
            return Err(CompileError::Schedule(
                "output master has incoming arcs but was not scheduled".to_string(),
            ));
        }
    }
    Ok(())
}
