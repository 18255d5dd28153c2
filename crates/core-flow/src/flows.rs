//! The generation flows.
//!
//! Pass order is load-bearing: context discovery must precede state-update
//! insertion, blocking defers delay specialization until after FIFO
//! absorption, and the deadlock check runs on the final FIFO configuration.
//! Any deviation changes the semantics of a downstream pass.

use std::path::{Path, PathBuf};

use tracing::{info, info_span};

use core_domains::{blocking, clock};
use core_emit::{emit_multi_threaded, emit_single_threaded, FileSink};
use core_ir::{Design, NodeKind, Result};
use core_mt::{absorption, deadlock, fifo_insert};
use core_passes::{context_passes, design_passes, state_update};
use core_sched::{schedule_topological, verify_topological_order};

use crate::options::{DumpPoints, FlowOptions};

/// What a flow produced.
#[derive(Debug, Default)]
pub struct FlowReport {
    pub emitted: Vec<String>,
    pub dumps: Vec<PathBuf>,
}

fn dump_if(
    design: &mut Design,
    opts: &FlowOptions,
    point: DumpPoints,
    sink: &FileSink,
    name: &str,
    suffix: &str,
    report: &mut FlowReport,
) -> Result<()> {
    if !opts.dumps.contains(point) {
        return Ok(());
    }
    design.assign_node_ids();
    design.assign_arc_ids();
    let path = sink.path_of(&format!("{name}_{suffix}.graphml"));
    core_graphml::export_design(design, &path)?;
    report.dumps.push(path);
    Ok(())
}

/// Single-threaded reference flow.
pub fn single_threaded_flow(
    design: &mut Design,
    name: &str,
    out_dir: &Path,
    opts: &FlowOptions,
) -> Result<FlowReport> {
    let span = info_span!("flow.single", design = name);
    let _guard = span.enter();
    let sink = FileSink::new(out_dir)?;
    let mut report = FlowReport::default();

    design_passes::expand_to_primitives(design)?;
    design_passes::propagate_partitions(design);
    design_passes::prune(design, true)?;
    design_passes::disconnect_unconnected_arcs(design, false);

    run_clock_domain_passes(design)?;

    context_passes::expand_enabled_subsystem_contexts(design)?;
    design_passes::assign_default_partitions(design, 0);
    context_passes::place_enable_nodes_in_partitions(design);
    if opts.strategy.is_context_aware() {
        context_passes::discover_and_mark_contexts(design)?;
    }
    design.assign_node_ids();
    design.assign_arc_ids();

    dump_if(design, opts, DumpPoints::PRE_BLOCKING, &sink, name, "pre_blocking", &mut report)?;
    let mut deferred = blocking::DeferredExpansion::new();
    if opts.block_size > 1 {
        blocking::block_and_sub_block_design(design, opts.block_size, opts.sub_block_size, &mut deferred)?;
        if opts.strategy.is_context_aware() {
            context_passes::discover_and_mark_contexts(design)?;
        }
    }
    blocking::specialize_deferred_delays(design, &deferred)?;
    dump_if(design, opts, DumpPoints::POST_BLOCKING, &sink, name, "post_blocking", &mut report)?;

    if opts.strategy.is_context_aware() {
        context_passes::encapsulate_contexts(design)?;
        context_passes::create_context_variable_updates(design)?;
        context_passes::verify_context_structure(design)?;
    }

    state_update::create_state_update_nodes(design, opts.strategy.is_context_aware())?;

    design.assign_node_ids();
    design.validate()?;
    schedule_topological(design, opts.sort_params(), false, name, Some(out_dir))?;
    verify_topological_order(design, true)?;
    if opts.print_schedule {
        print_schedule(design);
    }
    dump_if(design, opts, DumpPoints::POST_SCHED, &sink, name, "post_scheduling", &mut report)?;

    report.emitted = emit_single_threaded(design, name, opts.strategy, opts.block_size, &sink)?;
    info!(target: "flow.single", files = report.emitted.len(), "flow_complete");
    Ok(report)
}

/// Multi-threaded flow: the full §-ordered pipeline through FIFO insertion,
/// absorption, deadlock checking, per-partition scheduling, and emission.
pub fn multi_threaded_flow(
    design: &mut Design,
    name: &str,
    out_dir: &Path,
    opts: &FlowOptions,
) -> Result<FlowReport> {
    let span = info_span!("flow.multi", design = name);
    let _guard = span.enter();
    let sink = FileSink::new(out_dir)?;
    let mut report = FlowReport::default();

    // 1-2: partition propagation, pruning.
    design_passes::expand_to_primitives(design)?;
    design_passes::propagate_partitions(design);
    design_passes::prune(design, true)?;
    design_passes::disconnect_unconnected_arcs(design, false);

    // 3: clock domains.
    run_clock_domain_passes(design)?;

    // 4-6: contexts.
    context_passes::expand_enabled_subsystem_contexts(design)?;
    design_passes::assign_default_partitions(design, 0);
    context_passes::place_enable_nodes_in_partitions(design);
    context_passes::discover_and_mark_contexts(design)?;
    context_passes::replicate_context_drivers(design)?;
    design.assign_node_ids();
    design.assign_arc_ids();

    dump_if(design, opts, DumpPoints::PRE_BLOCKING, &sink, name, "pre_blocking", &mut report)?;

    // 7: blocking (delay dimension specialization deferred).
    let mut deferred = blocking::DeferredExpansion::new();
    if opts.block_size > 1 {
        blocking::block_and_sub_block_design(design, opts.block_size, opts.sub_block_size, &mut deferred)?;
        context_passes::discover_and_mark_contexts(design)?;
    }
    dump_if(design, opts, DumpPoints::POST_BLOCKING, &sink, name, "post_blocking", &mut report)?;

    // 8: encapsulation.
    context_passes::encapsulate_contexts(design)?;
    context_passes::create_context_variable_updates(design)?;
    context_passes::verify_context_structure(design)?;

    // 9: FIFO insertion.
    fifo_insert::insert_partition_crossing_fifos(design, &opts.fifo_spec())?;

    // 10: absorption, merging, deferred delays.
    absorption::absorb_adjacent_delays(design)?;
    absorption::merge_fifos(design)?;
    blocking::specialize_deferred_delays(design, &deferred)?;

    dump_communication_graphs(design, opts, &sink, name, &mut report)?;

    // 11: deadlock check.
    deadlock::check_inter_thread_deadlock(design)?;

    // 12: state updates.
    state_update::create_state_update_nodes(design, true)?;

    // 13: schedule per partition.
    design.assign_node_ids();
    design.assign_arc_ids();
    design.validate()?;
    schedule_topological(design, opts.sort_params(), true, name, Some(out_dir))?;
    verify_topological_order(design, true)?;
    if opts.print_schedule {
        print_schedule(design);
    }
    dump_if(design, opts, DumpPoints::POST_SCHED, &sink, name, "post_scheduling", &mut report)?;

    // 14: emission.
    report.emitted = emit_multi_threaded(design, name, &opts.emit_options(), &sink)?;
    info!(target: "flow.multi", files = report.emitted.len(), "flow_complete");
    Ok(report)
}

/// Step 3 of the pipeline: discovery, link reset, rate rediscovery,
/// specialization, support nodes, validation.
fn run_clock_domain_passes(design: &mut Design) -> Result<()> {
    let domains = clock::find_clock_domains(design);
    if domains.is_empty() {
        return Ok(());
    }
    clock::reset_master_clock_domain_links(design);
    clock::rediscover_rates(design)?;
    clock::specialize_clock_domains(design)?;
    clock::create_clock_domain_support_nodes(design, true)?;
    clock::validate_rates(design)?;
    Ok(())
}

fn print_schedule(design: &Design) {
    let mut nodes: Vec<_> = design
        .node_keys()
        .into_iter()
        .filter(|k| design.node(*k).is_scheduled())
        .collect();
    nodes.sort_by_key(|k| (design.node(*k).partition, design.node(*k).sched_order));
    for key in nodes {
        let n = design.node(key);
        println!("p{:>3} #{:>4} {}", n.partition, n.sched_order, design.qualified_name(key));
    }
}

/// Communication graph dumps: partitions as nodes, FIFO edges annotated with
/// their initial-condition depth in blocks.
fn dump_communication_graphs(
    design: &Design,
    opts: &FlowOptions,
    sink: &FileSink,
    name: &str,
    report: &mut FlowReport,
) -> Result<()> {
    for (point, suffix, with_init) in [
        (DumpPoints::COMMUNICATION, "communication", false),
        (DumpPoints::COMMUNICATION_INIT_COND, "communication_init_cond", true),
    ] {
        if !opts.dumps.contains(point) {
            continue;
        }
        let mut s = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n  <graph id=\"comm\" edgedefault=\"directed\">\n",
        );
        let mut partitions: Vec<i32> = design.partitions().into_iter().collect();
        partitions.sort_unstable();
        for p in &partitions {
            s.push_str(&format!("    <node id=\"p{p}\"/>\n"));
        }
        for key in design.node_keys() {
            let NodeKind::Fifo(f) = &design.node(key).kind else { continue };
            let src = design.node(key).partition;
            for arc in design.out_arcs(key) {
                let dst = design.node(design.arc(arc).dst.node).partition;
                if with_init {
                    let elems = design.input_type(key, 0).num_elements().max(1);
                    let blocks = f.min_init_count() / elems / f.block_size.max(1);
                    s.push_str(&format!(
                        "    <edge source=\"p{src}\" target=\"p{dst}\"><data key=\"init_blocks\">{blocks}</data></edge>\n"
                    ));
                } else {
                    s.push_str(&format!("    <edge source=\"p{src}\" target=\"p{dst}\"/>\n"));
                }
            }
        }
        s.push_str("  </graph>\n</graphml>\n");
        let path = sink.write(&format!("{name}_{suffix}.graphml"), &s)?;
        report.dumps.push(path);
    }
    Ok(())
}
