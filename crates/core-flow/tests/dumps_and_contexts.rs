//! Debug dump checkpoints and a context-bearing multi-threaded run.

use core_flow::{multi_threaded_flow, FlowConfig, FlowOptions};
use core_ir::{
    Compare, CompareOp, Design, EnableGate, EnabledSubsystem, NodeKind, PortRef, Sum,
};
use core_types::DataType;

fn ty() -> DataType {
    DataType::parse_numeric_str("int16").unwrap()
}

fn sum2() -> NodeKind {
    NodeKind::Sum(Sum::new(vec![true, true]))
}

/// Enabled subsystem split across two partitions, Compare-driven enable.
fn build_gated(d: &mut Design) {
    let input = d.input_master();
    let output = d.output_master();

    let es = d.add_node("gate", NodeKind::EnabledSubsystem(EnabledSubsystem::default()), None);
    d.node_mut(es).partition = 0;

    let cmp = d.add_node("trigger", NodeKind::Compare(Compare { op: CompareOp::Gt }), None);
    d.node_mut(cmp).partition = 0;
    d.add_arc(PortRef::output(input, 0), PortRef::input(cmp, 0), ty(), -1.0);
    d.add_arc(PortRef::output(input, 1), PortRef::input(cmp, 1), ty(), -1.0);
    d.add_arc(PortRef::output(cmp, 0), PortRef::enable(es), DataType::bool_scalar(), -1.0);

    let ein = d.add_node("ein", NodeKind::EnableInput(EnableGate::default()), Some(es));
    d.node_mut(ein).partition = 0;
    d.add_arc(PortRef::output(input, 0), PortRef::input(ein, 0), ty(), -1.0);

    let inner0 = d.add_node("inner0", sum2(), Some(es));
    d.node_mut(inner0).partition = 0;
    d.add_arc(PortRef::output(ein, 0), PortRef::input(inner0, 0), ty(), -1.0);
    d.add_arc(PortRef::output(input, 1), PortRef::input(inner0, 1), ty(), -1.0);

    let inner1 = d.add_node("inner1", sum2(), Some(es));
    d.node_mut(inner1).partition = 1;
    d.add_arc(PortRef::output(inner0, 0), PortRef::input(inner1, 0), ty(), -1.0);
    d.add_arc(PortRef::output(input, 1), PortRef::input(inner1, 1), ty(), -1.0);

    let eout = d.add_node("eout", NodeKind::EnableOutput(EnableGate::default()), Some(es));
    d.node_mut(eout).partition = 1;
    d.add_arc(PortRef::output(inner1, 0), PortRef::input(eout, 0), ty(), -1.0);
    d.add_arc(PortRef::output(eout, 0), PortRef::input(output, 0), ty(), -1.0);
}

#[test]
fn enabled_subsystem_survives_the_multi_threaded_pipeline() {
    let mut d = Design::new();
    build_gated(&mut d);

    let file: FlowConfig = toml::from_str(
        "[generator]\nblock_size = 2\ndumps = [\"pre-blocking\", \"post-blocking\", \"post-scheduling\", \"communication\", \"communication-init-cond\"]\n",
    )
    .unwrap();
    let opts = FlowOptions::from_config(file, None).unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let report = multi_threaded_flow(&mut d, "gated", tmp.path(), &opts).unwrap();

    // All five checkpoints produced artifacts.
    assert_eq!(report.dumps.len(), 5);
    for suffix in [
        "gated_pre_blocking.graphml",
        "gated_post_blocking.graphml",
        "gated_post_scheduling.graphml",
        "gated_communication.graphml",
        "gated_communication_init_cond.graphml",
    ] {
        assert!(tmp.path().join(suffix).exists(), "missing {suffix}");
    }

    // The enable condition guards the emitted partition bodies.
    let p0 = std::fs::read_to_string(tmp.path().join("gated_partition0.c")).unwrap();
    assert!(p0.contains("if ("), "{p0}");

    // The enable driver was replicated per partition holding context nodes.
    let replicas = d
        .node_keys()
        .into_iter()
        .filter(|k| d.node(*k).name.starts_with("trigger_rep_p"))
        .count();
    assert_eq!(replicas, 2);

    // Communication dump records the partition edges.
    let comm = std::fs::read_to_string(tmp.path().join("gated_communication.graphml")).unwrap();
    assert!(comm.contains("<edge source=\"p0\" target=\"p1\""), "{comm}");
}
