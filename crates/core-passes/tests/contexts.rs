//! Context discovery, replication, and encapsulation over an enabled
//! subsystem driven by a single Compare.

use core_ir::{
    Compare, CompareOp, Design, EnableGate, EnabledSubsystem, NodeKey, NodeKind, PortRef, Sum,
};
use core_passes::context_passes;
use core_types::DataType;

fn ty() -> DataType {
    DataType::parse_numeric_str("int16").unwrap()
}

fn sum2() -> NodeKind {
    NodeKind::Sum(Sum::new(vec![true, true]))
}

/// Enabled subsystem with 15 internal nodes, enable driven by one Compare.
fn build(d: &mut Design) -> (NodeKey, NodeKey, Vec<NodeKey>) {
    let input = d.input_master();
    let es = d.add_node("gate", NodeKind::EnabledSubsystem(EnabledSubsystem::default()), None);

    let cmp = d.add_node("trigger", NodeKind::Compare(Compare { op: CompareOp::Gt }), None);
    d.add_arc(PortRef::output(input, 0), PortRef::input(cmp, 0), ty(), -1.0);
    d.add_arc(PortRef::output(input, 1), PortRef::input(cmp, 1), ty(), -1.0);
    d.add_arc(PortRef::output(cmp, 0), PortRef::enable(es), DataType::bool_scalar(), -1.0);

    let ein = d.add_node("ein", NodeKind::EnableInput(EnableGate::default()), Some(es));
    d.add_arc(PortRef::output(input, 0), PortRef::input(ein, 0), ty(), -1.0);

    let mut inner = vec![ein];
    let mut prev = ein;
    for i in 0..14 {
        let n = d.add_node(format!("inner{i}"), sum2(), Some(es));
        d.add_arc(PortRef::output(prev, 0), PortRef::input(n, 0), ty(), -1.0);
        d.add_arc(PortRef::output(input, 1), PortRef::input(n, 1), ty(), -1.0);
        inner.push(n);
        prev = n;
    }
    let term = d.terminator_master();
    d.add_arc(PortRef::output(prev, 0), PortRef::input(term, 0), ty(), -1.0);
    (es, cmp, inner)
}

#[test]
fn discovery_marks_every_inner_node_with_the_gate_context() {
    let mut d = Design::new();
    let (es, cmp, inner) = build(&mut d);
    assert_eq!(inner.len(), 15);

    context_passes::discover_and_mark_contexts(&mut d).unwrap();

    for &key in &inner {
        let stack = &d.node(key).contexts;
        assert_eq!(stack.len(), 1, "{}", d.qualified_name(key));
        assert_eq!(stack[0].root, es);
        assert_eq!(stack[0].sub_context, 0);
    }

    // The context's decision driver is the Compare, via the enable port.
    let enable_arc = d.node(es).enable_port.as_ref().unwrap().arcs[0];
    assert_eq!(d.arc(enable_arc).src.node, cmp);
    // The Compare itself is outside the context.
    assert!(d.node(cmp).contexts.is_empty());
}

#[test]
fn drivers_replicate_once_per_partition_holding_context_nodes() {
    let mut d = Design::new();
    let (es, _cmp, inner) = build(&mut d);

    // Split the subsystem body across two partitions.
    d.node_mut(es).partition = 0;
    for (i, &key) in inner.iter().enumerate() {
        d.node_mut(key).partition = if i < 8 { 0 } else { 1 };
    }

    context_passes::discover_and_mark_contexts(&mut d).unwrap();
    let replicated = context_passes::replicate_context_drivers(&mut d).unwrap();
    assert_eq!(replicated, 2);

    let NodeKind::EnabledSubsystem(payload) = &d.node(es).kind else { unreachable!() };
    let mut partitions: Vec<i32> = payload.partition_drivers.iter().map(|(p, _)| *p).collect();
    partitions.sort_unstable();
    assert_eq!(partitions, vec![0, 1]);

    // Each replica is a Compare with the same fan-in as the original.
    for (_, replica) in &payload.partition_drivers {
        assert!(matches!(d.node(*replica).kind, NodeKind::Compare(_)));
        assert_eq!(d.in_arcs(*replica).len(), 2);
    }
}

#[test]
fn encapsulation_rehomes_nodes_and_keeps_stacks_consistent() {
    let mut d = Design::new();
    let (es, cmp, inner) = build(&mut d);
    d.node_mut(es).partition = 0;
    for &key in &inner {
        d.node_mut(key).partition = 0;
    }

    context_passes::discover_and_mark_contexts(&mut d).unwrap();
    let created = context_passes::encapsulate_contexts(&mut d).unwrap();
    assert!(created >= 1);

    // Every inner node now lives in a ContextContainer of the family.
    for &key in &inner {
        let parent = d.node(key).parent.unwrap();
        assert!(matches!(d.node(parent).kind, NodeKind::ContextContainer(_)));
    }
    // The root was moved into its partition's family container.
    let fam = d.node(es).parent.unwrap();
    let NodeKind::ContextFamilyContainer(fc) = &d.node(fam).kind else {
        panic!("expected family container")
    };
    assert_eq!(fc.context_root, es);
    assert_eq!(fc.partition, 0);

    // The driver order-constrains the family container.
    let driver_targets: Vec<NodeKey> = d
        .node(cmp)
        .order_out
        .arcs
        .iter()
        .map(|a| d.arc(*a).dst.node)
        .collect();
    assert!(driver_targets.contains(&fam));

    context_passes::verify_context_structure(&d).unwrap();
    d.validate_structure().unwrap();
}
