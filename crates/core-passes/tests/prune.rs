use core_ir::{Delay, Design, NodeKind, PortRef, Sum};
use core_passes::design_passes;
use core_types::{DataType, NumericValue};

fn sum2() -> NodeKind {
    NodeKind::Sum(Sum::new(vec![true, true]))
}

fn ty() -> DataType {
    DataType::parse_numeric_str("int32").unwrap()
}

#[test]
fn prune_removes_unconsumed_combinational_nodes() {
    let mut d = Design::new();
    let input = d.input_master();
    let output = d.output_master();

    let a = d.add_node("a", sum2(), None);
    let b = d.add_node("b", sum2(), None);
    let dangling = d.add_node("dangling", sum2(), None);
    let held = d.add_node(
        "held",
        NodeKind::Delay(Delay::new(1, vec![NumericValue::Int(0)])),
        None,
    );

    d.add_arc(PortRef::output(input, 0), PortRef::input(a, 0), ty(), -1.0);
    d.add_arc(PortRef::output(input, 1), PortRef::input(a, 1), ty(), -1.0);
    d.add_arc(PortRef::output(a, 0), PortRef::input(b, 0), ty(), -1.0);
    d.add_arc(PortRef::output(input, 1), PortRef::input(b, 1), ty(), -1.0);
    d.add_arc(PortRef::output(b, 0), PortRef::input(output, 0), ty(), -1.0);
    // `dangling` consumes but produces nothing anyone reads.
    d.add_arc(PortRef::output(a, 0), PortRef::input(dangling, 0), ty(), -1.0);
    d.add_arc(PortRef::output(a, 0), PortRef::input(dangling, 1), ty(), -1.0);
    // `held` likewise, but it carries state and must survive.
    d.add_arc(PortRef::output(a, 0), PortRef::input(held, 0), ty(), -1.0);

    let removed = design_passes::prune(&mut d, true).unwrap();
    assert_eq!(removed, 1);
    assert!(!d.contains_node(dangling));
    assert!(d.contains_node(held));
    assert!(d.contains_node(a) && d.contains_node(b));

    // Post-condition: every surviving non-master node either has effective
    // out-degree >= 1 or was retained for state.
    let mut ignored = d.sink_masters().to_vec();
    ignored.push(d.vis_master());
    for key in d.node_keys() {
        let node = d.node(key);
        if node.is_master() || node.is_subsystem_like() {
            continue;
        }
        assert!(
            d.out_degree_ignoring(key, &ignored) >= 1 || node.has_state(),
            "{} kept without reason",
            d.qualified_name(key)
        );
    }
    d.validate_structure().unwrap();
}

#[test]
fn disconnect_removes_sink_master_arcs() {
    let mut d = Design::new();
    let a = d.add_node("a", sum2(), None);
    let term = d.terminator_master();
    let arc = d.add_arc(PortRef::output(a, 0), PortRef::input(term, 0), ty(), -1.0);
    let removed = design_passes::disconnect_unconnected_arcs(&mut d, false);
    assert_eq!(removed, 1);
    assert!(!d.contains_arc(arc));
}

#[test]
fn empty_hierarchy_collapses_upward() {
    let mut d = Design::new();
    let outer = d.add_node("outer", NodeKind::Subsystem(Default::default()), None);
    let inner = d.add_node("inner", NodeKind::Subsystem(Default::default()), Some(outer));
    let leaf = d.add_node("leaf", sum2(), Some(inner));

    // Move the leaf out; both subsystems become removable.
    d.set_parent(leaf, None);
    let removed = design_passes::cleanup_empty_hierarchy(&mut d, "test").unwrap();
    assert_eq!(removed, 2);
    assert!(!d.contains_node(outer) && !d.contains_node(inner));
    assert!(d.contains_node(leaf));
}
