//! Scheduler properties over the sum/delay feedback scenario.

use core_ir::{Delay, Design, NodeKey, NodeKind, PortRef, Product, Sum};
use core_passes::state_update;
use core_sched::{schedule_topological, verify_topological_order, SchedHeuristic, TopologicalSortParams};
use core_types::{DataType, NumericValue};

fn ty() -> DataType {
    DataType::parse_numeric_str("int32").unwrap()
}

/// Input[0] -> Sum; Input[1] -> Sum, Product; Sum -> Delay;
/// Delay -> Output[0], Sum, Product.
fn build(d: &mut Design) -> (NodeKey, NodeKey, NodeKey) {
    let input = d.input_master();
    let output = d.output_master();
    let term = d.terminator_master();

    let sum = d.add_node("sum", NodeKind::Sum(Sum::new(vec![true, true, true])), None);
    let product = d.add_node("product", NodeKind::Product(Product::new(vec![true, true])), None);
    let delay = d.add_node(
        "delay",
        NodeKind::Delay(Delay::new(1, vec![NumericValue::Int(0)])),
        None,
    );

    d.add_arc(PortRef::output(input, 0), PortRef::input(sum, 0), ty(), -1.0);
    d.add_arc(PortRef::output(input, 1), PortRef::input(sum, 1), ty(), -1.0);
    d.add_arc(PortRef::output(input, 1), PortRef::input(product, 0), ty(), -1.0);
    d.add_arc(PortRef::output(sum, 0), PortRef::input(delay, 0), ty(), -1.0);
    d.add_arc(PortRef::output(delay, 0), PortRef::input(output, 0), ty(), -1.0);
    d.add_arc(PortRef::output(delay, 0), PortRef::input(sum, 2), ty(), -1.0);
    d.add_arc(PortRef::output(delay, 0), PortRef::input(product, 1), ty(), -1.0);
    d.add_arc(PortRef::output(product, 0), PortRef::input(term, 0), ty(), -1.0);
    (sum, product, delay)
}

#[test]
fn feedback_through_delay_schedules_sum_before_delay() {
    let mut d = Design::new();
    let (sum, product, delay) = build(&mut d);
    state_update::create_state_update_nodes(&mut d, true).unwrap();

    schedule_topological(&mut d, TopologicalSortParams::default(), false, "feedback", None)
        .unwrap();

    assert!(d.node(sum).is_scheduled());
    assert!(d.node(delay).is_scheduled());
    assert!(d.node(sum).sched_order < d.node(delay).sched_order);
    assert!(d.node(delay).has_state());

    // The state update runs after both readers and the delay itself.
    let update = d
        .node_keys()
        .into_iter()
        .find(|k| matches!(d.node(*k).kind, NodeKind::StateUpdate(_)))
        .unwrap();
    for dep in [sum, product, delay] {
        assert!(d.node(dep).sched_order < d.node(update).sched_order);
    }

    verify_topological_order(&d, true).unwrap();
}

#[test]
fn combinational_cycle_is_fatal_and_dumps_the_residual() {
    let mut d = Design::new();
    let a = d.add_node("a", NodeKind::Sum(Sum::new(vec![true, true])), None);
    let b = d.add_node("b", NodeKind::Sum(Sum::new(vec![true, true])), None);
    let term = d.terminator_master();
    d.add_arc(PortRef::output(a, 0), PortRef::input(b, 0), ty(), -1.0);
    d.add_arc(PortRef::output(b, 0), PortRef::input(a, 0), ty(), -1.0);
    d.add_arc(PortRef::output(b, 0), PortRef::input(term, 0), ty(), -1.0);

    let dir = tempfile::tempdir().unwrap();
    let err = schedule_topological(
        &mut d,
        TopologicalSortParams::default(),
        false,
        "loopy",
        Some(dir.path()),
    )
    .unwrap_err();
    assert!(matches!(err, core_ir::CompileError::Schedule(_)));
    assert!(dir.path().join("loopy_schedule_error.graphml").exists());
}

#[test]
fn random_heuristic_is_reproducible_for_a_seed() {
    let orders = |seed: u64| -> Vec<i64> {
        let mut d = Design::new();
        build(&mut d);
        state_update::create_state_update_nodes(&mut d, true).unwrap();
        let params =
            TopologicalSortParams { heuristic: SchedHeuristic::Random, rand_seed: seed };
        schedule_topological(&mut d, params, false, "seeded", None).unwrap();
        let mut keys = d.node_keys();
        keys.sort_unstable();
        keys.into_iter().map(|k| d.node(k).sched_order).collect()
    };
    assert_eq!(orders(42), orders(42));
}

#[test]
fn per_partition_schedule_gives_each_thread_its_own_order_space() {
    let mut d = Design::new();
    let (sum, product, delay) = build(&mut d);
    d.node_mut(sum).partition = 0;
    d.node_mut(delay).partition = 0;
    d.node_mut(product).partition = 1;
    state_update::create_state_update_nodes(&mut d, true).unwrap();

    schedule_topological(&mut d, TopologicalSortParams::default(), true, "parts", None).unwrap();

    assert!(d.node(sum).is_scheduled());
    assert!(d.node(product).is_scheduled());
    assert!(d.node(d.output_master()).is_scheduled());
    verify_topological_order(&d, true).unwrap();
}
