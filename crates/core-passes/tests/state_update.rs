//! State-update insertion over the sum/delay feedback scenario.

use core_ir::{Delay, Design, NodeKey, NodeKind, PortRef, Product, Sum};
use core_passes::state_update;
use core_types::{DataType, NumericValue};

fn ty() -> DataType {
    DataType::parse_numeric_str("int32").unwrap()
}

/// Input[0] -> Sum; Input[1] -> Sum and Product; Sum -> Delay;
/// Delay -> Output[0], Sum, Product.
fn build(d: &mut Design) -> (NodeKey, NodeKey, NodeKey) {
    let input = d.input_master();
    let output = d.output_master();

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
    let term = d.terminator_master();
    d.add_arc(PortRef::output(product, 0), PortRef::input(term, 0), ty(), -1.0);

    (sum, product, delay)
}

#[test]
fn delay_gets_one_state_update_ordered_after_readers() {
    let mut d = Design::new();
    let (sum, product, delay) = build(&mut d);

    assert!(d.node(delay).has_state());
    let created = state_update::create_state_update_nodes(&mut d, true).unwrap();
    assert_eq!(created.len(), 1);
    let update = created[0];
    assert!(matches!(d.node(update).kind, NodeKind::StateUpdate(_)));

    // Order inputs: the delay itself (next state) plus both readers.
    let mut sources: Vec<NodeKey> = d
        .node(update)
        .order_in
        .arcs
        .iter()
        .map(|a| d.arc(*a).src.node)
        .collect();
    sources.sort_unstable();
    let mut expected = vec![delay, sum, product];
    expected.sort_unstable();
    assert_eq!(sources, expected);

    // Placed in the delay's partition.
    assert_eq!(d.node(update).partition, d.node(delay).partition);
    d.validate_structure().unwrap();
}
