use core_domains::blocking::{self, DeferredExpansion};
use core_ir::{Delay, Design, NodeKind, PortRef, Sum};
use core_types::{DataType, NumericValue};

fn ty() -> DataType {
    DataType::parse_numeric_str("int16").unwrap()
}

fn sum2() -> NodeKind {
    NodeKind::Sum(Sum::new(vec![true, true]))
}

#[test]
fn global_blocking_expands_io_dimensions_by_block_factor() {
    let mut d = Design::new();
    let input = d.input_master();
    let output = d.output_master();
    let a = d.add_node("a", sum2(), None);
    d.add_arc(PortRef::output(input, 0), PortRef::input(a, 0), ty(), -1.0);
    d.add_arc(PortRef::output(input, 1), PortRef::input(a, 1), ty(), -1.0);
    d.add_arc(PortRef::output(a, 0), PortRef::input(output, 0), ty(), -1.0);

    let mut deferred = DeferredExpansion::new();
    let global = blocking::block_and_sub_block_design(&mut d, 8, 1, &mut deferred).unwrap();

    // The interior node moved under the global domain.
    assert_eq!(d.node(a).parent, Some(global));

    // Outermost I/O dimensions are B times their pre-blocking values and no
    // arc width collapsed to zero.
    for arc_key in d.out_arcs(input) {
        let arc = d.arc(arc_key);
        assert!(matches!(d.node(arc.dst.node).kind, NodeKind::BlockingInput(_)));
        assert_eq!(arc.data_type.dimensions()[0], 8);
    }
    for arc_key in d.arc_keys() {
        assert!(d.arc(arc_key).data_type.num_elements() > 0);
    }
    let out_in_arc = d.input_arc(output, 0).unwrap();
    assert_eq!(d.arc(out_in_arc).data_type.dimensions()[0], 8);
    assert!(matches!(d.node(d.arc(out_in_arc).src.node).kind, NodeKind::BlockingOutput(_)));

    // Master port block sizes were recorded.
    let NodeKind::Master(m) = &d.node(input).kind else { panic!() };
    assert_eq!(m.port_block_size(0), 8);

    d.validate_structure().unwrap();
}

#[test]
fn delay_fed_from_input_master_defers_expansion() {
    let mut d = Design::new();
    let input = d.input_master();
    let output = d.output_master();
    let delay = d.add_node(
        "delay",
        NodeKind::Delay(Delay::new(2, vec![NumericValue::Int(0), NumericValue::Int(0)])),
        None,
    );
    d.add_arc(PortRef::output(input, 0), PortRef::input(delay, 0), ty(), -1.0);
    d.add_arc(PortRef::output(delay, 0), PortRef::input(output, 0), ty(), -1.0);

    let mut deferred = DeferredExpansion::new();
    blocking::block_and_sub_block_design(&mut d, 4, 4, &mut deferred).unwrap();
    assert_eq!(deferred.len(), 1);

    // Applying the deferred sweep widens the arc and the initial conditions
    // elementwise.
    blocking::specialize_deferred_delays(&mut d, &deferred).unwrap();
    let (&arc_key, &factor) = deferred.first().unwrap();
    assert_eq!(factor, 4);
    assert_eq!(d.arc(arc_key).data_type.dimensions()[0], 4);
    let NodeKind::Delay(payload) = &d.node(delay).kind else { panic!() };
    assert_eq!(payload.init_conditions.len(), 2 * 4);
}

#[test]
fn effective_sub_block_length_rejects_non_integral_division() {
    let mut d = Design::new();
    let dom = d.add_node("dom", NodeKind::ClockDomain(core_ir::ClockDomain::new()), None);
    if let NodeKind::ClockDomain(cd) = &mut d.node_mut(dom).kind {
        cd.rate = (1, 3);
    }
    let leaf = d.add_node("leaf", sum2(), Some(dom));
    assert_eq!(blocking::effective_sub_block_len(&d, leaf, 6), Some(2));
    assert_eq!(blocking::effective_sub_block_len(&d, leaf, 4), None);
}
