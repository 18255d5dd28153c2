use core_domains::clock;
use core_ir::{ClockDomain, ClockDomainVariant, Design, NodeKind, PortRef, RateChange, RateChangeVariant, Sum};
use core_types::DataType;

fn ty() -> DataType {
    DataType::parse_numeric_str("int16").unwrap()
}

fn sum2() -> NodeKind {
    NodeKind::Sum(Sum::new(vec![true, true]))
}

#[test]
fn downsample_domain_specializes_and_gets_counter() {
    let mut d = Design::new();
    let input = d.input_master();
    let output = d.output_master();

    let domain = d.add_node("dom", NodeKind::ClockDomain(ClockDomain::new()), None);
    let rc_in = d.add_node("rcIn", NodeKind::RateChange(RateChange::new(false, (1, 2))), Some(domain));
    let inner = d.add_node("inner", sum2(), Some(domain));
    let rc_out = d.add_node("rcOut", NodeKind::RateChange(RateChange::new(true, (1, 2))), Some(domain));

    d.add_arc(PortRef::output(input, 0), PortRef::input(rc_in, 0), ty(), -1.0);
    d.add_arc(PortRef::output(rc_in, 0), PortRef::input(inner, 0), ty(), -1.0);
    d.add_arc(PortRef::output(rc_in, 0), PortRef::input(inner, 1), ty(), -1.0);
    d.add_arc(PortRef::output(inner, 0), PortRef::input(rc_out, 0), ty(), -1.0);
    d.add_arc(PortRef::output(rc_out, 0), PortRef::input(output, 0), ty(), -1.0);

    clock::reset_master_clock_domain_links(&mut d);
    clock::rediscover_rates(&mut d).unwrap();
    clock::specialize_clock_domains(&mut d).unwrap();
    clock::create_clock_domain_support_nodes(&mut d, true).unwrap();
    clock::validate_rates(&mut d).unwrap();

    let NodeKind::ClockDomain(cd) = &d.node(domain).kind else { panic!() };
    assert_eq!(cd.variant, ClockDomainVariant::Downsample);
    assert_eq!(cd.rate, (1, 2));
    assert!(cd.rate_change_in.contains(&rc_in));
    assert!(cd.rate_change_out.contains(&rc_out));

    // Downsample by 2: a period-2 counter strobe drives the context.
    let counter = cd.counter_driver.expect("support counter");
    let NodeKind::TickCounter(tc) = &d.node(counter).kind else { panic!() };
    assert_eq!(tc.period, 2);

    // Rate changes were specialized into boundary implementations.
    let NodeKind::RateChange(rc) = &d.node(rc_in).kind else { panic!() };
    assert_eq!(rc.variant, RateChangeVariant::InputImpl);
    let NodeKind::RateChange(rc) = &d.node(rc_out).kind else { panic!() };
    assert_eq!(rc.variant, RateChangeVariant::OutputImpl);

    // Master ports inherit the domain of the connected side: the input
    // master's port 0 feeds a node inside the domain.
    let NodeKind::Master(m) = &d.node(input).kind else { panic!() };
    assert_eq!(m.port_clock_domain(0), Some(domain));
}

#[test]
fn conflicting_boundary_rates_are_rejected() {
    let mut d = Design::new();
    let input = d.input_master();
    let domain = d.add_node("dom", NodeKind::ClockDomain(ClockDomain::new()), None);
    let a = d.add_node("a", NodeKind::RateChange(RateChange::new(false, (1, 2))), Some(domain));
    let b = d.add_node("b", NodeKind::RateChange(RateChange::new(false, (1, 3))), Some(domain));
    d.add_arc(PortRef::output(input, 0), PortRef::input(a, 0), ty(), -1.0);
    d.add_arc(PortRef::output(input, 1), PortRef::input(b, 0), ty(), -1.0);

    assert!(clock::rediscover_rates(&mut d).is_err());
}

#[test]
fn effective_rate_accumulates_across_nested_domains() {
    let mut d = Design::new();
    let outer = d.add_node("outer", NodeKind::ClockDomain(ClockDomain::new()), None);
    let inner = d.add_node("inner", NodeKind::ClockDomain(ClockDomain::new()), Some(outer));
    let leaf = d.add_node("leaf", sum2(), Some(inner));

    if let NodeKind::ClockDomain(cd) = &mut d.node_mut(outer).kind {
        cd.rate = (1, 2);
    }
    if let NodeKind::ClockDomain(cd) = &mut d.node_mut(inner).kind {
        cd.rate = (1, 4);
    }
    assert_eq!(clock::effective_rate(&d, leaf), (1, 8));
}
