//! FIFO ↔ delay absorption properties.

use core_ir::{Delay, Design, FifoVariant, NodeKey, NodeKind, PortRef, Sum, ThreadCrossingFifo};
use core_mt::absorption;
use core_types::{DataType, NumericValue};

fn ty() -> DataType {
    DataType::parse_numeric_str("int32").unwrap()
}

fn sum2() -> NodeKind {
    NodeKind::Sum(Sum::new(vec![true, true]))
}

fn ints(vals: &[i64]) -> Vec<NumericValue> {
    vals.iter().map(|v| NumericValue::Int(*v)).collect()
}

/// producer -> delay -> fifo -> consumer, partitions 0 | 1.
fn build_input_chain(d: &mut Design, delay_len: usize, fifo_init: &[i64]) -> (NodeKey, NodeKey) {
    let producer = d.add_node("producer", sum2(), None);
    let delay = d.add_node(
        "delay",
        NodeKind::Delay(Delay::new(delay_len, ints(&(0..delay_len as i64).collect::<Vec<_>>()))),
        None,
    );
    let mut payload = ThreadCrossingFifo::new(FifoVariant::Lockless, 4);
    payload.block_size = 1;
    payload.ports[0].init_conditions = ints(fifo_init);
    let fifo = d.add_node("fifo", NodeKind::Fifo(payload), None);
    let consumer = d.add_node("consumer", sum2(), None);

    d.node_mut(producer).partition = 0;
    d.node_mut(delay).partition = 0;
    d.node_mut(fifo).partition = 0;
    d.node_mut(consumer).partition = 1;

    d.add_arc(PortRef::output(producer, 0), PortRef::input(delay, 0), ty(), -1.0);
    d.add_arc(PortRef::output(delay, 0), PortRef::input(fifo, 0), ty(), -1.0);
    d.add_arc(PortRef::output(fifo, 0), PortRef::input(consumer, 0), ty(), -1.0);
    (delay, fifo)
}

fn total_tokens(d: &Design, fifo: NodeKey) -> usize {
    let mut total = match &d.node(fifo).kind {
        NodeKind::Fifo(f) => f.init_count(0),
        _ => 0,
    };
    for key in d.node_keys() {
        if let NodeKind::Delay(delay) = &d.node(key).kind {
            total += delay.delay;
        }
    }
    total
}

#[test]
fn input_delay_is_fully_absorbed_when_it_fits() {
    let mut d = Design::new();
    let (delay, fifo) = build_input_chain(&mut d, 2, &[7]);
    let before = total_tokens(&d, fifo);

    absorption::absorb_adjacent_delays(&mut d).unwrap();

    assert!(!d.contains_node(delay), "delay should be deleted");
    let NodeKind::Fifo(f) = &d.node(fifo).kind else { panic!() };
    // FIFO now holds its old tokens plus the delay's, oldest first.
    assert_eq!(f.ports[0].init_conditions, ints(&[7, 0, 1]));
    assert_eq!(total_tokens(&d, fifo), before);

    // The producer now drives the FIFO directly.
    let in_arc = d.input_arc(fifo, 0).unwrap();
    assert_eq!(d.node(d.arc(in_arc).src.node).name, "producer");
    d.validate_structure().unwrap();
}

#[test]
fn oversized_input_delay_is_partially_absorbed() {
    let mut d = Design::new();
    // Capacity (length-1)*block = 3; delay of 5 only partially fits.
    let (delay, fifo) = build_input_chain(&mut d, 5, &[]);
    let before = total_tokens(&d, fifo);

    absorption::absorb_adjacent_delays(&mut d).unwrap();

    assert!(d.contains_node(delay));
    let NodeKind::Delay(payload) = &d.node(delay).kind else { panic!() };
    let NodeKind::Fifo(f) = &d.node(fifo).kind else { panic!() };
    assert_eq!(f.ports[0].init_conditions, ints(&[0, 1, 2]));
    assert_eq!(payload.delay, 2);
    assert_eq!(payload.init_conditions, ints(&[3, 4]));
    assert_eq!(total_tokens(&d, fifo), before);
}

#[test]
fn output_delays_lose_their_common_postfix() {
    let mut d = Design::new();
    let producer = d.add_node("producer", sum2(), None);
    let mut payload = ThreadCrossingFifo::new(FifoVariant::Lockless, 8);
    payload.ports[0].init_conditions = ints(&[9]);
    let fifo = d.add_node("fifo", NodeKind::Fifo(payload), None);
    let d1 = d.add_node("d1", NodeKind::Delay(Delay::new(3, ints(&[5, 2, 4]))), None);
    let d2 = d.add_node("d2", NodeKind::Delay(Delay::new(2, ints(&[2, 4]))), None);
    let c1 = d.add_node("c1", sum2(), None);
    let c2 = d.add_node("c2", sum2(), None);
    for k in [producer, fifo, d1, d2, c1, c2] {
        d.node_mut(k).partition = 0;
    }
    d.node_mut(producer).partition = 1;

    d.add_arc(PortRef::output(producer, 0), PortRef::input(fifo, 0), ty(), -1.0);
    d.add_arc(PortRef::output(fifo, 0), PortRef::input(d1, 0), ty(), -1.0);
    d.add_arc(PortRef::output(fifo, 0), PortRef::input(d2, 0), ty(), -1.0);
    d.add_arc(PortRef::output(d1, 0), PortRef::input(c1, 0), ty(), -1.0);
    d.add_arc(PortRef::output(d2, 0), PortRef::input(c2, 0), ty(), -1.0);

    let tokens_before = 1 + 3 + 2;
    absorption::absorb_adjacent_delays(&mut d).unwrap();

    // Common postfix [2, 4] moved in front of the FIFO's existing tokens.
    let NodeKind::Fifo(f) = &d.node(fifo).kind else { panic!() };
    assert_eq!(f.ports[0].init_conditions, ints(&[2, 4, 9]));

    // d2 was consumed entirely; d1 shrank to length 1.
    assert!(!d.contains_node(d2));
    let NodeKind::Delay(p1) = &d.node(d1).kind else { panic!() };
    assert_eq!(p1.delay, 1);
    assert_eq!(p1.init_conditions, ints(&[5]));

    // Token-sum invariant over the chain.
    let tokens_after = f.ports[0].init_conditions.len() + p1.delay;
    assert_eq!(tokens_before, tokens_after);

    // c2 now reads the FIFO directly.
    let c2_in = d.input_arc(c2, 0).unwrap();
    assert_eq!(d.arc(c2_in).src.node, fifo);
    d.validate_structure().unwrap();
}

#[test]
fn reshape_splits_remainder_into_input_side_delay() {
    let mut d = Design::new();
    let producer = d.add_node("producer", sum2(), None);
    let mut payload = ThreadCrossingFifo::new(FifoVariant::Lockless, 4);
    payload.block_size = 4;
    payload.ports[0].init_conditions = ints(&[1, 2]);
    let fifo = d.add_node("fifo", NodeKind::Fifo(payload), None);
    let consumer = d.add_node("consumer", sum2(), None);
    d.node_mut(producer).partition = 0;
    d.node_mut(fifo).partition = 0;
    d.node_mut(consumer).partition = 1;
    d.add_arc(PortRef::output(producer, 0), PortRef::input(fifo, 0), ty(), -1.0);
    d.add_arc(PortRef::output(fifo, 0), PortRef::input(consumer, 0), ty(), -1.0);

    absorption::absorb_adjacent_delays(&mut d).unwrap();

    // 2 mod 4 != 0: the whole remainder moved into a synthesized delay at
    // the FIFO input, leaving the FIFO holding 0 (and 0 mod 4 == 0).
    let NodeKind::Fifo(f) = &d.node(fifo).kind else { panic!() };
    assert_eq!(f.init_count(0), 0);

    let in_arc = d.input_arc(fifo, 0).unwrap();
    let reshape = d.arc(in_arc).src.node;
    let NodeKind::Delay(p) = &d.node(reshape).kind else { panic!("expected reshape delay") };
    assert_eq!(p.delay, 2);
    assert_eq!(p.init_conditions, ints(&[1, 2]));
}

#[test]
fn reshape_uses_output_side_when_driven_by_input_master() {
    let mut d = Design::new();
    let input = d.input_master();
    let mut payload = ThreadCrossingFifo::new(FifoVariant::Lockless, 4);
    payload.block_size = 4;
    payload.ports[0].init_conditions = ints(&[1, 2]);
    let fifo = d.add_node("fifo", NodeKind::Fifo(payload), None);
    let consumer = d.add_node("consumer", sum2(), None);
    d.node_mut(fifo).partition = core_ir::PARTITION_IO;
    d.node_mut(consumer).partition = 0;
    d.add_arc(PortRef::output(input, 0), PortRef::input(fifo, 0), ty(), -1.0);
    d.add_arc(PortRef::output(fifo, 0), PortRef::input(consumer, 0), ty(), -1.0);

    absorption::absorb_adjacent_delays(&mut d).unwrap();

    let NodeKind::Fifo(f) = &d.node(fifo).kind else { panic!() };
    assert_eq!(f.init_count(0), 0);

    // The synthesized delay sits between the FIFO and the consumer.
    let c_in = d.input_arc(consumer, 0).unwrap();
    let reshape = d.arc(c_in).src.node;
    let NodeKind::Delay(p) = &d.node(reshape).kind else { panic!("expected reshape delay") };
    assert_eq!(p.delay, 2);
    assert_eq!(p.init_conditions, ints(&[1, 2]));
}

#[test]
fn fifos_sharing_partition_pair_merge_onto_one_node() {
    let mut d = Design::new();
    let p1 = d.add_node("p1", sum2(), None);
    let p2 = d.add_node("p2", sum2(), None);
    let c1 = d.add_node("c1", sum2(), None);
    let c2 = d.add_node("c2", sum2(), None);
    for k in [p1, p2] {
        d.node_mut(k).partition = 0;
    }
    for k in [c1, c2] {
        d.node_mut(k).partition = 1;
    }

    let mut f1 = ThreadCrossingFifo::new(FifoVariant::Lockless, 4);
    f1.ports[0].init_conditions = ints(&[1]);
    let fifo1 = d.add_node("fifo1", NodeKind::Fifo(f1), None);
    let f2 = ThreadCrossingFifo::new(FifoVariant::Lockless, 4);
    let fifo2 = d.add_node("fifo2", NodeKind::Fifo(f2), None);
    d.node_mut(fifo1).partition = 0;
    d.node_mut(fifo2).partition = 0;

    d.add_arc(PortRef::output(p1, 0), PortRef::input(fifo1, 0), ty(), -1.0);
    d.add_arc(PortRef::output(fifo1, 0), PortRef::input(c1, 0), ty(), -1.0);
    d.add_arc(PortRef::output(p2, 0), PortRef::input(fifo2, 0), ty(), -1.0);
    d.add_arc(PortRef::output(fifo2, 0), PortRef::input(c2, 0), ty(), -1.0);

    let merged = absorption::merge_fifos(&mut d).unwrap();
    assert_eq!(merged, 1);
    assert!(!d.contains_node(fifo2));

    let NodeKind::Fifo(s) = &d.node(fifo1).kind else { panic!() };
    assert_eq!(s.ports.len(), 2);
    // Trimmed to the group minimum (0): fifo1's token moved into a delay.
    assert_eq!(s.min_init_count(), 0);

    // Port pair 1 carries the second producer/consumer.
    let c2_in = d.input_arc(c2, 0).unwrap();
    assert_eq!(d.arc(c2_in).src.node, fifo1);
    assert_eq!(d.arc(c2_in).src.number, 1);
    d.validate_structure().unwrap();
}
