use core_ir::{Design, NodeKind, PortRef, Sum};
use core_mt::fifo_insert::{self, FifoSpec};
use core_types::DataType;

fn ty() -> DataType {
    DataType::parse_numeric_str("int32").unwrap()
}

fn sum2() -> NodeKind {
    NodeKind::Sum(Sum::new(vec![true, true]))
}

#[test]
fn shared_source_port_bundles_into_one_fifo() {
    let mut d = Design::new();
    let src = d.add_node("src", sum2(), None);
    let c1 = d.add_node("c1", sum2(), None);
    let c2 = d.add_node("c2", sum2(), None);
    let c3 = d.add_node("c3", sum2(), None);
    d.node_mut(src).partition = 0;
    for k in [c1, c2, c3] {
        d.node_mut(k).partition = 1;
    }

    // Two consumers off port 0, one off port 1.
    let a1 = d.add_arc(PortRef::output(src, 0), PortRef::input(c1, 0), ty(), -1.0);
    let a2 = d.add_arc(PortRef::output(src, 0), PortRef::input(c2, 0), ty(), -1.0);
    let a3 = d.add_arc(PortRef::output(src, 1), PortRef::input(c3, 0), ty(), -1.0);

    let spec = FifoSpec { length_blocks: 8, ..FifoSpec::default() };
    let fifos = fifo_insert::insert_partition_crossing_fifos(&mut d, &spec).unwrap();
    assert_eq!(fifos.len(), 2);

    // The bundled arcs now come out of the same FIFO; the third has its own.
    let f1 = d.arc(a1).src.node;
    assert_eq!(d.arc(a2).src.node, f1);
    let f2 = d.arc(a3).src.node;
    assert_ne!(f1, f2);
    assert!(matches!(d.node(f1).kind, NodeKind::Fifo(_)));
    assert!(matches!(d.node(f2).kind, NodeKind::Fifo(_)));

    // FIFOs live in the source partition, fed by a fresh producer arc.
    assert_eq!(d.node(f1).partition, 0);
    let producer_arc = d.input_arc(f1, 0).unwrap();
    assert_eq!(d.arc(producer_arc).src, PortRef::output(src, 0));

    // No data arc crosses partitions without a FIFO endpoint anymore.
    for a in d.partition_crossing_arcs() {
        let arc = d.arc(a);
        assert!(
            matches!(d.node(arc.src.node).kind, NodeKind::Fifo(_))
                || matches!(d.node(arc.dst.node).kind, NodeKind::Fifo(_)),
            "uncovered crossing"
        );
    }
    d.validate_structure().unwrap();
}
