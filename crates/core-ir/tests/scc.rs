//! Strongly-connected-component decomposition over the non-master node set.

use core_ir::{ConstantNode, Design, NodeKey, NodeKind, PortRef, Sum};
use core_types::{DataType, NumericValue};

fn sum2() -> NodeKind {
    NodeKind::Sum(Sum::new(vec![true, true]))
}

fn constant(v: i64) -> NodeKind {
    NodeKind::Constant(ConstantNode {
        values: vec![NumericValue::Int(v)],
        data_type: DataType::parse_numeric_str("int32").unwrap(),
    })
}

fn ty() -> DataType {
    DataType::parse_numeric_str("int32").unwrap()
}

fn chain(d: &mut Design, nodes: &[NodeKey]) {
    for w in nodes.windows(2) {
        d.add_arc(PortRef::output(w[0], 0), PortRef::input(w[1], 0), ty(), -1.0);
    }
}

#[test]
fn fifteen_node_graph_has_nine_components() {
    let mut d = Design::new();

    // Five-node feedback loop.
    let loop5: Vec<NodeKey> = (0..5).map(|i| d.add_node(format!("l{i}"), sum2(), None)).collect();
    chain(&mut d, &loop5);
    d.add_arc(PortRef::output(loop5[4], 0), PortRef::input(loop5[0], 1), ty(), -1.0);

    // Three single-constant components feeding the loop.
    for (i, target) in [(0usize, loop5[1]), (1, loop5[2]), (2, loop5[3])] {
        let c = d.add_node(format!("c{i}"), constant(i as i64), None);
        d.add_arc(PortRef::output(c, 0), PortRef::input(target, 1), ty(), -1.0);
    }

    // A three-node inner cycle downstream of the loop.
    let loop3: Vec<NodeKey> = (0..3).map(|i| d.add_node(format!("m{i}"), sum2(), None)).collect();
    chain(&mut d, &loop3);
    d.add_arc(PortRef::output(loop3[2], 0), PortRef::input(loop3[0], 1), ty(), -1.0);
    d.add_arc(PortRef::output(loop5[4], 0), PortRef::input(loop3[0], 0), ty(), -1.0);

    // Four acyclic tail nodes.
    let tail: Vec<NodeKey> = (0..4).map(|i| d.add_node(format!("t{i}"), sum2(), None)).collect();
    chain(&mut d, &tail);
    d.add_arc(PortRef::output(loop3[2], 0), PortRef::input(tail[0], 1), ty(), -1.0);

    assert_eq!(d.node_count() - 5, 15, "15 non-master nodes");

    let comps = d.strongly_connected_components();
    assert_eq!(comps.len(), 9);

    let mut sizes: Vec<usize> = comps.iter().map(|c| c.len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![1, 1, 1, 1, 1, 1, 1, 3, 5]);

    // The five-node component is exactly the feedback loop.
    let five = comps.iter().find(|c| c.len() == 5).unwrap();
    let mut expected = loop5.clone();
    expected.sort_unstable();
    let mut got = five.clone();
    got.sort_unstable();
    assert_eq!(got, expected);

    // Constants are their own components.
    let singles: usize = comps
        .iter()
        .filter(|c| {
            c.len() == 1 && matches!(d.node(c[0]).kind, NodeKind::Constant(_))
        })
        .count();
    assert_eq!(singles, 3);
}
