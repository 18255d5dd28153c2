use core_ir::{Design, FifoVariant, NodeKind, PortRef, Sum, ThreadCrossingFifo};
use core_mt::deadlock;
use core_types::{DataType, NumericValue};

fn ty() -> DataType {
    DataType::parse_numeric_str("int32").unwrap()
}

fn sum2() -> NodeKind {
    NodeKind::Sum(Sum::new(vec![true, true]))
}

/// Two partitions linked both ways; `init_blocks` seeds the back edge.
fn build_cycle(init_blocks: usize) -> Design {
    let mut d = Design::new();
    let a = d.add_node("a", sum2(), None);
    let b = d.add_node("b", sum2(), None);
    d.node_mut(a).partition = 0;
    d.node_mut(b).partition = 1;

    let fwd = ThreadCrossingFifo::new(FifoVariant::Lockless, 4);
    let fwd = d.add_node("fwd", NodeKind::Fifo(fwd), None);
    d.node_mut(fwd).partition = 0;

    let mut back = ThreadCrossingFifo::new(FifoVariant::Lockless, 4);
    back.ports[0].init_conditions = vec![NumericValue::Int(0); init_blocks];
    let back = d.add_node("back", NodeKind::Fifo(back), None);
    d.node_mut(back).partition = 1;

    d.add_arc(PortRef::output(a, 0), PortRef::input(fwd, 0), ty(), -1.0);
    d.add_arc(PortRef::output(fwd, 0), PortRef::input(b, 0), ty(), -1.0);
    d.add_arc(PortRef::output(b, 0), PortRef::input(back, 0), ty(), -1.0);
    d.add_arc(PortRef::output(back, 0), PortRef::input(a, 0), ty(), -1.0);
    d
}

#[test]
fn zero_init_cycle_is_a_deadlock() {
    let d = build_cycle(0);
    let err = deadlock::check_inter_thread_deadlock(&d).unwrap_err();
    assert!(matches!(err, core_ir::CompileError::Deadlock(_)));
}

#[test]
fn one_block_of_initial_data_breaks_the_cycle() {
    let d = build_cycle(1);
    deadlock::check_inter_thread_deadlock(&d).unwrap();
}

#[test]
fn acyclic_partition_graph_passes() {
    let mut d = Design::new();
    let a = d.add_node("a", sum2(), None);
    let b = d.add_node("b", sum2(), None);
    d.node_mut(a).partition = 0;
    d.node_mut(b).partition = 1;
    let f = d.add_node("f", NodeKind::Fifo(ThreadCrossingFifo::new(FifoVariant::Lockless, 4)), None);
    d.node_mut(f).partition = 0;
    d.add_arc(PortRef::output(a, 0), PortRef::input(f, 0), ty(), -1.0);
    d.add_arc(PortRef::output(f, 0), PortRef::input(b, 0), ty(), -1.0);
    deadlock::check_inter_thread_deadlock(&d).unwrap();
}
