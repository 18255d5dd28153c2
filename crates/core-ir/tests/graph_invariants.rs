use core_ir::{Batch, Compare, CompareOp, Design, NodeKind, PortRef, Subsystem, Sum};
use core_types::DataType;

fn sum2() -> NodeKind {
    NodeKind::Sum(Sum::new(vec![true, true]))
}

fn ty() -> DataType {
    DataType::parse_numeric_str("int32").unwrap()
}

#[test]
fn arc_endpoints_are_maintained() {
    let mut d = Design::new();
    let a = d.add_node("a", sum2(), None);
    let b = d.add_node("b", sum2(), None);
    let arc = d.add_arc(PortRef::output(a, 0), PortRef::input(b, 0), ty(), -1.0);

    assert!(d.node(a).outputs[0].arcs.contains(&arc));
    assert!(d.node(b).inputs[0].arcs.contains(&arc));

    // Re-pointing the destination detaches from the old port.
    let c = d.add_node("c", sum2(), None);
    d.set_arc_dst(arc, PortRef::input(c, 1));
    assert!(d.node(b).inputs[0].arcs.is_empty());
    assert!(d.node(c).inputs[1].arcs.contains(&arc));

    // Removing the arc clears both sides.
    d.remove_arc(arc);
    assert!(d.node(a).outputs[0].arcs.is_empty());
    assert!(d.node(c).inputs[1].arcs.is_empty());
    assert!(!d.contains_arc(arc));
}

#[test]
fn master_ids_are_reserved() {
    let d = Design::new();
    let ids: Vec<i32> = d.master_keys().iter().map(|k| d.node(*k).id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    d.validate_structure().unwrap();
}

#[test]
fn assign_node_ids_preserves_positive_ids() {
    let mut d = Design::new();
    let a = d.add_node("a", sum2(), None);
    let b = d.add_node("b", sum2(), None);
    d.node_mut(a).id = 17;
    d.assign_node_ids();
    assert_eq!(d.node(a).id, 17);
    // New IDs number above both the max and the reserved master range.
    assert!(d.node(b).id > 17);
    d.validate_structure().unwrap();
}

#[test]
fn assign_arc_ids_preserves_positive_ids() {
    let mut d = Design::new();
    let a = d.add_node("a", sum2(), None);
    let b = d.add_node("b", sum2(), None);
    let k1 = d.add_arc(PortRef::output(a, 0), PortRef::input(b, 0), ty(), -1.0);
    let k2 = d.add_arc(PortRef::output(a, 0), PortRef::input(b, 1), ty(), -1.0);
    d.arc_mut(k1).id = 9;
    d.assign_arc_ids();
    assert_eq!(d.arc(k1).id, 9);
    assert!(d.arc(k2).id > 9);
}

#[test]
fn copy_graph_maps_are_mutual_inverses() {
    let mut d = Design::new();
    let sub = d.add_node("sub", NodeKind::Subsystem(Subsystem::default()), None);
    let a = d.add_node("a", sum2(), Some(sub));
    let b = d.add_node("b", sum2(), Some(sub));
    d.add_arc(PortRef::output(a, 0), PortRef::input(b, 0), ty(), -1.0);
    d.add_arc(PortRef::output(a, 0), PortRef::input(b, 1), ty(), -1.0);

    let (copy, maps) = d.copy_graph();
    for k in d.node_keys() {
        let fwd = maps.orig_to_copy_node[&k];
        assert_eq!(maps.copy_to_orig_node[&fwd], k);
    }
    for k in d.arc_keys() {
        let fwd = maps.orig_to_copy_arc[&k];
        assert_eq!(maps.copy_to_orig_arc[&fwd], k);
    }
    assert_eq!(copy.node_count(), d.node_count());
    assert_eq!(copy.arc_count(), d.arc_count());
    copy.validate_structure().unwrap();
}

#[test]
fn name_path_lookup_walks_hierarchy() {
    let mut d = Design::new();
    let outer = d.add_node("outer", NodeKind::Subsystem(Subsystem::default()), None);
    let inner = d.add_node("inner", NodeKind::Subsystem(Subsystem::default()), Some(outer));
    let leaf = d.add_node("leaf", sum2(), Some(inner));
    assert_eq!(d.node_by_name_path(&["outer", "inner", "leaf"]), Some(leaf));
    assert_eq!(d.node_by_name_path(&["outer", "inner"]), Some(inner));
    assert_eq!(d.node_by_name_path(&["outer", "leaf"]), None);
    assert_eq!(d.qualified_name(leaf), "outer/inner/leaf");
}

#[test]
fn removing_subsystem_with_children_is_refused() {
    let mut d = Design::new();
    let sub = d.add_node("sub", NodeKind::Subsystem(Subsystem::default()), None);
    let child = d.add_node("child", sum2(), Some(sub));
    assert!(d.remove_node(sub).is_err());
    d.set_parent(child, None);
    d.remove_node(sub).unwrap();
    assert!(d.top_level_nodes().contains(&child));
}

#[test]
fn batch_applies_additions_before_deletions() {
    let mut d = Design::new();
    let a = d.add_node("a", sum2(), None);
    let b = d.add_node("b", sum2(), None);
    let c = d.add_node("c", NodeKind::Compare(Compare { op: CompareOp::Lt }), None);
    let old = d.add_arc(PortRef::output(a, 0), PortRef::input(b, 0), ty(), -1.0);

    // Replace b with c as the consumer in one batch.
    let batch = Batch {
        new_arcs: vec![(PortRef::output(a, 0), PortRef::input(c, 0), ty(), -1.0)],
        removed_arcs: vec![old],
        removed_nodes: vec![b],
    };
    let added = d.apply_batch(batch).unwrap();
    assert_eq!(added.len(), 1);
    assert!(!d.contains_node(b));
    assert_eq!(d.arc(added[0]).dst.node, c);
    d.validate_structure().unwrap();
}

#[test]
fn partition_crossings_group_by_source_port() {
    let mut d = Design::new();
    let a = d.add_node("a", sum2(), None);
    let b = d.add_node("b", sum2(), None);
    let c = d.add_node("c", sum2(), None);
    d.node_mut(a).partition = 0;
    d.node_mut(b).partition = 1;
    d.node_mut(c).partition = 1;

    // Two arcs share a's output port 0; a third leaves from port 1.
    d.add_arc(PortRef::output(a, 0), PortRef::input(b, 0), ty(), -1.0);
    d.add_arc(PortRef::output(a, 0), PortRef::input(c, 0), ty(), -1.0);
    d.add_arc(PortRef::output(a, 1), PortRef::input(c, 1), ty(), -1.0);

    let groups = d.group_partition_crossings();
    let pair = groups.get(&(0, 1)).expect("crossing pair");
    assert_eq!(pair.len(), 2);
    let sizes: Vec<usize> = pair.iter().map(|g| g.arcs.len()).collect();
    assert!(sizes.contains(&2) && sizes.contains(&1));
}
