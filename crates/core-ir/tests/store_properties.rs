//! Property tests over the node/arc stores.

use core_ir::{Design, NodeKind, PortRef, Sum};
use core_types::DataType;
use proptest::prelude::*;

fn ty() -> DataType {
    DataType::parse_numeric_str("int16").unwrap()
}

proptest! {
    #[test]
    fn random_wiring_keeps_structure_valid(
        node_count in 2usize..12,
        edges in proptest::collection::vec((0usize..12, 0usize..12, 0u32..3), 0..24),
    ) {
        let mut d = Design::new();
        let keys: Vec<_> = (0..node_count)
            .map(|i| d.add_node(format!("n{i}"), NodeKind::Sum(Sum::new(vec![true, true])), None))
            .collect();

        let mut used_inputs = std::collections::HashSet::new();
        for (s, t, port) in edges {
            let (s, t) = (s % node_count, t % node_count);
            // Keep the single-driver invariant by construction.
            if used_inputs.insert((t, port)) {
                d.add_arc(PortRef::output(keys[s], 0), PortRef::input(keys[t], port), ty(), -1.0);
            }
        }

        d.validate_structure().unwrap();
        d.assign_node_ids();
        d.assign_arc_ids();
        d.validate_structure().unwrap();

        // Every assigned ID is positive and unique.
        let mut ids: Vec<i32> = d.node_keys().iter().map(|k| d.node(*k).id).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), d.node_count());

        // Removing every arc leaves no port referencing anything.
        for a in d.arc_keys() {
            d.remove_arc(a);
        }
        for k in d.node_keys() {
            for (_, port) in d.node(k).all_ports(k) {
                prop_assert!(port.arcs.is_empty());
            }
        }
    }
}
