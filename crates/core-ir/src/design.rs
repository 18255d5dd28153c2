//! The design container: nodes, arcs, hierarchy, and the graph operations
//! every pass builds on.
//!
//! Storage is arena-style: nodes and arcs live in insertion-ordered maps
//! keyed by stable handles ([`NodeKey`] / [`ArcKey`]).  Public integer IDs
//! (used by serialized graphs) are separate attributes that can be assigned
//! and renumbered without disturbing the handles.  All endpoint bookkeeping
//! (port arc-sets, parent/child links, the top-level list) goes through the
//! methods here so the universal graph invariants hold between passes.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use core_types::{DataType, NumericValue};

use crate::arc::{ArcData, ArcKey};
use crate::error::{CompileError, Result};
use crate::kind::{ConstantNode, ExpandedNode, MasterNode, MasterRole, NodeKind, Product};
use crate::node::{Node, NodeKey, PARTITION_IO};
use crate::port::{PortKind, PortRef};

/// Bidirectional node/arc maps produced by [`Design::copy_graph`].
#[derive(Debug, Default, Clone)]
pub struct GraphCopyMaps {
    pub orig_to_copy_node: IndexMap<NodeKey, NodeKey>,
    pub copy_to_orig_node: IndexMap<NodeKey, NodeKey>,
    pub orig_to_copy_arc: IndexMap<ArcKey, ArcKey>,
    pub copy_to_orig_arc: IndexMap<ArcKey, ArcKey>,
}

/// A batched set of graph edits.  Additions are applied before deletions so
/// replacement patterns can transfer edges without transiently dangling.
#[derive(Debug, Default)]
pub struct Batch {
    pub new_arcs: Vec<(PortRef, PortRef, DataType, f64)>,
    pub removed_arcs: Vec<ArcKey>,
    pub removed_nodes: Vec<NodeKey>,
}

/// Arcs between one source port and one destination partition, bundleable
/// into a single FIFO.
#[derive(Debug, Clone)]
pub struct CrossingGroup {
    pub src_port: PortRef,
    pub arcs: Vec<ArcKey>,
}

/// A streaming dataflow design.
#[derive(Debug, Clone)]
pub struct Design {
    nodes: IndexMap<NodeKey, Node>,
    arcs: IndexMap<ArcKey, ArcData>,
    top_level: Vec<NodeKey>,
    next_node: u32,
    next_arc: u32,
    input_master: NodeKey,
    output_master: NodeKey,
    vis_master: NodeKey,
    terminator_master: NodeKey,
    unconnected_master: NodeKey,
}

impl Design {
    /// Construct an empty design with the five master nodes pre-created on
    /// their reserved IDs.
    pub fn new() -> Design {
        let mut d = Design {
            nodes: IndexMap::new(),
            arcs: IndexMap::new(),
            top_level: Vec::new(),
            next_node: 0,
            next_arc: 0,
            input_master: NodeKey(0),
            output_master: NodeKey(0),
            vis_master: NodeKey(0),
            terminator_master: NodeKey(0),
            unconnected_master: NodeKey(0),
        };
        d.input_master = d.add_master(MasterRole::Input);
        d.output_master = d.add_master(MasterRole::Output);
        d.vis_master = d.add_master(MasterRole::Visualization);
        d.terminator_master = d.add_master(MasterRole::Terminator);
        d.unconnected_master = d.add_master(MasterRole::Unconnected);
        d
    }

    fn add_master(&mut self, role: MasterRole) -> NodeKey {
        let key = NodeKey(self.next_node);
        self.next_node += 1;
        let mut node = Node::new(role.tag(), NodeKind::Master(MasterNode::new(role)));
        node.id = role.reserved_id();
        node.partition = PARTITION_IO;
        self.nodes.insert(key, node);
        key
    }

    // ---- Accessors -------------------------------------------------------

    pub fn input_master(&self) -> NodeKey {
        self.input_master
    }

    pub fn output_master(&self) -> NodeKey {
        self.output_master
    }

    pub fn vis_master(&self) -> NodeKey {
        self.vis_master
    }

    pub fn terminator_master(&self) -> NodeKey {
        self.terminator_master
    }

    pub fn unconnected_master(&self) -> NodeKey {
        self.unconnected_master
    }

    pub fn master_keys(&self) -> [NodeKey; 5] {
        [
            self.input_master,
            self.output_master,
            self.vis_master,
            self.terminator_master,
            self.unconnected_master,
        ]
    }

    /// Output-like sinks ignored when computing effective out-degree.
    pub fn sink_masters(&self) -> [NodeKey; 2] {
        [self.terminator_master, self.unconnected_master]
    }

    pub fn node(&self, key: NodeKey) -> &Node {
        self.nodes.get(&key).unwrap_or_else(|| panic!("stale node key {key}"))
    }

    pub fn node_mut(&mut self, key: NodeKey) -> &mut Node {
        self.nodes.get_mut(&key).unwrap_or_else(|| panic!("stale node key {key}"))
    }

    pub fn try_node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(&key)
    }

    pub fn contains_node(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    pub fn arc(&self, key: ArcKey) -> &ArcData {
        self.arcs.get(&key).unwrap_or_else(|| panic!("stale arc key {key}"))
    }

    pub fn arc_mut(&mut self, key: ArcKey) -> &mut ArcData {
        self.arcs.get_mut(&key).unwrap_or_else(|| panic!("stale arc key {key}"))
    }

    pub fn contains_arc(&self, key: ArcKey) -> bool {
        self.arcs.contains_key(&key)
    }

    pub fn node_keys(&self) -> Vec<NodeKey> {
        self.nodes.keys().copied().collect()
    }

    pub fn arc_keys(&self) -> Vec<ArcKey> {
        self.arcs.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    pub fn top_level_nodes(&self) -> &[NodeKey] {
        &self.top_level
    }

    // ---- Node / arc insertion and removal --------------------------------

    /// Add a node under `parent` (or at top level).  The node gets ID -1;
    /// call [`Design::assign_node_ids`] before serializing.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        kind: NodeKind,
        parent: Option<NodeKey>,
    ) -> NodeKey {
        let key = NodeKey(self.next_node);
        self.next_node += 1;
        let node = Node::new(name, kind);
        self.nodes.insert(key, node);
        self.set_parent(key, parent);
        key
    }

    /// Move a node to a new parent, maintaining child sets and the top-level
    /// list on both ends.
    pub fn set_parent(&mut self, key: NodeKey, parent: Option<NodeKey>) {
        let old_parent = self.node(key).parent;
        if let Some(op) = old_parent
            && let Some(base) = self.node_mut(op).kind.subsystem_base_mut()
        {
            base.children.shift_remove(&key);
        }
        self.top_level.retain(|k| *k != key);

        self.node_mut(key).parent = parent;
        match parent {
            Some(p) => {
                let base = self
                    .node_mut(p)
                    .kind
                    .subsystem_base_mut()
                    .unwrap_or_else(|| panic!("parent {p} is not subsystem-like"));
                base.children.insert(key);
            }
            None => {
                if !self.node(key).is_master() {
                    self.top_level.push(key);
                }
            }
        }
    }

    /// Remove a node.  All attached arcs are removed as well.  Subsystems
    /// must have their children re-parented first; masters cannot be removed.
    pub fn remove_node(&mut self, key: NodeKey) -> Result<()> {
        let node = self.node(key);
        if node.is_master() {
            return Err(CompileError::Transform(format!(
                "cannot remove master node `{}`",
                node.name
            )));
        }
        if let Some(base) = node.children()
            && !base.children.is_empty()
        {
            return Err(CompileError::Transform(format!(
                "cannot remove subsystem `{}` with {} children; re-parent them first",
                self.qualified_name(key),
                base.children.len()
            )));
        }
        for arc in self.arcs_of_node(key) {
            self.remove_arc(arc);
        }
        self.set_parent(key, None);
        self.top_level.retain(|k| *k != key);
        self.nodes.shift_remove(&key);
        Ok(())
    }

    /// Add an arc; both endpoint ports get the arc attached.
    pub fn add_arc(
        &mut self,
        src: PortRef,
        dst: PortRef,
        data_type: DataType,
        sample_time: f64,
    ) -> ArcKey {
        let key = ArcKey(self.next_arc);
        self.next_arc += 1;
        self.arcs.insert(key, ArcData::new(src, dst, data_type, sample_time));
        self.node_mut(src.node).port_mut(src.kind, src.number).attach(key);
        self.node_mut(dst.node).port_mut(dst.kind, dst.number).attach(key);
        key
    }

    /// Add an order-constraint arc (boolean scalar type, inherited rate).
    pub fn add_order_constraint(&mut self, src_node: NodeKey, dst_node: NodeKey) -> ArcKey {
        self.add_arc(
            PortRef::order_out(src_node),
            PortRef::order_in(dst_node),
            DataType::bool_scalar(),
            -1.0,
        )
    }

    /// Remove an arc, detaching it from both endpoint ports.
    pub fn remove_arc(&mut self, key: ArcKey) {
        if let Some(arc) = self.arcs.shift_remove(&key) {
            self.node_mut(arc.src.node).port_mut(arc.src.kind, arc.src.number).detach(key);
            self.node_mut(arc.dst.node).port_mut(arc.dst.kind, arc.dst.number).detach(key);
        }
    }

    /// Re-point an arc's source, updating both the old and new ports.
    pub fn set_arc_src(&mut self, key: ArcKey, src: PortRef) {
        let old = self.arc(key).src;
        self.node_mut(old.node).port_mut(old.kind, old.number).detach(key);
        self.arc_mut(key).src = src;
        self.node_mut(src.node).port_mut(src.kind, src.number).attach(key);
    }

    /// Re-point an arc's destination, updating both the old and new ports.
    pub fn set_arc_dst(&mut self, key: ArcKey, dst: PortRef) {
        let old = self.arc(key).dst;
        self.node_mut(old.node).port_mut(old.kind, old.number).detach(key);
        self.arc_mut(key).dst = dst;
        self.node_mut(dst.node).port_mut(dst.kind, dst.number).attach(key);
    }

    /// Apply a batch: new arcs first, then arc deletions, then node
    /// deletions.
    pub fn apply_batch(&mut self, batch: Batch) -> Result<Vec<ArcKey>> {
        let mut added = Vec::with_capacity(batch.new_arcs.len());
        for (src, dst, ty, ts) in batch.new_arcs {
            added.push(self.add_arc(src, dst, ty, ts));
        }
        for arc in batch.removed_arcs {
            self.remove_arc(arc);
        }
        for node in batch.removed_nodes {
            self.remove_node(node)?;
        }
        Ok(added)
    }

    // ---- Arc queries -----------------------------------------------------

    pub fn arcs_of_node(&self, key: NodeKey) -> Vec<ArcKey> {
        let node = self.node(key);
        let mut out = Vec::new();
        for (_, port) in node.all_ports(key) {
            out.extend(port.arcs.iter().copied());
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Arcs leaving any output port (order-constraint outputs excluded).
    pub fn out_arcs(&self, key: NodeKey) -> Vec<ArcKey> {
        self.node(key).outputs.iter().flat_map(|p| p.arcs.iter().copied()).collect()
    }

    /// Arcs entering any input or enable port (order-constraint inputs
    /// excluded).
    pub fn in_arcs(&self, key: NodeKey) -> Vec<ArcKey> {
        let node = self.node(key);
        let mut out: Vec<ArcKey> =
            node.inputs.iter().flat_map(|p| p.arcs.iter().copied()).collect();
        if let Some(p) = &node.enable_port {
            out.extend(p.arcs.iter().copied());
        }
        out
    }

    /// All arcs entering the node, order constraints included.
    pub fn in_arcs_with_order(&self, key: NodeKey) -> Vec<ArcKey> {
        let mut out = self.in_arcs(key);
        out.extend(self.node(key).order_in.arcs.iter().copied());
        out
    }

    /// All arcs leaving the node, order constraints included.
    pub fn out_arcs_with_order(&self, key: NodeKey) -> Vec<ArcKey> {
        let mut out = self.out_arcs(key);
        out.extend(self.node(key).order_out.arcs.iter().copied());
        out
    }

    /// The single arc driving an input port, if connected.
    pub fn input_arc(&self, key: NodeKey, port: u32) -> Option<ArcKey> {
        self.node(key).port(PortKind::Input, port).and_then(|p| p.arcs.first().copied())
    }

    /// Output degree ignoring arcs into the given masters.
    pub fn out_degree_ignoring(&self, key: NodeKey, ignored: &[NodeKey]) -> usize {
        self.out_arcs_with_order(key)
            .iter()
            .filter(|a| !ignored.contains(&self.arc(**a).dst.node))
            .count()
    }

    // ---- ID management ---------------------------------------------------

    /// Assign IDs to nodes with `id < 0`, numbering above both the current
    /// maximum and the reserved master range.  Positive IDs are preserved.
    pub fn assign_node_ids(&mut self) {
        let mut max = self.nodes.values().map(|n| n.id).max().unwrap_or(0).max(5);
        for node in self.nodes.values_mut() {
            if node.id < 0 {
                max += 1;
                node.id = max;
            }
        }
    }

    /// Renumber every non-master node sequentially from 6.  Master nodes
    /// keep their reserved IDs.
    pub fn renumber_node_ids(&mut self) {
        let mut next = 6;
        for node in self.nodes.values_mut() {
            if let NodeKind::Master(m) = &node.kind {
                node.id = m.role().reserved_id();
            } else {
                node.id = next;
                next += 1;
            }
        }
    }

    /// Assign IDs to arcs with `id < 0`; positive IDs are preserved.
    pub fn assign_arc_ids(&mut self) {
        let mut max = self.arcs.values().map(|a| a.id).max().unwrap_or(0).max(0);
        for arc in self.arcs.values_mut() {
            if arc.id < 0 {
                max += 1;
                arc.id = max;
            }
        }
    }

    /// Renumber every arc sequentially from 1.
    pub fn renumber_arc_ids(&mut self) {
        for (next, arc) in self.arcs.values_mut().enumerate() {
            arc.id = next as i32 + 1;
        }
    }

    pub fn node_by_id(&self, id: i32) -> Option<NodeKey> {
        self.nodes.iter().find(|(_, n)| n.id == id).map(|(k, _)| *k)
    }

    // ---- Hierarchy -------------------------------------------------------

    /// Fully qualified name: path components from the root joined by `/`.
    pub fn qualified_name(&self, key: NodeKey) -> String {
        let mut parts = vec![self.node(key).name.clone()];
        let mut cur = self.node(key).parent;
        while let Some(p) = cur {
            parts.push(self.node(p).name.clone());
            cur = self.node(p).parent;
        }
        parts.reverse();
        parts.join("/")
    }

    /// Look up a node by name path from the root (top-level name first).
    pub fn node_by_name_path(&self, path: &[&str]) -> Option<NodeKey> {
        let mut candidates: Vec<NodeKey> = self.top_level.clone();
        let mut current = None;
        for part in path {
            let found = candidates.iter().copied().find(|k| self.node(*k).name == *part)?;
            current = Some(found);
            candidates = self.children_of(found);
        }
        current
    }

    /// Direct children of a subsystem-like node (empty for leaves).
    pub fn children_of(&self, key: NodeKey) -> Vec<NodeKey> {
        self.node(key).children().map(|b| b.children.iter().copied().collect()).unwrap_or_default()
    }

    /// All nodes under `key`, depth-first, excluding `key` itself.
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack = self.children_of(key);
        while let Some(k) = stack.pop() {
            out.push(k);
            stack.extend(self.children_of(k));
        }
        out
    }

    // ---- Enumerations ----------------------------------------------------

    pub fn nodes_with_state(&self) -> Vec<NodeKey> {
        self.nodes.iter().filter(|(_, n)| n.has_state()).map(|(k, _)| *k).collect()
    }

    pub fn nodes_with_global_decl(&self) -> Vec<NodeKey> {
        self.nodes.iter().filter(|(_, n)| n.has_global_decl()).map(|(k, _)| *k).collect()
    }

    pub fn context_root_nodes(&self) -> Vec<NodeKey> {
        self.nodes.iter().filter(|(_, n)| n.kind.is_context_root()).map(|(k, _)| *k).collect()
    }

    pub fn black_boxes(&self) -> Vec<NodeKey> {
        self.nodes
            .iter()
            .filter(|(_, n)| matches!(n.kind, NodeKind::BlackBox(_)))
            .map(|(k, _)| *k)
            .collect()
    }

    // ---- Partitions ------------------------------------------------------

    /// Distinct partitions with at least one node (masters contribute the
    /// I/O partition).
    pub fn partitions(&self) -> IndexSet<i32> {
        self.nodes.values().map(|n| n.partition).collect()
    }

    pub fn nodes_by_partition(&self, partition: i32) -> Vec<NodeKey> {
        self.nodes.iter().filter(|(_, n)| n.partition == partition).map(|(k, _)| *k).collect()
    }

    /// Data arcs whose endpoints live in different partitions.
    pub fn partition_crossing_arcs(&self) -> Vec<ArcKey> {
        self.arcs
            .iter()
            .filter(|(_, a)| {
                !matches!(a.src.kind, PortKind::OrderConstraintOut)
                    && self.node(a.src.node).partition != self.node(a.dst.node).partition
            })
            .map(|(k, _)| *k)
            .collect()
    }

    /// Group partition-crossing arcs into FIFO candidates: per ordered
    /// partition pair, arcs sharing a source port form one group;
    /// independent source ports become separate groups.
    pub fn group_partition_crossings(&self) -> IndexMap<(i32, i32), Vec<CrossingGroup>> {
        let mut out: IndexMap<(i32, i32), Vec<CrossingGroup>> = IndexMap::new();
        for arc_key in self.partition_crossing_arcs() {
            let arc = self.arc(arc_key);
            let src_part = self.node(arc.src.node).partition;
            let dst_part = self.node(arc.dst.node).partition;
            let groups = out.entry((src_part, dst_part)).or_default();
            match groups.iter_mut().find(|g| g.src_port == arc.src) {
                Some(g) => g.arcs.push(arc_key),
                None => groups.push(CrossingGroup { src_port: arc.src, arcs: vec![arc_key] }),
            }
        }
        out
    }

    // ---- Deep copy -------------------------------------------------------

    /// Clone the whole design.  Keys are preserved in the copy, and the
    /// returned maps relate originals and copies in both directions for
    /// every node and arc.
    pub fn copy_graph(&self) -> (Design, GraphCopyMaps) {
        let copy = self.clone();
        let mut maps = GraphCopyMaps::default();
        for k in self.nodes.keys() {
            maps.orig_to_copy_node.insert(*k, *k);
            maps.copy_to_orig_node.insert(*k, *k);
        }
        for k in self.arcs.keys() {
            maps.orig_to_copy_arc.insert(*k, *k);
            maps.copy_to_orig_arc.insert(*k, *k);
        }
        (copy, maps)
    }

    // ---- Expansion -------------------------------------------------------

    /// Expand one node into a primitive subgraph inside an [`ExpandedNode`],
    /// if the node supports expansion.  Returns the wrapper's key.
    pub fn expand_node(&mut self, key: NodeKey) -> Result<Option<NodeKey>> {
        if !self.node(key).can_expand() {
            return Ok(None);
        }
        let NodeKind::Gain(gain) = self.node(key).kind.clone() else {
            return Ok(None);
        };

        let name = self.node(key).name.clone();
        let parent = self.node(key).parent;
        let partition = self.node(key).partition;
        let contexts = self.node(key).contexts.clone();

        let wrapper = self.add_node(
            name.clone(),
            NodeKind::Expanded(ExpandedNode {
                base: Default::default(),
                orig_kind: Box::new(NodeKind::Gain(gain.clone())),
                orig_name: name.clone(),
            }),
            parent,
        );

        // Output type drives the constant's declared type.
        let out_type = self
            .out_arcs(key)
            .first()
            .map(|a| self.arc(*a).data_type.to_scalar())
            .unwrap_or_else(DataType::double_scalar);

        let constant = self.add_node(
            format!("{name}_gain"),
            NodeKind::Constant(ConstantNode { values: gain.gain.clone(), data_type: out_type.clone() }),
            Some(wrapper),
        );
        let product = self.add_node(
            format!("{name}_mult"),
            NodeKind::Product(Product::new(vec![true, true])),
            Some(wrapper),
        );

        for k in [wrapper, constant, product] {
            let n = self.node_mut(k);
            n.partition = partition;
            n.contexts = contexts.clone();
        }

        // Rewire data: in -> product.0, const -> product.1, product.0 -> outs.
        if let Some(in_arc) = self.input_arc(key, 0) {
            self.set_arc_dst(in_arc, PortRef::input(product, 0));
        }
        self.add_arc(PortRef::output(constant, 0), PortRef::input(product, 1), out_type, -1.0);
        for out_arc in self.out_arcs(key) {
            self.set_arc_src(out_arc, PortRef::output(product, 0));
        }

        debug!(target: "ir.expand", node = %self.qualified_name(wrapper), "expanded");
        self.remove_node(key)?;
        Ok(Some(wrapper))
    }

    /// Broadcast a scalar value into a flattened initial-condition vector.
    pub fn broadcast_values(value: NumericValue, count: usize) -> Vec<NumericValue> {
        vec![value; count]
    }
}

impl Default for Design {
    fn default() -> Self {
        Design::new()
    }
}
