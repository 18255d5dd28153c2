//! Design validation: universal graph invariants plus per-node checks.

use crate::design::Design;
use crate::error::{CompileError, Result};
use crate::kind::{MasterRole, NodeKind};
use crate::node::NodeKey;

impl Design {
    fn validation_err(&self, node: NodeKey, msg: impl Into<String>) -> CompileError {
        CompileError::Validation { node: self.qualified_name(node), msg: msg.into() }
    }

    /// Check the universal graph invariants that must hold after every pass.
    pub fn validate_structure(&self) -> Result<()> {
        // Arc endpoint sets.
        for arc_key in self.arc_keys() {
            let arc = self.arc(arc_key);
            for (end, port_ref) in [("src", arc.src), ("dst", arc.dst)] {
                let node = self.try_node(port_ref.node).ok_or_else(|| {
                    CompileError::Transform(format!("arc {arc_key} {end} references a removed node"))
                })?;
                let port = node.port(port_ref.kind, port_ref.number).ok_or_else(|| {
                    CompileError::Transform(format!("arc {arc_key} {end} references a missing port"))
                })?;
                if !port.arcs.contains(&arc_key) {
                    return Err(CompileError::Transform(format!(
                        "arc {arc_key} missing from its {end} port arc set on `{}`",
                        self.qualified_name(port_ref.node)
                    )));
                }
            }
        }

        for key in self.node_keys() {
            let node = self.node(key);

            // Ports reference only live arcs that point back at them.
            for (port_ref, port) in node.all_ports(key) {
                for arc_key in &port.arcs {
                    if !self.contains_arc(*arc_key) {
                        return Err(CompileError::Transform(format!(
                            "port on `{}` references removed arc {arc_key}",
                            self.qualified_name(key)
                        )));
                    }
                    let arc = self.arc(*arc_key);
                    if arc.src != port_ref && arc.dst != port_ref {
                        return Err(CompileError::Transform(format!(
                            "arc {arc_key} does not reference back port on `{}`",
                            self.qualified_name(key)
                        )));
                    }
                }
            }

            // Single driver on non-sink input ports.
            let many_ok = match &node.kind {
                NodeKind::Master(m) => m.role().is_many_input_sink(),
                _ => false,
            };
            if !many_ok {
                for port in &node.inputs {
                    if port.degree() > 1 {
                        return Err(self.validation_err(
                            key,
                            format!("input port {} has {} drivers", port.number, port.degree()),
                        ));
                    }
                }
            }
            if let Some(p) = &node.enable_port
                && p.degree() > 1
            {
                return Err(self.validation_err(key, "enable port has multiple drivers"));
            }

            // Parent chain must terminate at a top-level node.
            if !node.is_master() {
                let mut cur = key;
                let mut hops = 0usize;
                while let Some(p) = self.node(cur).parent {
                    if !self.contains_node(p) {
                        return Err(CompileError::Transform(format!(
                            "`{}` has a dangling parent",
                            self.qualified_name(key)
                        )));
                    }
                    cur = p;
                    hops += 1;
                    if hops > self.node_count() {
                        return Err(CompileError::Transform(format!(
                            "parent cycle through `{}`",
                            node.name
                        )));
                    }
                }
                if !self.top_level_nodes().contains(&cur) {
                    return Err(CompileError::Transform(format!(
                        "`{}` root `{}` is not in the top-level list",
                        self.qualified_name(key),
                        self.node(cur).name
                    )));
                }
            }

            // Child sets agree with parent pointers.
            if let Some(base) = node.children() {
                for child in &base.children {
                    if self.try_node(*child).map(|c| c.parent) != Some(Some(key)) {
                        return Err(CompileError::Transform(format!(
                            "child set of `{}` disagrees with parent pointer",
                            self.qualified_name(key)
                        )));
                    }
                }
            }
        }

        // Reserved master IDs.
        for key in self.master_keys() {
            let node = self.node(key);
            if let NodeKind::Master(m) = &node.kind
                && node.id != m.role().reserved_id()
            {
                return Err(CompileError::Transform(format!(
                    "master `{}` has ID {}, expected {}",
                    node.name,
                    node.id,
                    m.role().reserved_id()
                )));
            }
        }

        // Assigned IDs are unique.
        let mut seen = ahash::AHashSet::new();
        for key in self.node_keys() {
            let id = self.node(key).id;
            if id >= 0 && !seen.insert(id) {
                return Err(CompileError::Transform(format!("node ID collision on {id}")));
            }
        }

        Ok(())
    }

    /// Run every node's validation hook.
    pub fn validate_nodes(&self) -> Result<()> {
        for key in self.node_keys() {
            self.validate_node(key)?;
        }
        Ok(())
    }

    /// Full validation: structure plus node hooks.
    pub fn validate(&self) -> Result<()> {
        self.validate_structure()?;
        self.validate_nodes()
    }

    /// Per-node invariant checks.
    pub fn validate_node(&self, key: NodeKey) -> Result<()> {
        let node = self.node(key);
        match &node.kind {
            NodeKind::Sum(s) => {
                if node.inputs.len() < 2 {
                    return Err(self.validation_err(key, "Sum requires at least 2 inputs"));
                }
                if s.signs.len() != node.inputs.len() {
                    return Err(self.validation_err(
                        key,
                        format!("{} signs for {} inputs", s.signs.len(), node.inputs.len()),
                    ));
                }
            }
            NodeKind::Product(p) => {
                if node.inputs.len() < 2 {
                    return Err(self.validation_err(key, "Product requires at least 2 inputs"));
                }
                if p.ops.len() != node.inputs.len() {
                    return Err(self.validation_err(
                        key,
                        format!("{} ops for {} inputs", p.ops.len(), node.inputs.len()),
                    ));
                }
            }
            NodeKind::Compare(_) => {
                if node.inputs.len() != 2 {
                    return Err(self.validation_err(key, "Compare requires exactly 2 inputs"));
                }
            }
            NodeKind::Delay(d) => {
                self.validate_delay(key, d)?;
            }
            NodeKind::TappedDelay(t) => {
                if t.delay.delay == 0 && !t.include_current {
                    return Err(self.validation_err(key, "TappedDelay exposes zero samples"));
                }
                self.validate_delay(key, &t.delay)?;
            }
            NodeKind::Lut(l) => {
                if l.breakpoints.len() < 2 {
                    return Err(self.validation_err(key, "LUT requires at least 2 breakpoints"));
                }
                if l.table.len() != l.breakpoints.len() {
                    return Err(self.validation_err(
                        key,
                        format!(
                            "table has {} entries for {} breakpoints",
                            l.table.len(),
                            l.breakpoints.len()
                        ),
                    ));
                }
                if l.max_spacing_error() > 1e-9 {
                    return Err(self.validation_err(key, "LUT breakpoints are not evenly spaced"));
                }
                // Integer inputs constrain the step per the index computation
                // rules: integral step >= 1, or a step whose reciprocal is
                // integral.
                if let Some(arc) = self.input_arc(key, 0) {
                    let ty = &self.arc(arc).data_type;
                    if !ty.is_floating_pt() {
                        let s = l.step();
                        let integral_step = s >= 1.0 && s.fract() == 0.0;
                        let integral_recip = s > 0.0 && s < 1.0 && (1.0 / s).fract() == 0.0;
                        if !integral_step && !integral_recip {
                            return Err(self.validation_err(
                                key,
                                format!("LUT step {s} unusable with integer input"),
                            ));
                        }
                    }
                }
            }
            NodeKind::Mux(m) => {
                if m.num_data_inputs < 2 {
                    return Err(self.validation_err(key, "Mux requires at least 2 data inputs"));
                }
                if node.inputs.len() != m.num_data_inputs + 1 {
                    return Err(self.validation_err(
                        key,
                        format!(
                            "Mux has {} ports, expected selector plus {} data inputs",
                            node.inputs.len(),
                            m.num_data_inputs
                        ),
                    ));
                }
            }
            NodeKind::Fifo(f) => {
                if f.ports.is_empty() {
                    return Err(self.validation_err(key, "FIFO has no port pairs"));
                }
                if node.inputs.len() != f.ports.len() || node.outputs.len() != f.ports.len() {
                    return Err(self.validation_err(
                        key,
                        format!(
                            "FIFO port bookkeeping mismatch: {} pairs, {} inputs, {} outputs",
                            f.ports.len(),
                            node.inputs.len(),
                            node.outputs.len()
                        ),
                    ));
                }
                if f.length_blocks == 0 {
                    return Err(self.validation_err(key, "FIFO length must be at least 1 block"));
                }
            }
            NodeKind::Master(m) => {
                if m.role() == MasterRole::Input
                    && node.inputs.iter().any(|p| p.degree() > 0)
                {
                    return Err(self.validation_err(key, "input master cannot have input arcs"));
                }
            }
            NodeKind::BlackBox(b) => {
                if b.call_name.is_empty() {
                    return Err(self.validation_err(key, "BlackBox has no call name"));
                }
            }
            NodeKind::StateUpdate(su) => {
                if !self.contains_node(su.primary) {
                    return Err(self.validation_err(key, "StateUpdate primary node was removed"));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn validate_delay(&self, key: NodeKey, d: &crate::kind::Delay) -> Result<()> {
        if d.delay == 0 {
            if !d.init_conditions.is_empty() {
                return Err(self.validation_err(key, "zero-delay with initial conditions"));
            }
            return Ok(());
        }
        let elements = self
            .input_arc(key, 0)
            .map(|a| self.arc(a).data_type.num_elements())
            .unwrap_or(1);
        let n = d.init_conditions.len();
        if n != d.delay && n != d.delay * elements && n != 1 {
            return Err(self.validation_err(
                key,
                format!(
                    "delay {} with {} initial conditions ({} elements per sample)",
                    d.delay, n, elements
                ),
            ));
        }
        Ok(())
    }
}
