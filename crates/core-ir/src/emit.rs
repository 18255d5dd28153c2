//! Per-node emission hooks.
//!
//! The emitters walk the scheduled graph and ask each node for (a) an r-value
//! expression for one output port, (b) the statements computing its next
//! state, and (c) the statements committing that state.  Statements are
//! appended to a [`CodeQueue`]; expression results are cached per pass in an
//! [`EmitState`] so fan-out reuses temporaries and per-node artifacts (the
//! LUT index variable) are emitted exactly once.

use ahash::{AHashMap, AHashSet};

use core_types::{DataType, Variable};

use crate::design::Design;
use crate::error::{CompileError, Result};
use crate::kind::{DelayBuffer, ExtrapMethod, InterpMethod, NodeKind};
use crate::node::NodeKey;

/// Ordered list of emitted C statements.
#[derive(Debug, Default, Clone)]
pub struct CodeQueue {
    lines: Vec<String>,
}

impl CodeQueue {
    pub fn new() -> CodeQueue {
        CodeQueue::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    pub fn extend(&mut self, other: CodeQueue) {
        self.lines.extend(other.lines);
    }
}

/// Per-pass emission state.
#[derive(Debug, Default)]
pub struct EmitState {
    /// Materialized output expressions: (node, port, imag) -> temp name.
    expr_cache: AHashMap<(NodeKey, u32, bool), String>,
    /// LUT index variables already emitted this pass.
    emitted_lut_index: AHashSet<NodeKey>,
    /// Index expression for the current element when emitting inside a
    /// block/sub-block loop (e.g. `"blkInd"`).
    pub element_index: Option<String>,
}

impl EmitState {
    pub fn new() -> EmitState {
        EmitState::default()
    }

    pub fn cached(&self, key: NodeKey, port: u32, imag: bool) -> Option<&String> {
        self.expr_cache.get(&(key, port, imag))
    }

    pub fn cache(&mut self, key: NodeKey, port: u32, imag: bool, expr: String) {
        self.expr_cache.insert((key, port, imag), expr);
    }
}

/// C identifier for a node: sanitized instance name plus the public ID.
pub fn node_ident(design: &Design, key: NodeKey) -> String {
    let node = design.node(key);
    let mut name: String = node
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() || name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        name.insert(0, 'v');
    }
    format!("{name}_n{}", node.id.max(0))
}

impl Design {
    /// Type of an output port, taken from its first arc.
    pub fn output_type(&self, key: NodeKey, port: u32) -> DataType {
        self.node(key)
            .outputs
            .get(port as usize)
            .and_then(|p| p.arcs.first())
            .map(|a| self.arc(*a).data_type.clone())
            .unwrap_or_default()
    }

    /// Type of an input port, taken from its driving arc.
    pub fn input_type(&self, key: NodeKey, port: u32) -> DataType {
        self.input_arc(key, port)
            .map(|a| self.arc(a).data_type.clone())
            .unwrap_or_default()
    }

    /// Emit the expression for one input port by following its driving arc.
    ///
    /// Fan-out from the driver is materialized into a temporary the first
    /// time it is requested; later requests reuse the cached name.
    pub fn input_expression(
        &self,
        key: NodeKey,
        port: u32,
        imag: bool,
        q: &mut CodeQueue,
        st: &mut EmitState,
    ) -> Result<String> {
        let arc_key = self.input_arc(key, port).ok_or_else(|| {
            CompileError::Transform(format!(
                "`{}` input port {port} is unconnected at emit time",
                self.qualified_name(key)
            ))
        })?;
        let arc = self.arc(arc_key);
        let (src, src_port) = (arc.src.node, arc.src.number);

        if let Some(cached) = st.cached(src, src_port, imag) {
            return Ok(cached.clone());
        }

        let expr = self.emit_value_expression(src, src_port, imag, q, st)?;

        // Fan-out: materialize once so downstream consumers share the temp.
        let fanout = self
            .node(src)
            .outputs
            .get(src_port as usize)
            .map(|p| p.degree())
            .unwrap_or(0);
        if fanout > 1 && !self.expression_is_trivial(&expr) {
            let ty = arc.data_type.clone();
            let name = format!("{}_out{}{}", node_ident(self, src), src_port, if imag { "_im" } else { "" });
            q.push(format!("{} {} = {};", ty.to_scalar().c_storage_type(), name, expr));
            st.cache(src, src_port, imag, name.clone());
            return Ok(name);
        }
        Ok(expr)
    }

    fn expression_is_trivial(&self, expr: &str) -> bool {
        expr.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '[' || c == ']')
    }

    /// Emit the r-value expression for `key`'s output `port`.
    ///
    /// Statements the expression depends on (operand temporaries, LUT index
    /// variables) are appended to `q`; the returned string is a pure r-value.
    pub fn emit_value_expression(
        &self,
        key: NodeKey,
        port: u32,
        imag: bool,
        q: &mut CodeQueue,
        st: &mut EmitState,
    ) -> Result<String> {
        if let Some(cached) = st.cached(key, port, imag) {
            return Ok(cached.clone());
        }
        let node = self.node(key);
        let ident = node_ident(self, key);
        match &node.kind {
            NodeKind::Master(m) => {
                let name = m
                    .port_name(port as usize)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("in_port{port}"));
                let name = if imag { format!("{name}_im") } else { name };
                Ok(self.indexed(name, self.output_type(key, port), st))
            }
            NodeKind::Constant(c) => {
                if c.values.len() == 1 {
                    Ok(c.values[0].c_literal(&c.data_type, imag))
                } else {
                    Ok(self.indexed(
                        format!("{ident}_table{}", if imag { "_im" } else { "" }),
                        self.output_type(key, port),
                        st,
                    ))
                }
            }
            NodeKind::Sum(s) => {
                let mut expr = String::from("(");
                for (i, positive) in s.signs.iter().enumerate() {
                    let operand = self.input_expression(key, i as u32, imag, q, st)?;
                    if i == 0 && *positive {
                        expr.push_str(&operand);
                    } else {
                        expr.push_str(if *positive { " + " } else { " - " });
                        expr.push_str(&operand);
                    }
                }
                expr.push(')');
                Ok(expr)
            }
            NodeKind::Product(p) => {
                let mut expr = String::from("(");
                for (i, mult) in p.ops.iter().enumerate() {
                    let operand = self.input_expression(key, i as u32, imag, q, st)?;
                    if i == 0 && *mult {
                        expr.push_str(&operand);
                    } else {
                        expr.push_str(if *mult { " * " } else { " / " });
                        expr.push_str(&operand);
                    }
                }
                expr.push(')');
                Ok(expr)
            }
            NodeKind::Gain(g) => {
                // Normally expanded before emit; kept for the unexpanded path.
                let operand = self.input_expression(key, 0, imag, q, st)?;
                let ty = self.output_type(key, port);
                let lit = g.gain.first().copied().unwrap_or(core_types::NumericValue::Int(1));
                Ok(format!("({operand} * {})", lit.c_literal(&ty, imag)))
            }
            NodeKind::Compare(c) => {
                let lhs = self.input_expression(key, 0, imag, q, st)?;
                let rhs = self.input_expression(key, 1, imag, q, st)?;
                Ok(format!("({lhs} {} {rhs})", c.op.c_op()))
            }
            NodeKind::Mux(m) => {
                let sel = self.input_expression(key, crate::kind::Mux::SELECT_PORT, false, q, st)?;
                let mut expr = String::new();
                let mut depth = 0;
                for i in 0..m.num_data_inputs {
                    let data = self.input_expression(key, crate::kind::Mux::data_port(i), imag, q, st)?;
                    if i + 1 == m.num_data_inputs {
                        expr.push_str(&data);
                    } else {
                        expr.push_str(&format!("(({sel}) == {i} ? {data} : "));
                        depth += 1;
                    }
                }
                expr.push_str(&")".repeat(depth));
                Ok(expr)
            }
            NodeKind::Lut(_) => self.emit_lut_expression(key, imag, q, st),
            NodeKind::Delay(d) => {
                if d.delay == 0 {
                    return self.input_expression(key, 0, imag, q, st);
                }
                Ok(self.delay_read_expr(key, d, imag))
            }
            NodeKind::TappedDelay(t) => {
                let elements = self.input_type(key, 0).num_elements();
                match t.delay.resolved_buffer(elements) {
                    DelayBuffer::CircularBuffer => {
                        Ok(format!("{ident}_tapScratch{}", if imag { "_im" } else { "" }))
                    }
                    _ => Ok(format!("{ident}_state{}", if imag { "_im" } else { "" })),
                }
            }
            NodeKind::EnableInput(_) | NodeKind::RateChange(_) => {
                self.input_expression(key, 0, imag, q, st)
            }
            NodeKind::EnableOutput(_) => {
                Ok(format!("{ident}_latch{}", if imag { "_im" } else { "" }))
            }
            // Blocking boundaries are pure pass-throughs at expression level;
            // the blocked-side source already indexes by the current element.
            NodeKind::BlockingInput(_) | NodeKind::BlockingOutput(_) => {
                self.input_expression(key, 0, imag, q, st)
            }
            NodeKind::TickCounter(_) => Ok(format!("({ident}_count == 0)")),
            NodeKind::Fifo(_) => {
                // Read buffers hold one block; index by the current element.
                let name = format!("{ident}_readBuf_p{port}{}", if imag { "_im" } else { "" });
                match &st.element_index {
                    Some(idx) => Ok(format!("{name}[{idx}]")),
                    None => Ok(format!("{name}[0]")),
                }
            }
            NodeKind::BlackBox(b) => {
                let mut args = Vec::new();
                for i in 0..node.inputs.len() {
                    args.push(self.input_expression(key, i as u32, imag, q, st)?);
                }
                Ok(format!("{}({})", b.call_name, args.join(", ")))
            }
            NodeKind::Subsystem(_)
            | NodeKind::Expanded(_)
            | NodeKind::EnabledSubsystem(_)
            | NodeKind::ClockDomain(_)
            | NodeKind::BlockingDomain(_)
            | NodeKind::ContextFamilyContainer(_)
            | NodeKind::ContextContainer(_)
            | NodeKind::ContextVariableUpdate(_)
            | NodeKind::StateUpdate(_) => Err(CompileError::Transform(format!(
                "`{}` ({}) has no value expression",
                self.qualified_name(key),
                node.kind.tag()
            ))),
        }
    }

    fn indexed(&self, name: String, ty: DataType, st: &EmitState) -> String {
        match (&st.element_index, ty.is_vector()) {
            (Some(idx), true) => format!("{name}[{idx}]"),
            _ => name,
        }
    }

    // ---- Delay -----------------------------------------------------------

    fn delay_buffer_geometry(&self, key: NodeKey, d: &crate::kind::Delay) -> (DelayBuffer, usize) {
        let elements = self.input_type(key, 0).num_elements();
        (d.resolved_buffer(elements), d.buffer_len(elements))
    }

    fn wrap_expr(&self, d: &crate::kind::Delay, len: usize, expr: String) -> String {
        if d.round_circular_to_pow2 && len.is_power_of_two() {
            format!("(({expr}) & {})", len - 1)
        } else {
            format!("(({expr}) % {len})")
        }
    }

    fn delay_read_expr(&self, key: NodeKey, d: &crate::kind::Delay, imag: bool) -> String {
        let ident = node_ident(self, key);
        let im = if imag { "_im" } else { "" };
        let (buffer, len) = self.delay_buffer_geometry(key, d);
        match buffer {
            DelayBuffer::CircularBuffer => {
                let head = format!("{ident}_cbHead");
                let pos = if d.earliest_first {
                    self.wrap_expr(d, len, format!("{head} + {}", d.delay - 1))
                } else {
                    head
                };
                format!("{ident}_state{im}[{pos}]")
            }
            _ => {
                if d.delay == 1 && self.input_type(key, 0).is_scalar() && !d.allocate_extra_space {
                    format!("{ident}_state{im}")
                } else if d.earliest_first {
                    format!("{ident}_state{im}[{}]", d.delay - 1 + usize::from(d.allocate_extra_space))
                } else {
                    format!("{ident}_state{im}[0]")
                }
            }
        }
    }

    /// Emit the next-state computation for a stateful node.
    pub fn emit_next_state(&self, key: NodeKey, q: &mut CodeQueue, st: &mut EmitState) -> Result<()> {
        let node = self.node(key);
        let ident = node_ident(self, key);
        let complex = self.input_type(key, 0).is_complex();
        let parts: &[bool] = if complex { &[false, true] } else { &[false] };
        match &node.kind {
            NodeKind::Delay(d) => {
                if d.delay == 0 {
                    return Ok(());
                }
                for &imag in parts {
                    let input = self.input_expression(key, 0, imag, q, st)?;
                    let im = if imag { "_im" } else { "" };
                    q.push(format!("{ident}_nextState{im} = {input};"));
                    if d.allocate_extra_space {
                        let slot = self.current_slot_expr(key, d);
                        q.push(format!("{ident}_state{im}[{slot}] = {input};"));
                    }
                }
                Ok(())
            }
            NodeKind::TappedDelay(t) => {
                let d = &t.delay;
                for &imag in parts {
                    let input = self.input_expression(key, 0, imag, q, st)?;
                    let im = if imag { "_im" } else { "" };
                    if d.delay > 0 {
                        q.push(format!("{ident}_nextState{im} = {input};"));
                    }
                    if t.include_current {
                        let slot = self.current_slot_expr(key, d);
                        q.push(format!("{ident}_state{im}[{slot}] = {input};"));
                    }
                    // Circular buffers expose a linearized scratch copy.
                    let (buffer, len) = self.delay_buffer_geometry(key, d);
                    if buffer == DelayBuffer::CircularBuffer {
                        let exposed = t.exposed_len();
                        let start = if t.include_current {
                            self.current_slot_expr(key, d)
                        } else {
                            format!("{ident}_cbHead")
                        };
                        q.push(format!(
                            "for (uint64_t k = 0; k < {exposed}; k++) {{ {ident}_tapScratch{im}[k] = \
                             {ident}_state{im}[{}]; }}",
                            self.wrap_expr(d, len, format!("{start} + k"))
                        ));
                    }
                }
                Ok(())
            }
            NodeKind::EnableOutput(_) => {
                for &imag in parts {
                    let input = self.input_expression(key, 0, imag, q, st)?;
                    let im = if imag { "_im" } else { "" };
                    q.push(format!("{ident}_latch{im} = {input};"));
                }
                Ok(())
            }
            NodeKind::TickCounter(_) | NodeKind::Lut(_) | NodeKind::BlackBox(_) | NodeKind::Fifo(_) => {
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Index of the extra "current input" slot, honoring the direction flag.
    fn current_slot_expr(&self, key: NodeKey, d: &crate::kind::Delay) -> String {
        let ident = node_ident(self, key);
        let (buffer, len) = self.delay_buffer_geometry(key, d);
        match buffer {
            DelayBuffer::CircularBuffer => {
                let head = format!("{ident}_cbHead");
                if d.earliest_first {
                    self.wrap_expr(d, len, format!("{head} + {len} - 1"))
                } else {
                    self.wrap_expr(d, len, format!("{head} + {}", d.delay))
                }
            }
            _ => {
                if d.earliest_first {
                    "0".to_string()
                } else {
                    format!("{}", d.delay)
                }
            }
        }
    }

    /// Emit the state-update statements for a stateful node.  `_state_src`
    /// is the StateUpdate node requesting the commit.
    pub fn emit_state_update(
        &self,
        key: NodeKey,
        _state_src: Option<NodeKey>,
        q: &mut CodeQueue,
        _st: &mut EmitState,
    ) -> Result<()> {
        let node = self.node(key);
        let ident = node_ident(self, key);
        let complex = self.input_type(key, 0).is_complex();
        let parts: &[bool] = if complex { &[false, true] } else { &[false] };
        match &node.kind {
            NodeKind::Delay(d) => {
                self.emit_delay_update(key, d, parts, q);
                Ok(())
            }
            NodeKind::TappedDelay(t) => {
                if t.delay.delay > 0 {
                    self.emit_delay_update(key, &t.delay, parts, q);
                }
                Ok(())
            }
            NodeKind::TickCounter(tc) => {
                q.push(format!("{ident}_count = ({ident}_count + 1) % {};", tc.period));
                Ok(())
            }
            // EnableOutput latches directly in its next-state computation.
            NodeKind::EnableOutput(_) | NodeKind::Lut(_) | NodeKind::BlackBox(_) => Ok(()),
            _ => Ok(()),
        }
    }

    fn emit_delay_update(&self, key: NodeKey, d: &crate::kind::Delay, parts: &[bool], q: &mut CodeQueue) {
        if d.delay == 0 {
            return;
        }
        let ident = node_ident(self, key);
        let (buffer, len) = self.delay_buffer_geometry(key, d);
        match buffer {
            DelayBuffer::CircularBuffer => {
                let head = format!("{ident}_cbHead");
                if d.earliest_first {
                    // Head moves toward the newest slot, then takes the value.
                    q.push(format!("{head} = {};", self.wrap_expr(d, len, format!("{head} + {len} - 1"))));
                    for &imag in parts {
                        let im = if imag { "_im" } else { "" };
                        q.push(format!("{ident}_state{im}[{head}] = {ident}_nextState{im};"));
                    }
                } else {
                    for &imag in parts {
                        let im = if imag { "_im" } else { "" };
                        let write = self.wrap_expr(d, len, format!("{head} + {}", d.delay));
                        q.push(format!("{ident}_state{im}[{write}] = {ident}_nextState{im};"));
                    }
                    q.push(format!("{head} = {};", self.wrap_expr(d, len, format!("{head} + 1"))));
                }
            }
            _ => {
                let scalar = d.delay == 1
                    && self.input_type(key, 0).is_scalar()
                    && !d.allocate_extra_space;
                for &imag in parts {
                    let im = if imag { "_im" } else { "" };
                    if scalar {
                        q.push(format!("{ident}_state{im} = {ident}_nextState{im};"));
                    } else if d.earliest_first {
                        let base = usize::from(d.allocate_extra_space);
                        q.push(format!(
                            "for (uint64_t k = {}; k > {base}; k--) {{ {ident}_state{im}[k] = \
                             {ident}_state{im}[k - 1]; }}",
                            d.delay - 1 + base
                        ));
                        q.push(format!("{ident}_state{im}[{base}] = {ident}_nextState{im};"));
                    } else {
                        q.push(format!(
                            "for (uint64_t k = 0; k + 1 < {}; k++) {{ {ident}_state{im}[k] = \
                             {ident}_state{im}[k + 1]; }}",
                            d.delay
                        ));
                        q.push(format!("{ident}_state{im}[{}] = {ident}_nextState{im};", d.delay - 1));
                    }
                }
            }
        }
    }

    // ---- LUT -------------------------------------------------------------

    fn emit_lut_expression(
        &self,
        key: NodeKey,
        imag: bool,
        q: &mut CodeQueue,
        st: &mut EmitState,
    ) -> Result<String> {
        let NodeKind::Lut(l) = &self.node(key).kind else { unreachable!() };
        let ident = node_ident(self, key);
        let idx = format!("{ident}_idx");

        if !st.emitted_lut_index.contains(&key) {
            st.emitted_lut_index.insert(key);
            let x = self.input_expression(key, 0, false, q, st)?;
            let in_ty = self.input_type(key, 0);
            let b0 = l.first_breakpoint();
            let s = l.step();
            let m = l.breakpoints.len();

            let raw = if in_ty.is_floating_pt() {
                let bias = match l.interp {
                    InterpMethod::Nearest => 0.5,
                    _ => 0.0,
                };
                if bias != 0.0 {
                    format!("(int64_t) ((({x}) - ({b0}))/{s} + {bias})")
                } else {
                    format!("(int64_t) ((({x}) - ({b0}))/{s})")
                }
            } else if s >= 1.0 {
                // Integer input with integral step.
                let s_int = s as i64;
                let nudge = if matches!(l.interp, InterpMethod::Nearest) { s_int / 2 } else { 0 };
                if nudge != 0 {
                    format!("((({x}) - ({}) + {nudge}) / {s_int})", b0 as i64)
                } else {
                    format!("((({x}) - ({})) / {s_int})", b0 as i64)
                }
            } else {
                // Integer input with integral reciprocal step.
                let recip = (1.0 / s) as i64;
                format!("((({x}) - ({})) * {recip})", b0 as i64)
            };

            match l.extrap {
                ExtrapMethod::Clip => {
                    let last = b0 + s * (m as f64 - 1.0);
                    let (b0_lit, last_lit) = if in_ty.is_floating_pt() {
                        (format!("{b0}"), format!("{last}"))
                    } else {
                        (format!("{}", b0 as i64), format!("{}", last as i64))
                    };
                    q.push(format!("int64_t {idx};"));
                    q.push(format!(
                        "if (({x}) <= ({b0_lit})) {{ {idx} = 0; }} else if (({x}) >= ({last_lit})) \
                         {{ {idx} = {}; }} else {{ {idx} = {raw}; }}",
                        m - 1
                    ));
                }
                _ => {
                    q.push(format!("int64_t {idx} = {raw};"));
                }
            }

            if l.search.has_memory() {
                q.push(format!("{ident}_lastIdx = {idx};"));
            }
        }

        let table = format!("{ident}_table{}", if imag { "_im" } else { "" });
        Ok(format!("{table}[{idx}]"))
    }

    // ---- State variables and global declarations -------------------------

    /// Variables holding this node's state across cycles.
    pub fn state_variables(&self, key: NodeKey) -> Vec<Variable> {
        let node = self.node(key);
        let ident = node_ident(self, key);
        match &node.kind {
            NodeKind::Delay(d) => self.delay_state_variables(key, d, &ident, false),
            NodeKind::TappedDelay(t) => {
                let mut vars = self.delay_state_variables(key, &t.delay, &ident, true);
                let elements = self.input_type(key, 0).num_elements();
                if t.delay.resolved_buffer(elements) == DelayBuffer::CircularBuffer {
                    let mut ty = self.input_type(key, 0).to_scalar();
                    ty.set_dimensions(vec![t.exposed_len().max(1)]);
                    vars.push(Variable::new(format!("{ident}_tapScratch"), ty));
                }
                vars
            }
            NodeKind::EnableOutput(_) => {
                let ty = self.input_type(key, 0);
                vec![Variable::new(format!("{ident}_latch"), ty)]
            }
            NodeKind::TickCounter(_) => {
                let ty = DataType::new(false, false, false, 64, 0, vec![1]);
                vec![Variable::with_init(
                    format!("{ident}_count"),
                    ty,
                    vec![core_types::NumericValue::Int(0)],
                )]
            }
            NodeKind::Lut(l) if l.search.has_memory() => {
                let ty = DataType::new(false, false, false, 64, 0, vec![1]);
                vec![Variable::with_init(
                    format!("{ident}_lastIdx"),
                    ty,
                    vec![core_types::NumericValue::Int(0)],
                )]
            }
            _ => Vec::new(),
        }
    }

    fn delay_state_variables(
        &self,
        key: NodeKey,
        d: &crate::kind::Delay,
        ident: &str,
        _tapped: bool,
    ) -> Vec<Variable> {
        if d.delay == 0 && !d.allocate_extra_space {
            return Vec::new();
        }
        let in_ty = self.input_type(key, 0);
        let elements = in_ty.num_elements();
        let (buffer, len) = self.delay_buffer_geometry(key, d);
        let mut vars = Vec::new();

        let mut state_ty = in_ty.to_scalar();
        let scalar_state = len == 1 && elements == 1;
        if !scalar_state {
            state_ty.set_dimensions(vec![len * elements]);
        }
        // Pad the initial conditions out to the allocated buffer (power-of-two
        // rounding and the extra slot read as zero until first written).
        let mut init = d.init_conditions.clone();
        if init.len() == 1 && d.delay * elements > 1 {
            init = vec![init[0]; d.delay * elements];
        }
        init.resize(len * elements, core_types::NumericValue::Int(0));
        vars.push(Variable::with_init(format!("{ident}_state"), state_ty, init));

        if d.delay > 0 {
            vars.push(Variable::new(format!("{ident}_nextState"), in_ty.to_scalar()));
        }
        if buffer == DelayBuffer::CircularBuffer {
            let ty = DataType::new(false, false, false, 64, 0, vec![1]);
            vars.push(Variable::with_init(
                format!("{ident}_cbHead"),
                ty,
                vec![core_types::NumericValue::Int(0)],
            ));
        }
        vars
    }

    /// File-scope declaration text for nodes with global declarations.
    pub fn global_decl_text(&self, key: NodeKey) -> Option<String> {
        let node = self.node(key);
        let ident = node_ident(self, key);
        match &node.kind {
            NodeKind::Lut(l) => {
                let out_ty = self.output_type(key, 0).to_scalar();
                let ctype = out_ty.c_storage_type();
                let vals: Vec<String> =
                    l.table.iter().map(|v| v.c_literal(&out_ty, false)).collect();
                let mut text = format!(
                    "static const {ctype} {ident}_table[{}] = {{{}}};",
                    l.table.len(),
                    vals.join(", ")
                );
                if out_ty.is_complex() || l.table.iter().any(|v| v.is_complex()) {
                    let ivals: Vec<String> =
                        l.table.iter().map(|v| v.c_literal(&out_ty, true)).collect();
                    text.push_str(&format!(
                        "\nstatic const {ctype} {ident}_table_im[{}] = {{{}}};",
                        l.table.len(),
                        ivals.join(", ")
                    ));
                }
                Some(text)
            }
            NodeKind::Constant(c) if c.values.len() > 1 => {
                let ctype = c.data_type.to_scalar().c_storage_type();
                let vals: Vec<String> =
                    c.values.iter().map(|v| v.c_literal(&c.data_type, false)).collect();
                Some(format!(
                    "static const {ctype} {ident}_table[{}] = {{{}}};",
                    c.values.len(),
                    vals.join(", ")
                ))
            }
            NodeKind::BlackBox(b) => Some(b.body.clone()),
            _ => None,
        }
    }
}
