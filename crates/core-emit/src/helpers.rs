//! Shared emission machinery: scheduled-body emission with context guards.

use core_ir::{
    node_ident, CodeQueue, CompileError, Context, Design, EmitState, NodeKey, NodeKind, Result,
};
use core_types::DataType;

/// One emitted artifact (name + content), before it reaches the sink.
#[derive(Debug, Clone)]
pub struct EmittedFile {
    pub name: String,
    pub content: String,
}

/// Scheduled nodes of a partition in order; negative partitions allowed.
pub fn scheduled_nodes(design: &Design, partition: Option<i32>) -> Vec<NodeKey> {
    let mut nodes: Vec<NodeKey> = design
        .node_keys()
        .into_iter()
        .filter(|k| {
            let n = design.node(*k);
            n.is_scheduled()
                && !n.is_subsystem_like()
                && partition.is_none_or(|p| n.partition == p)
        })
        .collect();
    nodes.sort_by_key(|k| design.node(*k).sched_order);
    nodes
}

/// Decision expression guarding one context level, or `None` for contexts
/// that emit as loops/transparently (blocking domains).
fn context_guard_expr(
    design: &Design,
    ctx: &Context,
    partition: i32,
    q: &mut CodeQueue,
    st: &mut EmitState,
) -> Result<Option<String>> {
    let root = design.node(ctx.root);
    match &root.kind {
        NodeKind::EnabledSubsystem(es) => {
            // Prefer a driver replicated into this partition.
            let driver = es
                .partition_drivers
                .iter()
                .find(|(p, _)| *p == partition)
                .map(|(_, d)| *d)
                .or_else(|| {
                    root.enable_port
                        .as_ref()
                        .and_then(|p| p.arcs.first())
                        .map(|a| design.arc(*a).src.node)
                });
            match driver {
                Some(d) => {
                    let expr = design.emit_value_expression(d, 0, false, q, st)?;
                    Ok(Some(expr))
                }
                None => Err(CompileError::Transform(format!(
                    "enabled subsystem `{}` has no enable driver at emit time",
                    design.qualified_name(ctx.root)
                ))),
            }
        }
        NodeKind::Mux(_) => {
            let sel =
                design.input_expression(ctx.root, core_ir::Mux::SELECT_PORT, false, q, st)?;
            Ok(Some(format!("({sel}) == {}", ctx.sub_context)))
        }
        NodeKind::ClockDomain(cd) => {
            let driver = cd
                .partition_drivers
                .iter()
                .find(|(p, _)| *p == partition)
                .map(|(_, d)| *d)
                .or(cd.counter_driver);
            match driver {
                Some(d) => {
                    let expr = design.emit_value_expression(d, 0, false, q, st)?;
                    Ok(Some(expr))
                }
                // Upsample domains iterate rather than gate.
                None => Ok(None),
            }
        }
        NodeKind::BlockingDomain(b) if !b.global => match &st.element_index {
            Some(idx) => Ok(Some(format!("(({idx}) % {}) == 0", b.blocking_len.max(1)))),
            None => Ok(None),
        },
        _ => Ok(None),
    }
}

fn declare_default(ty: &DataType, name: &str) -> String {
    format!("{} {name} = 0;", ty.to_scalar().c_storage_type())
}

/// Emit the statements for a partition's scheduled nodes, opening and
/// closing context guards as the stack changes between consecutive nodes.
///
/// Every producing node is materialized into a temporary at its scheduled
/// position; temporaries for nodes inside contexts are declared into
/// `prelude` so they stay in scope outside the guard braces.
pub fn emit_partition_body(
    design: &Design,
    nodes: &[NodeKey],
    partition: i32,
    guards_enabled: bool,
    prelude: &mut CodeQueue,
    body: &mut CodeQueue,
    st: &mut EmitState,
) -> Result<()> {
    let mut open: Vec<Context> = Vec::new();

    for &key in nodes {
        let node = design.node(key);
        let target: Vec<Context> = if guards_enabled {
            node.contexts
                .iter()
                .copied()
                .filter(|c| guarded_context(design, c))
                .collect()
        } else {
            Vec::new()
        };

        // Close guards no longer in force.
        while !core_ir::is_prefix(&open, &target) {
            body.push("}");
            open.pop();
        }

        // Declarations that must outlive the guard braces.
        let in_context = !target.is_empty();
        let mut outputs: Vec<(u32, DataType)> = Vec::new();
        for port in &node.outputs {
            if port.arcs.is_empty() {
                continue;
            }
            let ty = design.output_type(key, port.number);
            outputs.push((port.number, ty));
        }
        if emits_value(design, key) && in_context {
            for (port, ty) in &outputs {
                prelude.push(declare_default(ty, &temp_name(design, key, *port, false)));
                if ty.is_complex() {
                    prelude.push(declare_default(ty, &temp_name(design, key, *port, true)));
                }
            }
        }

        // Open newly entered guards.
        for ctx in &target[open.len()..] {
            if let Some(cond) = context_guard_expr(design, ctx, partition, body, st)? {
                body.push(format!("if ({cond}) {{"));
            } else {
                body.push("{".to_string());
            }
            open.push(*ctx);
        }

        emit_node_statements(design, key, in_context, &outputs, body, st)?;
    }

    while open.pop().is_some() {
        body.push("}");
    }
    Ok(())
}

fn guarded_context(design: &Design, ctx: &Context) -> bool {
    match &design.node(ctx.root).kind {
        NodeKind::BlockingDomain(b) => !b.global,
        _ => true,
    }
}

fn temp_name(design: &Design, key: NodeKey, port: u32, imag: bool) -> String {
    format!("{}_v{}{}", node_ident(design, key), port, if imag { "_im" } else { "" })
}

/// True for nodes whose outputs are materialized into temporaries at their
/// scheduled position.
fn emits_value(design: &Design, key: NodeKey) -> bool {
    let node = design.node(key);
    if node.is_master() || node.has_state() {
        return false;
    }
    !matches!(
        node.kind,
        NodeKind::Constant(_)
            | NodeKind::StateUpdate(_)
            | NodeKind::ContextVariableUpdate(_)
            | NodeKind::BlockingInput(_)
            | NodeKind::BlockingOutput(_)
            | NodeKind::EnableInput(_)
            | NodeKind::RateChange(_)
    )
}

fn emit_node_statements(
    design: &Design,
    key: NodeKey,
    in_context: bool,
    outputs: &[(u32, DataType)],
    body: &mut CodeQueue,
    st: &mut EmitState,
) -> Result<()> {
    let node = design.node(key);
    match &node.kind {
        NodeKind::StateUpdate(su) => {
            design.emit_state_update(su.primary, Some(key), body, st)?;
        }
        NodeKind::ContextVariableUpdate(cv) => {
            let sel =
                design.input_expression(cv.context_root, core_ir::Mux::SELECT_PORT, false, body, st)?;
            body.push(format!("{} = {sel};", cv.decision_var.c_name(false)));
        }
        NodeKind::Master(_) => {
            if key == design.output_master() {
                for port in &design.node(key).inputs {
                    let Some(&arc) = port.arcs.first() else { continue };
                    let arc = design.arc(arc);
                    let out_name = match &design.node(key).kind {
                        NodeKind::Master(m) => m
                            .port_name(port.number as usize)
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| format!("out_port{}", port.number)),
                        _ => unreachable!(),
                    };
                    let parts: &[bool] =
                        if arc.data_type.is_complex() { &[false, true] } else { &[false] };
                    for &imag in parts {
                        let expr =
                            design.input_expression(key, port.number, imag, body, st)?;
                        let name = if imag { format!("{out_name}_im") } else { out_name.clone() };
                        match &st.element_index {
                            Some(idx) if arc.data_type.is_vector() => {
                                body.push(format!("{name}[{idx}] = {expr};"));
                            }
                            _ => body.push(format!("*{name} = {expr};")),
                        }
                    }
                }
            }
        }
        NodeKind::Fifo(_) => {
            // Producer side: stage the current element into the write buffer.
            let ident = core_ir::node_ident(design, key);
            let idx = st.element_index.clone().unwrap_or_else(|| "0".to_string());
            for port_number in node.inputs.iter().filter(|p| !p.arcs.is_empty()).map(|p| p.number) {
                let ty = design.input_type(key, port_number);
                let parts: &[bool] = if ty.is_complex() { &[false, true] } else { &[false] };
                for &imag in parts {
                    let expr = design.input_expression(key, port_number, imag, body, st)?;
                    let im = if imag { "_im" } else { "" };
                    body.push(format!("{ident}_writeBuf_p{port_number}{im}[{idx}] = {expr};"));
                }
            }
        }
        _ if node.has_state() => {
            design.emit_next_state(key, body, st)?;
        }
        _ if emits_value(design, key) => {
            for (port, ty) in outputs {
                let parts: &[bool] = if ty.is_complex() { &[false, true] } else { &[false] };
                for &imag in parts {
                    let expr = design.emit_value_expression(key, *port, imag, body, st)?;
                    let name = temp_name(design, key, *port, imag);
                    if in_context {
                        body.push(format!("{name} = {expr};"));
                    } else {
                        body.push(format!("{} {name} = {expr};", ty.to_scalar().c_storage_type()));
                    }
                    st.cache(key, *port, imag, name);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// File-scope state declarations for the nodes of one partition.
pub fn state_declarations(design: &Design, nodes: &[NodeKey]) -> Vec<String> {
    let mut out = Vec::new();
    for &key in nodes {
        for var in design.state_variables(key) {
            out.push(format!("static {}", var.c_decl(false)));
            if var.data_type().is_complex() {
                out.push(format!("static {}", var.c_decl(true)));
            }
        }
    }
    out
}

/// File-scope global declarations (LUT tables, vector constants, black-box
/// bodies) for one partition's nodes.
pub fn global_declarations(design: &Design, nodes: &[NodeKey]) -> Vec<String> {
    let mut out = Vec::new();
    for &key in nodes {
        if design.node(key).has_global_decl()
            && let Some(text) = design.global_decl_text(key)
        {
            out.push(text);
        }
    }
    out
}

/// Render a statement queue with brace-driven indentation.
pub fn render(queue: &CodeQueue, base_indent: usize) -> String {
    let mut out = String::new();
    let mut level = base_indent;
    for line in queue.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('}') {
            level = level.saturating_sub(1);
        }
        for _ in 0..level {
            out.push_str("    ");
        }
        out.push_str(trimmed);
        out.push('\n');
        if trimmed.ends_with('{') {
            level += 1;
        }
    }
    out
}
