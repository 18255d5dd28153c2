//! Single-threaded reference emitter.
//!
//! Produces one flat compute function following the schedule, with three
//! traversal strategies: bottom-up from the outputs, topological, and
//! topological with context guards.  The single-threaded path exists to
//! validate the scheduler against a simpler baseline, so the strategies are
//! kept distinct rather than funneled through one code path.

use indexmap::IndexSet;
use tracing::info;

use core_ir::{CodeQueue, Design, EmitState, NodeKey, NodeKind, Result};
use core_sched::SchedStrategy;

use crate::files::FileSink;
use crate::helpers;

/// Emit `{name}.h` and `{name}.c` for the single-threaded path.  Returns the
/// emitted file names.
pub fn emit_single_threaded(
    design: &Design,
    name: &str,
    strategy: SchedStrategy,
    block_len: usize,
    sink: &FileSink,
) -> Result<Vec<String>> {
    let nodes = match strategy {
        SchedStrategy::BottomUp => bottom_up_order(design),
        _ => helpers::scheduled_nodes(design, None),
    };

    let mut prelude = CodeQueue::new();
    let mut body = CodeQueue::new();
    let mut st = EmitState::new();
    if block_len > 1 {
        st.element_index = Some("blkIdx".to_string());
    }

    helpers::emit_partition_body(
        design,
        &nodes,
        0,
        strategy.is_context_aware(),
        &mut prelude,
        &mut body,
        &mut st,
    )?;

    let signature = function_signature(design, name);
    let mut c = String::new();
    c.push_str(&format!("#include \"{name}.h\"\n\n"));
    for decl in helpers::global_declarations(design, &nodes) {
        c.push_str(&decl);
        c.push('\n');
    }
    c.push('\n');
    for decl in helpers::state_declarations(design, &nodes) {
        c.push_str(&decl);
        c.push('\n');
    }
    c.push('\n');
    c.push_str(&format!("{signature} {{\n"));
    c.push_str(&helpers::render(&prelude, 1));
    if block_len > 1 {
        c.push_str(&format!(
            "    for (uint64_t blkIdx = 0; blkIdx < {block_len}; blkIdx++) {{\n"
        ));
        c.push_str(&helpers::render(&body, 2));
        c.push_str("    }\n");
    } else {
        c.push_str(&helpers::render(&body, 1));
    }
    c.push_str("}\n");

    let header = format!(
        "#ifndef {guard}\n#define {guard}\n\n#include <stdint.h>\n#include <stdbool.h>\n\n{signature};\n\n#endif\n",
        guard = format!("{}_H", name.to_uppercase()),
    );

    let h_name = format!("{name}.h");
    let c_name = format!("{name}.c");
    sink.write(&h_name, &header)?;
    sink.write(&c_name, &c)?;
    info!(target: "emit.single", strategy = ?strategy, nodes = nodes.len(), "single_thread_emitted");
    Ok(vec![h_name, c_name])
}

/// C signature: design inputs as const parameters, outputs as pointers.
fn function_signature(design: &Design, name: &str) -> String {
    let mut params = Vec::new();
    let input = design.input_master();
    let input_node = design.node(input);
    for port in &input_node.outputs {
        if port.arcs.is_empty() {
            continue;
        }
        let ty = design.output_type(input, port.number);
        let pname = match &input_node.kind {
            NodeKind::Master(m) => m
                .port_name(port.number as usize)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("in_port{}", port.number)),
            _ => unreachable!(),
        };
        let ctype = ty.to_scalar().c_storage_type();
        if ty.is_vector() {
            params.push(format!("const {ctype} {pname}[{}]", ty.num_elements()));
        } else {
            params.push(format!("const {ctype} {pname}"));
        }
    }

    let output = design.output_master();
    let output_node = design.node(output);
    for port in &output_node.inputs {
        if port.arcs.is_empty() {
            continue;
        }
        let ty = design.input_type(output, port.number);
        let pname = match &output_node.kind {
            NodeKind::Master(m) => m
                .port_name(port.number as usize)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("out_port{}", port.number)),
            _ => unreachable!(),
        };
        let ctype = ty.to_scalar().c_storage_type();
        if ty.is_vector() {
            params.push(format!("{ctype} {pname}[{}]", ty.num_elements()));
        } else {
            params.push(format!("{ctype} *{pname}"));
        }
    }
    format!("void {name}_compute({})", params.join(", "))
}

/// Bottom-up order: post-order DFS backwards from the design outputs, with
/// stateful nodes acting as traversal boundaries; their next-state sections
/// and state updates follow at the end.
fn bottom_up_order(design: &Design) -> Vec<NodeKey> {
    let mut order = Vec::new();
    let mut visited: IndexSet<NodeKey> = IndexSet::new();

    // (node, expanded) post-order stack.
    let mut stack: Vec<(NodeKey, bool)> = vec![(design.output_master(), false)];
    while let Some((key, expanded)) = stack.pop() {
        if expanded {
            order.push(key);
            continue;
        }
        if !visited.insert(key) {
            continue;
        }
        stack.push((key, true));
        // Recurse into producers unless the producer holds state (its value
        // is this cycle's previous state, available without recursion).
        for arc in design.in_arcs(key) {
            let src = design.arc(arc).src.node;
            let src_node = design.node(src);
            if src_node.is_master()
                || src_node.has_state()
                || src_node.is_subsystem_like()
                || matches!(src_node.kind, NodeKind::Constant(_))
                || visited.contains(&src)
            {
                continue;
            }
            stack.push((src, false));
        }
    }

    // Next-state computations for every stateful node, then the updates.
    for key in design.nodes_with_state() {
        if matches!(design.node(key).kind, NodeKind::Fifo(_)) {
            continue;
        }
        // Pull in any combinational producers feeding the state input that
        // were not needed by the outputs.
        let mut pre = vec![key];
        let mut cursor = 0;
        while cursor < pre.len() {
            let current = pre[cursor];
            cursor += 1;
            for arc in design.in_arcs(current) {
                let src = design.arc(arc).src.node;
                let n = design.node(src);
                if n.is_master()
                    || n.has_state()
                    || n.is_subsystem_like()
                    || matches!(n.kind, NodeKind::Constant(_))
                    || visited.contains(&src)
                    || pre.contains(&src)
                {
                    continue;
                }
                pre.push(src);
            }
        }
        // Producers first.
        for k in pre.into_iter().rev() {
            if visited.insert(k) {
                order.push(k);
            }
        }
        if visited.insert(key) {
            order.push(key);
        }
    }
    for key in design.node_keys() {
        if matches!(design.node(key).kind, NodeKind::StateUpdate(_)) && visited.insert(key) {
            order.push(key);
        }
    }
    order
}
