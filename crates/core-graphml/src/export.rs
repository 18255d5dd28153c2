//! GraphML writer (native dialect).
//!
//! Used both for the final re-exportable design and for the debug dumps the
//! pipeline emits at its checkpoints.  Hierarchy is expressed with nested
//! `<graph>` elements; node IDs are `::`-joined paths whose last component
//! is the node's integer ID.

use std::io::Write as _;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use core_ir::{CompileError, Design, NodeKey, NodeKind, PortKind, Result};

const NODE_KEYS: &[&str] =
    &["block_node_type", "block_function", "instance_name", "partition", "sched_order"];
const EDGE_KEYS: &[&str] = &[
    "arc_src_port",
    "arc_dst_port",
    "arc_dst_port_type",
    "arc_datatype",
    "arc_complex",
    "arc_dimensions",
    "arc_sample_time",
    "arc_id",
];

/// Export a design to a GraphML file.
pub fn export_design(design: &Design, path: &Path) -> Result<()> {
    let mut buf = Vec::new();
    export_design_to_writer(design, &mut buf)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(&buf)?;
    tracing::info!(target: "graphml.export", path = %path.display(), "design_exported");
    Ok(())
}

/// Export a design as GraphML into any writer.
pub fn export_design_to_writer(design: &Design, out: &mut Vec<u8>) -> Result<()> {
    let mut w = Writer::new_with_indent(out, b' ', 2);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(io_err)?;

    let mut graphml = BytesStart::new("graphml");
    graphml.push_attribute(("xmlns", "http://graphml.graphdrawing.org/xmlns"));
    w.write_event(Event::Start(graphml)).map_err(io_err)?;

    for key in NODE_KEYS {
        write_key(&mut w, key, "node")?;
    }
    for key in EDGE_KEYS {
        write_key(&mut w, key, "edge")?;
    }

    let mut graph = BytesStart::new("graph");
    graph.push_attribute(("id", "G"));
    graph.push_attribute(("edgedefault", "directed"));
    w.write_event(Event::Start(graph)).map_err(io_err)?;

    // Masters first, then the hierarchy.
    for key in design.master_keys() {
        write_node(design, &mut w, key, "")?;
    }
    for &key in design.top_level_nodes() {
        write_node(design, &mut w, key, "")?;
    }

    for arc_key in design.arc_keys() {
        let arc = design.arc(arc_key);
        let mut edge = BytesStart::new("edge");
        edge.push_attribute(("source", node_path(design, arc.src.node).as_str()));
        edge.push_attribute(("target", node_path(design, arc.dst.node).as_str()));
        w.write_event(Event::Start(edge)).map_err(io_err)?;
        write_data(&mut w, "arc_src_port", &arc.src.number.to_string())?;
        write_data(&mut w, "arc_dst_port", &arc.dst.number.to_string())?;
        let port_type = match arc.dst.kind {
            PortKind::Enable => "Enable",
            PortKind::OrderConstraintIn => "OrderConstraint",
            _ => "Standard",
        };
        write_data(&mut w, "arc_dst_port_type", port_type)?;
        write_data(&mut w, "arc_datatype", &arc.data_type.to_numeric_str())?;
        write_data(&mut w, "arc_complex", if arc.data_type.is_complex() { "true" } else { "false" })?;
        let dims: Vec<String> = arc.data_type.dimensions().iter().map(|d| d.to_string()).collect();
        write_data(&mut w, "arc_dimensions", &dims.join(" "))?;
        write_data(&mut w, "arc_sample_time", &arc.sample_time.to_string())?;
        write_data(&mut w, "arc_id", &arc.id.to_string())?;
        w.write_event(Event::End(BytesEnd::new("edge"))).map_err(io_err)?;
    }

    w.write_event(Event::End(BytesEnd::new("graph"))).map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new("graphml"))).map_err(io_err)?;
    Ok(())
}

fn io_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> CompileError {
    CompileError::Io(std::io::Error::other(e))
}

fn write_key(w: &mut Writer<&mut Vec<u8>>, name: &str, target: &str) -> Result<()> {
    let mut key = BytesStart::new("key");
    key.push_attribute(("id", name));
    key.push_attribute(("for", target));
    key.push_attribute(("attr.name", name));
    key.push_attribute(("attr.type", "string"));
    w.write_event(Event::Empty(key)).map_err(io_err)
}

fn write_data(w: &mut Writer<&mut Vec<u8>>, key: &str, value: &str) -> Result<()> {
    let mut data = BytesStart::new("data");
    data.push_attribute(("key", key));
    w.write_event(Event::Start(data)).map_err(io_err)?;
    w.write_event(Event::Text(BytesText::new(value))).map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new("data"))).map_err(io_err)
}

fn node_id_component(design: &Design, key: NodeKey) -> String {
    let id = design.node(key).id;
    if id >= 0 { format!("n{id}") } else { format!("k{}", key.0) }
}

fn node_path(design: &Design, key: NodeKey) -> String {
    let mut parts = vec![node_id_component(design, key)];
    let mut cur = design.node(key).parent;
    while let Some(p) = cur {
        parts.push(node_id_component(design, p));
        cur = design.node(p).parent;
    }
    parts.reverse();
    parts.join("::")
}

fn write_node(design: &Design, w: &mut Writer<&mut Vec<u8>>, key: NodeKey, _prefix: &str) -> Result<()> {
    let node = design.node(key);
    let mut el = BytesStart::new("node");
    el.push_attribute(("id", node_path(design, key).as_str()));
    w.write_event(Event::Start(el)).map_err(io_err)?;

    let (node_type, function) = kind_strings(&node.kind);
    write_data(w, "block_node_type", node_type)?;
    if !function.is_empty() {
        write_data(w, "block_function", function)?;
    }
    write_data(w, "instance_name", &node.name)?;
    write_data(w, "partition", &node.partition.to_string())?;
    write_data(w, "sched_order", &node.sched_order.to_string())?;
    for (k, v) in kind_parameters(design, key) {
        write_data(w, &k, &v)?;
    }

    if node.is_subsystem_like() {
        let mut graph = BytesStart::new("graph");
        let gid = format!("{}:g", node_path(design, key));
        graph.push_attribute(("id", gid.as_str()));
        graph.push_attribute(("edgedefault", "directed"));
        w.write_event(Event::Start(graph)).map_err(io_err)?;
        for child in design.children_of(key) {
            write_node(design, w, child, "")?;
        }
        w.write_event(Event::End(BytesEnd::new("graph"))).map_err(io_err)?;
    }

    w.write_event(Event::End(BytesEnd::new("node"))).map_err(io_err)
}

fn kind_strings(kind: &NodeKind) -> (&'static str, &'static str) {
    match kind {
        NodeKind::Master(_) => ("Master", ""),
        NodeKind::Subsystem(_) => ("Subsystem", ""),
        NodeKind::Expanded(_) => ("Expanded", ""),
        NodeKind::EnabledSubsystem(_) => ("Enabled Subsystem", ""),
        NodeKind::EnableInput(_) => ("Special Input Port", ""),
        NodeKind::EnableOutput(_) => ("Special Output Port", ""),
        NodeKind::Sum(_) => ("Standard", "Sum"),
        NodeKind::Product(_) => ("Standard", "Product"),
        NodeKind::Gain(_) => ("Standard", "Gain"),
        NodeKind::Constant(_) => ("Standard", "Constant"),
        NodeKind::Compare(_) => ("Standard", "Compare"),
        NodeKind::Delay(_) => ("Standard", "Delay"),
        NodeKind::TappedDelay(_) => ("Standard", "TappedDelay"),
        NodeKind::Lut(_) => ("Standard", "LUT"),
        NodeKind::Mux(_) => ("Standard", "Mux"),
        NodeKind::BlackBox(_) => ("Standard", "BlackBox"),
        NodeKind::StateUpdate(_) => ("Standard", "StateUpdate"),
        NodeKind::Fifo(_) => ("Standard", "ThreadCrossingFIFO"),
        NodeKind::ClockDomain(_) => ("Subsystem", "ClockDomain"),
        NodeKind::RateChange(_) => ("Standard", "RateChange"),
        NodeKind::TickCounter(_) => ("Standard", "TickCounter"),
        NodeKind::BlockingDomain(_) => ("Subsystem", "BlockingDomain"),
        NodeKind::BlockingInput(_) => ("Standard", "BlockingInput"),
        NodeKind::BlockingOutput(_) => ("Standard", "BlockingOutput"),
        NodeKind::ContextFamilyContainer(_) => ("Subsystem", "ContextFamilyContainer"),
        NodeKind::ContextContainer(_) => ("Subsystem", "ContextContainer"),
        NodeKind::ContextVariableUpdate(_) => ("Standard", "ContextVariableUpdate"),
    }
}

/// Per-kind parameters, matching what the importer understands.
fn kind_parameters(design: &Design, key: NodeKey) -> Vec<(String, String)> {
    let node = design.node(key);
    let join = |vals: &[core_types::NumericValue]| {
        vals.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
    };
    match &node.kind {
        NodeKind::Master(m) => vec![("master_role".into(), m.role().tag().into())],
        NodeKind::Sum(s) => vec![(
            "signs".into(),
            s.signs.iter().map(|p| if *p { '+' } else { '-' }).collect::<String>(),
        )],
        NodeKind::Product(p) => vec![(
            "ops".into(),
            p.ops.iter().map(|m| if *m { '*' } else { '/' }).collect::<String>(),
        )],
        NodeKind::Gain(g) => vec![("gain".into(), format!("[{}]", join(&g.gain)))],
        NodeKind::Constant(c) => vec![
            ("value".into(), format!("[{}]", join(&c.values))),
            ("value_datatype".into(), c.data_type.to_numeric_str()),
        ],
        NodeKind::Compare(c) => vec![("compare_op".into(), c.op.c_op().into())],
        NodeKind::Delay(d) => vec![
            ("delay_length".into(), d.delay.to_string()),
            ("initial_condition".into(), format!("[{}]", join(&d.init_conditions))),
            ("earliest_first".into(), d.earliest_first.to_string()),
        ],
        NodeKind::TappedDelay(t) => vec![
            ("delay_length".into(), t.delay.delay.to_string()),
            ("initial_condition".into(), format!("[{}]", join(&t.delay.init_conditions))),
            ("include_current".into(), t.include_current.to_string()),
        ],
        NodeKind::Lut(l) => vec![
            ("breakpoints_dim1".into(), format!("[{}]", join(&l.breakpoints))),
            ("table_data".into(), format!("[{}]", join(&l.table))),
            ("interp_method".into(), format!("{:?}", l.interp)),
            ("extrap_method".into(), format!("{:?}", l.extrap)),
            ("search_method".into(), format!("{:?}", l.search)),
        ],
        NodeKind::Mux(m) => vec![("data_inputs".into(), m.num_data_inputs.to_string())],
        NodeKind::ClockDomain(cd) => vec![
            ("rate_numerator".into(), cd.rate.0.to_string()),
            ("rate_denominator".into(), cd.rate.1.to_string()),
        ],
        NodeKind::RateChange(rc) => vec![
            ("upsample".into(), rc.upsample.to_string()),
            ("rate_numerator".into(), rc.rate.0.to_string()),
            ("rate_denominator".into(), rc.rate.1.to_string()),
        ],
        NodeKind::TickCounter(tc) => vec![("period".into(), tc.period.to_string())],
        NodeKind::Fifo(f) => {
            let mut out = vec![
                ("fifo_length_blocks".into(), f.length_blocks.to_string()),
                ("fifo_block_size".into(), f.block_size.to_string()),
                ("fifo_variant".into(), f.variant.tag().into()),
            ];
            for (i, p) in f.ports.iter().enumerate() {
                out.push((format!("fifo_init_p{i}"), format!("[{}]", join(&p.init_conditions))));
            }
            out
        }
        NodeKind::BlockingDomain(b) => vec![
            ("blocking_len".into(), b.blocking_len.to_string()),
            ("sub_blocking_len".into(), b.sub_blocking_len.to_string()),
            ("global".into(), b.global.to_string()),
        ],
        _ => Vec::new(),
    }
}
