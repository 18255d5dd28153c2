//! GraphML reader for the native and vendor-export dialects.

use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use core_ir::{
    BlackBox, BlockingBoundary, BlockingDomain, ClockDomain, Compare, CompareOp, ConstantNode,
    CompileError, Delay, Design, EnableGate, EnabledSubsystem, ExpandedNode, ExtrapMethod,
    FifoVariant, Gain, InterpMethod, Lut, MasterRole, Mux, NodeKey, NodeKind, PortKind, PortRef,
    Product, RateChange, Result, SearchMethod, Subsystem, Sum, TappedDelay, ThreadCrossingFifo,
    TickCounter,
};
use core_types::{DataType, NumericValue};

use crate::Dialect;

#[derive(Debug, Default)]
struct RawNode {
    id: String,
    data: IndexMap<String, String>,
    children: Vec<RawNode>,
}

#[derive(Debug, Default)]
struct RawEdge {
    source: String,
    target: String,
    data: IndexMap<String, String>,
}

/// Import a design from a GraphML file.
pub fn import_design(path: &std::path::Path, dialect: Dialect) -> Result<Design> {
    let text = std::fs::read_to_string(path)?;
    import_design_from_str(&text, dialect)
}

/// Import a design from GraphML text.
pub fn import_design_from_str(text: &str, dialect: Dialect) -> Result<Design> {
    let (roots, edges) = parse_raw(text)?;

    let mut design = Design::new();
    let mut by_path: IndexMap<String, NodeKey> = IndexMap::new();
    for raw in &roots {
        build_node(&mut design, raw, None, dialect, &mut by_path)?;
    }

    for edge in &edges {
        build_edge(&mut design, edge, dialect, &by_path)?;
    }

    design.assign_node_ids();
    design.assign_arc_ids();
    debug!(
        target: "graphml.import",
        nodes = design.node_count(),
        arcs = design.arc_count(),
        "design_imported"
    );
    Ok(design)
}

// ---- XML parsing ---------------------------------------------------------

fn parse_raw(text: &str) -> Result<(Vec<RawNode>, Vec<RawEdge>)> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut roots: Vec<RawNode> = Vec::new();
    let mut edges: Vec<RawEdge> = Vec::new();
    let mut node_stack: Vec<RawNode> = Vec::new();
    let mut current_edge: Option<RawEdge> = None;
    let mut current_data_key: Option<String> = None;

    loop {
        match reader.read_event() {
            Err(e) => return Err(CompileError::Parse(format!("malformed GraphML: {e}"))),
            Ok(Event::Eof) => break,
            Ok(Event::Start(el)) | Ok(Event::Empty(el)) => {
                let name = String::from_utf8_lossy(el.name().as_ref()).to_string();
                let attr = |key: &str| -> Option<String> {
                    el.attributes().flatten().find_map(|a| {
                        (String::from_utf8_lossy(a.key.as_ref()) == key)
                            .then(|| String::from_utf8_lossy(&a.value).to_string())
                    })
                };
                match name.as_str() {
                    "node" => {
                        node_stack.push(RawNode {
                            id: attr("id").unwrap_or_default(),
                            ..Default::default()
                        });
                    }
                    "edge" => {
                        current_edge = Some(RawEdge {
                            source: attr("source").unwrap_or_default(),
                            target: attr("target").unwrap_or_default(),
                            ..Default::default()
                        });
                    }
                    "data" => {
                        current_data_key = attr("key");
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(key) = &current_data_key {
                    let value = text
                        .unescape()
                        .map_err(|e| CompileError::Parse(format!("bad GraphML text: {e}")))?
                        .to_string();
                    if let Some(edge) = &mut current_edge {
                        edge.data.insert(key.clone(), value);
                    } else if let Some(node) = node_stack.last_mut() {
                        node.data.insert(key.clone(), value);
                    }
                }
            }
            Ok(Event::End(el)) => {
                match el.name().as_ref() {
                    b"node" => {
                        let done = node_stack.pop().ok_or_else(|| {
                            CompileError::Parse("unbalanced <node> nesting".into())
                        })?;
                        match node_stack.last_mut() {
                            Some(parent) => parent.children.push(done),
                            None => roots.push(done),
                        }
                    }
                    b"edge" => {
                        if let Some(edge) = current_edge.take() {
                            edges.push(edge);
                        }
                    }
                    b"data" => current_data_key = None,
                    _ => {}
                }
            }
            Ok(_) => {}
        }
    }
    Ok((roots, edges))
}

// ---- Node construction ---------------------------------------------------

fn leaf_id(path: &str) -> Option<i32> {
    let last = path.rsplit("::").next()?;
    last.strip_prefix('n')?.parse().ok()
}

fn build_node(
    design: &mut Design,
    raw: &RawNode,
    parent: Option<NodeKey>,
    dialect: Dialect,
    by_path: &mut IndexMap<String, NodeKey>,
) -> Result<()> {
    let node_type = raw.data.get("block_node_type").map(|s| s.as_str()).unwrap_or("Standard");
    let name = raw
        .data
        .get("instance_name")
        .cloned()
        .unwrap_or_else(|| raw.id.rsplit("::").next().unwrap_or("node").to_string());

    // Masters map onto the pre-created sentinels.
    if node_type == "Master" {
        let role = raw
            .data
            .get("master_role")
            .map(|s| s.as_str())
            .or(Some(name.as_str()))
            .and_then(parse_master_role)
            .ok_or_else(|| {
                CompileError::Parse(format!("unknown master role for node `{}`", raw.id))
            })?;
        let key = match role {
            MasterRole::Input => design.input_master(),
            MasterRole::Output => design.output_master(),
            MasterRole::Visualization => design.vis_master(),
            MasterRole::Terminator => design.terminator_master(),
            MasterRole::Unconnected => design.unconnected_master(),
        };
        by_path.insert(raw.id.clone(), key);
        return Ok(());
    }

    let kind = kind_from_raw(raw, node_type)?;
    let key = design.add_node(name, kind, parent);
    if let Some(id) = leaf_id(&raw.id) {
        design.node_mut(key).id = id;
    }
    if let Some(p) = raw.data.get("partition").and_then(|s| s.parse().ok()) {
        design.node_mut(key).partition = p;
    }
    if let Some(o) = raw.data.get("sched_order").and_then(|s| s.parse().ok()) {
        design.node_mut(key).sched_order = o;
    }
    by_path.insert(raw.id.clone(), key);

    for child in &raw.children {
        build_node(design, child, Some(key), dialect, by_path)?;
    }
    Ok(())
}

fn parse_master_role(s: &str) -> Option<MasterRole> {
    match s {
        "MasterInput" | "Input Master" => Some(MasterRole::Input),
        "MasterOutput" | "Output Master" => Some(MasterRole::Output),
        "MasterVis" | "Visualization Master" => Some(MasterRole::Visualization),
        "MasterTerminator" | "Terminator Master" => Some(MasterRole::Terminator),
        "MasterUnconnected" | "Unconnected Master" => Some(MasterRole::Unconnected),
        _ => None,
    }
}

fn values(raw: &RawNode, key: &str) -> Result<Vec<NumericValue>> {
    match raw.data.get(key) {
        Some(s) => {
            NumericValue::parse_list(s).map_err(|e| CompileError::Parse(e.to_string()))
        }
        None => Ok(Vec::new()),
    }
}

fn flag(raw: &RawNode, key: &str) -> bool {
    matches!(
        raw.data.get(key).map(|s| s.trim().to_ascii_lowercase()),
        Some(ref v) if v == "true" || v == "on" || v == "1"
    )
}

fn number<T: std::str::FromStr>(raw: &RawNode, key: &str, default: T) -> T {
    raw.data.get(key).and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

fn kind_from_raw(raw: &RawNode, node_type: &str) -> Result<NodeKind> {
    match node_type {
        "Subsystem" => match raw.data.get("block_function").map(|s| s.as_str()) {
            Some("ClockDomain") => {
                let mut cd = ClockDomain::new();
                cd.rate = (
                    number(raw, "rate_numerator", 1u32),
                    number(raw, "rate_denominator", 1u32),
                );
                Ok(NodeKind::ClockDomain(cd))
            }
            Some("BlockingDomain") => Ok(NodeKind::BlockingDomain(BlockingDomain::new(
                number(raw, "blocking_len", 1usize),
                number(raw, "sub_blocking_len", 1usize),
                flag(raw, "global"),
            ))),
            _ => Ok(NodeKind::Subsystem(Subsystem::default())),
        },
        "Enabled Subsystem" => Ok(NodeKind::EnabledSubsystem(EnabledSubsystem::default())),
        "Expanded" => Ok(NodeKind::Expanded(ExpandedNode {
            base: Default::default(),
            orig_kind: Box::new(NodeKind::Subsystem(Subsystem::default())),
            orig_name: raw.data.get("instance_name").cloned().unwrap_or_default(),
        })),
        "Special Input Port" => Ok(NodeKind::EnableInput(EnableGate::default())),
        "Special Output Port" => Ok(NodeKind::EnableOutput(EnableGate::default())),
        "VectorFan" => {
            warn!(target: "graphml.import", id = %raw.id, "VectorFan imported as subsystem");
            Ok(NodeKind::Subsystem(Subsystem::default()))
        }
        "Standard" => standard_kind(raw),
        other => Err(CompileError::Parse(format!(
            "unknown block_node_type `{other}` on node `{}`",
            raw.id
        ))),
    }
}

fn standard_kind(raw: &RawNode) -> Result<NodeKind> {
    let function = raw
        .data
        .get("block_function")
        .ok_or_else(|| CompileError::Parse(format!("node `{}` has no block_function", raw.id)))?;
    match function.as_str() {
        "Sum" | "Add" | "Subtract" => {
            let signs = raw
                .data
                .get("signs")
                .or_else(|| raw.data.get("Inputs"))
                .map(|s| Sum::parse_signs(s))
                .unwrap_or_else(|| vec![true, true]);
            Ok(NodeKind::Sum(Sum::new(signs)))
        }
        "Product" | "Multiply" | "Divide" => {
            let ops = raw
                .data
                .get("ops")
                .or_else(|| raw.data.get("Inputs"))
                .map(|s| Product::parse_ops(s))
                .unwrap_or_else(|| vec![true, true]);
            Ok(NodeKind::Product(Product::new(ops)))
        }
        "Gain" => Ok(NodeKind::Gain(Gain { gain: values(raw, "gain")? })),
        "Constant" => {
            let dtype = raw
                .data
                .get("value_datatype")
                .map(|s| DataType::parse_numeric_str(s))
                .transpose()?
                .unwrap_or_else(DataType::double_scalar);
            Ok(NodeKind::Constant(ConstantNode { values: values(raw, "value")?, data_type: dtype }))
        }
        "Compare" | "RelationalOperator" => {
            let op = raw
                .data
                .get("compare_op")
                .or_else(|| raw.data.get("Operator"))
                .and_then(|s| CompareOp::parse(s))
                .ok_or_else(|| {
                    CompileError::Parse(format!("node `{}` has no comparison operator", raw.id))
                })?;
            Ok(NodeKind::Compare(Compare { op }))
        }
        "Delay" => {
            let mut d = Delay::new(
                number(raw, "delay_length", 0usize),
                values(raw, "initial_condition")?,
            );
            d.earliest_first = flag(raw, "earliest_first");
            Ok(NodeKind::Delay(d))
        }
        "TappedDelay" => Ok(NodeKind::TappedDelay(TappedDelay::new(
            number(raw, "delay_length", 1usize),
            values(raw, "initial_condition")?,
            flag(raw, "include_current"),
        ))),
        "LUT" | "Lookup" => {
            let mut lut = Lut::new(
                values(raw, "breakpoints_dim1")?,
                values(raw, "table_data")?,
            );
            if let Some(s) = raw.data.get("interp_method") {
                lut.interp = parse_interp(s)?;
            }
            if let Some(s) = raw.data.get("extrap_method") {
                lut.extrap = parse_extrap(s)?;
            }
            if let Some(s) = raw.data.get("search_method") {
                lut.search = parse_search(s)?;
            }
            Ok(NodeKind::Lut(lut))
        }
        "Mux" => Ok(NodeKind::Mux(Mux::new(number(raw, "data_inputs", 2usize)))),
        "BlackBox" => Ok(NodeKind::BlackBox(BlackBox {
            body: raw.data.get("body").cloned().unwrap_or_default(),
            call_name: raw.data.get("call_name").cloned().unwrap_or_default(),
            stateful: flag(raw, "stateful"),
            combinational: flag(raw, "combinational"),
        })),
        "RateChange" | "Upsample" | "Downsample" => {
            let upsample = function == "Upsample" || flag(raw, "upsample");
            Ok(NodeKind::RateChange(RateChange::new(
                upsample,
                (number(raw, "rate_numerator", 1u32), number(raw, "rate_denominator", 1u32)),
            )))
        }
        "TickCounter" => {
            Ok(NodeKind::TickCounter(TickCounter { period: number(raw, "period", 1usize) }))
        }
        "ThreadCrossingFIFO" => {
            let mut f = ThreadCrossingFifo::new(
                if raw.data.get("fifo_variant").map(|s| s.as_str()) == Some("lockless_inplace") {
                    FifoVariant::LocklessInPlace
                } else {
                    FifoVariant::Lockless
                },
                number(raw, "fifo_length_blocks", 16usize),
            );
            f.block_size = number(raw, "fifo_block_size", 1usize);
            f.ports[0].init_conditions = values(raw, "fifo_init_p0")?;
            Ok(NodeKind::Fifo(f))
        }
        "BlockingInput" => Ok(NodeKind::BlockingInput(BlockingBoundary::new(
            number(raw, "blocking_len", 1usize),
            number(raw, "sub_blocking_len", 1usize),
        ))),
        "BlockingOutput" => Ok(NodeKind::BlockingOutput(BlockingBoundary::new(
            number(raw, "blocking_len", 1usize),
            number(raw, "sub_blocking_len", 1usize),
        ))),
        other => Err(CompileError::Parse(format!(
            "unknown block_function `{other}` on node `{}`",
            raw.id
        ))),
    }
}

fn parse_interp(s: &str) -> Result<InterpMethod> {
    match s.trim().to_ascii_lowercase().as_str() {
        "flat" => Ok(InterpMethod::Flat),
        "nearest" => Ok(InterpMethod::Nearest),
        "linear" => Ok(InterpMethod::Linear),
        "cubic" | "cubicspline" => Ok(InterpMethod::CubicSpline),
        other => Err(CompileError::Parse(format!("unknown interpolation method `{other}`"))),
    }
}

fn parse_extrap(s: &str) -> Result<ExtrapMethod> {
    match s.trim().to_ascii_lowercase().as_str() {
        "no-check" | "nocheck" => Ok(ExtrapMethod::NoCheck),
        "clip" => Ok(ExtrapMethod::Clip),
        "linear" => Ok(ExtrapMethod::Linear),
        "cubic" | "cubicspline" => Ok(ExtrapMethod::CubicSpline),
        other => Err(CompileError::Parse(format!("unknown extrapolation method `{other}`"))),
    }
}

fn parse_search(s: &str) -> Result<SearchMethod> {
    match s.trim().to_ascii_lowercase().as_str() {
        "evenly-spaced" | "evenlyspaced" => Ok(SearchMethod::EvenlySpaced),
        "linear" | "linearnomemory" => Ok(SearchMethod::LinearNoMemory),
        "linear-memory" | "linearmemory" => Ok(SearchMethod::LinearMemory),
        "binary" | "binarynomemory" => Ok(SearchMethod::BinaryNoMemory),
        "binary-memory" | "binarymemory" => Ok(SearchMethod::BinaryMemory),
        other => Err(CompileError::Parse(format!("unknown search method `{other}`"))),
    }
}

// ---- Edge construction ---------------------------------------------------

fn build_edge(
    design: &mut Design,
    edge: &RawEdge,
    dialect: Dialect,
    by_path: &IndexMap<String, NodeKey>,
) -> Result<()> {
    let src_node = *by_path.get(&edge.source).ok_or_else(|| {
        CompileError::Parse(format!("edge references unknown source `{}`", edge.source))
    })?;
    let dst_node = *by_path.get(&edge.target).ok_or_else(|| {
        CompileError::Parse(format!("edge references unknown target `{}`", edge.target))
    })?;

    let base = if dialect == Dialect::VendorExport { 1 } else { 0 };
    let parse_port = |key: &str| -> u32 {
        edge.data
            .get(key)
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(|p| (p - base).max(0) as u32)
            .unwrap_or(0)
    };
    let src_port = parse_port("arc_src_port");
    let dst_port = parse_port("arc_dst_port");

    let (src_kind, dst_kind) = match edge.data.get("arc_dst_port_type").map(|s| s.as_str()) {
        Some("Enable") => (PortKind::Output, PortKind::Enable),
        Some("OrderConstraint") => (PortKind::OrderConstraintOut, PortKind::OrderConstraintIn),
        _ => (PortKind::Output, PortKind::Input),
    };

    let mut data_type = edge
        .data
        .get("arc_datatype")
        .map(|s| DataType::parse_numeric_str(s))
        .transpose()?
        .unwrap_or_default();
    if matches!(
        edge.data.get("arc_complex").map(|s| s.trim().to_ascii_lowercase()),
        Some(ref v) if v == "true" || v == "on" || v == "1"
    ) {
        data_type.set_complex(true);
    }
    if let Some(dims) = edge.data.get("arc_dimensions") {
        let parsed: Vec<usize> =
            dims.split_whitespace().filter_map(|d| d.parse().ok()).collect();
        if !parsed.is_empty() {
            data_type.set_dimensions(parsed);
        }
    } else if let Some(width) = edge.data.get("arc_width").and_then(|s| s.trim().parse::<usize>().ok())
        && width > 1
    {
        data_type.set_dimensions(vec![width]);
    }

    let sample_time = edge
        .data
        .get("arc_sample_time")
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(-1.0);

    let arc = design.add_arc(
        PortRef { node: src_node, kind: src_kind, number: src_port },
        PortRef { node: dst_node, kind: dst_kind, number: dst_port },
        data_type,
        sample_time,
    );
    if let Some(id) = edge.data.get("arc_id").and_then(|s| s.trim().parse().ok()) {
        design.arc_mut(arc).id = id;
    }
    Ok(())
}
