//! Import → export → import round-trip and the nested-subsystem import
//! scenario.

use core_graphml::{export_design_to_writer, import_design_from_str, Dialect};
use core_ir::{Delay, Design, NodeKind, PortRef, Product, Subsystem, Sum};
use core_types::{DataType, NumericValue};

fn ty(s: &str) -> DataType {
    DataType::parse_numeric_str(s).unwrap()
}

fn build_sample() -> Design {
    let mut d = Design::new();
    let input = d.input_master();
    let output = d.output_master();

    let sub = d.add_node("sub", NodeKind::Subsystem(Subsystem::default()), None);
    let sum = d.add_node("sum", NodeKind::Sum(Sum::new(vec![true, false])), Some(sub));
    let delay = d.add_node(
        "delay",
        NodeKind::Delay(Delay::new(2, vec![NumericValue::Int(1), NumericValue::Int(2)])),
        Some(sub),
    );

    d.add_arc(PortRef::output(input, 0), PortRef::input(sum, 0), ty("int16"), -1.0);
    d.add_arc(PortRef::output(input, 1), PortRef::input(sum, 1), ty("int16"), -1.0);
    d.add_arc(PortRef::output(sum, 0), PortRef::input(delay, 0), ty("int16"), -1.0);
    d.add_arc(PortRef::output(delay, 0), PortRef::input(output, 0), ty("int16"), -1.0);
    d.assign_node_ids();
    d.assign_arc_ids();
    d
}

/// Shape signature independent of keys and IDs.
fn signature(d: &Design) -> (usize, usize, Vec<String>, Vec<String>) {
    let mut names: Vec<String> = d
        .node_keys()
        .into_iter()
        .map(|k| format!("{}:{}", d.qualified_name(k), d.node(k).kind.tag()))
        .collect();
    names.sort();
    let mut arcs: Vec<String> = d
        .arc_keys()
        .into_iter()
        .map(|a| {
            let arc = d.arc(a);
            format!(
                "{}.{} -> {}.{} : {}",
                d.qualified_name(arc.src.node),
                arc.src.number,
                d.qualified_name(arc.dst.node),
                arc.dst.number,
                arc.data_type.to_numeric_str()
            )
        })
        .collect();
    arcs.sort();
    (d.node_count(), d.arc_count(), names, arcs)
}

#[test]
fn export_then_import_is_isomorphic() {
    let original = build_sample();

    let mut xml = Vec::new();
    export_design_to_writer(&original, &mut xml).unwrap();
    let text = String::from_utf8(xml).unwrap();

    let reimported = import_design_from_str(&text, Dialect::Native).unwrap();
    assert_eq!(signature(&original), signature(&reimported));
    reimported.validate().unwrap();

    // A second round trip is stable.
    let mut xml2 = Vec::new();
    export_design_to_writer(&reimported, &mut xml2).unwrap();
    let again = import_design_from_str(&String::from_utf8(xml2).unwrap(), Dialect::Native).unwrap();
    assert_eq!(signature(&reimported), signature(&again));
}

#[test]
fn delay_parameters_survive_round_trip() {
    let original = build_sample();
    let mut xml = Vec::new();
    export_design_to_writer(&original, &mut xml).unwrap();
    let re = import_design_from_str(&String::from_utf8(xml).unwrap(), Dialect::Native).unwrap();

    let delay = re.node_by_name_path(&["sub", "delay"]).unwrap();
    let NodeKind::Delay(d) = &re.node(delay).kind else { panic!() };
    assert_eq!(d.delay, 2);
    assert_eq!(d.init_conditions, vec![NumericValue::Int(1), NumericValue::Int(2)]);
}

const NESTED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <graph id="G" edgedefault="directed">
    <node id="n1"><data key="block_node_type">Master</data><data key="master_role">MasterInput</data></node>
    <node id="n2"><data key="block_node_type">Master</data><data key="master_role">MasterOutput</data></node>
    <node id="n3"><data key="block_node_type">Master</data><data key="master_role">MasterVis</data></node>
    <node id="n4"><data key="block_node_type">Master</data><data key="master_role">MasterTerminator</data></node>
    <node id="n5"><data key="block_node_type">Master</data><data key="master_role">MasterUnconnected</data></node>
    <node id="n6">
      <data key="block_node_type">Standard</data>
      <data key="block_function">Sum</data>
      <data key="signs">++</data>
      <data key="instance_name">preSum</data>
    </node>
    <node id="n7">
      <data key="block_node_type">Subsystem</data>
      <data key="instance_name">side</data>
      <graph id="n7:g" edgedefault="directed">
        <node id="n7::n15">
          <data key="block_node_type">Standard</data>
          <data key="block_function">Constant</data>
          <data key="value">[3]</data>
          <data key="value_datatype">uint16</data>
          <data key="instance_name">bias</data>
        </node>
        <node id="n7::n16">
          <data key="block_node_type">Standard</data>
          <data key="block_function">Delay</data>
          <data key="delay_length">1</data>
          <data key="initial_condition">[0]</data>
          <data key="instance_name">dly3</data>
        </node>
      </graph>
    </node>
    <node id="n8">
      <data key="block_node_type">Subsystem</data>
      <data key="instance_name">outer</data>
      <graph id="n8:g" edgedefault="directed">
        <node id="n8::n9">
          <data key="block_node_type">Standard</data>
          <data key="block_function">Product</data>
          <data key="ops">**</data>
          <data key="instance_name">mult1</data>
        </node>
        <node id="n8::n10">
          <data key="block_node_type">Standard</data>
          <data key="block_function">Delay</data>
          <data key="delay_length">1</data>
          <data key="initial_condition">[0]</data>
          <data key="instance_name">dly1</data>
        </node>
        <node id="n8::n11">
          <data key="block_node_type">Subsystem</data>
          <data key="instance_name">inner</data>
          <graph id="n8::n11:g" edgedefault="directed">
            <node id="n8::n11::n12">
              <data key="block_node_type">Standard</data>
              <data key="block_function">Product</data>
              <data key="ops">**</data>
              <data key="instance_name">mult2</data>
            </node>
            <node id="n8::n11::n13">
              <data key="block_node_type">Standard</data>
              <data key="block_function">Delay</data>
              <data key="delay_length">1</data>
              <data key="initial_condition">[0]</data>
              <data key="instance_name">dly2</data>
            </node>
          </graph>
        </node>
      </graph>
    </node>
    <node id="n14">
      <data key="block_node_type">Standard</data>
      <data key="block_function">Sum</data>
      <data key="signs">++</data>
      <data key="instance_name">postSum</data>
    </node>
    <edge source="n1" target="n6"><data key="arc_src_port">0</data><data key="arc_dst_port">0</data><data key="arc_datatype">uint16</data></edge>
    <edge source="n7::n15" target="n7::n16"><data key="arc_src_port">0</data><data key="arc_dst_port">0</data><data key="arc_datatype">uint16</data></edge>
    <edge source="n7::n16" target="n6"><data key="arc_src_port">0</data><data key="arc_dst_port">1</data><data key="arc_datatype">uint16</data></edge>
    <edge source="n6" target="n8::n9"><data key="arc_src_port">0</data><data key="arc_dst_port">0</data><data key="arc_datatype">uint16</data></edge>
    <edge source="n1" target="n8::n9"><data key="arc_src_port">1</data><data key="arc_dst_port">1</data><data key="arc_datatype">uint16</data></edge>
    <edge source="n8::n9" target="n8::n10"><data key="arc_src_port">0</data><data key="arc_dst_port">0</data><data key="arc_datatype">uint32</data></edge>
    <edge source="n8::n10" target="n8::n11::n12"><data key="arc_src_port">0</data><data key="arc_dst_port">0</data><data key="arc_datatype">uint32</data></edge>
    <edge source="n8::n10" target="n8::n11::n12"><data key="arc_src_port">0</data><data key="arc_dst_port">1</data><data key="arc_datatype">uint32</data></edge>
    <edge source="n8::n11::n12" target="n8::n11::n13"><data key="arc_src_port">0</data><data key="arc_dst_port">0</data><data key="arc_datatype">ufix48_En8</data></edge>
    <edge source="n8::n11::n13" target="n14"><data key="arc_src_port">0</data><data key="arc_dst_port">0</data><data key="arc_datatype">ufix48_En8</data></edge>
    <edge source="n8::n10" target="n14"><data key="arc_src_port">0</data><data key="arc_dst_port">1</data><data key="arc_datatype">uint32</data></edge>
    <edge source="n14" target="n2"><data key="arc_src_port">0</data><data key="arc_dst_port">0</data><data key="arc_datatype">ufix48_En8</data></edge>
  </graph>
</graphml>
"#;

#[test]
fn nested_subsystems_import_with_full_hierarchy() {
    let d = import_design_from_str(NESTED, Dialect::Native).unwrap();

    // 4 top-level nodes, two of them subsystems.
    assert_eq!(d.top_level_nodes().len(), 4);
    let subsystems = d
        .top_level_nodes()
        .iter()
        .filter(|k| d.node(**k).is_subsystem_like())
        .count();
    assert_eq!(subsystems, 2);

    // Full hierarchy traversal reaches 11 nodes: 4 top level, 5 under
    // `outer` (including `inner` and its pair), 2 under `side`.
    let mut total = 0usize;
    let mut stack: Vec<_> = d.top_level_nodes().to_vec();
    while let Some(k) = stack.pop() {
        total += 1;
        stack.extend(d.children_of(k));
    }
    assert_eq!(total, 11);

    // Type promotion along the multiplier/delay chain.
    let mult1 = d.node_by_name_path(&["outer", "mult1"]).unwrap();
    let dly2 = d.node_by_name_path(&["outer", "inner", "dly2"]).unwrap();
    assert_eq!(d.input_type(mult1, 0).to_numeric_str(), "uint16");
    assert_eq!(d.output_type(mult1, 0).to_numeric_str(), "uint32");
    assert_eq!(d.input_type(dly2, 0).to_numeric_str(), "ufix48_En8");

    d.validate().unwrap();
}
