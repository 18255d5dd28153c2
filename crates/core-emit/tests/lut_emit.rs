//! LUT index-computation emission.

use core_ir::{CodeQueue, Design, EmitState, ExtrapMethod, InterpMethod, Lut, NodeKind, PortRef};
use core_types::{DataType, NumericValue};

/// Breakpoints -5..=5 step 1, table = atan(x).
fn build_lut(extrap: ExtrapMethod, interp: InterpMethod, input_ty: &str) -> (Design, core_ir::NodeKey) {
    let mut d = Design::new();
    let input = d.input_master();
    let output = d.output_master();

    let breakpoints: Vec<NumericValue> = (-5..=5).map(NumericValue::Int).collect();
    let table: Vec<NumericValue> =
        (-5..=5).map(|x| NumericValue::real((x as f64).atan())).collect();
    let mut lut = Lut::new(breakpoints, table);
    lut.interp = interp;
    lut.extrap = extrap;
    let lut = d.add_node("atanLut", NodeKind::Lut(lut), None);

    let in_ty = DataType::parse_numeric_str(input_ty).unwrap();
    let out_ty = DataType::parse_numeric_str("double").unwrap();
    d.add_arc(PortRef::output(input, 0), PortRef::input(lut, 0), in_ty, -1.0);
    d.add_arc(PortRef::output(lut, 0), PortRef::input(output, 0), out_ty, -1.0);
    d.assign_node_ids();
    (d, lut)
}

#[test]
fn floating_nearest_truncates_biased_index() {
    let (d, lut) = build_lut(ExtrapMethod::NoCheck, InterpMethod::Nearest, "double");
    d.validate().unwrap();

    let mut q = CodeQueue::new();
    let mut st = EmitState::new();
    let expr = d.emit_value_expression(lut, 0, false, &mut q, &mut st).unwrap();

    let emitted = q.lines().join("\n");
    assert!(emitted.contains("(int64_t)"), "{emitted}");
    assert!(emitted.contains("- (-5))/1 + 0.5"), "{emitted}");
    assert!(expr.contains("_table["), "{expr}");
    // No bounds logic in no-check mode.
    assert!(!emitted.contains("if ("), "{emitted}");
}

#[test]
fn clip_extrapolation_clamps_to_endpoint_indices() {
    let (d, lut) = build_lut(ExtrapMethod::Clip, InterpMethod::Nearest, "double");
    d.validate().unwrap();

    let mut q = CodeQueue::new();
    let mut st = EmitState::new();
    d.emit_value_expression(lut, 0, false, &mut q, &mut st).unwrap();

    let emitted = q.lines().join("\n");
    assert!(emitted.contains("= 0;"), "{emitted}");
    assert!(emitted.contains("= 10;"), "{emitted}");
    assert!(emitted.contains("<= (-5)"), "{emitted}");
    assert!(emitted.contains(">= (5)"), "{emitted}");
}

#[test]
fn index_variable_is_emitted_once_per_pass() {
    let (d, lut) = build_lut(ExtrapMethod::NoCheck, InterpMethod::Flat, "double");
    let mut q = CodeQueue::new();
    let mut st = EmitState::new();
    d.emit_value_expression(lut, 0, false, &mut q, &mut st).unwrap();
    let first = q.lines().len();
    d.emit_value_expression(lut, 0, false, &mut q, &mut st).unwrap();
    assert_eq!(q.lines().len(), first, "second emission must not re-declare the index");
}

#[test]
fn integer_input_uses_integer_division() {
    let (d, lut) = build_lut(ExtrapMethod::NoCheck, InterpMethod::Flat, "int16");
    d.validate().unwrap();

    let mut q = CodeQueue::new();
    let mut st = EmitState::new();
    d.emit_value_expression(lut, 0, false, &mut q, &mut st).unwrap();
    let emitted = q.lines().join("\n");
    assert!(emitted.contains(") / 1"), "{emitted}");
    assert!(!emitted.contains("0.5"), "{emitted}");
}

#[test]
fn lut_table_is_a_global_declaration() {
    let (d, lut) = build_lut(ExtrapMethod::Clip, InterpMethod::Nearest, "double");
    assert!(d.node(lut).has_global_decl());
    let decl = d.global_decl_text(lut).unwrap();
    assert!(decl.contains("static const double"), "{decl}");
    assert!(decl.contains("_table[11]"), "{decl}");
}
