use std::collections::HashSet;

use ic10c::codegen::gen::Codegen;
use ic10c::codegen::instr::Instruction;
use ic10c::error::CodeGenError;
use ic10c::parser::ast::{Node, Program, VariableDeclaration};
use ic10c::{compile_with, CompileOptions};

const RAW: CompileOptions = CompileOptions { simplify: false };

fn raw(src: &str) -> String {
    compile_with(src, &RAW).unwrap()
}

fn lines(text: &[&str]) -> String {
    text.iter().map(|l| format!("{}\n", l)).collect()
}

fn codegen_error(src: &str) -> CodeGenError {
    compile_with(src, &RAW)
        .unwrap_err()
        .downcast::<CodeGenError>()
        .unwrap()
}

#[test]
fn unsimplified_arithmetic_reuses_the_destination() {
    assert_eq!(
        raw("var a = 2 + 3 * 4;"),
        lines(&["mul r15 3 4", "add r15 2 r15"])
    );
}

#[test]
fn later_operands_get_temporaries() {
    assert_eq!(
        raw("var a = 1; var b = (a + 1) * (a + 2) + (a + 3) * (a + 4);"),
        lines(&[
            "move r15 1",
            "add r14 r15 1",
            "add r1 r15 2",
            "mul r14 r14 r1",
            "add r1 r15 3",
            "add r2 r15 4",
            "mul r1 r1 r2",
            "add r14 r14 r1",
        ])
    );
}

#[test]
fn literals_and_variables_are_moved() {
    assert_eq!(
        raw("var a = pi; var b = HASH(\"StructureBattery\"); var c = a; var d = -0.5;"),
        lines(&[
            "move r15 pi",
            "move r14 -400115994",
            "move r13 r15",
            "move r12 -0.5",
        ])
    );
}

#[test]
fn comparisons_not_and_ternary() {
    assert_eq!(
        raw("var a = 1; var b = a >= 2; var c = !a; var d = a > 0 ? 10 : 20;"),
        lines(&[
            "move r15 1",
            "sge r14 r15 2",
            "slt r13 r15 1",
            "sgt r12 r15 0",
            "select r12 r12 10 20",
        ])
    );
}

#[test]
fn constant_ternary_generates_one_branch() {
    assert_eq!(
        raw("var a = 1; var b = 0 ? a : a + 1;"),
        lines(&["move r15 1", "add r14 r15 1"])
    );
}

#[test]
fn logical_values_normalize_both_sides() {
    assert_eq!(
        raw("var a = 1; var b = 0; var c = a || b; var d = a && b < 3;"),
        lines(&[
            "move r15 1",
            "move r14 0",
            "sge r13 r15 1",
            "sge r1 r14 1",
            "or r13 r13 r1",
            "slt r1 r14 3",
            "sge r12 r15 1",
            "sge r1 r1 1",
            "and r12 r12 r1",
        ])
    );
}

#[test]
fn if_without_else() {
    assert_eq!(
        raw("var a = 1; if (a != 3) { a = 3; }"),
        lines(&["move r15 1", "beq r15 3 if001", "move r15 3", "if001:"])
    );
}

#[test]
fn if_with_else() {
    assert_eq!(
        raw("var a = 1; var b = 0; if (a == 1) { b = 2; } else { b = 3; }"),
        lines(&[
            "move r15 1",
            "move r14 0",
            "bne r15 1 if_else001",
            "move r14 2",
            "j if_end001",
            "if_else001:",
            "move r14 3",
            "if_end001:",
        ])
    );
}

#[test]
fn opposite_jumps_for_every_comparison() {
    let cases = [
        ("==", "bne"),
        ("!=", "beq"),
        ("<", "bge"),
        ("<=", "bgt"),
        (">", "ble"),
        (">=", "blt"),
    ];
    for (op, branch) in cases {
        let out = raw(&format!("var a = 1; if (a {} 2) {{ a = 0; }}", op));
        assert_eq!(
            out.lines().nth(1),
            Some(format!("{} r15 2 if001", branch).as_str())
        );
    }
}

#[test]
fn opposite_jumps_for_logic_and_values() {
    assert_eq!(
        raw("var a = 1; var b = 2; if (a && b) { a = 0; }"),
        lines(&[
            "move r15 1",
            "move r14 2",
            "blt r15 1 if001",
            "blt r14 1 if001",
            "move r15 0",
            "if001:",
        ])
    );
    assert_eq!(
        raw("var a = 1; var b = 2; if (a || b > 1) { a = 0; }"),
        lines(&[
            "move r15 1",
            "move r14 2",
            "sgt r0 r14 1",
            "brge r15 1 3",
            "brge r0 1 2",
            "j if001",
            "move r15 0",
            "if001:",
        ])
    );
    assert_eq!(
        raw("var a = 1; if (!a) { a = 2; } if (a) { a = 3; }"),
        lines(&[
            "move r15 1",
            "bge r15 1 if001",
            "move r15 2",
            "if001:",
            "blt r15 1 if002",
            "move r15 3",
            "if002:",
        ])
    );
}

#[test]
fn while_loop_with_continue() {
    assert_eq!(
        raw("var a = 0; while (a < 5) { a = a + 1; if (a == 2) { continue; } }"),
        lines(&[
            "move r15 0",
            "while_start001:",
            "bge r15 5 while_end001",
            "add r15 r15 1",
            "bne r15 2 if001",
            "j while_start001",
            "if001:",
            "j while_start001",
            "while_end001:",
        ])
    );
}

#[test]
fn constant_conditions_without_simplifier() {
    assert_eq!(raw("if (1) { var a = 1; }"), lines(&["move r15 1"]));
    assert_eq!(raw("var a = 1; while (0) { a = 2; }"), lines(&["move r15 1"]));
    assert_eq!(
        raw("while (1) { yield(); }"),
        lines(&[
            "while_start001:",
            "yield",
            "j while_start001",
            "while_end001:",
        ])
    );
    assert_eq!(
        raw("if (0) { yield(); } else { hcf(); }"),
        lines(&["hcf"])
    );
}

#[test]
fn nested_loops_break_to_the_innermost() {
    assert_eq!(
        raw("loop { loop { break; } break; }"),
        lines(&[
            "loop_start001:",
            "loop_start002:",
            "j loop_end002",
            "j loop_start002",
            "loop_end002:",
            "j loop_end001",
            "j loop_start001",
            "loop_end001:",
        ])
    );
}

#[test]
fn assignment_reading_its_target() {
    assert_eq!(
        raw("var a = 1; var b = 2; a = (a + 1) * b; b = b * 2;"),
        lines(&[
            "move r15 1",
            "move r14 2",
            "add r1 r15 1",
            "mul r1 r1 r14",
            "move r15 r1",
            "mul r14 r14 2",
        ])
    );
}

#[test]
fn port_device_access() {
    assert_eq!(
        raw("var d = Device(StructureBattery, d1); var i = 2; d.On = 1; d[i].Lock = 0; var r = d.Ratio; var q = d[i + 1].Quantity;"),
        lines(&[
            "move r15 2",
            "s d1 On 1",
            "ss d1 r15 Lock 0",
            "l r14 d1 Ratio",
            "add r13 r15 1",
            "ls r13 d1 r13 Quantity",
        ])
    );
}

#[test]
fn batch_device_access() {
    assert_eq!(
        raw("var s = Device(StructureGasSensor, Average); var t = s.Temperature; var u = s[0].Occupied; s.On = 0; s[1].On = t;"),
        lines(&[
            "lb r15 -1252983604 Temperature Average",
            "lbs r14 -1252983604 0 Occupied Average",
            "sb -1252983604 On 0",
            "sbs -1252983604 1 On r15",
        ])
    );
}

#[test]
fn named_batch_device_access() {
    assert_eq!(
        raw("var f = Device(Furnace, \"Big\", Sum); var q = f[1].Quantity; var t = f.Temperature; f.On = 1;"),
        lines(&[
            "lbns r15 -2085733260 -340351831 1 Quantity Sum",
            "lbn r14 -2085733260 -340351831 Temperature Sum",
            "sbn -2085733260 -340351831 On 1",
        ])
    );
}

#[test]
fn device_store_computes_value_then_slot() {
    assert_eq!(
        raw("var d = Device(StructureBattery, d0); var a = 1; d[a + 1].Setting = a * 3;"),
        lines(&[
            "move r15 1",
            "mul r0 r15 3",
            "add r1 r15 1",
            "ss d0 r1 Setting r0",
        ])
    );
}

#[test]
fn indexed_named_batch_store_is_unsupported() {
    assert_eq!(
        codegen_error("var f = Device(Furnace, \"Big\", Sum); f[0].On = 1;"),
        CodeGenError::UnsupportedDeviceStore {
            name: "f".to_owned(),
        }
    );
}

#[test]
fn device_access_needs_a_property() {
    assert_eq!(
        codegen_error("var d = Device(StructureBattery, d0); var x = d;"),
        CodeGenError::MissingProperty {
            name: "d".to_owned(),
        }
    );
    assert!(matches!(
        codegen_error("var d = Device(StructureBattery, d0); d = 1;"),
        CodeGenError::MissingProperty { .. }
    ));
}

#[test]
fn variables_have_no_properties() {
    assert_eq!(
        codegen_error("var a = 1; var b = a.On;"),
        CodeGenError::PropertyOnVariable {
            name: "a".to_owned(),
        }
    );
}

#[test]
fn bare_device_configuration_is_unsupported() {
    assert!(matches!(
        codegen_error("Device(StructureBattery, d0);"),
        CodeGenError::Unsupported { .. }
    ));
}

#[test]
fn builtin_calls_and_pseudo_ops() {
    assert_eq!(
        raw("var a = 1; var b = min(a + 1, a * 2); var c = rand(); sleep(b); sleep(a / 2); yield(); hcf();"),
        lines(&[
            "move r15 1",
            "add r14 r15 1",
            "mul r1 r15 2",
            "min r14 r14 r1",
            "rand r13",
            "sleep r14",
            "div r0 r15 2",
            "sleep r0",
            "yield",
            "hcf",
        ])
    );
}

#[test]
fn fifteen_variables_fit_and_sixteen_do_not() {
    let fifteen: String = (0..15).map(|i| format!("var v{} = {};\n", i, i)).collect();
    let out = raw(&fifteen);
    assert_eq!(out.lines().last(), Some("move r1 14"));

    let sixteen = format!("{}var v15 = 15;", fifteen);
    assert_eq!(
        codegen_error(&sixteen),
        CodeGenError::RegistersExhausted { min: 0, max: 15 }
    );
}

#[test]
fn labels_are_unique() {
    let out = raw(
        "var a = 1;\n\
         loop { if (a) { a = 0; } else { a = 1; } while (a < 3) { a = a + 1; } }\n\
         loop { if (a) { break; } while (a) { if (a > 1) { continue; } } }",
    );
    let labels: Vec<&str> = out
        .lines()
        .filter_map(|l| l.strip_suffix(':'))
        .collect();
    let unique: HashSet<&str> = labels.iter().copied().collect();
    assert_eq!(labels.len(), unique.len());
    assert_eq!(labels.len(), 12);
}

#[test]
fn generated_code_is_deterministic() {
    let src = "var d = Device(Furnace, \"A\", Sum); var b = 1; loop { if (d.Pressure > b * 2 || b) { d.On = b; } }";
    assert_eq!(raw(src), raw(src));
}

fn program(statements: Vec<Node>) -> Program {
    Program { statements }
}

#[test]
fn loop_control_outside_a_loop_is_refused() {
    let err = program(vec![Node::Break]).codegen().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CodeGenError>(),
        Some(CodeGenError::LoopControlOutsideLoop { keyword }) if keyword == "break"
    ));
}

#[test]
fn redeclaration_is_refused() {
    let decl = Node::VariableDecl(VariableDeclaration {
        name: "a".to_owned(),
        init: Node::Numeric("1".to_owned()).into(),
    });
    let err = program(vec![decl.clone(), decl]).codegen().unwrap_err();
    assert_eq!(
        err.downcast_ref::<CodeGenError>(),
        Some(&CodeGenError::Redeclared {
            name: "a".to_owned(),
        })
    );
}

#[test]
fn undeclared_variable_is_refused() {
    let assign = Node::VariableDecl(VariableDeclaration {
        name: "a".to_owned(),
        init: Node::Identifier(ic10c::parser::ast::Identifier::plain("ghost")).into(),
    });
    let err = program(vec![assign]).codegen().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CodeGenError>(),
        Some(CodeGenError::Undeclared { name }) if name == "ghost"
    ));
}

#[test]
fn unknown_function_is_refused() {
    let call = Node::Call(ic10c::parser::ast::CallExpression {
        name: "teleport".to_owned(),
        args: vec![],
    });
    let err = program(vec![call]).codegen().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CodeGenError>(),
        Some(CodeGenError::Unsupported { .. })
    ));
}

#[test]
fn instruction_model_is_exposed() {
    let instructions = ic10c::parse("var a = 1;")
        .unwrap()
        .codegen()
        .unwrap();
    assert!(matches!(instructions[..], [Instruction::Move { .. }]));
}
