use std::collections::HashMap;

use anyhow::{bail, Result};
use log::debug;

use crate::{
    codegen::{
        instr::{ArithmeticOp, BitwiseOp, Condition, DeviceTarget, Instruction, Operand},
        labels::{LabelGenerator, LoopTargets},
        registers::{Register, RegisterFile},
    },
    error::CodeGenError,
    parser::ast::{
        AssignmentStatement, BinaryExpressionKind, CallExpression, DeviceAddressing,
        DeviceConfig, Identifier, IfStatement, LogicalKind, Node, Program, UnaryExpressionKind,
        VariableDeclaration,
    },
    util::{self, BUILTIN_FUNCTIONS, PSEUDO_OPS},
};

pub trait Codegen {
    fn codegen(&self) -> Result<Vec<Instruction>>;
}

impl Codegen for Program {
    fn codegen(&self) -> Result<Vec<Instruction>> {
        let mut generator = Generator::new();
        generator.generate_program(self)?;
        Ok(generator.instructions)
    }
}

/// Registers holding the operands of one instruction.
///
/// The first operand that has to be computed lands in `dst`; every later
/// one gets a fresh temporary, released by `close_scope`.
struct OperandScope {
    dst: Register,
    dst_taken: bool,
    temps: Vec<Register>,
}

impl OperandScope {
    fn new(dst: Register) -> OperandScope {
        OperandScope {
            dst,
            dst_taken: false,
            temps: vec![],
        }
    }
}

pub struct Generator {
    pub instructions: Vec<Instruction>,
    registers: RegisterFile,
    labels: LabelGenerator,
    loops: LoopTargets,
    variables: HashMap<String, Register>,
    devices: HashMap<String, DeviceConfig>,
}

impl Default for Generator {
    fn default() -> Self {
        Generator::new()
    }
}

impl Generator {
    pub fn new() -> Generator {
        Generator {
            instructions: vec![],
            registers: RegisterFile::new(),
            labels: LabelGenerator::new(),
            loops: LoopTargets::default(),
            variables: HashMap::new(),
            devices: HashMap::new(),
        }
    }

    pub fn generate_program(&mut self, program: &Program) -> Result<()> {
        let scratch = self.registers.reserve()?;
        for statement in &program.statements {
            self.generate_statement(statement, scratch)?;
        }
        self.registers.free(scratch)?;

        let variables: Vec<Register> = self.variables.drain().map(|(_, r)| r).collect();
        for register in variables {
            self.registers.free(register)?;
        }

        let count = self.registers.in_use();
        if count != 0 {
            bail!(CodeGenError::RegisterLeak { count });
        }

        debug!("generated {} instructions", self.instructions.len());
        Ok(())
    }

    fn push(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    /// `dst` is the register the statement may use for its own scratch work.
    fn generate_statement(&mut self, node: &Node, dst: Register) -> Result<()> {
        match node {
            Node::Block(block) => {
                for statement in &block.statements {
                    self.generate_statement(statement, dst)?;
                }
            }
            Node::ConditionalStatement(stmt) => self.generate_if(stmt, dst)?,
            Node::ConditionalLoop(stmt) => {
                let truth = constant_truth(&stmt.condition);
                if truth == Some(false) {
                    return Ok(());
                }
                let start = self.labels.next("while_start");
                let end = self.labels.next("while_end");
                self.generate_loop(&stmt.body, dst, start, end, |generator, end| match truth {
                    Some(_) => Ok(()),
                    None => generator.generate_opposite_jump(&stmt.condition, dst, end),
                })?;
            }
            Node::Loop(stmt) => {
                let start = self.labels.next("loop_start");
                let end = self.labels.next("loop_end");
                self.generate_loop(&stmt.body, dst, start, end, |_, _| Ok(()))?;
            }
            Node::Break => {
                let Some(target) = self.loops.break_target() else {
                    bail!(CodeGenError::LoopControlOutsideLoop {
                        keyword: "break".to_owned(),
                    });
                };
                let target = target.to_owned();
                self.push(Instruction::Jump(target));
            }
            Node::Continue => {
                let Some(target) = self.loops.continue_target() else {
                    bail!(CodeGenError::LoopControlOutsideLoop {
                        keyword: "continue".to_owned(),
                    });
                };
                let target = target.to_owned();
                self.push(Instruction::Jump(target));
            }
            Node::VariableDecl(decl) => self.generate_declaration(decl)?,
            Node::Assignment(assign) => self.generate_assignment(assign, dst)?,
            _ => self.generate_expression(node, dst)?,
        }

        Ok(())
    }

    fn generate_if(&mut self, stmt: &IfStatement, dst: Register) -> Result<()> {
        match (constant_truth(&stmt.condition), &stmt.else_branch) {
            (Some(true), _) => self.generate_statement(&stmt.then_branch, dst),
            (Some(false), Some(else_branch)) => self.generate_statement(else_branch, dst),
            (Some(false), None) => Ok(()),
            (None, Some(else_branch)) => {
                let else_label = self.labels.next("if_else");
                let end_label = self.labels.next("if_end");
                self.generate_opposite_jump(&stmt.condition, dst, &else_label)?;
                self.generate_statement(&stmt.then_branch, dst)?;
                self.push(Instruction::Jump(end_label.clone()));
                self.push(Instruction::Label(else_label));
                self.generate_statement(else_branch, dst)?;
                self.push(Instruction::Label(end_label));
                Ok(())
            }
            (None, None) => {
                let label = self.labels.next("if");
                self.generate_opposite_jump(&stmt.condition, dst, &label)?;
                self.generate_statement(&stmt.then_branch, dst)?;
                self.push(Instruction::Label(label));
                Ok(())
            }
        }
    }

    fn generate_loop<F>(
        &mut self,
        body: &Node,
        dst: Register,
        start: String,
        end: String,
        test: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Generator, &str) -> Result<()>,
    {
        self.loops.push(end.clone(), start.clone());
        self.push(Instruction::Label(start.clone()));
        test(self, &end)?;
        self.generate_statement(body, dst)?;
        self.push(Instruction::Jump(start));
        self.push(Instruction::Label(end));
        self.loops.pop();
        Ok(())
    }

    /// Branches to `label` when `condition` does not hold.
    fn generate_opposite_jump(&mut self, condition: &Node, dst: Register, label: &str) -> Result<()> {
        let one = || Operand::Immediate("1".to_owned());

        match condition {
            Node::Comparison(cmp) => {
                let mut scope = OperandScope::new(dst);
                let lhs = self.scoped_operand(&mut scope, &cmp.lhs)?;
                let rhs = self.scoped_operand(&mut scope, &cmp.rhs)?;
                self.push(Instruction::Branch {
                    condition: Condition::from(cmp.kind).inverse(),
                    lhs,
                    rhs,
                    target: label.to_owned(),
                });
                self.close_scope(scope)
            }
            Node::Logical(logical) => {
                let mut scope = OperandScope::new(dst);
                let lhs = self.scoped_operand(&mut scope, &logical.lhs)?;
                let rhs = self.scoped_operand(&mut scope, &logical.rhs)?;
                match logical.kind {
                    LogicalKind::And => {
                        for operand in [lhs, rhs] {
                            self.push(Instruction::Branch {
                                condition: Condition::Less,
                                lhs: operand,
                                rhs: one(),
                                target: label.to_owned(),
                            });
                        }
                    }
                    LogicalKind::Or => {
                        // Either test passing skips the jump out.
                        self.push(Instruction::BranchRelative {
                            condition: Condition::GreaterEqual,
                            lhs,
                            rhs: one(),
                            offset: 3,
                        });
                        self.push(Instruction::BranchRelative {
                            condition: Condition::GreaterEqual,
                            lhs: rhs,
                            rhs: one(),
                            offset: 2,
                        });
                        self.push(Instruction::Jump(label.to_owned()));
                    }
                }
                self.close_scope(scope)
            }
            Node::UnaryOp(unary) if unary.kind == UnaryExpressionKind::Not => {
                let operand = self.materialize(&unary.expr, dst)?;
                self.push(Instruction::Branch {
                    condition: Condition::GreaterEqual,
                    lhs: operand,
                    rhs: one(),
                    target: label.to_owned(),
                });
                Ok(())
            }
            _ => {
                let operand = self.materialize(condition, dst)?;
                self.push(Instruction::Branch {
                    condition: Condition::Less,
                    lhs: operand,
                    rhs: one(),
                    target: label.to_owned(),
                });
                Ok(())
            }
        }
    }

    fn generate_declaration(&mut self, decl: &VariableDeclaration) -> Result<()> {
        if self.devices.contains_key(&decl.name) || self.variables.contains_key(&decl.name) {
            bail!(CodeGenError::Redeclared {
                name: decl.name.clone(),
            });
        }

        if let Node::DeviceConfig(config) = decl.init.as_ref() {
            self.devices.insert(decl.name.clone(), config.clone());
            return Ok(());
        }

        let register = self.registers.reserve_high()?;
        match self.operand(&decl.init)? {
            Some(src) => self.push(Instruction::Move { dst: register, src }),
            None => self.generate_expression(&decl.init, register)?,
        }
        self.variables.insert(decl.name.clone(), register);
        Ok(())
    }

    fn generate_assignment(&mut self, assign: &AssignmentStatement, dst: Register) -> Result<()> {
        let target = &assign.target;

        if let Some(config) = self.devices.get(&target.name).cloned() {
            let Some(property) = target.property.clone() else {
                bail!(CodeGenError::MissingProperty {
                    name: target.name.clone(),
                });
            };
            if target.index.is_some() && matches!(config.addressing, DeviceAddressing::NamedBatch { .. })
            {
                bail!(CodeGenError::UnsupportedDeviceStore {
                    name: target.name.clone(),
                });
            }

            let mut scope = OperandScope::new(dst);
            let value = self.scoped_operand(&mut scope, &assign.expr)?;
            let slot = match &target.index {
                Some(index) => Some(self.scoped_operand(&mut scope, index)?),
                None => None,
            };
            self.push(Instruction::Store {
                device: device_target(&config),
                slot,
                property,
                value,
            });
            return self.close_scope(scope);
        }

        let register = self.variable(target)?;
        if let Some(src) = self.operand(&assign.expr)? {
            self.push(Instruction::Move { dst: register, src });
        } else if references(&assign.expr, &target.name) && !self.is_single_instruction(&assign.expr)
        {
            // The variable is still read after the first partial result is written.
            let temp = self.registers.reserve()?;
            self.generate_expression(&assign.expr, temp)?;
            self.push(Instruction::Move {
                dst: register,
                src: Operand::Register(temp),
            });
            self.registers.free(temp)?;
        } else {
            self.generate_expression(&assign.expr, register)?;
        }
        Ok(())
    }

    /// Computes `node` into `dst`.
    fn generate_expression(&mut self, node: &Node, dst: Register) -> Result<()> {
        match node {
            Node::BinaryOp(binary) => {
                let op = match binary.kind {
                    BinaryExpressionKind::Add => ArithmeticOp::Add,
                    BinaryExpressionKind::Sub => ArithmeticOp::Sub,
                    BinaryExpressionKind::Mul => ArithmeticOp::Mul,
                    BinaryExpressionKind::Div => ArithmeticOp::Div,
                };
                let mut scope = OperandScope::new(dst);
                let lhs = self.scoped_operand(&mut scope, &binary.lhs)?;
                let rhs = self.scoped_operand(&mut scope, &binary.rhs)?;
                self.push(Instruction::Arithmetic { op, dst, lhs, rhs });
                self.close_scope(scope)?;
            }
            Node::Comparison(cmp) => {
                let mut scope = OperandScope::new(dst);
                let lhs = self.scoped_operand(&mut scope, &cmp.lhs)?;
                let rhs = self.scoped_operand(&mut scope, &cmp.rhs)?;
                self.push(Instruction::Set {
                    condition: Condition::from(cmp.kind),
                    dst,
                    lhs,
                    rhs,
                });
                self.close_scope(scope)?;
            }
            Node::Logical(logical) => {
                let op = match logical.kind {
                    LogicalKind::And => BitwiseOp::And,
                    LogicalKind::Or => BitwiseOp::Or,
                };
                let lhs = self.materialize(&logical.lhs, dst)?;
                let temp = self.registers.reserve()?;
                let rhs = self.materialize(&logical.rhs, temp)?;
                self.push(Instruction::Set {
                    condition: Condition::GreaterEqual,
                    dst,
                    lhs,
                    rhs: Operand::Immediate("1".to_owned()),
                });
                self.push(Instruction::Set {
                    condition: Condition::GreaterEqual,
                    dst: temp,
                    lhs: rhs,
                    rhs: Operand::Immediate("1".to_owned()),
                });
                self.push(Instruction::Bitwise {
                    op,
                    dst,
                    lhs: Operand::Register(dst),
                    rhs: Operand::Register(temp),
                });
                self.registers.free(temp)?;
            }
            Node::UnaryOp(unary) => match unary.kind {
                UnaryExpressionKind::Not => {
                    let operand = self.materialize(&unary.expr, dst)?;
                    self.push(Instruction::Set {
                        condition: Condition::Less,
                        dst,
                        lhs: operand,
                        rhs: Operand::Immediate("1".to_owned()),
                    });
                }
            },
            Node::Ternary(ternary) => match util::value_of(&ternary.condition) {
                Some(v) => {
                    let chosen = if v != 0.0 {
                        &ternary.then_expr
                    } else {
                        &ternary.else_expr
                    };
                    self.generate_expression(chosen, dst)?;
                }
                None => {
                    let mut scope = OperandScope::new(dst);
                    let condition = self.scoped_operand(&mut scope, &ternary.condition)?;
                    let then_value = self.scoped_operand(&mut scope, &ternary.then_expr)?;
                    let else_value = self.scoped_operand(&mut scope, &ternary.else_expr)?;
                    self.push(Instruction::Select {
                        dst,
                        condition,
                        then_value,
                        else_value,
                    });
                    self.close_scope(scope)?;
                }
            },
            Node::Numeric(_) | Node::ConstantRef(_) | Node::HashLiteral(_) => {
                if let Some(src) = self.operand(node)? {
                    self.push(Instruction::Move { dst, src });
                }
            }
            Node::Identifier(ident) => match self.devices.get(&ident.name).cloned() {
                Some(config) => self.generate_load(ident, &config, dst)?,
                None => {
                    let register = self.variable(ident)?;
                    self.push(Instruction::Move {
                        dst,
                        src: Operand::Register(register),
                    });
                }
            },
            Node::Call(call) => self.generate_call(call, dst)?,
            Node::DeviceConfig(_) => bail!(CodeGenError::Unsupported {
                what: "device configuration outside a variable declaration".to_owned(),
            }),
            _ => bail!(CodeGenError::Unsupported {
                what: "statement used as a value".to_owned(),
            }),
        }

        Ok(())
    }

    fn generate_load(&mut self, ident: &Identifier, config: &DeviceConfig, dst: Register) -> Result<()> {
        let Some(property) = ident.property.clone() else {
            bail!(CodeGenError::MissingProperty {
                name: ident.name.clone(),
            });
        };

        let mut scope = OperandScope::new(dst);
        let slot = match &ident.index {
            Some(index) => Some(self.scoped_operand(&mut scope, index)?),
            None => None,
        };
        self.push(Instruction::Load {
            dst,
            device: device_target(config),
            slot,
            property,
        });
        self.close_scope(scope)
    }

    fn generate_call(&mut self, call: &CallExpression, dst: Register) -> Result<()> {
        if let Some(arity) = PSEUDO_OPS.get(call.name.as_str()) {
            check_arity(&call.name, *arity, call.args.len())?;
            match call.name.as_str() {
                "sleep" => {
                    let duration = self.materialize(&call.args[0], dst)?;
                    self.push(Instruction::Sleep(duration));
                }
                "yield" => self.push(Instruction::Yield),
                _ => self.push(Instruction::Hcf),
            }
            return Ok(());
        }

        let Some(arity) = BUILTIN_FUNCTIONS.get(call.name.as_str()) else {
            bail!(CodeGenError::Unsupported {
                what: format!("function `{}`", call.name),
            });
        };
        check_arity(&call.name, *arity, call.args.len())?;

        let mut scope = OperandScope::new(dst);
        let mut args = vec![];
        for arg in &call.args {
            args.push(self.scoped_operand(&mut scope, arg)?);
        }
        self.push(Instruction::Function {
            name: call.name.clone(),
            dst,
            args,
        });
        self.close_scope(scope)
    }

    /// Operands usable without generating any code.
    fn operand(&self, node: &Node) -> Result<Option<Operand>> {
        Ok(match node {
            Node::Numeric(text) => Some(Operand::Immediate(text.clone())),
            Node::ConstantRef(name) => Some(Operand::Immediate(name.clone())),
            Node::HashLiteral(s) => Some(Operand::Immediate(util::hash(s).to_string())),
            Node::Identifier(ident) if !self.devices.contains_key(&ident.name) => {
                Some(Operand::Register(self.variable(ident)?))
            }
            _ => None,
        })
    }

    fn variable(&self, ident: &Identifier) -> Result<Register> {
        let Some(register) = self.variables.get(&ident.name) else {
            bail!(CodeGenError::Undeclared {
                name: ident.name.clone(),
            });
        };
        if ident.property.is_some() || ident.index.is_some() {
            bail!(CodeGenError::PropertyOnVariable {
                name: ident.name.clone(),
            });
        }
        Ok(*register)
    }

    /// Whether `node` lowers to one instruction reading only plain operands.
    fn is_single_instruction(&self, node: &Node) -> bool {
        let plain = |n: &Node| match n {
            Node::Numeric(_) | Node::ConstantRef(_) | Node::HashLiteral(_) => true,
            Node::Identifier(ident) => {
                !self.devices.contains_key(&ident.name)
                    && ident.index.is_none()
                    && ident.property.is_none()
            }
            _ => false,
        };

        match node {
            Node::BinaryOp(binary) => plain(&binary.lhs) && plain(&binary.rhs),
            Node::Comparison(cmp) => plain(&cmp.lhs) && plain(&cmp.rhs),
            Node::UnaryOp(unary) => plain(&unary.expr),
            Node::Ternary(ternary) => {
                plain(&ternary.condition) && plain(&ternary.then_expr) && plain(&ternary.else_expr)
            }
            Node::Call(call) => call.args.iter().all(plain),
            Node::Identifier(ident) => ident.index.as_deref().map_or(true, plain),
            _ => false,
        }
    }

    fn materialize(&mut self, node: &Node, dst: Register) -> Result<Operand> {
        if let Some(operand) = self.operand(node)? {
            return Ok(operand);
        }
        self.generate_expression(node, dst)?;
        Ok(Operand::Register(dst))
    }

    fn scoped_operand(&mut self, scope: &mut OperandScope, node: &Node) -> Result<Operand> {
        if let Some(operand) = self.operand(node)? {
            return Ok(operand);
        }
        let register = if scope.dst_taken {
            let temp = self.registers.reserve()?;
            scope.temps.push(temp);
            temp
        } else {
            scope.dst_taken = true;
            scope.dst
        };
        self.generate_expression(node, register)?;
        Ok(Operand::Register(register))
    }

    fn close_scope(&mut self, scope: OperandScope) -> Result<()> {
        for temp in scope.temps {
            self.registers.free(temp)?;
        }
        Ok(())
    }
}

fn constant_truth(condition: &Node) -> Option<bool> {
    util::value_of(condition).map(util::is_true)
}

fn check_arity(name: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        bail!(CodeGenError::ArityMismatch {
            name: name.to_owned(),
            expected,
            found,
        });
    }
    Ok(())
}

fn device_target(config: &DeviceConfig) -> DeviceTarget {
    match &config.addressing {
        DeviceAddressing::Port(port) => DeviceTarget::Port(port.clone()),
        DeviceAddressing::Batch(mode) => DeviceTarget::Batch {
            type_hash: util::hash(&config.device_type),
            mode: *mode,
        },
        DeviceAddressing::NamedBatch { name, mode } => DeviceTarget::NamedBatch {
            type_hash: util::hash(&config.device_type),
            name_hash: util::hash(name),
            mode: *mode,
        },
    }
}

/// Whether evaluating `node` reads the variable `name`.
fn references(node: &Node, name: &str) -> bool {
    match node {
        Node::Identifier(ident) => {
            ident.name == name
                || ident
                    .index
                    .as_ref()
                    .is_some_and(|index| references(index, name))
        }
        Node::UnaryOp(unary) => references(&unary.expr, name),
        Node::BinaryOp(binary) => references(&binary.lhs, name) || references(&binary.rhs, name),
        Node::Comparison(cmp) => references(&cmp.lhs, name) || references(&cmp.rhs, name),
        Node::Logical(logical) => {
            references(&logical.lhs, name) || references(&logical.rhs, name)
        }
        Node::Ternary(ternary) => {
            references(&ternary.condition, name)
                || references(&ternary.then_expr, name)
                || references(&ternary.else_expr, name)
        }
        Node::Call(call) => call.args.iter().any(|arg| references(arg, name)),
        _ => false,
    }
}
