//! Source-like rendering of the AST, used by the `--parse` and `--simplify`
//! dumps. The output parses back to the same tree.

use std::fmt::{self, Display, Formatter, Write};

use crate::parser::ast::{
    BinaryExpressionKind, ComparisonKind, DeviceAddressing, DeviceConfig, Identifier,
    LogicalKind, Node, Program, UnaryExpressionKind,
};

const INDENT: &str = "  ";

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write_statement(f, statement, 0)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Node::Block(_)
            | Node::VariableDecl(_)
            | Node::Assignment(_)
            | Node::Loop(_)
            | Node::ConditionalLoop(_)
            | Node::ConditionalStatement(_)
            | Node::Break
            | Node::Continue => write_statement(f, self, 0),
            _ => write_expression(f, self),
        }
    }
}

fn write_statement(f: &mut Formatter<'_>, node: &Node, indent: usize) -> fmt::Result {
    match node {
        Node::Block(block) => {
            writeln!(f, "{{")?;
            for statement in &block.statements {
                f.write_str(&INDENT.repeat(indent + 1))?;
                write_statement(f, statement, indent + 1)?;
                writeln!(f)?;
            }
            write!(f, "{}}}", INDENT.repeat(indent))
        }
        Node::VariableDecl(decl) => {
            write!(f, "var {} = ", decl.name)?;
            write_expression(f, &decl.init)?;
            f.write_char(';')
        }
        Node::Assignment(assign) => {
            write_identifier(f, &assign.target)?;
            f.write_str(" = ")?;
            write_expression(f, &assign.expr)?;
            f.write_char(';')
        }
        Node::Loop(stmt) => {
            f.write_str("loop ")?;
            write_statement(f, &stmt.body, indent)
        }
        Node::ConditionalLoop(stmt) => {
            f.write_str("while ")?;
            write_condition(f, &stmt.condition)?;
            f.write_char(' ')?;
            write_statement(f, &stmt.body, indent)
        }
        Node::ConditionalStatement(stmt) => {
            f.write_str("if ")?;
            write_condition(f, &stmt.condition)?;
            f.write_char(' ')?;
            write_statement(f, &stmt.then_branch, indent)?;
            if let Some(else_branch) = &stmt.else_branch {
                f.write_str(" else ")?;
                write_statement(f, else_branch, indent)?;
            }
            Ok(())
        }
        Node::Break => f.write_str("break;"),
        Node::Continue => f.write_str("continue;"),
        _ => {
            write_expression(f, node)?;
            f.write_char(';')
        }
    }
}

fn write_condition(f: &mut Formatter<'_>, condition: &Node) -> fmt::Result {
    if is_parenthesized(condition) {
        write_expression(f, condition)
    } else {
        f.write_char('(')?;
        write_expression(f, condition)?;
        f.write_char(')')
    }
}

fn is_parenthesized(node: &Node) -> bool {
    matches!(
        node,
        Node::UnaryOp(_)
            | Node::BinaryOp(_)
            | Node::Comparison(_)
            | Node::Logical(_)
            | Node::Ternary(_)
    )
}

fn write_expression(f: &mut Formatter<'_>, node: &Node) -> fmt::Result {
    match node {
        Node::Numeric(text) | Node::ConstantRef(text) => f.write_str(text),
        Node::HashLiteral(s) => write!(f, "HASH(\"{}\")", s),
        Node::Identifier(ident) => write_identifier(f, ident),
        Node::DeviceConfig(config) => write_device(f, config),
        Node::Call(call) => {
            write!(f, "{}(", call.name)?;
            for (i, arg) in call.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_expression(f, arg)?;
            }
            f.write_char(')')
        }
        // `!` binds looser than `+`, so the whole operation is wrapped.
        Node::UnaryOp(unary) => {
            match unary.kind {
                UnaryExpressionKind::Not => f.write_str("(!")?,
            }
            write_expression(f, &unary.expr)?;
            f.write_char(')')
        }
        Node::BinaryOp(binary) => {
            let op = match binary.kind {
                BinaryExpressionKind::Add => "+",
                BinaryExpressionKind::Sub => "-",
                BinaryExpressionKind::Mul => "*",
                BinaryExpressionKind::Div => "/",
            };
            write_infix(f, &binary.lhs, op, &binary.rhs)
        }
        Node::Comparison(cmp) => {
            let op = match cmp.kind {
                ComparisonKind::Equal => "==",
                ComparisonKind::NotEqual => "!=",
                ComparisonKind::Less => "<",
                ComparisonKind::LessEqual => "<=",
                ComparisonKind::Greater => ">",
                ComparisonKind::GreaterEqual => ">=",
            };
            write_infix(f, &cmp.lhs, op, &cmp.rhs)
        }
        Node::Logical(logical) => {
            let op = match logical.kind {
                LogicalKind::And => "&&",
                LogicalKind::Or => "||",
            };
            write_infix(f, &logical.lhs, op, &logical.rhs)
        }
        Node::Ternary(ternary) => {
            f.write_char('(')?;
            write_expression(f, &ternary.condition)?;
            f.write_str(" ? ")?;
            write_expression(f, &ternary.then_expr)?;
            f.write_str(" : ")?;
            write_expression(f, &ternary.else_expr)?;
            f.write_char(')')
        }
        _ => write_statement(f, node, 0),
    }
}

fn write_infix(f: &mut Formatter<'_>, lhs: &Node, op: &str, rhs: &Node) -> fmt::Result {
    f.write_char('(')?;
    write_expression(f, lhs)?;
    write!(f, " {} ", op)?;
    write_expression(f, rhs)?;
    f.write_char(')')
}

fn write_identifier(f: &mut Formatter<'_>, ident: &Identifier) -> fmt::Result {
    f.write_str(&ident.name)?;
    if let Some(index) = &ident.index {
        f.write_char('[')?;
        write_expression(f, index)?;
        f.write_char(']')?;
    }
    if let Some(property) = &ident.property {
        write!(f, ".{}", property)?;
    }
    Ok(())
}

fn write_device(f: &mut Formatter<'_>, config: &DeviceConfig) -> fmt::Result {
    write!(f, "Device({}, ", config.device_type)?;
    match &config.addressing {
        DeviceAddressing::Port(port) => f.write_str(port)?,
        DeviceAddressing::Batch(mode) => f.write_str(mode.as_str())?,
        DeviceAddressing::NamedBatch { name, mode } => {
            write!(f, "\"{}\", {}", name, mode.as_str())?
        }
    }
    f.write_char(')')
}
