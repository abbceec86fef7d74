use crate::{
    parser::ast::{
        AssignmentStatement, BinaryExpression, BinaryExpressionKind, BlockStatement,
        CallExpression, ComparisonExpression, ComparisonKind, Identifier, IfStatement,
        LogicalExpression, LogicalKind, LoopStatement, Node, Program, TernaryExpression,
        UnaryExpression, UnaryExpressionKind, VariableDeclaration, WhileStatement,
    },
    util::{is_true, number_node, parse_numeric, value_of},
};

/// Constant folding, algebraic identities and dead-branch removal over the
/// AST. The input is never modified; every node comes back rebuilt.
pub trait Simplify {
    fn simplify(&self) -> Self;
}

impl Simplify for Program {
    fn simplify(&self) -> Self {
        Program {
            statements: simplify_statements(&self.statements),
        }
    }
}

fn simplify_statements(statements: &[Node]) -> Vec<Node> {
    statements.iter().filter_map(simplify_statement).collect()
}

/// `None` when the statement has no effect left.
pub fn simplify_statement(node: &Node) -> Option<Node> {
    match node {
        Node::Block(block) => {
            let statements = simplify_statements(&block.statements);
            if statements.is_empty() {
                return None;
            }
            Some(Node::Block(BlockStatement { statements }))
        }
        Node::VariableDecl(decl) => Some(Node::VariableDecl(VariableDeclaration {
            name: decl.name.clone(),
            init: simplify_expression(&decl.init).into(),
        })),
        Node::Assignment(assign) => Some(Node::Assignment(AssignmentStatement {
            target: simplify_identifier(&assign.target),
            expr: simplify_expression(&assign.expr).into(),
        })),
        Node::Loop(stmt) => Some(Node::Loop(LoopStatement {
            body: simplify_body(&stmt.body).into(),
        })),
        Node::ConditionalLoop(stmt) => {
            let condition = simplify_expression(&stmt.condition);
            match value_of(&condition) {
                Some(v) if is_true(v) => Some(Node::Loop(LoopStatement {
                    body: simplify_body(&stmt.body).into(),
                })),
                Some(_) => None,
                None => Some(Node::ConditionalLoop(WhileStatement {
                    condition: condition.into(),
                    body: simplify_body(&stmt.body).into(),
                })),
            }
        }
        Node::ConditionalStatement(stmt) => {
            let condition = simplify_expression(&stmt.condition);
            match value_of(&condition) {
                Some(v) if is_true(v) => simplify_statement(&stmt.then_branch),
                Some(_) => stmt
                    .else_branch
                    .as_ref()
                    .and_then(|e| simplify_statement(e)),
                None => Some(Node::ConditionalStatement(IfStatement {
                    condition: condition.into(),
                    then_branch: simplify_body(&stmt.then_branch).into(),
                    else_branch: stmt
                        .else_branch
                        .as_ref()
                        .and_then(|e| simplify_statement(e))
                        .map(Box::new),
                })),
            }
        }
        Node::Break | Node::Continue => Some(node.clone()),
        _ => Some(simplify_expression(node)),
    }
}

fn simplify_body(node: &Node) -> Node {
    simplify_statement(node).unwrap_or(Node::Block(BlockStatement { statements: vec![] }))
}

fn simplify_identifier(ident: &Identifier) -> Identifier {
    Identifier {
        name: ident.name.clone(),
        index: ident
            .index
            .as_ref()
            .map(|i| Box::new(simplify_expression(i))),
        property: ident.property.clone(),
    }
}

pub fn simplify_expression(node: &Node) -> Node {
    match node {
        Node::Identifier(ident) => Node::Identifier(simplify_identifier(ident)),
        Node::Call(call) => Node::Call(CallExpression {
            name: call.name.clone(),
            args: call.args.iter().map(simplify_expression).collect(),
        }),
        Node::UnaryOp(unary) => {
            let expr = simplify_expression(&unary.expr);
            match (unary.kind, value_of(&expr)) {
                (UnaryExpressionKind::Not, Some(v)) => number_node(bool_value(v < 1.0)),
                (kind, None) => Node::UnaryOp(UnaryExpression {
                    kind,
                    expr: expr.into(),
                }),
            }
        }
        Node::BinaryOp(binary) => {
            let lhs = simplify_expression(&binary.lhs);
            let rhs = simplify_expression(&binary.rhs);
            if let (Some(a), Some(b)) = (value_of(&lhs), value_of(&rhs)) {
                return number_node(match binary.kind {
                    BinaryExpressionKind::Add => a + b,
                    BinaryExpressionKind::Sub => a - b,
                    BinaryExpressionKind::Mul => a * b,
                    BinaryExpressionKind::Div => a / b,
                });
            }
            simplify_identity(binary.kind, lhs, rhs)
        }
        Node::Comparison(cmp) => {
            let lhs = simplify_expression(&cmp.lhs);
            let rhs = simplify_expression(&cmp.rhs);
            match (value_of(&lhs), value_of(&rhs)) {
                (Some(a), Some(b)) => number_node(bool_value(match cmp.kind {
                    ComparisonKind::Equal => a == b,
                    ComparisonKind::NotEqual => a != b,
                    ComparisonKind::Less => a < b,
                    ComparisonKind::LessEqual => a <= b,
                    ComparisonKind::Greater => a > b,
                    ComparisonKind::GreaterEqual => a >= b,
                })),
                _ => Node::Comparison(ComparisonExpression {
                    kind: cmp.kind,
                    lhs: lhs.into(),
                    rhs: rhs.into(),
                }),
            }
        }
        Node::Logical(logical) => {
            let lhs = simplify_expression(&logical.lhs);
            let rhs = simplify_expression(&logical.rhs);
            match (value_of(&lhs), value_of(&rhs)) {
                (Some(a), Some(b)) => number_node(bool_value(match logical.kind {
                    LogicalKind::And => is_true(a) && is_true(b),
                    LogicalKind::Or => is_true(a) || is_true(b),
                })),
                _ => Node::Logical(LogicalExpression {
                    kind: logical.kind,
                    lhs: lhs.into(),
                    rhs: rhs.into(),
                }),
            }
        }
        Node::Ternary(ternary) => {
            let condition = simplify_expression(&ternary.condition);
            match value_of(&condition) {
                // Same rule as `select`: any non-zero condition picks the first value.
                Some(v) if v != 0.0 => simplify_expression(&ternary.then_expr),
                Some(_) => simplify_expression(&ternary.else_expr),
                None => Node::Ternary(TernaryExpression {
                    condition: condition.into(),
                    then_expr: simplify_expression(&ternary.then_expr).into(),
                    else_expr: simplify_expression(&ternary.else_expr).into(),
                }),
            }
        }
        _ => node.clone(),
    }
}

fn simplify_identity(kind: BinaryExpressionKind, lhs: Node, rhs: Node) -> Node {
    let l = literal(&lhs);
    let r = literal(&rhs);

    match kind {
        BinaryExpressionKind::Mul if r == Some(1.0) => lhs,
        BinaryExpressionKind::Mul if l == Some(1.0) => rhs,
        BinaryExpressionKind::Mul if l == Some(0.0) || r == Some(0.0) => Node::Numeric("0".to_owned()),
        BinaryExpressionKind::Add if r == Some(0.0) => lhs,
        BinaryExpressionKind::Add if l == Some(0.0) => rhs,
        BinaryExpressionKind::Sub if r == Some(0.0) => lhs,
        _ => Node::BinaryOp(BinaryExpression {
            kind,
            lhs: lhs.into(),
            rhs: rhs.into(),
        }),
    }
}

fn literal(node: &Node) -> Option<f64> {
    match node {
        Node::Numeric(text) => parse_numeric(text),
        _ => None,
    }
}

fn bool_value(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}
