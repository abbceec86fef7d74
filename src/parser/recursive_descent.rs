use std::collections::{BTreeSet, VecDeque};

use anyhow::{bail, Result};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::{
    error::ParseError,
    lexer::lex::{Span, SpannedToken, Token},
    parser::ast::{
        AssignmentStatement, BatchMode, BinaryExpression, BinaryExpressionKind, BlockStatement,
        CallExpression, ComparisonExpression, ComparisonKind, DeviceAddressing, DeviceConfig,
        Identifier, IfStatement, LogicalExpression, LogicalKind, LoopStatement, Node, Program,
        TernaryExpression, UnaryExpression, UnaryExpressionKind, VariableDeclaration,
        WhileStatement,
    },
    util::{self, BUILTIN_FUNCTIONS, PSEUDO_OPS},
};

lazy_static! {
    static ref PORT_RE: Regex = Regex::new(r"^d[0-9b]$").unwrap();
}

const MAX_DEVICE_ARGUMENTS: usize = 3;

enum DeviceArgument {
    Name(String),
    Text(String),
}

pub struct Parser {
    pub tokens: VecDeque<SpannedToken>,
    pub current: Option<SpannedToken>,
    pub previous: Option<SpannedToken>,
    declared: BTreeSet<String>,
    loop_depth: usize,
}

impl Parser {
    pub fn new(tokens: VecDeque<SpannedToken>) -> Parser {
        let tokens = tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Comment(_)))
            .collect();
        Parser {
            tokens,
            current: None,
            previous: None,
            declared: BTreeSet::new(),
            loop_depth: 0,
        }
    }

    fn advance(&mut self) -> Option<SpannedToken> {
        self.previous = self.current.take();
        self.current = self.tokens.pop_front();
        self.previous.clone()
    }

    fn consume(&mut self, token: &Token, expected: &str) -> Result<SpannedToken> {
        if self.check(token) {
            if let Some(t) = self.advance() {
                return Ok(t);
            }
        }
        Err(self.unexpected(expected))
    }

    fn consume_identifier(&mut self, expected: &str) -> Result<(String, Span)> {
        match self.consume(&Token::Identifier(String::new()), expected)? {
            SpannedToken {
                token: Token::Identifier(name),
                span,
            } => Ok((name, span)),
            _ => unreachable!(),
        }
    }

    fn check(&self, token: &Token) -> bool {
        match &self.current {
            Some(t) => std::mem::discriminant(&t.token) == std::mem::discriminant(token),
            None => false,
        }
    }

    fn is_next(&mut self, tokens: &[Token]) -> bool {
        for token in tokens {
            if self.check(token) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn previous_span(&self) -> Span {
        self.previous.as_ref().map(|t| t.span).unwrap_or_default()
    }

    fn unexpected(&self, expected: &str) -> anyhow::Error {
        match &self.current {
            Some(t) => ParseError::UnexpectedToken {
                expected: expected.to_owned(),
                found: t.token.to_string(),
                span: t.span,
            }
            .into(),
            None => ParseError::UnexpectedEof {
                expected: expected.to_owned(),
            }
            .into(),
        }
    }

    pub fn parse(&mut self) -> Result<Program> {
        self.advance();
        let mut statements = vec![];
        while self.current.is_some() {
            statements.push(self.parse_statement()?);
        }
        debug!("parsed {} top-level statements", statements.len());
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Node> {
        if self.is_next(&[Token::Var]) {
            self.parse_variable_declaration()
        } else if self.is_next(&[Token::Loop]) {
            self.parse_loop_statement()
        } else if self.is_next(&[Token::While]) {
            self.parse_while_statement()
        } else if self.is_next(&[Token::If]) {
            self.parse_if_statement()
        } else if self.is_next(&[Token::Break]) {
            self.parse_loop_control(Node::Break, "break")
        } else if self.is_next(&[Token::Continue]) {
            self.parse_loop_control(Node::Continue, "continue")
        } else if self.is_next(&[Token::Device]) {
            let device = self.parse_device_config()?;
            self.consume(&Token::Semicolon, "';'")?;
            Ok(device)
        } else if self.is_next(&[Token::LBrace]) {
            self.parse_block_statement()
        } else if self.check(&Token::Identifier(String::new())) {
            let (name, span) = self.consume_identifier("identifier")?;
            if PSEUDO_OPS.contains_key(name.as_str()) {
                self.parse_pseudo_op(name, span)
            } else {
                self.parse_assignment(name, span)
            }
        } else {
            Err(self.unexpected("statement"))
        }
    }

    fn parse_variable_declaration(&mut self) -> Result<Node> {
        let (name, span) = self.consume_identifier("variable name")?;
        // A statement starting with a pseudo-op name is always a call.
        if self.declared.contains(&name)
            || util::is_constant(&name)
            || PSEUDO_OPS.contains_key(name.as_str())
        {
            bail!(ParseError::Redeclared { name, span });
        }
        self.consume(&Token::Equal, "'='")?;
        let init = self.parse_expression()?;
        self.consume(&Token::Semicolon, "';'")?;

        self.declared.insert(name.clone());

        Ok(Node::VariableDecl(VariableDeclaration {
            name,
            init: init.into(),
        }))
    }

    fn parse_loop_body(&mut self) -> Result<Node> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        body
    }

    fn parse_loop_statement(&mut self) -> Result<Node> {
        let body = self.parse_loop_body()?;
        Ok(Node::Loop(LoopStatement { body: body.into() }))
    }

    fn parse_while_statement(&mut self) -> Result<Node> {
        let condition = self.parse_condition()?;
        let body = self.parse_loop_body()?;
        Ok(Node::ConditionalLoop(WhileStatement {
            condition: condition.into(),
            body: body.into(),
        }))
    }

    fn parse_if_statement(&mut self) -> Result<Node> {
        let condition = self.parse_condition()?;
        let then_branch = self.parse_statement()?;

        let else_branch: Option<Box<Node>> = if self.is_next(&[Token::Elif]) {
            Some(self.parse_if_statement()?.into())
        } else if self.is_next(&[Token::Else]) {
            Some(self.parse_statement()?.into())
        } else {
            None
        };

        Ok(Node::ConditionalStatement(IfStatement {
            condition: condition.into(),
            then_branch: then_branch.into(),
            else_branch,
        }))
    }

    fn parse_condition(&mut self) -> Result<Node> {
        self.consume(&Token::LParen, "'('")?;
        let condition = self.parse_expression()?;
        self.consume(&Token::RParen, "')'")?;
        Ok(condition)
    }

    fn parse_loop_control(&mut self, node: Node, keyword: &str) -> Result<Node> {
        if self.loop_depth == 0 {
            bail!(ParseError::LoopControlOutsideLoop {
                keyword: keyword.to_owned(),
                span: self.previous_span(),
            });
        }
        self.consume(&Token::Semicolon, "';'")?;
        Ok(node)
    }

    fn parse_block_statement(&mut self) -> Result<Node> {
        let mut statements = vec![];
        while !self.check(&Token::RBrace) {
            if self.current.is_none() {
                return Err(self.unexpected("'}'"));
            }
            statements.push(self.parse_statement()?);
        }
        self.consume(&Token::RBrace, "'}'")?;
        Ok(Node::Block(BlockStatement { statements }))
    }

    fn parse_pseudo_op(&mut self, name: String, span: Span) -> Result<Node> {
        self.consume(&Token::LParen, "'('")?;
        let args = self.parse_arguments()?;
        check_arity(&name, PSEUDO_OPS[name.as_str()], args.len(), span)?;
        self.consume(&Token::Semicolon, "';'")?;
        Ok(Node::Call(CallExpression { name, args }))
    }

    fn parse_assignment(&mut self, name: String, span: Span) -> Result<Node> {
        if !self.declared.contains(&name) {
            bail!(ParseError::Undeclared { name, span });
        }
        let target = self.parse_identifier_suffix(name, span)?;
        self.consume(&Token::Equal, "'='")?;
        let expr = self.parse_expression()?;
        self.consume(&Token::Semicolon, "';'")?;
        Ok(Node::Assignment(AssignmentStatement {
            target,
            expr: expr.into(),
        }))
    }

    fn parse_identifier_suffix(&mut self, name: String, span: Span) -> Result<Identifier> {
        let index = if self.is_next(&[Token::LBracket]) {
            let index = self.parse_expression()?;
            self.consume(&Token::RBracket, "']'")?;
            Some(Box::new(index))
        } else {
            None
        };

        let property = if self.is_next(&[Token::Dot]) {
            Some(self.consume_identifier("logic type")?.0)
        } else {
            None
        };

        if index.is_some() && property.is_none() {
            bail!(ParseError::IndexWithoutProperty { name, span });
        }

        Ok(Identifier {
            name,
            index,
            property,
        })
    }

    /// Arguments of a call whose `(` was already consumed, through `)`.
    fn parse_arguments(&mut self) -> Result<Vec<Node>> {
        let mut args = vec![];
        if !self.check(&Token::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.is_next(&[Token::Comma]) {
                    break;
                }
            }
        }
        self.consume(&Token::RParen, "')'")?;
        Ok(args)
    }

    fn parse_device_config(&mut self) -> Result<Node> {
        let span = self.previous_span();
        self.consume(&Token::LParen, "'('")?;

        let mut args = vec![];
        loop {
            if args.len() == MAX_DEVICE_ARGUMENTS {
                bail!(ParseError::TooManyDeviceArguments { span });
            }
            args.push(self.parse_device_argument()?);
            if !self.is_next(&[Token::Comma]) {
                break;
            }
        }
        self.consume(&Token::RParen, "')'")?;

        let malformed = |reason: &str| ParseError::MalformedDevice {
            reason: reason.to_owned(),
            span,
        };

        let mut args = args.into_iter();
        let device_type = match args.next() {
            Some(DeviceArgument::Name(t) | DeviceArgument::Text(t)) => t,
            None => unreachable!(),
        };

        let addressing = match (args.next(), args.next()) {
            (None, _) => bail!(malformed("missing device address")),
            (Some(DeviceArgument::Name(port)), None) if PORT_RE.is_match(&port) => {
                DeviceAddressing::Port(port)
            }
            (Some(DeviceArgument::Name(port)), Some(_)) if PORT_RE.is_match(&port) => {
                bail!(malformed("a port address takes no batch mode"))
            }
            (Some(DeviceArgument::Text(name)), Some(DeviceArgument::Name(mode))) => {
                match BatchMode::from_name(&mode) {
                    Some(mode) => DeviceAddressing::NamedBatch { name, mode },
                    None => bail!(malformed(&format!("unknown batch mode `{}`", mode))),
                }
            }
            (Some(DeviceArgument::Text(_)), _) => {
                bail!(malformed("a device name must be followed by a batch mode"))
            }
            (Some(DeviceArgument::Name(mode)), None) => match BatchMode::from_name(&mode) {
                Some(mode) => DeviceAddressing::Batch(mode),
                None => bail!(malformed(&format!("`{}` is neither a port nor a batch mode", mode))),
            },
            (Some(DeviceArgument::Name(_)), Some(_)) => {
                bail!(malformed("expected a port, a batch mode, or a name and a batch mode"))
            }
        };

        Ok(Node::DeviceConfig(DeviceConfig {
            device_type,
            addressing,
        }))
    }

    fn parse_device_argument(&mut self) -> Result<DeviceArgument> {
        match self.current.as_ref().map(|t| &t.token) {
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Ok(DeviceArgument::Name(name))
            }
            Some(Token::StringLiteral(text)) => {
                let text = text.clone();
                self.advance();
                Ok(DeviceArgument::Text(text))
            }
            _ => Err(self.unexpected("device argument")),
        }
    }

    pub fn parse_expression(&mut self) -> Result<Node> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Node> {
        let condition = self.parse_logical()?;
        if self.is_next(&[Token::QuestionMark]) {
            let then_expr = self.parse_ternary()?;
            self.consume(&Token::Colon, "':'")?;
            let else_expr = self.parse_ternary()?;
            return Ok(Node::Ternary(TernaryExpression {
                condition: condition.into(),
                then_expr: then_expr.into(),
                else_expr: else_expr.into(),
            }));
        }
        Ok(condition)
    }

    fn parse_logical(&mut self) -> Result<Node> {
        let mut result = self.parse_comparison()?;
        while self.is_next(&[Token::DoubleAmpersand, Token::DoublePipe]) {
            let kind = match self.previous.as_ref().map(|t| &t.token) {
                Some(Token::DoubleAmpersand) => LogicalKind::And,
                _ => LogicalKind::Or,
            };
            let rhs = self.parse_comparison()?;
            result = Node::Logical(LogicalExpression {
                kind,
                lhs: result.into(),
                rhs: rhs.into(),
            });
        }
        Ok(result)
    }

    fn parse_comparison(&mut self) -> Result<Node> {
        let mut result = self.parse_unary()?;
        while self.is_next(&[
            Token::DoubleEqual,
            Token::BangEqual,
            Token::Less,
            Token::LessEqual,
            Token::Greater,
            Token::GreaterEqual,
        ]) {
            let kind = match self.previous.as_ref().map(|t| &t.token) {
                Some(Token::DoubleEqual) => ComparisonKind::Equal,
                Some(Token::BangEqual) => ComparisonKind::NotEqual,
                Some(Token::Less) => ComparisonKind::Less,
                Some(Token::LessEqual) => ComparisonKind::LessEqual,
                Some(Token::Greater) => ComparisonKind::Greater,
                _ => ComparisonKind::GreaterEqual,
            };
            let rhs = self.parse_unary()?;
            result = Node::Comparison(ComparisonExpression {
                kind,
                lhs: result.into(),
                rhs: rhs.into(),
            });
        }
        Ok(result)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        if self.is_next(&[Token::Bang]) {
            let expr = self.parse_unary()?;
            return Ok(Node::UnaryOp(UnaryExpression {
                kind: UnaryExpressionKind::Not,
                expr: expr.into(),
            }));
        }
        self.parse_term()
    }

    fn parse_term(&mut self) -> Result<Node> {
        let mut result = self.parse_factor()?;
        while self.is_next(&[Token::Plus, Token::Hyphen]) {
            let kind = match self.previous.as_ref().map(|t| &t.token) {
                Some(Token::Plus) => BinaryExpressionKind::Add,
                _ => BinaryExpressionKind::Sub,
            };
            let rhs = self.parse_factor()?;
            result = Node::BinaryOp(BinaryExpression {
                kind,
                lhs: result.into(),
                rhs: rhs.into(),
            });
        }
        Ok(result)
    }

    fn parse_factor(&mut self) -> Result<Node> {
        let mut result = self.parse_primary()?;
        while self.is_next(&[Token::Star, Token::Slash]) {
            let kind = match self.previous.as_ref().map(|t| &t.token) {
                Some(Token::Star) => BinaryExpressionKind::Mul,
                _ => BinaryExpressionKind::Div,
            };
            let rhs = self.parse_primary()?;
            result = Node::BinaryOp(BinaryExpression {
                kind,
                lhs: result.into(),
                rhs: rhs.into(),
            });
        }
        Ok(result)
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let Some(current) = self.current.clone() else {
            return Err(self.unexpected("expression"));
        };

        match current.token {
            Token::Number(text) => {
                self.advance();
                Ok(Node::Numeric(text))
            }
            Token::Hyphen => {
                self.advance();
                match self.current.as_ref().map(|t| &t.token) {
                    Some(Token::Number(text)) => {
                        let node = negative_literal(text);
                        self.advance();
                        Ok(node)
                    }
                    _ => Err(self.unexpected("number")),
                }
            }
            Token::Hash => {
                self.advance();
                self.consume(&Token::LParen, "'('")?;
                let s = match self.consume(&Token::StringLiteral(String::new()), "string")? {
                    SpannedToken {
                        token: Token::StringLiteral(s),
                        ..
                    } => s,
                    _ => unreachable!(),
                };
                self.consume(&Token::RParen, "')'")?;
                Ok(Node::HashLiteral(s))
            }
            Token::Device => {
                self.advance();
                self.parse_device_config()
            }
            Token::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                if !self.check(&Token::RParen) {
                    bail!(ParseError::UnterminatedGrouping { span: current.span });
                }
                self.advance();
                Ok(expr)
            }
            Token::Identifier(name) => {
                self.advance();
                self.parse_named(name, current.span)
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_named(&mut self, name: String, span: Span) -> Result<Node> {
        if self.check(&Token::LParen) {
            if let Some(arity) = BUILTIN_FUNCTIONS.get(name.as_str()) {
                self.advance();
                let args = self.parse_arguments()?;
                check_arity(&name, *arity, args.len(), span)?;
                return Ok(Node::Call(CallExpression { name, args }));
            }
            if PSEUDO_OPS.contains_key(name.as_str()) {
                bail!(ParseError::UnexpectedToken {
                    expected: "expression".to_owned(),
                    found: Token::Identifier(name).to_string(),
                    span,
                });
            }
            bail!(ParseError::UnknownFunction { name, span });
        }

        if util::is_constant(&name) {
            return Ok(Node::ConstantRef(name));
        }
        if !self.declared.contains(&name) {
            bail!(ParseError::Undeclared { name, span });
        }
        Ok(Node::Identifier(self.parse_identifier_suffix(name, span)?))
    }
}

fn check_arity(name: &str, expected: usize, found: usize, span: Span) -> Result<()> {
    if expected != found {
        bail!(ParseError::ArityMismatch {
            name: name.to_owned(),
            expected,
            found,
            span,
        });
    }
    Ok(())
}

/// Hex and binary operands are re-encoded as decimal once negated.
fn negative_literal(text: &str) -> Node {
    if text.starts_with('$') || text.starts_with('%') {
        if let Some(value) = util::parse_numeric(text) {
            return util::number_node(-value);
        }
    }
    Node::Numeric(format!("-{}", text))
}
